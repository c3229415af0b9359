//! Application state wiring all services together.
//!
//! AppState pins the generic core services to the concrete infra
//! implementations: SQLite for the durable cache, an in-memory store for
//! session markers, and the HTTP clients for the outreach service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use outreach_core::cache::{ConnectionCache, ConnectionLoader};
use outreach_core::event::EventBus;
use outreach_core::workflow::WorkflowOrchestrator;
use outreach_infra::config::load_global_config;
use outreach_infra::filesystem::resolve_data_dir;
use outreach_infra::http::{HttpConnectionSource, HttpMessageGenerator};
use outreach_infra::memory::MemoryKvStore;
use outreach_infra::secret::api_key_from_env;
use outreach_infra::sqlite::kv::SqliteKvStore;
use outreach_infra::sqlite::pool::{DatabasePool, database_url};
use outreach_types::config::GlobalConfig;

pub type ConcreteLoader = ConnectionLoader<HttpConnectionSource, SqliteKvStore, MemoryKvStore>;

pub type ConcreteOrchestrator = WorkflowOrchestrator<HttpMessageGenerator, SqliteKvStore>;

/// Shared application state for one signed-in user.
#[derive(Clone)]
pub struct AppState {
    pub loader: Arc<ConcreteLoader>,
    pub orchestrator: Arc<ConcreteOrchestrator>,
    pub event_bus: EventBus,
    pub config: GlobalConfig,
    pub user_id: String,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Connect to the DB, wire services, and sign `user_id` in.
    pub async fn init(user_id: &str) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_global_config(&data_dir).await;
        let pool = DatabasePool::new(&database_url(&data_dir))
            .await
            .context("failed to open the connection cache database")?;
        tracing::debug!(data_dir = %data_dir.display(), "database ready");

        let api_key = api_key_from_env();
        if api_key.is_none() {
            tracing::info!("OUTREACH_API_KEY not set, calling the service without credentials");
        }
        let timeout = Duration::from_secs(config.service.timeout_secs);
        let source = HttpConnectionSource::new(&config.service.base_url, api_key.clone(), timeout)?
            .with_user(user_id);
        let generator = HttpMessageGenerator::new(&config.service.base_url, api_key, timeout)?;

        let event_bus = EventBus::default();
        let cache = Arc::new(ConnectionCache::new(Arc::new(SqliteKvStore::new(pool))));
        let loader = Arc::new(ConnectionLoader::new(
            Arc::clone(&cache),
            Arc::new(source),
            Arc::new(MemoryKvStore::new()),
            event_bus.clone(),
        ));
        loader.sign_in(user_id).await?;

        let orchestrator = Arc::new(
            WorkflowOrchestrator::new(
                cache,
                Arc::new(generator),
                event_bus.clone(),
                config.workflow.clone(),
            )
            .with_sender_profile(config.sender.clone()),
        );

        Ok(Self {
            loader,
            orchestrator,
            event_bus,
            config,
            user_id: user_id.to_string(),
            data_dir,
        })
    }
}
