//! In-memory fakes for the core ports, shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use outreach_types::connection::{Connection, ConnectionStatus};
use outreach_types::error::{FetchError, GenerationError, RepositoryError};
use outreach_types::generation::GenerationRequest;
use outreach_types::storage::KvEntry;
use tokio::sync::watch;

use crate::service::{ConnectionSource, MessageGenerator};
use crate::storage::kv_store::KvStore;

pub fn ally(id: &str, name: &str) -> Connection {
    Connection::new(id, name, ConnectionStatus::Ally)
}

pub fn with_status(id: &str, name: &str, status: ConnectionStatus) -> Connection {
    Connection::new(id, name, status)
}

/// HashMap-backed `KvStore`.
#[derive(Default)]
pub struct MemKv {
    entries: Mutex<HashMap<(String, String), serde_json::Value>>,
    pub writes: AtomicUsize,
}

impl MemKv {
    pub fn raw(&self, namespace: &str, key: &str) -> Option<serde_json::Value> {
        self.entries
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }
}

impl KvStore for MemKv {
    async fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        Ok(self.raw(namespace, key))
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert((namespace.to_string(), key.to_string()), value.clone());
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), RepositoryError> {
        self.entries
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, RepositoryError> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn get_entry(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<KvEntry>, RepositoryError> {
        Ok(self.raw(namespace, key).map(|value| KvEntry {
            namespace: namespace.to_string(),
            key: key.to_string(),
            value,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }))
    }
}

/// `ConnectionSource` that counts calls and can be held open until released.
pub struct FakeSource {
    result: Mutex<Result<Vec<Connection>, FetchError>>,
    pub calls: AtomicUsize,
    release: watch::Receiver<bool>,
    release_tx: watch::Sender<bool>,
}

impl FakeSource {
    /// A source that answers immediately.
    pub fn ready(result: Result<Vec<Connection>, FetchError>) -> Self {
        let (release_tx, release) = watch::channel(true);
        Self {
            result: Mutex::new(result),
            calls: AtomicUsize::new(0),
            release,
            release_tx,
        }
    }

    /// A source whose calls block until `release()` is called.
    pub fn gated(result: Result<Vec<Connection>, FetchError>) -> Self {
        let source = Self::ready(result);
        source.release_tx.send_replace(false);
        source
    }

    pub fn release(&self) {
        self.release_tx.send_replace(true);
    }

    pub fn set_result(&self, result: Result<Vec<Connection>, FetchError>) {
        *self.result.lock().unwrap() = result;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConnectionSource for FakeSource {
    async fn fetch_connections(&self) -> Result<Vec<Connection>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut release = self.release.clone();
        let _ = release.wait_for(|open| *open).await;
        self.result.lock().unwrap().clone()
    }
}

/// One scripted generator response.
pub enum Scripted {
    Reply(Result<String, GenerationError>),
    /// Never completes; only a stop can get past it.
    Hang,
}

/// `MessageGenerator` that replays per-connection scripts and records calls.
#[derive(Default)]
pub struct ScriptedGenerator {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, connection_id: &str, responses: Vec<Scripted>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(connection_id.to_string(), responses.into());
        self
    }

    /// Connection ids in the order generation was attempted.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl MessageGenerator for ScriptedGenerator {
    async fn generate_message(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let id = request.connection.id.clone();
        self.calls.lock().unwrap().push(id.clone());
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&id)
            .and_then(|queue| queue.pop_front());
        match next {
            Some(Scripted::Reply(result)) => result,
            Some(Scripted::Hang) => std::future::pending().await,
            None => Ok(format!(
                "Hi {}, let's talk about {}.",
                request.connection.name, request.topic
            )),
        }
    }
}
