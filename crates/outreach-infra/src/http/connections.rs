//! `ConnectionSource` over HTTP.

use std::time::Duration;

use outreach_core::service::ConnectionSource;
use outreach_types::connection::Connection;
use outreach_types::error::FetchError;
use secrecy::SecretString;
use serde::Deserialize;

use super::{authorize, build_client, join_url};

/// Fetches the signed-in user's full connection list with
/// `GET {base_url}/connections?user_id=...`.
pub struct HttpConnectionSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    user_id: Option<String>,
}

/// The service answers with either a bare array or `{ "connections": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ConnectionsResponse {
    List(Vec<Connection>),
    Wrapped { connections: Vec<Connection> },
}

impl HttpConnectionSource {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
            api_key,
            user_id: None,
        })
    }

    /// Scope fetches to `user_id`.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

fn parse_connections(body: &str) -> Result<Vec<Connection>, FetchError> {
    match serde_json::from_str::<ConnectionsResponse>(body) {
        Ok(ConnectionsResponse::List(connections))
        | Ok(ConnectionsResponse::Wrapped { connections }) => Ok(connections),
        Err(e) => Err(FetchError::Decode(e.to_string())),
    }
}

impl ConnectionSource for HttpConnectionSource {
    async fn fetch_connections(&self) -> Result<Vec<Connection>, FetchError> {
        let user_id = self.user_id.as_deref().ok_or(FetchError::NoNamespace)?;
        let url = join_url(&self.base_url, "connections");

        tracing::debug!(url = url.as_str(), user_id, "fetching connections");
        let request = self.client.get(&url).query(&[("user_id", user_id)]);
        let response = authorize(request, self.api_key.as_ref())
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let connections = parse_connections(&body)?;
        tracing::debug!(user_id, count = connections.len(), "connections fetched");
        Ok(connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_server::serve_once;
    use outreach_types::connection::ConnectionStatus;

    fn source(base_url: &str) -> HttpConnectionSource {
        HttpConnectionSource::new(
            base_url,
            Some(SecretString::from("test-key-not-real")),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_bare_and_wrapped_lists() {
        let bare = r#"[{"id":"c1","status":"ally","name":"Ada"}]"#;
        let wrapped = r#"{"connections":[{"id":"c1","status":"ally","name":"Ada"}]}"#;

        assert_eq!(parse_connections(bare).unwrap()[0].id, "c1");
        assert_eq!(
            parse_connections(wrapped).unwrap()[0].status,
            ConnectionStatus::Ally
        );
        assert!(matches!(parse_connections("{}"), Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_fetch_without_user_is_rejected() {
        let source = source("http://127.0.0.1:9");
        assert_eq!(
            source.fetch_connections().await.unwrap_err(),
            FetchError::NoNamespace
        );
    }

    #[tokio::test]
    async fn test_fetch_sends_user_and_bearer() {
        let (url, captured) =
            serve_once(200, r#"[{"id":"c1","status":"ally","name":"Ada"}]"#).await;

        let connections = source(&url).with_user("u1").fetch_connections().await.unwrap();
        assert_eq!(connections.len(), 1);

        let captured = captured.await.unwrap();
        assert!(captured.head.starts_with("GET /connections?user_id=u1 "));
        assert!(
            captured
                .head
                .to_lowercase()
                .contains("authorization: bearer test-key-not-real")
        );
    }

    #[tokio::test]
    async fn test_fetch_error_status_is_reported() {
        let (url, _captured) = serve_once(503, r#"{"error":"down"}"#).await;

        let err = source(&url).with_user("u1").fetch_connections().await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }
}
