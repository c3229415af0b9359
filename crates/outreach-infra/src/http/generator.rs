//! `MessageGenerator` over HTTP.
//!
//! POSTs the `GenerationRequest` as JSON to `{base_url}/messages/generate`
//! and expects `{ "message": "..." }` back. HTTP failures are mapped onto
//! `GenerationError` so the recovery policy can tell a rate limit from a
//! bad credential.

use std::time::Duration;

use outreach_core::service::MessageGenerator;
use outreach_types::error::GenerationError;
use outreach_types::generation::GenerationRequest;
use secrecy::SecretString;
use serde::Deserialize;

use super::{authorize, build_client, join_url};

pub struct HttpMessageGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    message: String,
}

impl HttpMessageGenerator {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
            api_key,
        })
    }
}

/// Map a non-success status to a generation error.
fn classify_status(status: u16, body: String) -> GenerationError {
    match status {
        401 | 403 => GenerationError::Unauthorized,
        429 => GenerationError::RateLimited,
        408 | 504 => GenerationError::Timeout,
        404 => GenerationError::Configuration(format!("generation endpoint not found: {body}")),
        500..=599 => GenerationError::Unavailable(format!("HTTP {status}: {body}")),
        _ => GenerationError::InvalidRequest(format!("HTTP {status}: {body}")),
    }
}

fn classify_transport(err: &reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout
    } else if err.is_builder() {
        GenerationError::Configuration(err.to_string())
    } else {
        GenerationError::Unavailable(err.to_string())
    }
}

fn parse_message(body: &str) -> Result<String, GenerationError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::Unavailable(format!("malformed response: {e}")))?;
    let text = response.message.trim();
    if text.is_empty() {
        return Err(GenerationError::EmptyMessage);
    }
    Ok(text.to_string())
}

impl MessageGenerator for HttpMessageGenerator {
    async fn generate_message(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let url = join_url(&self.base_url, "messages/generate");
        tracing::debug!(
            url = url.as_str(),
            connection_id = request.connection.id.as_str(),
            "requesting message generation"
        );

        let response = authorize(self.client.post(&url).json(request), self.api_key.as_ref())
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| classify_transport(&e))?;
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), body));
        }

        parse_message(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_server::serve_once;
    use outreach_types::connection::{Connection, ConnectionStatus, SenderProfile};

    fn request() -> GenerationRequest {
        GenerationRequest {
            connection: Connection::new("c1", "Ada", ConnectionStatus::Ally),
            topic: "AI trends".to_string(),
            sender: SenderProfile::default(),
            include_history: false,
        }
    }

    fn generator(base_url: &str) -> HttpMessageGenerator {
        HttpMessageGenerator::new(base_url, None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(401, String::new()), GenerationError::Unauthorized);
        assert_eq!(classify_status(403, String::new()), GenerationError::Unauthorized);
        assert_eq!(classify_status(429, String::new()), GenerationError::RateLimited);
        assert_eq!(classify_status(504, String::new()), GenerationError::Timeout);
        assert!(matches!(classify_status(404, String::new()), GenerationError::Configuration(_)));
        assert!(matches!(classify_status(502, String::new()), GenerationError::Unavailable(_)));
        assert!(matches!(classify_status(422, String::new()), GenerationError::InvalidRequest(_)));
    }

    #[test]
    fn test_parse_message_trims_and_rejects_blank() {
        assert_eq!(parse_message(r#"{"message":"  Hi Ada \n"}"#).unwrap(), "Hi Ada");
        assert_eq!(
            parse_message(r#"{"message":"   "}"#).unwrap_err(),
            GenerationError::EmptyMessage
        );
        assert!(matches!(
            parse_message("not json").unwrap_err(),
            GenerationError::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_generate_posts_request_json() {
        let (url, captured) = serve_once(200, r#"{"message":"Hi Ada, about AI trends."}"#).await;

        let text = generator(&url).generate_message(&request()).await.unwrap();
        assert_eq!(text, "Hi Ada, about AI trends.");

        let captured = captured.await.unwrap();
        assert!(captured.head.starts_with("POST /messages/generate "));
        let sent: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
        assert_eq!(sent["connection"]["id"], "c1");
        assert_eq!(sent["topic"], "AI trends");
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let (url, _captured) = serve_once(429, r#"{"error":"slow down"}"#).await;

        let err = generator(&url).generate_message(&request()).await.unwrap_err();
        assert_eq!(err, GenerationError::RateLimited);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = generator(&format!("http://{addr}"))
            .generate_message(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Unavailable(_)));
    }
}
