//! HTTP clients for the connection service and the message generator.
//!
//! Both talk JSON to the same service base URL. The API key, when present,
//! is sent as a bearer token and is never logged.

pub mod connections;
pub mod generator;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

pub use connections::HttpConnectionSource;
pub use generator::HttpMessageGenerator;

fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("outreach/", env!("CARGO_PKG_VERSION")))
        .build()
}

fn authorize(request: reqwest::RequestBuilder, api_key: Option<&SecretString>) -> reqwest::RequestBuilder {
    match api_key {
        Some(key) => request.bearer_auth(key.expose_secret()),
        None => request,
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
