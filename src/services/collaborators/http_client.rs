use reqwest::Client;
use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};
use std::time::Duration;

/// Upper bound for a single collaborator call. The pipeline itself imposes no
/// timeout, so this is the only one a hanging collaborator will hit.
pub const COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(120);

/// Build the HTTP client shared by all collaborator adapters.
pub fn build_http_client() -> reqwest::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    Client::builder()
        .timeout(COLLABORATOR_TIMEOUT)
        .pool_idle_timeout(Some(Duration::from_secs(5)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .user_agent(concat!("acessivision-backend/", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .build()
}

/// Read an error body for logging without failing on unreadable bodies.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string())
}
