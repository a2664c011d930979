// src/fetch/client.rs
use reqwest::header;
use std::time::Duration;

use crate::utils::error::FetchError;

/// Creates the reqwest client used for static pages.
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent) // Sites serve reduced markup to unknown agents
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Downloads a static page's markup.
pub async fn download_page(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    tracing::info!("Downloading page from: {}", url);

    let response = client
        .get(url)
        .header(header::ACCEPT, "text/html,application/xhtml+xml,*/*")
        .header(header::ACCEPT_LANGUAGE, "es-ES,es;q=0.9,en;q=0.8")
        .send()
        .await?; // Transport errors and timeouts become FetchError::Network

    let status = response.status();
    if !status.is_success() {
        tracing::error!("HTTP error status: {} for URL: {}", status, url);
        return Err(FetchError::Http(status));
    }

    let body = response.text().await?;
    tracing::debug!("Successfully downloaded {} bytes from {}", body.len(), url);
    Ok(body)
}
