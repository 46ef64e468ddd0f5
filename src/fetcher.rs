use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::error::{FetchFailure, ScrapeError};
use crate::settings::FetchSettings;

const HTML_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

/// Accept only absolute http(s) URLs with a host.
pub fn validate_url(input: &str) -> Result<Url, ScrapeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ScrapeError::validation(input, "empty"));
    }
    let url = Url::parse(trimmed).map_err(|e| ScrapeError::validation(input, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ScrapeError::validation(
                input,
                format!("unsupported scheme {other:?}, expected http or https"),
            ))
        }
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ScrapeError::validation(input, "missing host"));
    }
    Ok(url)
}

/// One GET per call, no retries.
pub struct Fetcher {
    client: Client,
    timeout_secs: u64,
}

impl Fetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(&settings.user_agent)
            .build()?;
        Ok(Fetcher {
            client,
            timeout_secs: settings.timeout_secs,
        })
    }

    pub async fn fetch(&self, url: &Url) -> Result<String, ScrapeError> {
        info!("Fetching {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.failure(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::fetch(url, FetchFailure::Status(status.as_u16())));
        }

        if let Some(value) = response.headers().get(CONTENT_TYPE) {
            let content_type = value.to_str().unwrap_or_default().to_ascii_lowercase();
            let mime = content_type.split(';').next().unwrap_or_default().trim();
            if !HTML_TYPES.contains(&mime) {
                return Err(ScrapeError::fetch(url, FetchFailure::ContentType(content_type)));
            }
        }

        let body = response.text().await.map_err(|e| self.failure(url, e))?;
        debug!(bytes = body.len(), "fetched body");
        Ok(body)
    }

    fn failure(&self, url: &Url, err: reqwest::Error) -> ScrapeError {
        let kind = if err.is_timeout() {
            FetchFailure::Timeout(self.timeout_secs)
        } else {
            FetchFailure::Network(err.to_string())
        };
        ScrapeError::fetch(url, kind)
    }
}
