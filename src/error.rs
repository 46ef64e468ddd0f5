use thiserror::Error;

/// Terminal failures for a single scrape request.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid URL {input:?}: {reason}")]
    Validation { input: String, reason: String },

    #[error("fetch failed for {url}: {kind}")]
    Fetch { url: String, kind: FetchFailure },

    #[error("could not parse document: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("timed out after {0}s")]
    Timeout(u64),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("unexpected content type {0:?}")]
    ContentType(String),
    #[error("{0}")]
    Network(String),
}

impl ScrapeError {
    pub fn validation(input: &str, reason: impl Into<String>) -> Self {
        ScrapeError::Validation {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub fn fetch(url: &url::Url, kind: FetchFailure) -> Self {
        ScrapeError::Fetch {
            url: url.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("summarizer is not configured: missing {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model returned no content")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialize record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not create {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
