// src/utils/error.rs
use std::time::Duration;
use thiserror::Error;

/// The rendering resource could not be obtained. Fatal, never retried.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Failed to open browser tab: {0}")]
    Tab(String),
}

// Network/status failures while obtaining markup
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Covers transport errors and client timeouts

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// The request went out but the page never reported itself loaded.
    #[error("Navigation to {url} did not settle within {after:?}")]
    NavigationTimeout { url: String, after: Duration },

    #[error("Could not read rendered markup: {0}")]
    Markup(String),

    #[error("Rendering did not finish within {0:?}")]
    Deadline(Duration),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Structure not found: {0}")]
    StructureNotFound(String),

    #[error("Field parse error: {0}")]
    FieldParse(String),
}

/// Top-level failure of a single pipeline invocation.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to initialize browser: {0}")]
    Session(#[from] SessionError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Scraping task aborted: {0}")]
    Task(String),
}

/// Coarse failure classes exposed at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Session,
    Fetch,
    StructureNotFound,
    Internal,
}

impl FailureKind {
    pub fn status_code(self) -> u16 {
        match self {
            FailureKind::Session => 503,
            FailureKind::Fetch => 502,
            FailureKind::StructureNotFound => 404,
            FailureKind::Internal => 500,
        }
    }
}

impl PipelineError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            PipelineError::Session(_) => FailureKind::Session,
            PipelineError::Fetch(FetchError::Markup(_)) => FailureKind::Internal,
            PipelineError::Fetch(_) => FailureKind::Fetch,
            PipelineError::Extract(ExtractError::StructureNotFound(_)) => FailureKind::StructureNotFound,
            PipelineError::Extract(_) | PipelineError::Task(_) => FailureKind::Internal,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Pipeline '{0}' failed")]
    Pipeline(&'static str),
}
