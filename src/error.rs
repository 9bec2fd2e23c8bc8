//! Error types.

use std::path::PathBuf;

/// Failures while turning a file into an image asset.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed data URI: {0}")]
    MalformedDataUri(String),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Failures from a single round trip to the model service.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    #[error("{0}")]
    Service(String),

    #[error("API error ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("Analysis timed out after {0}s")]
    Timeout(u64),
}

/// Intents the workflow refuses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("No image has been uploaded")]
    NoImage,

    #[error("An analysis is already in progress")]
    AnalysisInFlight,

    #[error("Nothing to retry in the {0} state")]
    NothingToRetry(&'static str),

    #[error("Workflow has shut down")]
    Closed,
}
