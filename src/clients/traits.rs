use async_trait::async_trait;
use thiserror::Error;

use crate::report::ImageAttachment;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("generator not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Transport(err.to_string())
    }
}

/// Produces a recommendation for an observation.
///
/// Callers guarantee `text` is non-empty. Implementations make a single
/// attempt; failures are reported, never retried.
#[async_trait]
pub trait Recommender: Send + Sync {
    async fn generate(
        &self,
        text: &str,
        image: Option<&ImageAttachment>,
    ) -> Result<String, GenerationError>;

    /// Short label for logs and the UI status line.
    fn name(&self) -> &str;
}
