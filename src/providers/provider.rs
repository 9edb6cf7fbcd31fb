//! Text-generation provider trait.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not available: {0}")]
    NotAvailable(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Timeout")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    /// Classify a transport error, keeping timeouts distinct.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::HttpError(err)
        }
    }
}

/// Hosted language model that turns a prompt into reply text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider name.
    fn name(&self) -> &str;

    /// Model used for completions.
    fn model(&self) -> &str;

    /// Complete one exchange: a system instruction and the user's text.
    /// Returns the raw reply text, which is not guaranteed to be JSON.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}
