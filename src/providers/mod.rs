//! Text-generation providers.

use reqwest::Client;
use std::sync::Arc;

pub mod deepseek;
pub mod provider;

pub use provider::{ProviderError, Result, TextGenerator};

use crate::config::Settings;

/// Build the configured text generator, or `None` when no API key is set.
pub fn create_text_generator(settings: &Settings, http: Client) -> Option<Arc<dyn TextGenerator>> {
    match settings.llm.api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => Some(Arc::new(deepseek::DeepSeekProvider::new(
            http,
            key,
            &settings.llm,
        ))),
        _ => {
            tracing::warn!("No LLM API key configured; /chat will answer with an error");
            None
        }
    }
}
