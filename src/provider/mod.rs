//! The opaque text-generation boundary.
//!
//! The core never inspects structured provider errors beyond their message
//! text; a provider is just "prompt in, free-form text out, may fail".

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

mod openai;
mod types;

pub use openai::{OPENAI_BASE_URL, OpenAiCompatProvider};

pub trait Provider: Send + Sync {
    /// Provider identifier (e.g. "openai").
    fn name(&self) -> &str;

    /// One generation call. The model identifier and temperature are
    /// forwarded verbatim; the reply is whatever text the model produced.
    fn generate<'a>(
        &'a self,
        system_prompt: &'a str,
        prompt: &'a str,
        model: &'a str,
        temperature: f64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;
}

/// Shared reqwest client with timeouts suited to chat-completion latency.
#[must_use]
pub fn build_provider_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(120))
        .build()
        .unwrap_or_default()
}
