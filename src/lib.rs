#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]

//! Schema-shaped structured output for LLM chat APIs.
//!
//! Declare the JSON shape you want, hand over a task, and get back validated
//! records. Malformed replies are repaired where possible (code fences,
//! single quotes, trailing commas) and otherwise retried with the failure
//! fed back into the next prompt, up to a bounded number of attempts.
//!
//! ```no_run
//! use outshape::{OpenAiCompatProvider, OutputShape, RequestConfig, StructuredOutputRequester};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let shape = OutputShape::new()
//!     .literal("answer", "a short answer")
//!     .choice("sentiment", ["positive", "negative", "neutral"]);
//!
//! let provider = OpenAiCompatProvider::new(Some("sk-..."));
//! let requester = StructuredOutputRequester::new(Box::new(provider));
//!
//! let config = RequestConfig::new("You are a classifier.", "The food was great!", shape);
//! let records = requester.request(&config).await?;
//! # Ok(()) }
//! ```

pub mod error;
pub mod provider;
pub mod request;
pub mod sanitize;
pub mod schema;

pub use error::{AttemptError, OutshapeError};
pub use provider::{OpenAiCompatProvider, Provider, build_provider_client};
pub use request::{DEFAULT_MODEL, Input, RequestConfig, StructuredOutputRequester};
pub use sanitize::sanitize;
pub use schema::{FieldSpec, OutputShape, is_placeholder};
