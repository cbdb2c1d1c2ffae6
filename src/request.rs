//! The request/validate/retry loop.
//!
//! One [`RequestConfig`] describes one call: the task, the desired
//! [`OutputShape`], and the retry bound. [`StructuredOutputRequester`] runs
//! up to `num_tries` sequential attempts of prompt-build, provider-call,
//! sanitize, parse, validate, feeding each failure back into the next
//! attempt's prompt. Attempt results are explicit `Result` values; the loop
//! pattern-matches, nothing unwinds.

use crate::error::{AttemptError, OutshapeError};
use crate::provider::Provider;
use crate::sanitize::sanitize;
use crate::schema::{FieldSpec, OutputShape, is_placeholder};
use serde_json::Value;
use std::fmt::Write;

/// Model used when the caller does not pick one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_NUM_TRIES: u32 = 3;

/// Raw response text beyond this length is truncated before it enters
/// feedback for the next attempt.
const MAX_FEEDBACK_RESPONSE_CHARS: usize = 2000;

// ─── Request configuration ───────────────────────────────────────────────────

/// One prompt, or an ordered batch. A batch means "produce one output
/// record per input, in order".
#[derive(Debug, Clone)]
pub enum Input {
    Single(String),
    Many(Vec<String>),
}

impl Input {
    fn batch_len(&self) -> Option<usize> {
        match self {
            Self::Single(_) => None,
            Self::Many(items) => Some(items.len()),
        }
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Self::Single(text.to_string())
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Self::Single(text)
    }
}

impl From<Vec<String>> for Input {
    fn from(items: Vec<String>) -> Self {
        Self::Many(items)
    }
}

impl From<Vec<&str>> for Input {
    fn from(items: Vec<&str>) -> Self {
        Self::Many(items.into_iter().map(str::to_string).collect())
    }
}

/// Immutable configuration for one structured-output call.
///
/// Read-only once built; safe to share across concurrent requests.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub system_prompt: String,
    pub input: Input,
    pub shape: OutputShape,
    /// Fallback substituted when an enum field comes back outside its
    /// allowed set. `None` leaves the invalid value in place.
    pub default_category: Option<String>,
    /// Return bare value(s) instead of keyed records.
    pub value_only: bool,
    pub model: String,
    pub temperature: f64,
    pub num_tries: u32,
    /// Echo raw provider responses at info level instead of debug.
    pub verbose: bool,
}

impl RequestConfig {
    pub fn new(
        system_prompt: impl Into<String>,
        input: impl Into<Input>,
        shape: OutputShape,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            input: input.into(),
            shape,
            default_category: None,
            value_only: false,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            num_tries: DEFAULT_NUM_TRIES,
            verbose: false,
        }
    }

    /// An empty category means "no default configured".
    #[must_use]
    pub fn default_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.default_category = if category.is_empty() {
            None
        } else {
            Some(category)
        };
        self
    }

    #[must_use]
    pub fn value_only(mut self, value_only: bool) -> Self {
        self.value_only = value_only;
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn num_tries(mut self, num_tries: u32) -> Self {
        self.num_tries = num_tries;
        self
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

// ─── Requester ───────────────────────────────────────────────────────────────

/// Runs bounded attempts of prompt-build, provider-call, sanitize, parse,
/// validate, and returns the first fully validated record set.
pub struct StructuredOutputRequester {
    provider: Box<dyn Provider>,
}

impl StructuredOutputRequester {
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Execute up to `num_tries` attempts and return the validated records.
    ///
    /// On success the full ordered record sequence is returned immediately.
    /// When every attempt fails, [`OutshapeError::RetriesExhausted`] carries
    /// one message per attempt; partial results are never returned.
    pub async fn request(&self, config: &RequestConfig) -> Result<Vec<Value>, OutshapeError> {
        if config.num_tries == 0 {
            return Err(OutshapeError::InvalidConfig(
                "num_tries must be at least 1".into(),
            ));
        }
        if config.shape.is_empty() {
            return Err(OutshapeError::InvalidConfig(
                "output shape must declare at least one field".into(),
            ));
        }

        let mut feedback = String::new();
        let mut failures = Vec::new();

        for attempt in 1..=config.num_tries {
            match self.run_attempt(config, &feedback).await {
                Ok(records) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "structured output recovered after retries");
                    }
                    return Ok(records);
                }
                Err((error, raw)) => {
                    tracing::warn!(
                        provider = self.provider.name(),
                        attempt,
                        num_tries = config.num_tries,
                        %error,
                        "structured output attempt failed"
                    );
                    failures.push(format!("attempt {attempt}/{}: {error}", config.num_tries));
                    push_feedback(&mut feedback, &error, raw.as_deref());
                }
            }
        }

        Err(OutshapeError::RetriesExhausted {
            attempts: config.num_tries,
            failures,
        })
    }

    /// One full attempt. The raw response text rides along with the error so
    /// the next prompt can show the model what it produced.
    async fn run_attempt(
        &self,
        config: &RequestConfig,
        feedback: &str,
    ) -> Result<Vec<Value>, (AttemptError, Option<String>)> {
        let system = build_system_prompt(config, feedback);
        let user = render_input(&config.input);

        let raw = self
            .provider
            .generate(&system, &user, &config.model, config.temperature)
            .await
            .map_err(|error| (AttemptError::Provider(error.to_string()), None))?;

        if config.verbose {
            tracing::info!(raw = raw.as_str(), "raw provider response");
        } else {
            tracing::debug!(raw = raw.as_str(), "raw provider response");
        }

        let candidate =
            sanitize(&raw).ok_or_else(|| (AttemptError::NoJsonFound, Some(raw.clone())))?;
        let parsed: Value = serde_json::from_str(&candidate)
            .map_err(|error| (AttemptError::JsonParse(error.to_string()), Some(raw.clone())))?;

        validate(config, parsed).map_err(|error| (error, Some(raw)))
    }
}

// ─── Prompt construction ─────────────────────────────────────────────────────

fn build_system_prompt(config: &RequestConfig, feedback: &str) -> String {
    let mut out = config.system_prompt.clone();

    let _ = write!(
        out,
        "\n\nYou are to output the following in JSON format: {}.",
        config.shape.render()
    );
    out.push_str(" Output a single JSON value matching this shape exactly.");
    out.push_str(
        " Do not wrap the output in code fences, do not use single quotes, \
         do not leave trailing commas, and do not add any prose.",
    );

    if let Some(batch_len) = config.input.batch_len() {
        let _ = write!(
            out,
            " You will receive {batch_len} inputs as a JSON array. Return a JSON array \
             with exactly one object per input, in the same order.",
        );
    }

    if config.shape.has_placeholders() {
        out.push_str(
            " Any field name or value wrapped in angle brackets, such as <topic>, \
             must be replaced with a concrete value appropriate to the input.",
        );
    }

    out.push_str(feedback);
    out
}

fn render_input(input: &Input) -> String {
    match input {
        Input::Single(text) => text.clone(),
        Input::Many(items) => Value::from(items.clone()).to_string(),
    }
}

fn push_feedback(feedback: &mut String, error: &AttemptError, raw: Option<&str>) {
    feedback.push_str("\n\nA previous attempt was rejected.");
    if let Some(raw) = raw {
        let shown: String = raw.chars().take(MAX_FEEDBACK_RESPONSE_CHARS).collect();
        let _ = write!(feedback, "\nIt produced: {shown}");
    }
    let _ = write!(
        feedback,
        "\nError: {error}\nReturn corrected JSON that fixes this error."
    );
}

// ─── Validation ──────────────────────────────────────────────────────────────

fn validate(config: &RequestConfig, parsed: Value) -> Result<Vec<Value>, AttemptError> {
    let records = match parsed {
        Value::Array(items) => items,
        single => vec![single],
    };

    if let Some(batch_len) = config.input.batch_len()
        && records.len() != batch_len
    {
        return Err(AttemptError::Validation(format!(
            "expected {batch_len} records, one per input, got {}",
            records.len()
        )));
    }

    records
        .into_iter()
        .map(|record| validate_record(config, record))
        .collect()
}

fn validate_record(config: &RequestConfig, record: Value) -> Result<Value, AttemptError> {
    let Value::Object(mut map) = record else {
        return Err(AttemptError::Validation(format!(
            "expected a JSON object, got {record}"
        )));
    };

    for (key, spec) in config.shape.fields() {
        let Some(value) = map.get_mut(key) else {
            // Placeholder keys are substituted dynamically, so absence is fine.
            if is_placeholder(key) {
                continue;
            }
            return Err(AttemptError::Validation(format!(
                "missing required key {key:?}"
            )));
        };

        if let FieldSpec::Enum(allowed) = spec {
            // Models sometimes return a list for a single choice; only the
            // first element counts.
            if let Value::Array(items) = value {
                *value = items.first().cloned().unwrap_or(Value::Null);
            }

            let in_set = value
                .as_str()
                .is_some_and(|v| allowed.iter().any(|a| a == v));
            if !in_set && let Some(default) = &config.default_category {
                *value = Value::String(default.clone());
            }
        }
    }

    if config.value_only {
        let mut values: Vec<Value> = config
            .shape
            .keys()
            .filter_map(|key| map.get(key).cloned())
            .collect();
        return Ok(if config.shape.len() == 1 {
            values.pop().unwrap_or(Value::Null)
        } else {
            Value::Array(values)
        });
    }

    Ok(Value::Object(map))
}
