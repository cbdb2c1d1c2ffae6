use thiserror::Error;

// ─── Per-attempt errors ──────────────────────────────────────────────────────

/// Failures recovered within a single attempt.
///
/// These never escape [`crate::StructuredOutputRequester::request`]: each one
/// is converted into feedback text for the next attempt's prompt.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// The generation call itself failed (network, auth, quota, timeout).
    #[error("provider call failed: {0}")]
    Provider(String),

    /// The sanitized response contained no balanced JSON object or array.
    #[error("no JSON object or array found in response")]
    NoJsonFound,

    /// The located JSON span did not parse.
    #[error("response was not valid JSON: {0}")]
    JsonParse(String),

    /// A record did not match the declared output shape.
    #[error("validation failed: {0}")]
    Validation(String),
}

// ─── Terminal errors ─────────────────────────────────────────────────────────

/// Errors surfaced to the caller. Callers receive either a fully valid
/// record set or one of these; there is no partial-result mode.
#[derive(Debug, Error)]
pub enum OutshapeError {
    /// Every attempt failed. Carries one message per failed attempt.
    #[error("all {attempts} attempts failed:\n{}", .failures.join("\n"))]
    RetriesExhausted {
        /// Number of attempts made (always equal to the configured bound).
        attempts: u32,
        /// Per-attempt failure messages, in attempt order.
        failures: Vec<String>,
    },

    /// The request configuration was rejected before the first attempt.
    #[error("invalid request: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_errors_display_their_cause() {
        let err = AttemptError::Provider("503 Service Unavailable".into());
        assert!(err.to_string().contains("503"));

        let err = AttemptError::Validation("missing required key \"answer\"".into());
        assert!(err.to_string().contains("answer"));
    }

    #[test]
    fn retries_exhausted_lists_every_failure() {
        let err = OutshapeError::RetriesExhausted {
            attempts: 2,
            failures: vec![
                "attempt 1/2: no JSON object or array found in response".into(),
                "attempt 2/2: response was not valid JSON: EOF".into(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("all 2 attempts failed"));
        assert!(msg.contains("attempt 1/2"));
        assert!(msg.contains("attempt 2/2"));
    }

    #[test]
    fn invalid_config_displays_reason() {
        let err = OutshapeError::InvalidConfig("num_tries must be at least 1".into());
        assert!(err.to_string().contains("num_tries"));
    }
}
