//! Error types for the processing core.
//!
//! `GatewayError` covers everything a model call can fail with.
//! `SettingsError` covers the validated setters and their persistence.
//! Tauri commands flatten both into `String` at the boundary.

use crate::llm::provider::BackendFamily;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Marker the OpenAI backend puts in quota errors. Matched verbatim.
pub const OUT_OF_CREDITS_MARKER: &str = "API Key out of credits";

/// Failure from a single model stage (extract, solve, debug).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The configured identifier does not belong to any known backend family.
    #[error("Unsupported {stage} model: {model}")]
    UnsupportedModel { stage: &'static str, model: String },

    #[error("No {0} API key configured. Please close this window and re-enter a valid {0} API key.")]
    MissingCredential(BackendFamily),

    /// Debug was requested before any problem was extracted.
    #[error("No problem info available")]
    MissingProblem,

    /// Non-success response from the backend, message passed through.
    #[error("{0}")]
    Upstream(String),

    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse model response: {0}")]
    Parse(String),

    #[error("Request was canceled")]
    Cancelled,
}

impl GatewayError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GatewayError::Cancelled)
    }
}

/// How a failed run is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    CredentialExhausted,
    CredentialInvalid,
    Other,
}

fn invalid_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"re-enter a valid .*API key").expect("static regex is valid")
    })
}

/// Classify a failure message by the substrings the backends are known to use.
///
/// Out-of-credits wins over invalid-key when both appear.
pub fn classify_failure(message: &str) -> FailureKind {
    if message.contains(OUT_OF_CREDITS_MARKER) {
        FailureKind::CredentialExhausted
    } else if invalid_key_pattern().is_match(message) {
        FailureKind::CredentialInvalid
    } else {
        FailureKind::Other
    }
}

/// Failure from a settings setter or the settings store.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("Opacity {0} is out of range (10-100)")]
    OpacityOutOfRange(i64),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Settings file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_out_of_credits() {
        let msg = "API Key out of credits. Please refill your OpenAI API credits and try again.";
        assert_eq!(classify_failure(msg), FailureKind::CredentialExhausted);
    }

    #[test]
    fn classifies_invalid_key_for_any_provider() {
        assert_eq!(
            classify_failure("Please close this window and re-enter a valid Open AI API key."),
            FailureKind::CredentialInvalid
        );
        assert_eq!(
            classify_failure("Invalid key. Please close this window and re-enter a valid Gemini API key."),
            FailureKind::CredentialInvalid
        );
    }

    #[test]
    fn other_messages_stay_generic() {
        assert_eq!(classify_failure("Service overloaded"), FailureKind::Other);
        assert_eq!(classify_failure("out of credits"), FailureKind::Other);
    }

    #[test]
    fn missing_credential_message_is_classified_invalid() {
        let err = GatewayError::MissingCredential(BackendFamily::Anthropic);
        assert_eq!(classify_failure(&err.to_string()), FailureKind::CredentialInvalid);
    }
}
