//! Shared response handling: error body mapping and JSON extraction.

use crate::error::{GatewayError, OUT_OF_CREDITS_MARKER};
use serde::de::DeserializeOwned;

use super::provider::BackendFamily;

/// Leading slice of `text` for log lines, cut on a char boundary.
pub(crate) fn preview(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Strip a surrounding markdown code fence (```json ... ```) if present.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let without_open = match trimmed.find('\n') {
        Some(pos) => &trimmed[pos + 1..],
        None => return String::new(),
    };
    let without_close = without_open
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(without_open);
    without_close.trim().to_string()
}

/// Parse model text into a structured type, tolerating code fences.
pub fn parse_model_json<T: DeserializeOwned>(text: &str) -> Result<T, GatewayError> {
    let json_text = strip_code_fences(text);
    serde_json::from_str::<T>(&json_text).map_err(|e| {
        log::warn!(
            "[LLM] Failed to parse model JSON: {}: raw: {}",
            e,
            preview(&json_text, 200)
        );
        GatewayError::Parse(e.to_string())
    })
}

/// Turn a non-success HTTP response into the user-facing upstream message.
///
/// Credential failures are rewritten into the two messages the pipeline
/// classifies; everything else passes the backend's own message through.
pub fn upstream_error(family: BackendFamily, status: u16, body: &str) -> GatewayError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let backend_message = parsed
        .as_ref()
        .and_then(extract_error_message)
        .unwrap_or_else(|| body.trim().to_string());
    let code = parsed
        .as_ref()
        .and_then(extract_error_code)
        .unwrap_or_default();

    let provider_name = match family {
        BackendFamily::OpenAi => "Open AI".to_string(),
        other => other.to_string(),
    };

    let message = if is_invalid_key(status, &code, parsed.as_ref(), &backend_message) {
        format!(
            "Invalid API key ({}). Please close this window and re-enter a valid {} API key.",
            status, provider_name
        )
    } else if is_quota_error(status, &code, &backend_message) {
        format!(
            "{}. Please refill your {} API credits and try again.",
            OUT_OF_CREDITS_MARKER, family
        )
    } else if backend_message.is_empty() {
        format!("{} API error ({})", family, status)
    } else {
        backend_message
    };

    GatewayError::Upstream(message)
}

/// 401/403 from any backend, OpenAI's `invalid_api_key` code, or Gemini's
/// 400 with `details[].reason == "API_KEY_INVALID"`.
fn is_invalid_key(status: u16, code: &str, body: Option<&serde_json::Value>, message: &str) -> bool {
    if status == 401 || status == 403 || code == "invalid_api_key" {
        return true;
    }
    let reason_invalid = body
        .and_then(|json| json.pointer("/error/details"))
        .and_then(|details| details.as_array())
        .is_some_and(|details| {
            details
                .iter()
                .any(|d| d.get("reason").and_then(|r| r.as_str()) == Some("API_KEY_INVALID"))
        });
    reason_invalid || (status == 400 && message.to_ascii_lowercase().contains("api key not valid"))
}

fn is_quota_error(status: u16, code: &str, message: &str) -> bool {
    let code = code.to_ascii_lowercase();
    let message = message.to_ascii_lowercase();
    code == "insufficient_quota"
        || (code == "resource_exhausted" && message.contains("quota"))
        || (matches!(status, 400 | 402 | 429) && message.contains("credit balance"))
}

/// Error message from the three body shapes in use:
/// `{"error": {"message": ..}}` (OpenAI, Anthropic, Gemini) or `{"message": ..}`.
fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    json.get("error")
        .and_then(|e| e.get("message"))
        .or_else(|| json.get("message"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
}

fn extract_error_code(json: &serde_json::Value) -> Option<String> {
    let error = json.get("error")?;
    error
        .get("code")
        .and_then(|c| c.as_str())
        .or_else(|| error.get("status").and_then(|s| s.as_str()))
        .or_else(|| error.get("type").and_then(|t| t.as_str()))
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{classify_failure, FailureKind};
    use crate::llm::types::SolutionData;

    #[test]
    fn preview_cuts_on_char_boundary() {
        assert_eq!(preview("héllo", 2), "h");
        assert_eq!(preview("short", 100), "short");
    }

    #[test]
    fn strips_json_fence() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn leaves_plain_json_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn parses_fenced_solution() {
        let raw = "```\n{\"code\": \"print(1)\", \"thoughts\": [\"trivial\"], \"time_complexity\": \"O(1)\", \"space_complexity\": \"O(1)\"}\n```";
        let solution: SolutionData = parse_model_json(raw).unwrap();
        assert_eq!(solution.code, "print(1)");
        assert_eq!(solution.thoughts, vec!["trivial".to_string()]);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_model_json::<SolutionData>("I cannot help with that").unwrap_err();
        assert!(matches!(err, GatewayError::Parse(_)));
    }

    #[test]
    fn unauthorized_maps_to_reenter_key_message() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "code": "invalid_api_key"}}"#;
        let err = upstream_error(BackendFamily::OpenAi, 401, body);
        let msg = err.to_string();
        assert!(msg.contains("Please close this window and re-enter a valid Open AI API key."));
        assert_eq!(classify_failure(&msg), FailureKind::CredentialInvalid);
    }

    #[test]
    fn gemini_invalid_key_maps_to_reenter_key_message() {
        let body = r#"{
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT",
                "details": [{
                    "@type": "type.googleapis.com/google.rpc.ErrorInfo",
                    "reason": "API_KEY_INVALID",
                    "domain": "googleapis.com"
                }]
            }
        }"#;
        let msg = upstream_error(BackendFamily::Gemini, 400, body).to_string();
        assert!(msg.contains("Invalid API key (400)"));
        assert!(msg.contains("re-enter a valid Gemini API key."));
        assert_eq!(classify_failure(&msg), FailureKind::CredentialInvalid);

        // Same message without the details block still counts.
        let bare = r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}}"#;
        let msg = upstream_error(BackendFamily::Gemini, 400, bare).to_string();
        assert_eq!(classify_failure(&msg), FailureKind::CredentialInvalid);
    }

    #[test]
    fn other_bad_requests_pass_through() {
        let body = r#"{"error": {"code": 400, "message": "Request contains an invalid argument.", "status": "INVALID_ARGUMENT"}}"#;
        let msg = upstream_error(BackendFamily::Gemini, 400, body).to_string();
        assert_eq!(msg, "Request contains an invalid argument.");
        assert_eq!(classify_failure(&msg), FailureKind::Other);
    }

    #[test]
    fn insufficient_quota_maps_to_out_of_credits() {
        let body = r#"{"error": {"message": "You exceeded your current quota", "code": "insufficient_quota"}}"#;
        let err = upstream_error(BackendFamily::OpenAi, 429, body);
        assert_eq!(classify_failure(&err.to_string()), FailureKind::CredentialExhausted);
    }

    #[test]
    fn anthropic_credit_balance_maps_to_out_of_credits() {
        let body = r#"{"type": "error", "error": {"type": "invalid_request_error", "message": "Your credit balance is too low to access the Anthropic API."}}"#;
        let err = upstream_error(BackendFamily::Anthropic, 400, body);
        assert_eq!(classify_failure(&err.to_string()), FailureKind::CredentialExhausted);
    }

    #[test]
    fn other_errors_pass_backend_message_through() {
        let body = r#"{"error": {"message": "The server is overloaded", "type": "overloaded_error"}}"#;
        let err = upstream_error(BackendFamily::Anthropic, 529, body);
        assert_eq!(err.to_string(), "The server is overloaded");
    }

    #[test]
    fn non_json_body_is_used_verbatim() {
        let err = upstream_error(BackendFamily::Gemini, 502, "Bad Gateway");
        assert_eq!(err.to_string(), "Bad Gateway");
        let err = upstream_error(BackendFamily::Gemini, 500, "");
        assert_eq!(err.to_string(), "Gemini API error (500)");
    }
}
