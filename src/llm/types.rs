//! Structured model outputs: ProblemInfo and SolutionData.
//!
//! The backends are instructed to return JSON that deserializes directly
//! into these types. Field names stay snake_case on the wire because the
//! prompts spell them that way.

use serde::{Deserialize, Serialize};

/// Problem description produced by the extraction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemInfo {
    pub problem_statement: String,
    #[serde(default)]
    pub constraints: Option<String>,
    /// Expected return type of the function to implement.
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

/// One example case from the problem statement.
///
/// Inputs and outputs are kept as raw JSON since problems mix scalars,
/// arrays and objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Solution produced by the solve and debug stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionData {
    pub code: String,
    #[serde(default)]
    pub thoughts: Vec<String>,
    pub time_complexity: String,
    pub space_complexity: String,
}

/// One image sent to a backend. Always base64 without a data-URL prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub base64_data: String,
    pub mime_type: &'static str,
}

impl ImagePayload {
    pub fn png(base64_data: impl Into<String>) -> Self {
        Self {
            base64_data: base64_data.into(),
            mime_type: "image/png",
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_info_tolerates_missing_optional_fields() {
        let info: ProblemInfo =
            serde_json::from_str(r#"{"problem_statement": "Reverse a list"}"#).unwrap();
        assert_eq!(info.problem_statement, "Reverse a list");
        assert!(info.constraints.is_none());
        assert!(info.test_cases.is_empty());
    }

    #[test]
    fn test_case_keeps_structured_values() {
        let info: ProblemInfo = serde_json::from_str(
            r#"{
                "problem_statement": "Two sum",
                "constraints": "2 <= n <= 10^4",
                "return_type": "int[]",
                "test_cases": [{"input": {"nums": [2, 7], "target": 9}, "output": [0, 1]}]
            }"#,
        )
        .unwrap();
        assert_eq!(info.test_cases.len(), 1);
        assert_eq!(info.test_cases[0].output, serde_json::json!([0, 1]));
        assert_eq!(info.return_type.as_deref(), Some("int[]"));
    }

    #[test]
    fn solution_requires_code_and_complexities() {
        let missing = serde_json::from_str::<SolutionData>(r#"{"code": "pass"}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn data_url_has_mime_prefix() {
        let img = ImagePayload::png("AAAA");
        assert_eq!(img.data_url(), "data:image/png;base64,AAAA");
    }
}
