//! Backend families: which reasoning service a model identifier talks to.
//!
//! Routing is a pure function of the identifier, so new families can be
//! added here without touching the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A family of interchangeable backends sharing one API shape and one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendFamily {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
}

impl BackendFamily {
    pub const ALL: [BackendFamily; 3] = [
        BackendFamily::OpenAi,
        BackendFamily::Anthropic,
        BackendFamily::Gemini,
    ];

    /// Map a configured model identifier to its family.
    pub fn for_model(model: &str) -> Option<Self> {
        let model = model.trim().to_ascii_lowercase();
        if model.starts_with("gpt-")
            || model.starts_with("o1")
            || model.starts_with("o3")
            || model.starts_with("o4")
        {
            Some(BackendFamily::OpenAi)
        } else if model.starts_with("claude-") {
            Some(BackendFamily::Anthropic)
        } else if model.starts_with("gemini-") {
            Some(BackendFamily::Gemini)
        } else {
            None
        }
    }

    /// Stable id used by the settings panel and the keychain entry name.
    pub fn id(&self) -> &'static str {
        match self {
            BackendFamily::OpenAi => "openai",
            BackendFamily::Anthropic => "anthropic",
            BackendFamily::Gemini => "gemini",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.id() == id.to_ascii_lowercase())
    }

    /// Environment variable the credential is read from.
    pub fn env_key(&self) -> &'static str {
        match self {
            BackendFamily::OpenAi => "OPENAI_API_KEY",
            BackendFamily::Anthropic => "ANTHROPIC_API_KEY",
            BackendFamily::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for BackendFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendFamily::OpenAi => "OpenAI",
            BackendFamily::Anthropic => "Anthropic",
            BackendFamily::Gemini => "Gemini",
        };
        f.write_str(name)
    }
}

/// Provider metadata exposed to the settings panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub env_key: String,
    pub models: Vec<String>,
}

/// All known providers and the models offered for each.
pub fn all_providers() -> Vec<ProviderInfo> {
    BackendFamily::ALL
        .into_iter()
        .map(|family| ProviderInfo {
            id: family.id().to_string(),
            name: family.to_string(),
            env_key: family.env_key().to_string(),
            models: crate::settings::ALLOWED_MODELS
                .iter()
                .filter(|m| BackendFamily::for_model(m) == Some(family))
                .map(|m| m.to_string())
                .collect(),
        })
        .collect()
}
