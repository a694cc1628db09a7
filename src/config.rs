//! Process configuration: `.env` loading and environment-derived settings.
//!
//! Values here are fixed for the process lifetime. User-editable settings
//! (models, language, opacity, keys) live in `settings.rs` instead.

use std::path::{Path, PathBuf};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default bound on each screenshot queue.
pub const DEFAULT_MAX_SCREENSHOTS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub gemini_base_url: String,
    /// Capacity of the primary and extra screenshot queues.
    pub max_screenshots: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            anthropic_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            max_screenshots: DEFAULT_MAX_SCREENSHOTS,
        }
    }
}

impl AppConfig {
    /// Build from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let url = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };
        let max_screenshots = match lookup("MAX_SCREENSHOTS") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    log::warn!("[CONFIG] Ignoring invalid MAX_SCREENSHOTS={:?}", raw);
                    defaults.max_screenshots
                }
            },
            None => defaults.max_screenshots,
        };

        Self {
            openai_base_url: url("OPENAI_BASE_URL", defaults.openai_base_url),
            anthropic_base_url: url("ANTHROPIC_BASE_URL", defaults.anthropic_base_url),
            gemini_base_url: url("GEMINI_BASE_URL", defaults.gemini_base_url),
            max_screenshots,
        }
    }
}

/// Load `.env.local`, falling back to `.env`, from `root`.
///
/// Only the first file found is loaded. Variables already set in the
/// process environment win over file values. Runs before the logger is up,
/// so failures go to stderr; the loaded path is returned for the caller to log.
pub fn load_env_files(root: &Path) -> Option<PathBuf> {
    let path = [".env.local", ".env"]
        .into_iter()
        .map(|env_file| root.join(env_file))
        .find(|path| path.exists())?;
    match dotenvy::from_path(&path) {
        Ok(_) => Some(path),
        Err(e) => {
            eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e);
            None
        }
    }
}
