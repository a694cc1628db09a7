//! User settings: allowed values, validated setters, and persistence.
//!
//! Handles:
//! - The fixed sets of model identifiers and solution languages
//! - Setters that validate before writing into `StateManager`
//! - Settings file (`~/.config/problem-lens/settings.json`)
//! - API keys: env var first, then the OS keychain via the keyring crate

use crate::error::SettingsError;
use crate::llm::provider::BackendFamily;
use crate::state::{AppState, StateManager, StatePatch};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const KEYRING_SERVICE: &str = "problem-lens";
const SETTINGS_FILE: &str = "settings.json";

pub const MIN_OPACITY: u8 = 10;
pub const MAX_OPACITY: u8 = 100;

/// Model identifiers the settings panel offers.
pub const ALLOWED_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "claude-sonnet-4-5",
    "claude-haiku-4-5-20251001",
    "gemini-2.0-flash",
    "gemini-2.5-pro",
];

pub const DEFAULT_MODEL: &str = "gpt-4o";

pub fn is_allowed_model(model: &str) -> bool {
    ALLOWED_MODELS.contains(&model)
}

// ── Language ────────────────────────────────────────────────────────

/// Target language for generated solutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "python")]
    Python,
    #[serde(rename = "javascript")]
    JavaScript,
    #[serde(rename = "java")]
    Java,
    #[serde(rename = "golang", alias = "Go", alias = "go")]
    Go,
    #[serde(rename = "cpp")]
    Cpp,
    #[serde(rename = "kotlin")]
    Kotlin,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Python,
        Language::JavaScript,
        Language::Java,
        Language::Go,
        Language::Cpp,
        Language::Kotlin,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Java => "java",
            Language::Go => "golang",
            Language::Cpp => "cpp",
            Language::Kotlin => "kotlin",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::Java => "Java",
            Language::Go => "Go",
            Language::Cpp => "C++",
            Language::Kotlin => "Kotlin",
        }
    }
}

impl FromStr for Language {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|l| l.id() == wanted || l.display_name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| SettingsError::UnknownLanguage(s.to_string()))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ── Credentials ─────────────────────────────────────────────────────

/// One secret per backend family. Empty string means "not configured".
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiKeys {
    pub openai: String,
    pub anthropic: String,
    pub gemini: String,
}

impl ApiKeys {
    pub fn get(&self, family: BackendFamily) -> Option<&str> {
        let key = match family {
            BackendFamily::OpenAi => &self.openai,
            BackendFamily::Anthropic => &self.anthropic,
            BackendFamily::Gemini => &self.gemini,
        };
        if key.trim().is_empty() {
            None
        } else {
            Some(key.as_str())
        }
    }

    pub fn set(&mut self, family: BackendFamily, key: impl Into<String>) {
        let slot = match family {
            BackendFamily::OpenAi => &mut self.openai,
            BackendFamily::Anthropic => &mut self.anthropic,
            BackendFamily::Gemini => &mut self.gemini,
        };
        *slot = key.into();
    }

    pub fn configured(&self) -> Vec<BackendFamily> {
        BackendFamily::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_some())
            .collect()
    }
}

// Never print secrets, only whether they are set.
impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai", &!self.openai.is_empty())
            .field("anthropic", &!self.anthropic.is_empty())
            .field("gemini", &!self.gemini.is_empty())
            .finish()
    }
}

/// Resolve every family's key: env var first, then the OS keychain.
pub fn load_credentials() -> ApiKeys {
    let mut keys = ApiKeys::default();
    for family in BackendFamily::ALL {
        if let Some(key) = credential_from_env(family).or_else(|| credential_from_keychain(family)) {
            keys.set(family, key);
        }
    }
    log::info!("[SETTINGS] Credentials configured for: {:?}", keys.configured());
    keys
}

fn credential_from_env(family: BackendFamily) -> Option<String> {
    std::env::var(family.env_key())
        .ok()
        .filter(|k| !k.trim().is_empty())
}

fn credential_from_keychain(family: BackendFamily) -> Option<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, family.id()).ok()?;
    match entry.get_password() {
        Ok(key) if !key.is_empty() => {
            log::info!("[SETTINGS] Loaded {} key from OS keychain", family);
            Some(key)
        }
        _ => None,
    }
}

/// Store a key in the keychain and make it live for the current session.
pub fn save_api_key(
    state: &StateManager,
    family: BackendFamily,
    api_key: &str,
) -> Result<(), SettingsError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, family.id())?;
    entry.set_password(api_key)?;
    set_api_key(state, family, api_key);
    log::info!("[SETTINGS] API key saved for provider: {}", family);
    Ok(())
}

/// Session-only key update (no keychain write).
pub fn set_api_key(state: &StateManager, family: BackendFamily, api_key: &str) {
    let mut keys = state.get_state().api_keys;
    keys.set(family, api_key.trim());
    state.set_state(StatePatch {
        api_keys: Some(keys),
        ..Default::default()
    });
}

// ── Validated setters ───────────────────────────────────────────────

/// Which stage a model setting applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStage {
    Extraction,
    Solution,
    Debugging,
}

impl ModelStage {
    pub fn model_in<'a>(&self, state: &'a AppState) -> &'a str {
        match self {
            ModelStage::Extraction => &state.extraction_model,
            ModelStage::Solution => &state.solution_model,
            ModelStage::Debugging => &state.debugging_model,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelStage::Extraction => "extraction",
            ModelStage::Solution => "solution",
            ModelStage::Debugging => "debugging",
        }
    }
}

pub fn set_model(state: &StateManager, stage: ModelStage, model: &str) -> Result<(), SettingsError> {
    if !is_allowed_model(model) {
        return Err(SettingsError::UnknownModel(model.to_string()));
    }
    let model = Some(model.to_string());
    let patch = match stage {
        ModelStage::Extraction => StatePatch {
            extraction_model: model,
            ..Default::default()
        },
        ModelStage::Solution => StatePatch {
            solution_model: model,
            ..Default::default()
        },
        ModelStage::Debugging => StatePatch {
            debugging_model: model,
            ..Default::default()
        },
    };
    state.set_state(patch);
    log::info!("[SETTINGS] {} model set", stage.label());
    Ok(())
}

pub fn set_language(state: &StateManager, language: &str) -> Result<Language, SettingsError> {
    let language: Language = language.parse()?;
    state.set_state(StatePatch {
        language: Some(language),
        ..Default::default()
    });
    log::info!("[SETTINGS] Language set to: {}", language);
    Ok(language)
}

pub fn set_opacity(state: &StateManager, opacity: i64) -> Result<u8, SettingsError> {
    if opacity < MIN_OPACITY as i64 || opacity > MAX_OPACITY as i64 {
        return Err(SettingsError::OpacityOutOfRange(opacity));
    }
    let opacity = opacity as u8;
    state.set_state(StatePatch {
        opacity: Some(opacity),
        ..Default::default()
    });
    Ok(opacity)
}

/// Step opacity by `delta`, clamped to the allowed range.
pub fn adjust_opacity(state: &StateManager, delta: i64) -> u8 {
    let current = state.get_state().opacity as i64;
    let next = (current + delta).clamp(MIN_OPACITY as i64, MAX_OPACITY as i64) as u8;
    log::debug!("[SETTINGS] Adjusting opacity from {} to {}", current, next);
    state.set_state(StatePatch {
        opacity: Some(next),
        ..Default::default()
    });
    next
}

/// Reject a UI patch whose settings fields fall outside the allowed sets.
pub fn validate_patch(patch: &StatePatch) -> Result<(), SettingsError> {
    for model in [
        &patch.extraction_model,
        &patch.solution_model,
        &patch.debugging_model,
    ]
    .into_iter()
    .flatten()
    {
        if !is_allowed_model(model) {
            return Err(SettingsError::UnknownModel(model.clone()));
        }
    }
    if let Some(opacity) = patch.opacity {
        if !(MIN_OPACITY..=MAX_OPACITY).contains(&opacity) {
            return Err(SettingsError::OpacityOutOfRange(opacity as i64));
        }
    }
    Ok(())
}

// ── Persistence ─────────────────────────────────────────────────────

/// The non-secret subset of settings written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedSettings {
    pub extraction_model: String,
    pub solution_model: String,
    pub debugging_model: String,
    pub language: Language,
    pub opacity: u8,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            extraction_model: DEFAULT_MODEL.to_string(),
            solution_model: DEFAULT_MODEL.to_string(),
            debugging_model: DEFAULT_MODEL.to_string(),
            language: Language::Python,
            opacity: MAX_OPACITY,
        }
    }
}

impl PersistedSettings {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            extraction_model: state.extraction_model.clone(),
            solution_model: state.solution_model.clone(),
            debugging_model: state.debugging_model.clone(),
            language: state.language,
            opacity: state.opacity,
        }
    }

    /// Patch that applies these settings, dropping anything no longer allowed.
    pub fn into_patch(self) -> StatePatch {
        let allowed = |model: String| {
            if is_allowed_model(&model) {
                Some(model)
            } else {
                log::warn!("[SETTINGS] Ignoring stored model no longer offered: {}", model);
                None
            }
        };
        StatePatch {
            extraction_model: allowed(self.extraction_model),
            solution_model: allowed(self.solution_model),
            debugging_model: allowed(self.debugging_model),
            language: Some(self.language),
            opacity: Some(self.opacity.clamp(MIN_OPACITY, MAX_OPACITY)),
            ..Default::default()
        }
    }
}

/// JSON settings file on disk.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.config/problem-lens/settings.json` (platform config dir).
    pub fn default_location() -> Self {
        let dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("problem-lens");
        Self::new(dir.join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable files yield defaults.
    pub fn load(&self) -> PersistedSettings {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("[SETTINGS] Invalid {}: {}", self.path.display(), e);
                PersistedSettings::default()
            }),
            Err(_) => PersistedSettings::default(),
        }
    }

    pub fn save(&self, settings: &PersistedSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, json)?;
        log::info!("[SETTINGS] Saved {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_parses_ids_and_names() {
        assert_eq!("golang".parse::<Language>().unwrap(), Language::Go);
        assert_eq!("Go".parse::<Language>().unwrap(), Language::Go);
        assert_eq!("C++".parse::<Language>().unwrap(), Language::Cpp);
        assert!("cobol".parse::<Language>().is_err());
    }

    #[test]
    fn set_model_rejects_unknown_identifier() {
        let state = StateManager::default();
        let err = set_model(&state, ModelStage::Solution, "gpt-2").unwrap_err();
        assert!(matches!(err, SettingsError::UnknownModel(_)));
        assert_eq!(state.get_state().solution_model, DEFAULT_MODEL);

        set_model(&state, ModelStage::Solution, "claude-sonnet-4-5").unwrap();
        assert_eq!(state.get_state().solution_model, "claude-sonnet-4-5");
        assert_eq!(state.get_state().extraction_model, DEFAULT_MODEL);
    }

    #[test]
    fn set_language_writes_state() {
        let state = StateManager::default();
        set_language(&state, "Go").unwrap();
        assert_eq!(state.get_state().language, Language::Go);
    }

    #[test]
    fn opacity_bounds() {
        let state = StateManager::default();
        assert!(set_opacity(&state, 5).is_err());
        assert!(set_opacity(&state, 101).is_err());
        assert_eq!(set_opacity(&state, 10).unwrap(), 10);
        assert_eq!(adjust_opacity(&state, -20), 10);
        assert_eq!(adjust_opacity(&state, 500), 100);
        assert_eq!(adjust_opacity(&state, -15), 85);
    }

    #[test]
    fn validate_patch_checks_models_and_opacity() {
        let ok = StatePatch {
            debugging_model: Some("gemini-2.0-flash".to_string()),
            opacity: Some(50),
            ..Default::default()
        };
        assert!(validate_patch(&ok).is_ok());

        let bad_model = StatePatch {
            extraction_model: Some("davinci".to_string()),
            ..Default::default()
        };
        assert!(validate_patch(&bad_model).is_err());

        let bad_opacity = StatePatch {
            opacity: Some(3),
            ..Default::default()
        };
        assert!(validate_patch(&bad_opacity).is_err());
    }

    #[test]
    fn api_keys_debug_hides_secrets() {
        let mut keys = ApiKeys::default();
        keys.set(BackendFamily::OpenAi, "sk-secret");
        let printed = format!("{:?}", keys);
        assert!(!printed.contains("sk-secret"));
        assert_eq!(keys.get(BackendFamily::OpenAi), Some("sk-secret"));
        assert_eq!(keys.get(BackendFamily::Gemini), None);
        assert_eq!(keys.configured(), vec![BackendFamily::OpenAi]);
    }

    #[test]
    fn session_key_update_goes_through_state() {
        let state = StateManager::default();
        set_api_key(&state, BackendFamily::Anthropic, " sk-ant ");
        assert_eq!(
            state.get_state().api_keys.get(BackendFamily::Anthropic),
            Some("sk-ant")
        );
    }

    #[test]
    fn store_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join(SETTINGS_FILE));
        assert_eq!(store.load(), PersistedSettings::default());

        let settings = PersistedSettings {
            solution_model: "gpt-4o-mini".to_string(),
            language: Language::Kotlin,
            opacity: 70,
            ..Default::default()
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn stale_models_are_dropped_from_patch() {
        let settings = PersistedSettings {
            extraction_model: "retired-model".to_string(),
            opacity: 0,
            ..Default::default()
        };
        let patch = settings.into_patch();
        assert_eq!(patch.extraction_model, None);
        assert_eq!(patch.solution_model.as_deref(), Some(DEFAULT_MODEL));
        assert_eq!(patch.opacity, Some(MIN_OPACITY));
    }
}
