//! Problem Lens: screenshot a coding problem, get a structured solution.
//!
//! Domains:
//!   - state/      the single shared `AppState` + observers
//!   - llm/        `ModelGateway` and the OpenAI / Anthropic / Gemini backends
//!   - cancel.rs   per-group cancellation tokens
//!   - pipeline.rs primary (extract → solve) and debug orchestration
//!   - events.rs   notifications and the state mirror
//!   - settings.rs models, language, opacity, credentials, persistence
//!
//! The desktop shell (`desktop` feature) registers everything as a Tauri
//! plugin; the `problem-lens` binary drives the same core headlessly.

pub mod cancel;
#[cfg(feature = "desktop")]
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod pipeline;
pub mod settings;
pub mod state;

use cancel::CancellationRegistry;
use config::AppConfig;
use events::EventSink;
use llm::LlmGateway;
use pipeline::ProcessingPipeline;
use settings::{PersistedSettings, SettingsStore};
use state::{AppState, StateManager};
use std::sync::Arc;

/// Everything a front end needs, wired once at startup.
pub struct AppCore {
    pub config: AppConfig,
    pub state: Arc<StateManager>,
    pub registry: Arc<CancellationRegistry>,
    pub pipeline: ProcessingPipeline<LlmGateway>,
    pub gateway: LlmGateway,
    store: SettingsStore,
}

impl AppCore {
    /// Build the core: persisted settings and credentials are loaded into
    /// the initial state.
    pub fn new(config: AppConfig, store: SettingsStore, sink: Arc<dyn EventSink>) -> Self {
        let mut initial = AppState::with_queue_capacity(config.max_screenshots);
        initial.api_keys = settings::load_credentials();
        let state = Arc::new(StateManager::new(initial));
        state.set_state(store.load().into_patch());
        log::info!("[STARTUP] Settings loaded from {}", store.path().display());

        let registry = Arc::new(CancellationRegistry::new());
        let pipeline = ProcessingPipeline::new(
            Arc::clone(&state),
            LlmGateway::new(Arc::clone(&state), config.clone()),
            Arc::clone(&registry),
            sink,
        );
        let gateway = LlmGateway::new(Arc::clone(&state), config.clone());

        Self {
            config,
            state,
            registry,
            pipeline,
            gateway,
            store,
        }
    }

    /// Write the current model/language/opacity choices to disk.
    pub fn persist_settings(&self) -> Result<(), error::SettingsError> {
        self.store
            .save(&PersistedSettings::from_state(&self.state.get_state()))
    }
}

/// Load `.env.local` (else `.env`) from the working directory, then start
/// logging. Call once, first thing in `main`.
pub fn init_environment() {
    let loaded = std::env::current_dir()
        .ok()
        .and_then(|cwd| config::load_env_files(&cwd));
    // try_init: tests and embedders may already have a logger.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
    match loaded {
        Some(path) => log::info!("[STARTUP] Loaded {}", path.display()),
        None => log::info!("[STARTUP] No .env.local or .env found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Language;

    #[test]
    fn core_applies_persisted_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        store
            .save(&PersistedSettings {
                extraction_model: "gpt-4o-mini".to_string(),
                solution_model: "not-a-model".to_string(),
                debugging_model: "gpt-4o".to_string(),
                language: Language::Kotlin,
                opacity: 55,
            })
            .unwrap();

        let config = AppConfig {
            max_screenshots: 3,
            ..AppConfig::default()
        };
        let core = AppCore::new(
            config,
            SettingsStore::new(store.path()),
            Arc::new(events::LogSink),
        );
        let state = core.state.get_state();
        assert_eq!(state.extraction_model, "gpt-4o-mini");
        assert_eq!(state.solution_model, settings::DEFAULT_MODEL);
        assert_eq!(state.language, Language::Kotlin);
        assert_eq!(state.opacity, 55);
        assert_eq!(state.screenshot_queue.capacity(), 3);
    }

    #[test]
    fn persist_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let core = AppCore::new(
            AppConfig::default(),
            SettingsStore::new(&path),
            Arc::new(events::LogSink),
        );
        settings::set_language(&core.state, "java").unwrap();
        core.persist_settings().unwrap();
        assert_eq!(SettingsStore::new(&path).load().language, Language::Java);
    }
}
