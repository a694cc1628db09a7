//! Tauri plugin: commands + state mirror for the webview.
//!
//! These are thin wrappers that bridge frontend invoke() calls to `AppCore`.
//! The host app registers the plugin with `.plugin(problem_lens_lib::commands::init())`.

use crate::config::AppConfig;
use crate::events::{self, EventSink};
use crate::llm::{provider, BackendFamily};
use crate::pipeline::RunOutcome;
use crate::settings::{self, ModelStage, SettingsStore};
use crate::state::{AppState, PushOutcome, Screenshot, StatePatch};
use crate::AppCore;
use std::sync::Arc;
use tauri::plugin::{Builder, TauriPlugin};
use tauri::{Manager, Runtime};

pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("problem-lens")
        .invoke_handler(tauri::generate_handler![
            get_state,
            update_state,
            process_screenshots,
            cancel_processing,
            add_screenshot,
            delete_screenshot,
            reset_queues,
            get_provider_config,
            set_model,
            set_language,
            set_opacity,
            adjust_opacity,
            save_api_key,
            test_provider,
        ])
        .setup(|app, _api| {
            let sink: Arc<dyn EventSink> = Arc::new(app.clone());
            let core = AppCore::new(
                AppConfig::from_env(),
                SettingsStore::default_location(),
                Arc::clone(&sink),
            );
            // Lives as long as the state manager; never unsubscribed.
            let _mirror = events::mirror_state(&core.state, sink);
            app.manage(core);
            log::info!("[STARTUP] problem-lens plugin ready");
            Ok(())
        })
        .build()
}

fn persist(core: &AppCore) {
    if let Err(e) = core.persist_settings() {
        log::warn!("[SETTINGS] Failed to persist settings: {}", e);
    }
}

fn parse_provider(provider_id: &str) -> Result<BackendFamily, String> {
    BackendFamily::from_id(provider_id)
        .ok_or_else(|| settings_error(crate::error::SettingsError::UnknownProvider(provider_id.to_string())))
}

fn settings_error(e: crate::error::SettingsError) -> String {
    e.to_string()
}

/// Tauri command: full state snapshot (the webview also listens on `state:sync`).
#[tauri::command]
pub fn get_state(core: tauri::State<'_, AppCore>) -> AppState {
    core.state.get_state()
}

/// Tauri command: merge a partial update from the UI.
#[tauri::command]
pub fn update_state(core: tauri::State<'_, AppCore>, patch: StatePatch) -> Result<(), String> {
    settings::validate_patch(&patch).map_err(settings_error)?;
    let touches_settings = patch.extraction_model.is_some()
        || patch.solution_model.is_some()
        || patch.debugging_model.is_some()
        || patch.language.is_some()
        || patch.opacity.is_some();
    core.state.set_state(patch);
    if touches_settings {
        persist(&core);
    }
    Ok(())
}

/// Tauri command: the "process" action. The current view picks the group.
#[tauri::command]
pub async fn process_screenshots(core: tauri::State<'_, AppCore>) -> Result<RunOutcome, String> {
    Ok(core.pipeline.process_screenshots().await)
}

/// Tauri command: cancel everything in flight. Returns whether anything ran.
#[tauri::command]
pub fn cancel_processing(core: tauri::State<'_, AppCore>) -> bool {
    core.pipeline.cancel_ongoing_requests()
}

/// Tauri command: queue a capture (base64 PNG from the webview).
///
/// Returns the new screenshot's id.
#[tauri::command]
pub fn add_screenshot(core: tauri::State<'_, AppCore>, image_data: String) -> Result<String, String> {
    let png_bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &image_data)
        .map_err(|e| format!("Invalid screenshot data: {}", e))?;
    let screenshot = Screenshot::from_png_bytes(&png_bytes);
    let id = screenshot.id.clone();
    match core.state.enqueue_screenshot(screenshot) {
        PushOutcome::Duplicate => Err("Screenshot already queued".to_string()),
        PushOutcome::Added | PushOutcome::Evicted(_) => Ok(id),
    }
}

#[tauri::command]
pub fn delete_screenshot(core: tauri::State<'_, AppCore>, id: String) -> Result<(), String> {
    core.state
        .remove_screenshot(&id)
        .map(|_| ())
        .ok_or_else(|| format!("No screenshot with id {}", id))
}

/// Tauri command: cancel running work, then return to the capture phase.
#[tauri::command]
pub fn reset_queues(core: tauri::State<'_, AppCore>) {
    core.pipeline.cancel_ongoing_requests();
    core.state.reset();
}

/// Tauri command: provider list and per-stage models for the settings panel.
#[tauri::command]
pub fn get_provider_config(core: tauri::State<'_, AppCore>) -> Result<serde_json::Value, String> {
    let state = core.state.get_state();
    let configured: Vec<&str> = state
        .api_keys
        .configured()
        .into_iter()
        .map(|family| family.id())
        .collect();

    Ok(serde_json::json!({
        "providers": provider::all_providers(),
        "configuredProviders": configured,
        "extractionModel": state.extraction_model,
        "solutionModel": state.solution_model,
        "debuggingModel": state.debugging_model,
        "language": state.language,
        "opacity": state.opacity,
    }))
}

#[tauri::command]
pub fn set_model(core: tauri::State<'_, AppCore>, stage: ModelStage, model: String) -> Result<(), String> {
    settings::set_model(&core.state, stage, &model).map_err(settings_error)?;
    persist(&core);
    Ok(())
}

#[tauri::command]
pub fn set_language(core: tauri::State<'_, AppCore>, language: String) -> Result<(), String> {
    settings::set_language(&core.state, &language).map_err(settings_error)?;
    persist(&core);
    Ok(())
}

#[tauri::command]
pub fn set_opacity(core: tauri::State<'_, AppCore>, opacity: i64) -> Result<u8, String> {
    let opacity = settings::set_opacity(&core.state, opacity).map_err(settings_error)?;
    persist(&core);
    Ok(opacity)
}

/// Tauri command: step opacity (keyboard +/-); clamps instead of failing.
#[tauri::command]
pub fn adjust_opacity(core: tauri::State<'_, AppCore>, delta: i64) -> u8 {
    let opacity = settings::adjust_opacity(&core.state, delta);
    persist(&core);
    opacity
}

/// Tauri command: save an API key to the OS keychain and use it immediately.
#[tauri::command]
pub fn save_api_key(
    core: tauri::State<'_, AppCore>,
    provider_id: String,
    api_key: String,
) -> Result<(), String> {
    let family = parse_provider(&provider_id)?;
    settings::save_api_key(&core.state, family, &api_key).map_err(settings_error)
}

/// Tauri command: check a provider's key with a minimal request.
#[tauri::command]
pub async fn test_provider(core: tauri::State<'_, AppCore>, provider_id: String) -> Result<bool, String> {
    let family = parse_provider(&provider_id)?;
    core.gateway
        .test_provider(family)
        .await
        .map_err(|e| e.to_string())
}
