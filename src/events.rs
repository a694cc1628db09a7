//! Notifications from the pipeline to the presentation layer.
//!
//! The pipeline only knows `EventSink`. The desktop build implements it for
//! a Tauri `AppHandle`; the CLI logs; tests collect into a channel.

use crate::cancel::PipelineGroup;
use crate::llm::types::SolutionData;
use crate::state::{AppState, StateManager, Subscription};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Event name the state mirror is published under.
pub const STATE_SYNC_EVENT: &str = "state:sync";

/// Named notification for the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingEvent {
    NoScreenshots,
    InitialSolutionError(String),
    DebugStart,
    DebugSuccess(SolutionData),
    DebugError(String),
    ApiKeyOutOfCredits,
    ApiKeyInvalid,
    /// A run ended because it was canceled or preempted.
    ProcessingCanceled {
        group: String,
        message: String,
    },
}

impl ProcessingEvent {
    pub fn canceled(group: PipelineGroup, message: &str) -> Self {
        ProcessingEvent::ProcessingCanceled {
            group: group.to_string(),
            message: message.to_string(),
        }
    }

    /// Event name on the webview side.
    pub fn name(&self) -> &'static str {
        match self {
            ProcessingEvent::NoScreenshots => "processing-no-screenshots",
            ProcessingEvent::InitialSolutionError(_) => "initial-solution-error",
            ProcessingEvent::DebugStart => "debug-start",
            ProcessingEvent::DebugSuccess(_) => "debug-success",
            ProcessingEvent::DebugError(_) => "debug-error",
            ProcessingEvent::ApiKeyOutOfCredits => "api-key-out-of-credits",
            ProcessingEvent::ApiKeyInvalid => "api-key-invalid",
            ProcessingEvent::ProcessingCanceled { .. } => "processing-canceled",
        }
    }

    /// Payload sent with the event, if any.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            ProcessingEvent::InitialSolutionError(message) | ProcessingEvent::DebugError(message) => {
                serde_json::Value::String(message.clone())
            }
            ProcessingEvent::DebugSuccess(data) => {
                serde_json::to_value(data).unwrap_or(serde_json::Value::Null)
            }
            ProcessingEvent::ProcessingCanceled { group, message } => {
                serde_json::json!({ "group": group, "message": message })
            }
            _ => serde_json::Value::Null,
        }
    }
}

/// Window-handle sink: where notifications and state snapshots go.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ProcessingEvent);

    fn sync_state(&self, state: &AppState);
}

/// Mirror every state mutation to `sink` until the subscription is dropped
/// via `unsubscribe`. The current state is pushed once immediately.
pub fn mirror_state(state: &StateManager, sink: Arc<dyn EventSink>) -> Subscription {
    sink.sync_state(&state.get_state());
    state.subscribe(move |snapshot| sink.sync_state(snapshot))
}

/// Message delivered by `ChannelSink`.
#[derive(Debug, Clone)]
pub enum SinkMessage {
    Event(ProcessingEvent),
    State(Box<AppState>),
}

/// Forwards everything into an unbounded channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ProcessingEvent) {
        // A closed receiver just means nobody is listening anymore.
        let _ = self.tx.send(SinkMessage::Event(event));
    }

    fn sync_state(&self, state: &AppState) {
        let _ = self.tx.send(SinkMessage::State(Box::new(state.clone())));
    }
}

/// Logs notifications; used by the headless binary.
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: ProcessingEvent) {
        match &event {
            ProcessingEvent::InitialSolutionError(msg) | ProcessingEvent::DebugError(msg) => {
                log::error!("[EVENT] {}: {}", event.name(), msg)
            }
            ProcessingEvent::ApiKeyOutOfCredits | ProcessingEvent::ApiKeyInvalid => {
                log::error!("[EVENT] {}", event.name())
            }
            _ => log::info!("[EVENT] {}", event.name()),
        }
    }

    fn sync_state(&self, state: &AppState) {
        log::debug!(
            "[EVENT] state: view={:?} queue={} extra={} problem={} solution={}",
            state.view,
            state.screenshot_queue.len(),
            state.extra_screenshot_queue.len(),
            state.problem_info.is_some(),
            state.solution_data.is_some()
        );
    }
}

#[cfg(feature = "desktop")]
impl<R: tauri::Runtime> EventSink for tauri::AppHandle<R> {
    fn emit(&self, event: ProcessingEvent) {
        use tauri::Emitter;
        if let Err(e) = Emitter::emit(self, event.name(), event.payload()) {
            log::error!("[EVENT] Failed to emit {}: {}", event.name(), e);
        }
    }

    fn sync_state(&self, state: &AppState) {
        use tauri::Emitter;
        if let Err(e) = Emitter::emit(self, STATE_SYNC_EVENT, state) {
            log::error!("[EVENT] Failed to sync state: {}", e);
        }
    }
}
