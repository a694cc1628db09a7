//! Shared application state: one record, many observers.
//!
//! `StateManager` owns the process-wide `AppState`. Every mutation is a
//! shallow merge followed by a synchronous fan-out of the full snapshot to
//! all subscribers; the desktop bridge subscribes once and mirrors each
//! snapshot to the webview as `state:sync`.
//!
//! No validation happens here. Allowed models, languages and opacity bounds
//! are enforced by the setters in `settings.rs`.

pub mod queue;

pub use queue::{PushOutcome, Screenshot, ScreenshotQueue};

use crate::config::DEFAULT_MAX_SCREENSHOTS;
use crate::llm::types::{ProblemInfo, SolutionData};
use crate::settings::{ApiKeys, Language, DEFAULT_MODEL};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Current processing phase. Decides which queue the next run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Queue,
    Solutions,
    Debug,
    Settings,
}

/// The full shared record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub view: View,
    pub screenshot_queue: ScreenshotQueue,
    pub extra_screenshot_queue: ScreenshotQueue,
    pub problem_info: Option<ProblemInfo>,
    pub solution_data: Option<SolutionData>,

    // Settings
    pub extraction_model: String,
    pub solution_model: String,
    pub debugging_model: String,
    pub language: Language,
    pub api_keys: ApiKeys,
    pub opacity: u8,
}

impl AppState {
    pub fn with_queue_capacity(capacity: usize) -> Self {
        Self {
            view: View::Queue,
            screenshot_queue: ScreenshotQueue::new(capacity),
            extra_screenshot_queue: ScreenshotQueue::new(capacity),
            problem_info: None,
            solution_data: None,
            extraction_model: DEFAULT_MODEL.to_string(),
            solution_model: DEFAULT_MODEL.to_string(),
            debugging_model: DEFAULT_MODEL.to_string(),
            language: Language::Python,
            api_keys: ApiKeys::default(),
            opacity: 100,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_queue_capacity(DEFAULT_MAX_SCREENSHOTS)
    }
}

/// A partial update. Every `Some` field replaces the stored field wholesale.
///
/// `problem_info` and `solution_data` are doubly optional so a patch can
/// clear them: `Some(None)` clears, `None` leaves untouched. Queues are not
/// accepted from the UI; they change through `StateManager::update`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatePatch {
    pub view: Option<View>,
    #[serde(skip)]
    pub screenshot_queue: Option<ScreenshotQueue>,
    #[serde(skip)]
    pub extra_screenshot_queue: Option<ScreenshotQueue>,
    #[serde(deserialize_with = "present")]
    pub problem_info: Option<Option<ProblemInfo>>,
    #[serde(deserialize_with = "present")]
    pub solution_data: Option<Option<SolutionData>>,
    pub extraction_model: Option<String>,
    pub solution_model: Option<String>,
    pub debugging_model: Option<String>,
    pub language: Option<Language>,
    pub api_keys: Option<ApiKeys>,
    pub opacity: Option<u8>,
}

/// Any key that is present (even `null`) becomes `Some(..)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl StatePatch {
    fn apply(self, state: &mut AppState) {
        if let Some(view) = self.view {
            state.view = view;
        }
        if let Some(queue) = self.screenshot_queue {
            state.screenshot_queue = queue;
        }
        if let Some(queue) = self.extra_screenshot_queue {
            state.extra_screenshot_queue = queue;
        }
        if let Some(problem_info) = self.problem_info {
            state.problem_info = problem_info;
        }
        if let Some(solution_data) = self.solution_data {
            state.solution_data = solution_data;
        }
        if let Some(model) = self.extraction_model {
            state.extraction_model = model;
        }
        if let Some(model) = self.solution_model {
            state.solution_model = model;
        }
        if let Some(model) = self.debugging_model {
            state.debugging_model = model;
        }
        if let Some(language) = self.language {
            state.language = language;
        }
        if let Some(api_keys) = self.api_keys {
            state.api_keys = api_keys;
        }
        if let Some(opacity) = self.opacity {
            state.opacity = opacity;
        }
    }
}

type Observer = Arc<dyn Fn(&AppState) + Send + Sync>;
type ObserverList = Mutex<Vec<(u64, Observer)>>;

/// Process-wide state holder. Construct once at startup and share via `Arc`.
pub struct StateManager {
    state: Mutex<AppState>,
    observers: Arc<ObserverList>,
    next_observer_id: AtomicU64,
}

impl StateManager {
    pub fn new(initial: AppState) -> Self {
        Self {
            state: Mutex::new(initial),
            observers: Arc::new(Mutex::new(Vec::new())),
            next_observer_id: AtomicU64::new(1),
        }
    }

    /// Full snapshot of the current record.
    pub fn get_state(&self) -> AppState {
        self.lock_state().clone()
    }

    /// Shallow-merge `patch`, then notify every observer with the result.
    pub fn set_state(&self, patch: StatePatch) {
        let snapshot = {
            let mut state = self.lock_state();
            patch.apply(&mut state);
            state.clone()
        };
        self.notify(&snapshot);
    }

    /// Mutate the record in place (queue edits), then notify like `set_state`.
    pub fn update<T>(&self, mutate: impl FnOnce(&mut AppState) -> T) -> T {
        let (result, snapshot) = {
            let mut state = self.lock_state();
            let result = mutate(&mut state);
            (result, state.clone())
        };
        self.notify(&snapshot);
        result
    }

    /// Register an observer. It runs on every mutation until unsubscribed.
    pub fn subscribe(&self, observer: impl Fn(&AppState) + Send + Sync + 'static) -> Subscription {
        let id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.observers).push((id, Arc::new(observer)));
        Subscription {
            id,
            observers: Arc::downgrade(&self.observers),
        }
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.observers).len()
    }

    /// Back to the capture phase: both queues emptied, results dropped.
    /// Settings are kept.
    pub fn reset(&self) {
        self.update(|state| {
            state.view = View::Queue;
            state.screenshot_queue.clear();
            state.extra_screenshot_queue.clear();
            state.problem_info = None;
            state.solution_data = None;
        });
        log::info!("[STATE] Reset to queue view");
    }

    /// Add a capture to whichever queue the current view feeds.
    pub fn enqueue_screenshot(&self, screenshot: Screenshot) -> PushOutcome {
        let outcome = self.update(|state| {
            if state.view == View::Queue {
                state.screenshot_queue.push(screenshot)
            } else {
                state.extra_screenshot_queue.push(screenshot)
            }
        });
        match &outcome {
            PushOutcome::Evicted(old) => log::info!("[STATE] Queue full, evicted {}", old.id),
            PushOutcome::Duplicate => log::warn!("[STATE] Duplicate screenshot ignored"),
            PushOutcome::Added => {}
        }
        outcome
    }

    /// Remove a screenshot by id from either queue.
    pub fn remove_screenshot(&self, id: &str) -> Option<Screenshot> {
        self.update(|state| {
            state
                .screenshot_queue
                .remove(id)
                .or_else(|| state.extra_screenshot_queue.remove(id))
        })
    }

    fn notify(&self, snapshot: &AppState) {
        // Copy the list so observers may subscribe or mutate state re-entrantly.
        let observers: Vec<Observer> = lock(&self.observers)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(snapshot);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, AppState> {
        lock(&self.state)
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle returned by `subscribe`.
pub struct Subscription {
    id: u64,
    observers: Weak<ObserverList>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(observers) = self.observers.upgrade() {
            lock(&observers).retain(|(id, _)| *id != self.id);
        }
    }
}
