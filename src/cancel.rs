//! Cancellation registry: at most one live token per pipeline group.
//!
//! Starting a run cancels whatever the group had in flight ("latest request
//! wins"). The returned `ActiveRun` guard ends the run when dropped, so the
//! slot is released on success, error, cancellation and early return alike.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Independent cancellable unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineGroup {
    /// extract → solve
    Primary,
    Debug,
}

impl fmt::Display for PipelineGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineGroup::Primary => f.write_str("primary"),
            PipelineGroup::Debug => f.write_str("debug"),
        }
    }
}

struct Slot {
    run_id: u64,
    token: CancellationToken,
}

pub struct CancellationRegistry {
    slots: Mutex<HashMap<PipelineGroup, Slot>>,
    next_run_id: AtomicU64,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_run_id: AtomicU64::new(1),
        }
    }

    /// Cancel any run registered for `group`, then register a fresh one.
    pub fn start_run(&self, group: PipelineGroup) -> ActiveRun<'_> {
        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let previous = self.lock().insert(
            group,
            Slot {
                run_id,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            log::info!(
                "[CANCEL] Preempting {} run #{} with run #{}",
                group,
                previous.run_id,
                run_id
            );
            previous.token.cancel();
        }
        ActiveRun {
            registry: self,
            group,
            run_id,
            token,
        }
    }

    /// Release the group's slot if `run_id` still owns it.
    ///
    /// A preempted run ending late must not clear its successor's token.
    pub fn end_run(&self, group: PipelineGroup, run_id: u64) {
        let mut slots = self.lock();
        if slots.get(&group).map(|s| s.run_id) == Some(run_id) {
            slots.remove(&group);
            log::debug!("[CANCEL] {} run #{} ended", group, run_id);
        }
    }

    /// Cancel and clear every registered run. True if anything was in flight.
    pub fn cancel_all(&self) -> bool {
        let drained: Vec<(PipelineGroup, Slot)> = self.lock().drain().collect();
        for (group, slot) in &drained {
            log::info!("[CANCEL] Canceling {} run #{}", group, slot.run_id);
            slot.token.cancel();
        }
        !drained.is_empty()
    }

    pub fn is_active(&self, group: PipelineGroup) -> bool {
        self.lock().contains_key(&group)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PipelineGroup, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered run. Dropping it calls `end_run` exactly once.
pub struct ActiveRun<'a> {
    registry: &'a CancellationRegistry,
    group: PipelineGroup,
    run_id: u64,
    token: CancellationToken,
}

impl ActiveRun<'_> {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.registry.end_run(self.group, self.run_id);
    }
}
