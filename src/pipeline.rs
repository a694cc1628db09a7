//! Core screenshot-to-solution pipeline.
//!
//! Two independent groups:
//! - primary: queue → extract → solve, writes problem_info + solution_data
//! - debug:   queue ++ extra → debug, reports the revised solution as an event
//!
//! Each group holds one slot in the `CancellationRegistry`; a new run in a
//! group preempts the old one. The run's token is checked before every
//! state write, so a canceled run never commits results.

use crate::cancel::{CancellationRegistry, PipelineGroup};
use crate::error::{classify_failure, FailureKind, GatewayError};
use crate::events::{EventSink, ProcessingEvent};
use crate::llm::{ModelGateway, SolutionData};
use crate::state::{StateManager, StatePatch, View};
use serde::Serialize;
use std::sync::Arc;

pub const PRIMARY_CANCELED_MESSAGE: &str = "Processing was canceled by the user.";
pub const DEBUG_CANCELED_MESSAGE: &str = "Extra processing was canceled by the user.";

/// Terminal state of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "camelCase")]
pub enum RunOutcome {
    /// The relevant queue was empty; nothing started.
    NoScreenshots,
    Completed,
    Failed(String),
    Cancelled,
}

pub struct ProcessingPipeline<G: ModelGateway> {
    state: Arc<StateManager>,
    gateway: G,
    registry: Arc<CancellationRegistry>,
    sink: Arc<dyn EventSink>,
}

impl<G: ModelGateway> ProcessingPipeline<G> {
    pub fn new(
        state: Arc<StateManager>,
        gateway: G,
        registry: Arc<CancellationRegistry>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            state,
            gateway,
            registry,
            sink,
        }
    }

    /// Entry point for the "process" action: the view decides the group.
    pub async fn process_screenshots(&self) -> RunOutcome {
        if self.state.get_state().view == View::Queue {
            self.run_primary().await
        } else {
            self.run_debug().await
        }
    }

    /// Primary group: extract the problem, then solve it.
    pub async fn run_primary(&self) -> RunOutcome {
        let screenshots = self.state.get_state().screenshot_queue;
        if screenshots.is_empty() {
            log::info!("[PIPELINE] No screenshots queued");
            self.sink.emit(ProcessingEvent::NoScreenshots);
            return RunOutcome::NoScreenshots;
        }

        // Optimistic: the UI shows "processing" before any result exists.
        self.state.set_state(StatePatch {
            view: Some(View::Solutions),
            ..Default::default()
        });

        let run = self.registry.start_run(PipelineGroup::Primary);
        let token = run.token();
        let pipeline_start = std::time::Instant::now();
        log::info!(
            "[PIPELINE] Primary run #{} started with {} screenshot(s)",
            run.run_id(),
            screenshots.len()
        );

        // Stage 1: extract
        let problem = match self.gateway.extract_problem(screenshots.payloads(), token).await {
            Ok(problem) if !token.is_cancelled() => problem,
            Ok(_) => return self.primary_canceled(),
            Err(e) => return self.primary_failed(e),
        };
        let extract_ms = pipeline_start.elapsed().as_millis();
        self.state.set_state(StatePatch {
            problem_info: Some(Some(problem.clone())),
            ..Default::default()
        });
        log::info!("[PIPELINE] Problem extracted in {}ms", extract_ms);

        // Stage 2: solve
        let solve_start = std::time::Instant::now();
        let solution = match self.gateway.generate_solution(&problem, token).await {
            Ok(solution) if !token.is_cancelled() => solution,
            Ok(_) => return self.primary_canceled(),
            Err(e) => return self.primary_failed(e),
        };
        self.state.set_state(StatePatch {
            solution_data: Some(Some(solution)),
            ..Default::default()
        });

        log::info!(
            "[PIPELINE] Primary run complete: {}ms (extract={} + solve={})",
            pipeline_start.elapsed().as_millis(),
            extract_ms,
            solve_start.elapsed().as_millis()
        );
        RunOutcome::Completed
    }

    fn primary_canceled(&self) -> RunOutcome {
        log::info!("[PIPELINE] Primary run canceled");
        self.sink.emit(ProcessingEvent::canceled(
            PipelineGroup::Primary,
            PRIMARY_CANCELED_MESSAGE,
        ));
        RunOutcome::Cancelled
    }

    fn primary_failed(&self, error: GatewayError) -> RunOutcome {
        if error.is_cancelled() {
            return self.primary_canceled();
        }
        let message = error.to_string();
        log::error!("[PIPELINE] Primary run failed: {}", message);
        self.sink
            .emit(ProcessingEvent::InitialSolutionError(message.clone()));
        RunOutcome::Failed(message)
    }

    /// Debug group: original + extra screenshots against the known problem.
    ///
    /// The revised solution is delivered as `DebugSuccess`; `solution_data`
    /// is left for the caller to update.
    pub async fn run_debug(&self) -> RunOutcome {
        let snapshot = self.state.get_state();
        if snapshot.extra_screenshot_queue.is_empty() {
            log::info!("[PIPELINE] No extra screenshots queued");
            self.sink.emit(ProcessingEvent::NoScreenshots);
            return RunOutcome::NoScreenshots;
        }
        self.sink.emit(ProcessingEvent::DebugStart);

        let run = self.registry.start_run(PipelineGroup::Debug);
        let token = run.token();
        let start = std::time::Instant::now();

        // Originals first, capture order preserved within each queue.
        let mut images = snapshot.screenshot_queue.payloads();
        images.extend(snapshot.extra_screenshot_queue.payloads());
        log::info!(
            "[PIPELINE] Debug run #{} started with {} + {} screenshot(s)",
            run.run_id(),
            snapshot.screenshot_queue.len(),
            snapshot.extra_screenshot_queue.len()
        );

        let result = self
            .gateway
            .debug_solution(images, snapshot.problem_info.as_ref(), token)
            .await;

        match result {
            Ok(_) if token.is_cancelled() => self.debug_canceled(),
            Ok(solution) => self.debug_succeeded(solution, start),
            Err(e) if e.is_cancelled() => self.debug_canceled(),
            Err(e) => self.debug_failed(e),
        }
    }

    fn debug_succeeded(&self, solution: SolutionData, start: std::time::Instant) -> RunOutcome {
        log::info!(
            "[PIPELINE] Debug run complete in {}ms ({} thoughts)",
            start.elapsed().as_millis(),
            solution.thoughts.len()
        );
        self.sink.emit(ProcessingEvent::DebugSuccess(solution));
        RunOutcome::Completed
    }

    fn debug_canceled(&self) -> RunOutcome {
        log::info!("[PIPELINE] Debug run canceled");
        self.sink.emit(ProcessingEvent::canceled(
            PipelineGroup::Debug,
            DEBUG_CANCELED_MESSAGE,
        ));
        RunOutcome::Cancelled
    }

    fn debug_failed(&self, error: GatewayError) -> RunOutcome {
        let message = error.to_string();
        log::error!("[PIPELINE] Debug run failed: {}", message);
        let event = match classify_failure(&message) {
            FailureKind::CredentialExhausted => ProcessingEvent::ApiKeyOutOfCredits,
            FailureKind::CredentialInvalid => ProcessingEvent::ApiKeyInvalid,
            FailureKind::Other => ProcessingEvent::DebugError(message.clone()),
        };
        self.sink.emit(event);
        RunOutcome::Failed(message)
    }

    /// Global "stop processing": cancel every in-flight run.
    ///
    /// Returns whether anything was running. Each canceled run emits its
    /// own `ProcessingCanceled` when it unwinds.
    pub fn cancel_ongoing_requests(&self) -> bool {
        let canceled = self.registry.cancel_all();
        if canceled {
            log::info!("[PIPELINE] Canceled ongoing requests");
        }
        canceled
    }
}
