//! Headless front end: run the pipeline on image files and print JSON.
//!
//!   problem-lens shot1.png shot2.png
//!   problem-lens shot1.png --debug failing.png --language golang

use anyhow::{bail, Context, Result};
use clap::Parser;
use problem_lens_lib::config::AppConfig;
use problem_lens_lib::events::{ChannelSink, ProcessingEvent, SinkMessage};
use problem_lens_lib::pipeline::RunOutcome;
use problem_lens_lib::settings::{self, ModelStage, SettingsStore};
use problem_lens_lib::state::{Screenshot, StatePatch, View};
use problem_lens_lib::AppCore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "problem-lens", about = "Screenshot a coding problem, get a solution")]
struct Cli {
    /// Screenshots of the problem, in reading order.
    #[arg(required = true)]
    screenshots: Vec<PathBuf>,

    /// Extra screenshots (e.g. failing test output) to debug the solution with.
    #[arg(long = "debug")]
    debug_screenshots: Vec<PathBuf>,

    /// Solution language (python, javascript, java, golang, cpp, kotlin).
    #[arg(long)]
    language: Option<String>,

    /// Use this model for every stage.
    #[arg(long)]
    model: Option<String>,

    /// Settings file (defaults to the platform config dir).
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn load_screenshot(path: &Path) -> Result<Screenshot> {
    let image = image::open(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Screenshot::from_image(&image).with_context(|| format!("Failed to encode {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    problem_lens_lib::init_environment();
    let cli = Cli::parse();

    let store = cli
        .settings
        .map(SettingsStore::new)
        .unwrap_or_else(SettingsStore::default_location);
    let (sink, mut events) = ChannelSink::new();
    let core = AppCore::new(AppConfig::from_env(), store, Arc::new(sink));

    if let Some(language) = &cli.language {
        settings::set_language(&core.state, language)?;
    }
    if let Some(model) = &cli.model {
        for stage in [ModelStage::Extraction, ModelStage::Solution, ModelStage::Debugging] {
            settings::set_model(&core.state, stage, model)?;
        }
    }

    for path in &cli.screenshots {
        core.state.enqueue_screenshot(load_screenshot(path)?);
    }

    let started = std::time::Instant::now();
    let outcome = core.pipeline.run_primary().await;
    report_events(&mut events);
    match outcome {
        RunOutcome::Completed => {}
        RunOutcome::Failed(message) => bail!("Processing failed: {}", message),
        other => bail!("Processing did not complete: {:?}", other),
    }

    let state = core.state.get_state();
    let mut output = serde_json::json!({
        "problem": state.problem_info,
        "solution": state.solution_data,
    });

    if !cli.debug_screenshots.is_empty() {
        core.state.set_state(StatePatch {
            view: Some(View::Debug),
            ..Default::default()
        });
        for path in &cli.debug_screenshots {
            core.state.enqueue_screenshot(load_screenshot(path)?);
        }
        let outcome = core.pipeline.run_debug().await;
        let revised = report_events(&mut events);
        match (outcome, revised) {
            (RunOutcome::Completed, Some(solution)) => output["debug"] = serde_json::to_value(solution)?,
            (RunOutcome::Failed(message), _) => bail!("Debugging failed: {}", message),
            (other, _) => bail!("Debugging did not complete: {:?}", other),
        }
    }

    log::info!("[CLI] Done in {}ms", started.elapsed().as_millis());
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Drain queued notifications into the log; returns a debug result if one arrived.
fn report_events(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<SinkMessage>,
) -> Option<problem_lens_lib::llm::SolutionData> {
    let mut revised = None;
    while let Ok(message) = events.try_recv() {
        if let SinkMessage::Event(event) = message {
            log::info!("[CLI] {}", event.name());
            if let ProcessingEvent::DebugSuccess(solution) = event {
                revised = Some(solution);
            }
        }
    }
    revised
}
