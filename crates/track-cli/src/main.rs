// Entry point for the Track Execution Engine CLI.
//
// This stands in for the out-of-scope CLI/configuration-loader collaborator
// (spec.md §1): it loads a `Configuration` from TOML, wires up the default
// `StatusSink` and `RunnerRegistry`, runs the Stage Orchestrator, and prints
// a summary. It is not a general-purpose config language or job scheduler.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use track_common::{Configuration, StatusUtil};
use track_engine::{InMemoryStatusSink, Stage};
use track_runners::DefaultRunnerRegistry;
use track_sdk::{RealFilesystem, Status};

/// Run the Track Execution Engine's Stage Orchestrator against a repository.
#[derive(Parser, Debug)]
#[command(name = "track-engine", version, about)]
struct Cli {
    /// Repository root Discovery walks (contains `tracks/` and/or root `*.tf` files).
    #[arg(long, value_name = "DIR")]
    root: PathBuf,

    /// Path to the TOML configuration file (project, regions, whitelist, flags).
    #[arg(long, value_name = "FILE")]
    config: PathBuf,

    /// Emit the finished Stage as JSON instead of a plain-text summary.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    track_common::init_tracing();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let exit_code = runtime.block_on(run(cli))?;
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config = Configuration::load(&cli.config, cli.root.clone())
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    tracing::info!(
        project = %config.project,
        primary_region = %config.primary_region,
        root = %config.root.display(),
        "track-engine starting stage"
    );

    let filesystem: Arc<dyn track_sdk::Filesystem> = Arc::new(RealFilesystem);
    let status_sink: Arc<dyn track_engine::StatusSink> = Arc::new(InMemoryStatusSink::new());
    let runner_registry = DefaultRunnerRegistry::new();

    let stage = track_engine::run_stage(&config, filesystem, &runner_registry, status_sink)
        .await
        .context("stage orchestrator failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&stage).context("serializing stage as JSON")?;
        println!("{json}");
    } else {
        print_summary(&stage);
    }

    Ok(exit_code_for(&stage))
}

/// Plain-text per-track/per-region/per-step summary (SPEC_FULL §"Supplemental features").
fn print_summary(stage: &Stage) {
    if let Some(pretrack) = &stage.pretrack_output {
        println!("pre-track:");
        print_track(pretrack);
    }

    for track in &stage.track_outputs {
        println!("track {}:", track.track_name);
        if track.skipped {
            println!("  skipped (pre-track failed)");
            continue;
        }
        print_track(track);
    }
}

fn print_track(track: &track_engine::TrackOutput) {
    for region in &track.regions {
        println!(
            "  region {} ({}): executed={} skipped={} not_applicable={} failures={} failed_tests={}",
            region.region,
            region.deploy_type,
            region.output.executed,
            region.output.skipped,
            region.output.not_applicable,
            region.output.failure_count,
            region.output.failed_test_count,
        );
        let mut step_names: Vec<&String> = region.output.steps.keys().collect();
        step_names.sort();
        for name in step_names {
            let executed = &region.output.steps[name];
            let test_suffix = match &executed.test_output {
                Some(test) => format!(", test={}", test.status),
                None => String::new(),
            };
            println!("    step {name}: {}{test_suffix}", executed.output.status);
        }
    }
}

/// Overall process exit code: non-zero iff the worst-status-wins merge of
/// every track (pre-track included) lands on `Status::Fail`.
fn exit_code_for(stage: &Stage) -> i32 {
    let mut overall: Option<Status> = None;
    if let Some(pretrack) = &stage.pretrack_output {
        overall = Some(StatusUtil::merge(overall, track_status(pretrack)));
    }
    for track in &stage.track_outputs {
        overall = Some(StatusUtil::merge(overall, track_status(track)));
    }

    match overall {
        Some(Status::Fail) => 1,
        _ => 0,
    }
}

/// Collapse one track's per-region results to a single `Status` for the
/// exit-code merge: failed beats skipped beats success.
fn track_status(track: &track_engine::TrackOutput) -> Status {
    if track.skipped {
        Status::Skipped
    } else if track.has_failure() {
        Status::Fail
    } else {
        Status::Success
    }
}
