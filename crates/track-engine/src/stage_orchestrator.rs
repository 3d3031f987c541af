// Stage Orchestrator: runs the pre-track, then all other tracks in
// parallel; drives the symmetric destroy pass. Implements spec.md §4.6.

use crate::discovery;
use crate::execution::{StepOutputVariables, TrackOutput};
use crate::plan::Track;
use crate::status_sink::StatusSink;
use crate::track_executor;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use track_common::{Configuration, EngineError};
use track_sdk::{Filesystem, RunnerRegistry};

/// The result of one full orchestration run: every Track's output, plus the
/// pre-track's (if one exists), reflecting whatever destroy pass ran.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stage {
    pub track_outputs: Vec<TrackOutput>,
    pub pretrack_output: Option<TrackOutput>,
}

/// Run Discovery, then deploy (and optionally destroy) the resulting Plan.
pub async fn run_stage(
    config: &Configuration,
    filesystem: Arc<dyn Filesystem>,
    runner_registry: &dyn RunnerRegistry,
    status_sink: Arc<dyn StatusSink>,
) -> Result<Stage, EngineError> {
    let plan = discovery::discover(config, filesystem.as_ref(), runner_registry)?;

    let pretrack = plan.pre_track();
    let parallel_tracks: Vec<&Track> = plan.parallel_tracks().collect();

    let mut pretrack_output: Option<TrackOutput> = None;

    if let Some(pretrack) = pretrack {
        let output = track_executor::run_deploy(
            pretrack,
            config,
            None,
            status_sink.clone(),
            filesystem.clone(),
        )
        .await;
        let pretrack_failed = output.has_failure();
        pretrack_output = Some(output);

        if pretrack_failed {
            tracing::warn!(
                track_count = parallel_tracks.len(),
                "pre-track failed, skipping all other tracks"
            );
            let track_outputs = parallel_tracks
                .iter()
                .map(|t| TrackOutput {
                    track_name: t.name.clone(),
                    regions: Vec::new(),
                    primary_step_output_variables: StepOutputVariables::new(),
                    skipped: true,
                })
                .collect();
            return Ok(Stage {
                track_outputs,
                pretrack_output,
            });
        }
    }

    // Step 4: run all parallel tracks concurrently.
    let mut handles = Vec::new();
    for track in &parallel_tracks {
        let track = (*track).clone();
        let config_owned = config.clone();
        let pretrack_output_clone = pretrack_output.clone();
        let status_sink = status_sink.clone();
        let filesystem = filesystem.clone();
        handles.push(tokio::spawn(async move {
            let output = track_executor::run_deploy(
                &track,
                &config_owned,
                pretrack_output_clone.as_ref(),
                status_sink,
                filesystem,
            )
            .await;
            (track, output)
        }));
    }

    let mut deployed: Vec<(Track, TrackOutput)> = Vec::new();
    for handle in handles {
        if let Ok(pair) = handle.await {
            deployed.push(pair);
        }
    }

    let track_outputs: Vec<TrackOutput> = deployed.iter().map(|(_, output)| output.clone()).collect();

    // Step 5: self-destroy pass, only when requested and not a dry run.
    if config.should_self_destroy() {
        let mut destroy_handles = Vec::new();
        for (track, output) in &deployed {
            let execution_vars = execution_step_output_variables(output);
            let track = track.clone();
            let config_owned = config.clone();
            let pretrack_output_clone = pretrack_output.clone();
            let status_sink = status_sink.clone();
            let filesystem = filesystem.clone();
            destroy_handles.push(tokio::spawn(async move {
                track_executor::run_destroy(
                    &track,
                    &config_owned,
                    &execution_vars,
                    pretrack_output_clone.as_ref(),
                    status_sink,
                    filesystem,
                )
                .await
            }));
        }
        for handle in destroy_handles {
            let _ = handle.await;
        }

        if let Some(pretrack) = pretrack {
            let execution_vars = pretrack_output
                .as_ref()
                .map(execution_step_output_variables)
                .unwrap_or_default();
            let destroyed_pretrack = track_executor::run_destroy(
                pretrack,
                config,
                &execution_vars,
                None,
                status_sink.clone(),
                filesystem.clone(),
            )
            .await;
            pretrack_output = Some(destroyed_pretrack);
        }
    }

    Ok(Stage {
        track_outputs,
        pretrack_output,
    })
}

/// Build the `"<deployType>-<region>"` keyed map the destroy pass reseeds
/// from (§4.5 "Destroy", §4.6 step 5).
fn execution_step_output_variables(output: &TrackOutput) -> HashMap<String, StepOutputVariables> {
    let mut map = HashMap::new();
    for region in &output.regions {
        let key = format!("{}-{}", region.deploy_type, region.region);
        map.insert(key, region.output.step_output_variables.clone());
    }
    map
}
