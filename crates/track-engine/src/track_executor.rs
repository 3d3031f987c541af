// Track Executor: runs the primary region of a Track, then fans out to
// regional regions; gathers outputs. Implements spec.md §4.5.

use crate::execution::{inject_pretrack_variables, StepOutputVariables, TrackOutput};
use crate::plan::Track;
use crate::region_executor;
use crate::status_sink::StatusSink;
use std::collections::HashMap;
use std::sync::Arc;
use track_common::Configuration;
use track_sdk::{DeployType, Filesystem};

/// Deploy direction (§4.5 "Deploy"): Primary first, then all Regional regions
/// concurrently once the Primary has fully quiesced.
pub async fn run_deploy(
    track: &Track,
    config: &Configuration,
    pretrack_output: Option<&TrackOutput>,
    status_sink: Arc<dyn StatusSink>,
    filesystem: Arc<dyn Filesystem>,
) -> TrackOutput {
    let dry_run = config.dry_run;

    let mut primary_seed = StepOutputVariables::new();
    if let Some(pretrack) = pretrack_output {
        inject_pretrack_variables(&mut primary_seed, pretrack);
    }

    let primary_region = region_executor::run_deploy(
        track,
        config.primary_region.clone(),
        DeployType::Primary,
        primary_seed,
        None,
        dry_run,
        status_sink.clone(),
        filesystem.clone(),
    )
    .await;

    let primary_vars = primary_region.output.step_output_variables.clone();
    let primary_output_snapshot = primary_region.output.clone();
    let mut regions = vec![primary_region];

    if !track.has_regional_resources() {
        status_sink.flush_track(&track.name);
        return TrackOutput {
            track_name: track.name.clone(),
            regions,
            primary_step_output_variables: primary_vars,
            skipped: false,
        };
    }

    let mut handles = Vec::new();
    for region_name in &config.regional_regions {
        // Deep copy of the Primary's final map, per the invariant in spec.md
        // §3 (the design notes' shallow-copy seeding is a weaker alternative).
        let mut seed = primary_vars.clone();
        if let Some(pretrack) = pretrack_output {
            inject_pretrack_variables(&mut seed, pretrack);
        }
        let region_name = region_name.clone();
        let status_sink = status_sink.clone();
        let filesystem = filesystem.clone();
        let primary_output_snapshot = primary_output_snapshot.clone();
        let track_clone = track.clone();

        handles.push(tokio::spawn(async move {
            region_executor::run_deploy(
                &track_clone,
                region_name,
                DeployType::Regional,
                seed,
                Some(&primary_output_snapshot),
                dry_run,
                status_sink,
                filesystem,
            )
            .await
        }));
    }

    for handle in handles {
        if let Ok(region) = handle.await {
            regions.push(region);
        }
    }

    status_sink.flush_track(&track.name);

    TrackOutput {
        track_name: track.name.clone(),
        regions,
        primary_step_output_variables: primary_vars,
        skipped: false,
    }
}

/// Destroy direction (§4.5 "Destroy"): symmetric but reversed — all Regional
/// regions concurrently first, then the Primary. Each region's seed comes
/// from the Stage's recorded `"<deployType>-<region>"` output variables plus
/// pre-track outputs.
pub async fn run_destroy(
    track: &Track,
    config: &Configuration,
    execution_step_output_variables: &HashMap<String, StepOutputVariables>,
    pretrack_output: Option<&TrackOutput>,
    status_sink: Arc<dyn StatusSink>,
    filesystem: Arc<dyn Filesystem>,
) -> TrackOutput {
    let dry_run = config.dry_run;
    let mut regions = Vec::new();

    if track.has_regional_resources() {
        let mut handles = Vec::new();
        for region_name in &config.regional_regions {
            let key = format!("Regional-{region_name}");
            let mut seed = execution_step_output_variables
                .get(&key)
                .cloned()
                .unwrap_or_default();
            if let Some(pretrack) = pretrack_output {
                inject_pretrack_variables(&mut seed, pretrack);
            }
            let region_name = region_name.clone();
            let status_sink = status_sink.clone();
            let filesystem = filesystem.clone();
            let track_clone = track.clone();

            handles.push(tokio::spawn(async move {
                region_executor::run_destroy(
                    &track_clone,
                    region_name,
                    DeployType::Regional,
                    seed,
                    dry_run,
                    status_sink,
                    filesystem,
                )
                .await
            }));
        }
        for handle in handles {
            if let Ok(region) = handle.await {
                regions.push(region);
            }
        }
    }

    let primary_key = format!("Primary-{}", config.primary_region);
    let mut primary_seed = execution_step_output_variables
        .get(&primary_key)
        .cloned()
        .unwrap_or_default();
    if let Some(pretrack) = pretrack_output {
        inject_pretrack_variables(&mut primary_seed, pretrack);
    }

    let primary_region = region_executor::run_destroy(
        track,
        config.primary_region.clone(),
        DeployType::Primary,
        primary_seed,
        dry_run,
        status_sink.clone(),
        filesystem.clone(),
    )
    .await;
    regions.push(primary_region);

    status_sink.flush_track(&track.name);

    TrackOutput {
        track_name: track.name.clone(),
        regions,
        primary_step_output_variables: StepOutputVariables::new(),
        skipped: false,
    }
}
