// Region Executor: runs all progressions of one Track in one region,
// interleaving test execution. Implements spec.md §4.3 (deploy direction)
// and §4.4 (destroy direction).
//
// Concurrency follows the teacher's `steps_runner.rs` shape: a task per step
// within a progression, fanning results back through an mpsc channel and
// draining exactly as many results as steps were spawned before advancing to
// the next progression (the "channel-as-future" idiom, spec.md §9).

use crate::execution::{ExecutionOutput, RegionExecution, StepOutputVariables};
use crate::plan::{Progression, Track};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use track_common::EngineError;
use track_sdk::{DeployType, RunnerContext, Status, Step, StepOutput, StepTestOutput};
use track_sdk::trace::TracingTraceWriter;

/// Which of the four (deploy) / two (destroy) outcomes a Step gets this
/// progression, decided once per step before its work unit is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    NotApplicable,
    SkippedLocal,
    SkippedPrimary,
    Execute,
}

fn determine_deploy_disposition(
    step: &Step,
    level: u8,
    deploy_type: DeployType,
    local_failure_count: usize,
    primary_failure_count: Option<usize>,
) -> Disposition {
    if deploy_type == DeployType::Regional && !step.regional_resources_exist {
        return Disposition::NotApplicable;
    }
    if level > 1 && local_failure_count > 0 {
        return Disposition::SkippedLocal;
    }
    if deploy_type == DeployType::Regional && primary_failure_count.unwrap_or(0) > 0 {
        return Disposition::SkippedPrimary;
    }
    Disposition::Execute
}

/// Destroy direction collapses to two outcomes (§4.4).
fn should_skip_destroy(step: &Step, level: u8, deploy_type: DeployType, local_failure_count: usize) -> bool {
    (deploy_type == DeployType::Regional && !step.regional_resources_exist)
        || (level > 1 && local_failure_count > 0)
}

/// Flatten the nested `StepOutputVariables` map into the flat map a
/// `RunnerContext` exposes to a Runner. Conflicts between step-keys are
/// resolved arbitrarily (last write wins) — Runners are expected to read
/// variables by name, not by producing step, matching the Runner's
/// string-coercion convention (spec.md §9).
fn flatten_vars(vars: &StepOutputVariables) -> HashMap<String, String> {
    let mut flat = HashMap::new();
    for inner in vars.values() {
        for (k, v) in inner {
            flat.insert(k.clone(), v.clone());
        }
    }
    flat
}

fn runner_context(
    step: &Step,
    region: &str,
    deploy_type: DeployType,
    prior_vars: &StepOutputVariables,
    dry_run: bool,
    filesystem: Arc<dyn track_sdk::Filesystem>,
) -> RunnerContext {
    RunnerContext {
        step: step.clone(),
        region: region.to_string(),
        deploy_type,
        trace: Arc::new(TracingTraceWriter),
        filesystem,
        prior_output_variables: flatten_vars(prior_vars),
        dry_run,
    }
}

struct TestRequest {
    step: Step,
    ctx: RunnerContext,
    deploy_status: Status,
    has_error: bool,
}

struct TestResult {
    step_name: String,
    output: StepTestOutput,
}

async fn test_worker(
    receiver: Arc<AsyncMutex<mpsc::UnboundedReceiver<TestRequest>>>,
    results: mpsc::UnboundedSender<TestResult>,
    dry_run: bool,
) {
    let request = {
        let mut guard = receiver.lock().await;
        guard.recv().await
    };
    let Some(request) = request else { return };

    tracing::debug!(step = %request.step.name, "test worker picked up step");

    let output = if request.has_error
        || request.deploy_status == Status::Fail
        || request.deploy_status == Status::Skipped
    {
        StepTestOutput::empty()
    } else if dry_run {
        StepTestOutput::empty()
    } else {
        let runner = request
            .step
            .runner
            .clone()
            .expect("discovery always assigns a runner to a Step");
        runner.execute_tests(&request.ctx).await
    };

    let _ = results.send(TestResult {
        step_name: request.step.name.clone(),
        output,
    });
}

/// Run one RegionExecution in the deploy direction (§4.3).
#[allow(clippy::too_many_arguments)]
pub async fn run_deploy(
    track: &Track,
    region: String,
    deploy_type: DeployType,
    seed: StepOutputVariables,
    primary_output: Option<&ExecutionOutput>,
    dry_run: bool,
    status_sink: Arc<dyn crate::status_sink::StatusSink>,
    filesystem: Arc<dyn track_sdk::Filesystem>,
) -> RegionExecution {
    let mut output = ExecutionOutput::seeded(seed);

    let tests_needed = match deploy_type {
        DeployType::Primary => track.primary_tests_count(),
        DeployType::Regional => track.regional_tests_count(),
    };

    let (test_tx, test_rx) = mpsc::unbounded_channel::<TestRequest>();
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<TestResult>();
    let shared_test_rx = Arc::new(AsyncMutex::new(test_rx));
    for _ in 0..tests_needed {
        tokio::spawn(test_worker(
            shared_test_rx.clone(),
            result_tx.clone(),
            dry_run,
        ));
    }
    drop(result_tx);

    for progression in track.progressions_ascending() {
        run_deploy_progression(
            progression,
            track,
            &region,
            deploy_type,
            dry_run,
            &filesystem,
            &status_sink,
            &test_tx,
            primary_output,
            &mut output,
        )
        .await;
    }
    drop(test_tx);

    for _ in 0..tests_needed {
        if let Some(TestResult { step_name, output: test_output }) = result_rx.recv().await {
            output.attach_test(&step_name, test_output);
        }
    }

    RegionExecution {
        track_name: track.name.clone(),
        region,
        deploy_type,
        output,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_deploy_progression(
    progression: &Progression,
    track: &Track,
    region: &str,
    deploy_type: DeployType,
    dry_run: bool,
    filesystem: &Arc<dyn track_sdk::Filesystem>,
    status_sink: &Arc<dyn crate::status_sink::StatusSink>,
    test_tx: &mpsc::UnboundedSender<TestRequest>,
    primary_output: Option<&ExecutionOutput>,
    output: &mut ExecutionOutput,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<(Step, StepOutput)>();
    let local_failure_count = output.failure_count;
    let primary_failure_count = primary_output.map(|p| p.failure_count);

    for step in &progression.steps {
        let disposition = determine_deploy_disposition(
            step,
            progression.level,
            deploy_type,
            local_failure_count,
            primary_failure_count,
        );
        let tx = tx.clone();
        let step = step.clone();
        let filesystem = filesystem.clone();
        let status_sink = status_sink.clone();
        let region = region.to_string();
        let track_name = track.name.clone();
        let prior_vars = output.step_output_variables.clone();

        tokio::spawn(async move {
            let step_output = match disposition {
                Disposition::NotApplicable => StepOutput::not_applicable(),
                Disposition::SkippedLocal | Disposition::SkippedPrimary => StepOutput::skipped(),
                Disposition::Execute => {
                    status_sink.record_step_start(&track_name, &region, deploy_type, &step.name);
                    let ctx = runner_context(&step, &region, deploy_type, &prior_vars, dry_run, filesystem);
                    let runner = step
                        .runner
                        .clone()
                        .expect("discovery always assigns a runner to a Step");
                    match runner.pre_execute(&ctx).await {
                        Ok(()) => runner.execute(&ctx).await,
                        Err(err) => {
                            let init_err = EngineError::StepInit {
                                step_id: step.id.as_str().to_string(),
                                source: err,
                            };
                            StepOutput::fail(init_err.to_string(), Vec::new())
                        }
                    }
                }
            };
            let _ = tx.send((step, step_output));
        });
    }
    drop(tx);

    let expected = progression.steps.len();
    for _ in 0..expected {
        let (step, step_output) = rx
            .recv()
            .await
            .expect("exactly one result per spawned step in this progression");

        if step_output.has_error() {
            status_sink.record_step_fail(
                &track.name,
                region,
                deploy_type,
                &step.name,
                step_output.error.as_deref().unwrap_or("unknown error"),
            );
        } else if !matches!(step_output.status, Status::Skipped | Status::NotApplicable) {
            status_sink.record_step_success(&track.name, region, deploy_type, &step.name);
        }

        let triggers_test = match deploy_type {
            DeployType::Primary => step.tests_exist,
            DeployType::Regional => step.regional_tests_exist,
        };
        if triggers_test {
            let ctx = runner_context(
                &step,
                region,
                deploy_type,
                &output.step_output_variables,
                dry_run,
                filesystem.clone(),
            );
            let _ = test_tx.send(TestRequest {
                step: step.clone(),
                ctx,
                deploy_status: step_output.status,
                has_error: step_output.has_error(),
            });
        }

        output.record(step, step_output, deploy_type);
    }
}

/// Run one RegionExecution in the destroy direction (§4.4).
pub async fn run_destroy(
    track: &Track,
    region: String,
    deploy_type: DeployType,
    seed: StepOutputVariables,
    dry_run: bool,
    status_sink: Arc<dyn crate::status_sink::StatusSink>,
    filesystem: Arc<dyn track_sdk::Filesystem>,
) -> RegionExecution {
    let mut output = ExecutionOutput::seeded(seed);

    for progression in track.progressions_descending() {
        let (tx, mut rx) = mpsc::unbounded_channel::<(Step, StepOutput)>();
        let local_failure_count = output.failure_count;

        for step in &progression.steps {
            let skip = should_skip_destroy(step, progression.level, deploy_type, local_failure_count);
            let tx = tx.clone();
            let step = step.clone();
            let filesystem = filesystem.clone();
            let status_sink = status_sink.clone();
            let region = region.clone();
            let track_name = track.name.clone();
            let prior_vars = output.step_output_variables.clone();

            tokio::spawn(async move {
                let step_output = if skip {
                    StepOutput::skipped()
                } else {
                    status_sink.record_step_start(&track_name, &region, deploy_type, &step.name);
                    let ctx = runner_context(&step, &region, deploy_type, &prior_vars, dry_run, filesystem);
                    let runner = step
                        .runner
                        .clone()
                        .expect("discovery always assigns a runner to a Step");
                    runner.execute_destroy(&ctx).await
                };
                let _ = tx.send((step, step_output));
            });
        }
        drop(tx);

        let expected = progression.steps.len();
        for _ in 0..expected {
            let (step, step_output) = rx
                .recv()
                .await
                .expect("exactly one result per spawned step in this progression");

            if step_output.has_error() {
                status_sink.record_step_fail(
                    &track.name,
                    &region,
                    deploy_type,
                    &step.name,
                    step_output.error.as_deref().unwrap_or("unknown error"),
                );
            } else if step_output.status != Status::Skipped {
                status_sink.record_step_success(&track.name, &region, deploy_type, &step.name);
            }

            output.record_destroy(step, step_output);
        }
    }

    RegionExecution {
        track_name: track.name.clone(),
        region,
        deploy_type,
        output,
    }
}
