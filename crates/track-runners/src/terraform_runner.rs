// A Runner for step directories built around a Terraform-shaped CLI tool,
// grounded in track-sdk's `ProcessInvoker` (the same stdout/stderr-streaming
// shape the teacher uses to shell out to external tools).

use async_trait::async_trait;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use track_common::StepLogger;
use track_sdk::{ProcessInvoker, Runner, RunnerContext, StepOutput, StepTestOutput, WhichUtil};

/// The name of the binary this runner shells out to. Configurable so tests
/// can point it at a stub script instead of a real `terraform` install.
const DEFAULT_BINARY: &str = "terraform";

/// Runner for step directories that declare IaC resources via `*.tf` files.
///
/// `PreExecute` is a no-op (the context is already fully resolved by
/// Discovery); `Execute`/`ExecuteDestroy` invoke the configured binary with
/// `apply`/`destroy`, and `ExecuteTests` runs whichever test marker script
/// the region calls for, if Discovery found one.
pub struct TerraformRunner {
    binary: String,
}

impl TerraformRunner {
    pub fn new() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
        }
    }

    /// Point the runner at a different binary (e.g. a stub script in tests).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    async fn run(&self, ctx: &RunnerContext, args: &str) -> StepOutput {
        let mut invoker = ProcessInvoker::new(ctx.trace.clone());
        let mut stdout_rx = invoker.take_stdout_receiver().expect("freshly built invoker");

        let working_directory = ctx.step.directory.to_string_lossy().to_string();
        let environment = prior_variables_as_env(&ctx.prior_output_variables);

        let invocation = invoker.execute(
            &working_directory,
            &self.binary,
            args,
            Some(&environment),
            true,
            false,
            CancellationToken::new(),
        );

        let logger = StepLogger::new();

        // Drain stdout concurrently with the process run so the channel never
        // backs up (the teacher's pattern for every `ProcessInvoker` caller),
        // parsing `name=value` output lines before they gain a log timestamp.
        let drain_logger = logger.clone();
        let drain = tokio::spawn(async move {
            let mut output_variables = HashMap::new();
            while let Some(event) = stdout_rx.recv().await {
                if let Some((key, value)) = parse_output_line(&event.data) {
                    output_variables.insert(key, value);
                }
                drain_logger.write(&event.data);
            }
            output_variables
        });

        let result = invocation.await;
        // Drop the invoker to close the channel senders, so the receiver task can finish.
        drop(invoker);
        let output_variables = drain.await.unwrap_or_default();
        let log = logger.lines();

        match result {
            Ok(_exit_code) => StepOutput::success(log, output_variables),
            Err(err) => StepOutput::fail(err.to_string(), log),
        }
    }
}

impl Default for TerraformRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for TerraformRunner {
    /// Resolve the configured binary on `PATH` before the region executor
    /// invokes `execute`/`execute_destroy`. A missing binary fails here,
    /// which the region executor turns into an `EngineError::StepInit`
    /// (`track-engine::region_executor`) rather than a failed process spawn
    /// deep inside `ProcessInvoker`.
    async fn pre_execute(&self, _ctx: &RunnerContext) -> anyhow::Result<()> {
        WhichUtil::which(&self.binary, true)?;
        Ok(())
    }

    async fn execute(&self, ctx: &RunnerContext) -> StepOutput {
        self.run(ctx, "apply -auto-approve").await
    }

    async fn execute_destroy(&self, ctx: &RunnerContext) -> StepOutput {
        self.run(ctx, "destroy -auto-approve").await
    }

    async fn execute_tests(&self, ctx: &RunnerContext) -> StepTestOutput {
        let marker = test_marker_for(ctx);
        let script = ctx.step.directory.join(marker);
        if !ctx.filesystem.exists(&script) {
            return StepTestOutput::empty();
        }

        let mut invoker = ProcessInvoker::new(ctx.trace.clone());
        let mut stdout_rx = invoker.take_stdout_receiver().expect("freshly built invoker");
        let working_directory = ctx.step.directory.to_string_lossy().to_string();

        let invocation = invoker.execute(
            &working_directory,
            script.to_string_lossy().as_ref(),
            "",
            None,
            true,
            false,
            CancellationToken::new(),
        );

        let logger = StepLogger::new();
        let drain_logger = logger.clone();
        let drain = tokio::spawn(async move {
            while let Some(event) = stdout_rx.recv().await {
                drain_logger.write(&event.data);
            }
        });

        let result = invocation.await;
        // Drop the invoker to close the channel senders, so the receiver task can finish.
        drop(invoker);
        let _ = drain.await;
        let log = logger.lines();

        match result {
            Ok(_) => StepTestOutput::success(log),
            Err(err) => StepTestOutput::fail(err.to_string(), log),
        }
    }
}

/// Mirrors `track-common::constants::{TESTS_MARKER, REGIONAL_TESTS_MARKER}`;
/// duplicated here rather than depending on `track-common` so this crate
/// keeps the same zero-extra-engine-dependency shape as its sibling Runners.
fn test_marker_for(ctx: &RunnerContext) -> &'static str {
    match ctx.deploy_type {
        track_sdk::DeployType::Primary => "tests/tests.test",
        track_sdk::DeployType::Regional => "regional/tests/tests.test",
    }
}

fn prior_variables_as_env(vars: &HashMap<String, String>) -> HashMap<String, String> {
    vars.iter()
        .map(|(k, v)| (format!("TF_VAR_{k}"), v.clone()))
        .collect()
}

/// Parse one `name=value` stdout line into an output variable, the Runner's
/// string-coercion convention.
fn parse_output_line(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}
