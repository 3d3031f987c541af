// Fallback Runner for a step directory the Registry cannot classify
// (spec.md §6): every verb fails immediately, no process is started.

use async_trait::async_trait;
use track_sdk::{Runner, RunnerContext, StepOutput, StepTestOutput};

pub struct UnknownRunner;

#[async_trait]
impl Runner for UnknownRunner {
    async fn execute(&self, ctx: &RunnerContext) -> StepOutput {
        StepOutput::fail(unrecognized_message(ctx), Vec::new())
    }

    async fn execute_destroy(&self, ctx: &RunnerContext) -> StepOutput {
        StepOutput::fail(unrecognized_message(ctx), Vec::new())
    }

    async fn execute_tests(&self, ctx: &RunnerContext) -> StepTestOutput {
        StepTestOutput::fail(unrecognized_message(ctx), Vec::new())
    }
}

fn unrecognized_message(ctx: &RunnerContext) -> String {
    format!(
        "step '{}' has no recognized layout (no *.tf files found in {})",
        ctx.step.name,
        ctx.step.directory.display()
    )
}
