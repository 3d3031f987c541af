// The Step Runner capability set (spec.md §4.2), following the teacher's
// `Handler` trait pattern (`handlers/handler.rs`): a small async trait
// implemented once per step layout and dispatched through a registry.

use crate::step::{RunnerContext, StepOutput, StepTestOutput};
use async_trait::async_trait;

/// A runner capable of executing one step directory in one region.
///
/// Implementations are expected to be pure with respect to engine state:
/// they may touch external systems (shell out to an IaC tool, read files),
/// but they return results rather than mutating engine structures (§4.2).
#[async_trait]
pub trait Runner: Send + Sync {
    /// Prepare the context for execution (resolve paths, validate inputs).
    /// A failure here must surface as a `Fail` `StepOutput` from `execute`/
    /// `execute_destroy` rather than propagating — the engine does not retry.
    async fn pre_execute(&self, ctx: &RunnerContext) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Run the step in deploy (apply) mode.
    async fn execute(&self, ctx: &RunnerContext) -> StepOutput;

    /// Run the step in destroy mode.
    async fn execute_destroy(&self, ctx: &RunnerContext) -> StepOutput;

    /// Run the step's test suite, if any.
    async fn execute_tests(&self, ctx: &RunnerContext) -> StepTestOutput;
}

/// Selects the `Runner` for a given step by inspecting its directory layout.
///
/// Maps spec.md §6's Runner Registry contract: selection is by directory
/// contents; unknown layouts yield a runner whose `execute` immediately
/// fails.
pub trait RunnerRegistry: Send + Sync {
    fn select(
        &self,
        step: &crate::step::Step,
        filesystem: &dyn crate::filesystem::Filesystem,
    ) -> std::sync::Arc<dyn Runner>;
}
