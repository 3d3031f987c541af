// Engine-visible error kinds, mapping spec.md §7 ("Error Handling Design").
//
// `Discovery` fails the whole stage outright (§7's "Propagation policy").
// `StepInit` does not: the region executor catches it at the one call site
// that constructs it and folds it into a terminal `StepOutput::fail`, so it
// carries a typed message through that boundary without aborting the run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Unreadable directory during Discovery, or another hard init failure.
    /// Per-step parse errors (non-numeric progression digit) are logged and
    /// the step dropped; they do not produce this variant.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// A Runner's `pre_execute` failed for a step (e.g. a missing binary).
    /// Constructed in `region_executor::run_deploy_progression` and folded
    /// into the step's `StepOutput::fail` message.
    #[error("step init failed for {step_id}: {source}")]
    StepInit {
        step_id: String,
        source: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_error_displays_message() {
        let err = EngineError::Discovery("unreadable root".into());
        assert_eq!(err.to_string(), "discovery failed: unreadable root");
    }

    #[test]
    fn step_init_error_displays_step_id_and_source() {
        let err = EngineError::StepInit {
            step_id: "p-foo-a".into(),
            source: anyhow::anyhow!("terraform: command not found"),
        };
        assert_eq!(
            err.to_string(),
            "step init failed for p-foo-a: terraform: command not found"
        );
    }
}
