// Rolling aggregates produced while running one RegionExecution/Track,
// mapping spec.md §3's `ExecutionOutput`/`RegionExecution`/`TrackOutput`.

use serde::Serialize;
use std::collections::HashMap;
use track_sdk::{DeployType, Status, Step, StepOutput, StepTestOutput};

/// Map step-key → map var-name → value (spec.md §3).
///
/// A plain `HashMap` clone is a deep copy (Rust has no reference-counted
/// inner maps to share), which the design notes call out as an acceptable,
/// strictly-stronger alternative to the source's shallow-copy seeding.
pub type StepOutputVariables = HashMap<String, HashMap<String, String>>;

/// One finished Step, with its deploy output and (if triggered) test output.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutedStep {
    pub step: Step,
    pub output: StepOutput,
    pub test_output: Option<StepTestOutput>,
}

/// Rolling aggregate of a single RegionExecution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionOutput {
    pub steps: HashMap<String, ExecutedStep>,
    pub executed: usize,
    pub skipped: usize,
    pub not_applicable: usize,
    pub failure_count: usize,
    pub failed_test_count: usize,
    pub failed_steps: Vec<String>,
    pub step_output_variables: StepOutputVariables,
}

impl ExecutionOutput {
    pub fn seeded(step_output_variables: StepOutputVariables) -> Self {
        Self {
            step_output_variables,
            ..Default::default()
        }
    }

    /// Apply one finished Step's deploy result: update counters, store the
    /// Step, and merge its output variables under the step-key rule (§3, §4.3).
    pub fn record(&mut self, step: Step, output: StepOutput, deploy_type: DeployType) {
        match output.status {
            Status::NotApplicable => self.not_applicable += 1,
            Status::Skipped => self.skipped += 1,
            Status::Success | Status::Fail => self.executed += 1,
        }
        if output.has_error() {
            self.failure_count += 1;
            self.failed_steps.push(step.name.clone());
        }
        self.step_output_variables
            .insert(step.output_key(deploy_type), output.output_variables.clone());
        self.steps.insert(
            step.name.clone(),
            ExecutedStep {
                step,
                output,
                test_output: None,
            },
        );
    }

    /// Apply a finished Step's destroy result. Destroy has only two
    /// dispositions and never publishes output variables downstream (§4.4).
    pub fn record_destroy(&mut self, step: Step, output: StepOutput) {
        match output.status {
            Status::Skipped => self.skipped += 1,
            Status::NotApplicable | Status::Success | Status::Fail => self.executed += 1,
        }
        if output.has_error() {
            self.failure_count += 1;
            self.failed_steps.push(step.name.clone());
        }
        self.steps.insert(
            step.name.clone(),
            ExecutedStep {
                step,
                output,
                test_output: None,
            },
        );
    }

    /// Attach a test result to an already-recorded Step (§4.3, post-progression drain).
    pub fn attach_test(&mut self, step_name: &str, test_output: StepTestOutput) {
        if test_output.has_error() {
            self.failed_test_count += 1;
        }
        if let Some(executed) = self.steps.get_mut(step_name) {
            executed.test_output = Some(test_output);
        }
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

/// One (Track × Region × DeployType) run.
#[derive(Debug, Clone, Serialize)]
pub struct RegionExecution {
    pub track_name: String,
    pub region: String,
    pub deploy_type: DeployType,
    pub output: ExecutionOutput,
}

/// All RegionExecutions of one Track, plus the Primary's output variables
/// hoisted to track level for downstream tracks to read (§3).
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackOutput {
    pub track_name: String,
    pub regions: Vec<RegionExecution>,
    pub primary_step_output_variables: StepOutputVariables,
    /// Set by the Stage Orchestrator when the pre-track failed (§4.6 step 3).
    pub skipped: bool,
}

impl TrackOutput {
    pub fn primary(&self) -> Option<&RegionExecution> {
        self.regions
            .iter()
            .find(|r| r.deploy_type == DeployType::Primary)
    }

    pub fn regional(&self) -> impl Iterator<Item = &RegionExecution> {
        self.regions
            .iter()
            .filter(|r| r.deploy_type == DeployType::Regional)
    }

    pub fn has_failure(&self) -> bool {
        self.regions.iter().any(|r| r.output.failure_count > 0)
    }
}

/// Inject pre-track outputs under the `pretrack-<stepKey>` prefix (§3, §4.5).
pub fn inject_pretrack_variables(
    seed: &mut StepOutputVariables,
    pretrack_output: &TrackOutput,
) {
    for region in &pretrack_output.regions {
        for (step_key, vars) in &region.output.step_output_variables {
            seed.insert(format!("pretrack-{step_key}"), vars.clone());
        }
    }
}
