// Core discovery/execution data model shared between the engine and the
// Runner implementations: `Step`, `Status`, `DeployType`, `StepOutput`,
// `StepTestOutput`. Kept in the foundation crate (no internal dependencies)
// so a `Runner` implementation never needs to depend on `track-engine`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// The outcome of a single step or test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Success,
    Fail,
    Skipped,
    NotApplicable,
}

impl Status {
    /// Whether this status counts as a failure for progression-gating purposes.
    pub fn is_failure(self) -> bool {
        matches!(self, Status::Fail)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Success => "Success",
            Status::Fail => "Fail",
            Status::Skipped => "Skipped",
            Status::NotApplicable => "NotApplicable",
        };
        write!(f, "{s}")
    }
}

/// Which region role a `RegionExecution` is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployType {
    Primary,
    Regional,
}

impl std::fmt::Display for DeployType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeployType::Primary => "Primary",
            DeployType::Regional => "Regional",
        };
        write!(f, "{s}")
    }
}

/// Stable identifier for a step: `#project#track#step`, or `#project#step`
/// for the default track. Whitelist matching against this ID is
/// case-insensitive (§6).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

impl StepId {
    pub const DEFAULT_TRACK: &'static str = "default";

    /// Build the stable ID for a step in `track` named `step_name` under `project`.
    /// The default track omits the track segment, per spec.md §3/§6.
    pub fn new(project: &str, track: &str, step_name: &str) -> Self {
        if track == Self::DEFAULT_TRACK {
            StepId(format!("#{project}#{step_name}"))
        } else {
            StepId(format!("#{project}#{track}#{step_name}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable discovery record for one `stepN_<name>` directory.
///
/// Maps spec.md §3's `Step`. Produced once by Discovery and never mutated.
#[derive(Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub track_name: String,
    pub directory: PathBuf,
    pub progression: u8,
    pub id: StepId,
    pub tests_exist: bool,
    pub regional_resources_exist: bool,
    pub regional_tests_exist: bool,

    /// The Runner selected for this step by the Runner Registry (§3, §4.1
    /// step 3). Not serialized: a `Runner` is a live trait object, not data.
    #[serde(skip)]
    pub runner: Option<Arc<dyn crate::runner::Runner>>,
}

impl Step {
    /// The step-key used in `StepOutputVariables` for a given deploy type
    /// (spec.md §3: `<stepName>-regional` for Regional, else the step name).
    pub fn output_key(&self, deploy_type: DeployType) -> String {
        match deploy_type {
            DeployType::Primary => self.name.clone(),
            DeployType::Regional => format!("{}-regional", self.name),
        }
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("track_name", &self.track_name)
            .field("directory", &self.directory)
            .field("progression", &self.progression)
            .field("id", &self.id)
            .field("tests_exist", &self.tests_exist)
            .field("regional_resources_exist", &self.regional_resources_exist)
            .field("regional_tests_exist", &self.regional_tests_exist)
            .field("runner", &self.runner.is_some())
            .finish()
    }
}

/// Terminal, immutable result of one `Execute`/`ExecuteDestroy` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutput {
    pub status: Status,
    pub error: Option<String>,
    pub log: Vec<String>,
    pub output_variables: HashMap<String, String>,
}

impl StepOutput {
    pub fn success(log: Vec<String>, output_variables: HashMap<String, String>) -> Self {
        Self {
            status: Status::Success,
            error: None,
            log,
            output_variables,
        }
    }

    pub fn fail(error: impl Into<String>, log: Vec<String>) -> Self {
        Self {
            status: Status::Fail,
            error: Some(error.into()),
            log,
            output_variables: HashMap::new(),
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: Status::Skipped,
            error: None,
            log: Vec::new(),
            output_variables: HashMap::new(),
        }
    }

    pub fn not_applicable() -> Self {
        Self {
            status: Status::NotApplicable,
            error: None,
            log: Vec::new(),
            output_variables: HashMap::new(),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some() || self.status == Status::Fail
    }
}

/// Terminal result of an `ExecuteTests` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTestOutput {
    pub status: Status,
    pub error: Option<String>,
    pub log: Vec<String>,
}

impl StepTestOutput {
    pub fn empty() -> Self {
        Self {
            status: Status::Skipped,
            error: None,
            log: Vec::new(),
        }
    }

    pub fn success(log: Vec<String>) -> Self {
        Self {
            status: Status::Success,
            error: None,
            log,
        }
    }

    pub fn fail(error: impl Into<String>, log: Vec<String>) -> Self {
        Self {
            status: Status::Fail,
            error: Some(error.into()),
            log,
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Execution context handed to a `Runner` for one Step in one region.
///
/// Carries everything §4.2 lists: the Step, region, deploy type, a logger,
/// a filesystem handle, and the current map of prior step output variables.
#[derive(Clone)]
pub struct RunnerContext {
    pub step: Step,
    pub region: String,
    pub deploy_type: DeployType,
    pub trace: Arc<dyn crate::trace::TraceWriter>,
    pub filesystem: Arc<dyn crate::filesystem::Filesystem>,
    pub prior_output_variables: HashMap<String, String>,
    pub dry_run: bool,
}
