// track-engine: the Track Execution Engine core.
//
// Discovery walks a repository into a Plan; the Stage Orchestrator drives
// Track Executors, which drive Region Executors, which drive Step Runners
// (the `track-runners` crate supplies concrete ones). Architecture:
//
//   stage_orchestrator::run_stage → discovery::discover → Plan
//     → track_executor::run_deploy (per track) → region_executor::run_deploy
//       (per region) → Runner::execute (per step)

pub mod discovery;
pub mod execution;
pub mod plan;
pub mod region_executor;
pub mod stage_orchestrator;
pub mod status_sink;
pub mod track_executor;

pub use execution::{ExecutedStep, ExecutionOutput, RegionExecution, StepOutputVariables, TrackOutput};
pub use plan::{Plan, Progression, Track};
pub use stage_orchestrator::{run_stage, Stage};
pub use status_sink::{ExecutionResult, InMemoryStatusSink, StatusSink};
