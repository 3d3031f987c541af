// track-sdk: Foundation layer for the Track Execution Engine.
// This crate has ZERO dependencies on other engine crates and provides
// core utilities, the filesystem abstraction, the Step/StepOutput data
// model, and the Runner capability trait used throughout the engine.

pub mod filesystem;
pub mod process_invoker;
pub mod runner;
pub mod step;
pub mod trace;
pub mod which_util;

// Re-export commonly used items at crate root
pub use filesystem::{DirEntryInfo, Filesystem, RealFilesystem};
pub use process_invoker::{ProcessDataReceivedEventArgs, ProcessExitCodeError, ProcessInvoker};
pub use runner::{Runner, RunnerRegistry};
pub use step::{DeployType, RunnerContext, Status, Step, StepId, StepOutput, StepTestOutput};
pub use trace::TraceWriter;
pub use which_util::WhichUtil;
