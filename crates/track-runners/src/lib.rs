// track-runners: concrete Step Runner implementations selected by the
// Runner Registry. `TerraformRunner` shells out to an IaC CLI tool via
// `track-sdk`'s `ProcessInvoker`; `UnknownRunner` is the fallback for step
// directories the registry can't classify.

pub mod registry;
pub mod terraform_runner;
pub mod unknown_runner;

pub use registry::DefaultRunnerRegistry;
pub use terraform_runner::TerraformRunner;
pub use unknown_runner::UnknownRunner;
