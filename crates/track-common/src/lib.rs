// track-common: Shared infrastructure for the Track Execution Engine.
// Depends on `track-sdk`; provides structured logging, configuration,
// engine-visible error kinds, and the filesystem layout constants.

pub mod config_store;
pub mod constants;
pub mod exceptions;
pub mod logging;
pub mod tracing;
pub mod util;

pub use config_store::Configuration;
pub use exceptions::EngineError;
pub use logging::StepLogger;
pub use tracing::init_tracing;
pub use util::status_util::StatusUtil;
