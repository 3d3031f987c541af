// StepLogger mapping the teacher's `PagingLogger` (`Logging.cs`), trimmed
// to an in-memory line buffer: at this engine's scale (one log per step
// execution, not a multi-GB build log) there is no paging concern, so the
// disk-backed page/block bookkeeping the teacher does is unneeded — see
// DESIGN.md.
//
// Backs `StepOutput.log` / `StepTestOutput.log`.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;

/// An in-memory, UTC-timestamped line buffer for one step's execution log.
#[derive(Clone, Default)]
pub struct StepLogger {
    lines: Arc<Mutex<Vec<String>>>,
}

impl StepLogger {
    pub fn new() -> Self {
        Self {
            lines: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append a line, prefixed with a UTC timestamp, matching the teacher's
    /// `PagingLogger::write` line format.
    pub fn write(&self, message: &str) {
        let line = format!("{} {}", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"), message);
        self.lines.lock().push(line);
    }

    /// Snapshot all lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn total_lines(&self) -> usize {
        self.lines.lock().len()
    }
}
