// Status Sink collaborator contract (spec.md §6) and its default in-memory
// implementation, grounded in the teacher's `ResultsClient`
// (`update_workflow_steps`/`upload_step_log`) collapsed to the four verbs
// spec.md names, and in `runner-common`'s `parking_lot`-guarded shared state.

use parking_lot::Mutex;
use std::collections::HashMap;
use track_sdk::{DeployType, Status};

/// One recorded step event, accumulated by `StatusSink` and returned by
/// `flush_track`.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub track_name: String,
    pub region: String,
    pub deploy_type: DeployType,
    pub step_name: String,
    pub status: Status,
    pub error: Option<String>,
}

/// Per-step start/success/fail recording, flushed at track completion (§5,
/// §6). The engine's only process-wide shared state.
pub trait StatusSink: Send + Sync {
    fn record_step_start(&self, track_name: &str, region: &str, deploy_type: DeployType, step_name: &str);

    fn record_step_success(&self, track_name: &str, region: &str, deploy_type: DeployType, step_name: &str);

    fn record_step_fail(
        &self,
        track_name: &str,
        region: &str,
        deploy_type: DeployType,
        step_name: &str,
        error: &str,
    );

    /// Remove and return all records for `track_name`. A second flush of the
    /// same track returns an empty vec.
    fn flush_track(&self, track_name: &str) -> Vec<ExecutionResult>;
}

/// Default `StatusSink`: accumulates `ExecutionResult`s per track under a
/// `parking_lot::Mutex`, matching spec.md §5's "accumulates per-step records
/// under a mutex."
#[derive(Default)]
pub struct InMemoryStatusSink {
    records: Mutex<HashMap<String, Vec<ExecutionResult>>>,
}

impl InMemoryStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, record: ExecutionResult) {
        self.records
            .lock()
            .entry(record.track_name.clone())
            .or_default()
            .push(record);
    }
}

impl StatusSink for InMemoryStatusSink {
    fn record_step_start(&self, track_name: &str, region: &str, _deploy_type: DeployType, step_name: &str) {
        tracing::debug!(track = track_name, region, step = step_name, "step started");
    }

    fn record_step_success(
        &self,
        track_name: &str,
        region: &str,
        deploy_type: DeployType,
        step_name: &str,
    ) {
        tracing::info!(track = track_name, region, step = step_name, "step succeeded");
        self.push(ExecutionResult {
            track_name: track_name.to_string(),
            region: region.to_string(),
            deploy_type,
            step_name: step_name.to_string(),
            status: Status::Success,
            error: None,
        });
    }

    fn record_step_fail(
        &self,
        track_name: &str,
        region: &str,
        deploy_type: DeployType,
        step_name: &str,
        error: &str,
    ) {
        tracing::warn!(track = track_name, region, step = step_name, error, "step failed");
        self.push(ExecutionResult {
            track_name: track_name.to_string(),
            region: region.to_string(),
            deploy_type,
            step_name: step_name.to_string(),
            status: Status::Fail,
            error: Some(error.to_string()),
        });
    }

    fn flush_track(&self, track_name: &str) -> Vec<ExecutionResult> {
        self.records.lock().remove(track_name).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_returns_accumulated_records_then_empties() {
        let sink = InMemoryStatusSink::new();
        sink.record_step_success("foo", "r1", DeployType::Primary, "a");
        sink.record_step_fail("foo", "r1", DeployType::Primary, "b", "boom");

        let first = sink.flush_track("foo");
        assert_eq!(first.len(), 2);

        let second = sink.flush_track("foo");
        assert!(second.is_empty());
    }

    #[test]
    fn tracks_are_independent() {
        let sink = InMemoryStatusSink::new();
        sink.record_step_success("foo", "r1", DeployType::Primary, "a");
        sink.record_step_success("bar", "r1", DeployType::Primary, "a");

        assert_eq!(sink.flush_track("foo").len(), 1);
        assert_eq!(sink.flush_track("bar").len(), 1);
    }
}
