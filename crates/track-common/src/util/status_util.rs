// StatusUtil mapping the teacher's `TaskResultUtil` (`Util/TaskResultUtil.cs`):
// a small merge helper used to roll step-level `Status` values up into an
// overall run outcome (used by `track-cli` to pick a process exit code).
//
// The engine itself never needs this — progression gating is driven purely
// by `ExecutionOutput::failure_count` (spec.md §4.3) — but CLI-level
// summarization wants a single "worst status wins" merge, the same shape as
// the teacher's per-job result rollup.

use track_sdk::Status;

pub struct StatusUtil;

impl StatusUtil {
    /// Merge two statuses, keeping the "worst" (highest severity) one.
    /// Precedence (worst to best): `Fail` > `Skipped` > `NotApplicable` > `Success`.
    pub fn merge(current: Option<Status>, coming: Status) -> Status {
        match current {
            None => coming,
            Some(current) => {
                if Self::severity(coming) >= Self::severity(current) {
                    coming
                } else {
                    current
                }
            }
        }
    }

    fn severity(status: Status) -> u8 {
        match status {
            Status::Success => 0,
            Status::NotApplicable => 1,
            Status::Skipped => 2,
            Status::Fail => 3,
        }
    }
}
