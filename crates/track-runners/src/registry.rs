// Default Runner Registry: classifies a step directory by its contents and
// hands back the matching Runner, following the teacher's handler-factory
// pattern of dispatching on a discriminant computed from the input rather
// than on a static table.

use crate::terraform_runner::TerraformRunner;
use crate::unknown_runner::UnknownRunner;
use std::sync::Arc;
use track_sdk::{Filesystem, Runner, RunnerRegistry, Step};

const IAC_FILE_EXTENSION: &str = ".tf";

/// Probes for `*.tf` files in a step's directory; falls back to
/// [`UnknownRunner`] for anything else (spec.md §6).
#[derive(Default)]
pub struct DefaultRunnerRegistry;

impl DefaultRunnerRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl RunnerRegistry for DefaultRunnerRegistry {
    fn select(&self, step: &Step, filesystem: &dyn Filesystem) -> Arc<dyn Runner> {
        let has_tf_files = !filesystem
            .files_with_extension(&step.directory, IAC_FILE_EXTENSION)
            .is_empty();

        if has_tf_files {
            Arc::new(TerraformRunner::new())
        } else {
            tracing::debug!(step = %step.name, "no *.tf files found, using UnknownRunner");
            Arc::new(UnknownRunner)
        }
    }
}
