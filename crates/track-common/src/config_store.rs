// Configuration mapping spec.md §6's "Configuration consumed" list.
//
// This is deliberately not a general-purpose config language: it is the
// minimum settings object the Stage Orchestrator needs, loaded once at
// startup by `track-cli`. The CLI/config loader proper is an out-of-scope
// collaborator (spec.md §1); this is the concrete shape its output takes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Engine-visible run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    /// Used in step IDs (`#<project>#<track>#<step>`).
    pub project: String,

    /// The single region for Primary executions.
    pub primary_region: String,

    /// The regions for Regional executions.
    #[serde(default)]
    pub regional_regions: Vec<String>,

    /// Step IDs to include when non-empty and `target_all` is false.
    #[serde(default)]
    pub step_whitelist: HashSet<String>,

    /// Bypass whitelist filtering when true.
    #[serde(default)]
    pub target_all: bool,

    /// Run the destroy pass after deploy (only meaningful when not `dry_run`).
    #[serde(default)]
    pub self_destroy: bool,

    /// Disables step tests and the destroy pass.
    #[serde(default)]
    pub dry_run: bool,

    /// Repository root Discovery walks.
    #[serde(skip)]
    pub root: PathBuf,
}

impl Configuration {
    /// Load a `Configuration` from a TOML file, then attach the repository
    /// root (not itself part of the file — it is the directory the engine
    /// was invoked against).
    pub fn load(path: &Path, root: PathBuf) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration file {}", path.display()))?;
        let mut config: Configuration = toml::from_str(&raw)
            .with_context(|| format!("parsing configuration file {}", path.display()))?;
        config.root = root;
        Ok(config)
    }

    /// Whether a step with the given ID should be included, applying the
    /// whitelist/target-all rule from spec.md §4.1 step 3 (case-insensitive).
    pub fn includes_step(&self, step_id: &str) -> bool {
        if self.step_whitelist.is_empty() || self.target_all {
            return true;
        }
        self.step_whitelist
            .iter()
            .any(|id| id.eq_ignore_ascii_case(step_id))
    }

    /// Whether the destroy pass should run after a successful deploy.
    pub fn should_self_destroy(&self) -> bool {
        self.self_destroy && !self.dry_run
    }
}
