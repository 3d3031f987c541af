// Domain constants for the Track Execution Engine's filesystem layout,
// mapping spec.md §6's "Filesystem layout consumed".

/// Subdirectory under the repository root holding explicit tracks.
pub const TRACKS_DIR: &str = "tracks";

/// Reserved track name for the pre-track (runs before all others).
pub const PRETRACK_NAME: &str = "_pretrack";

/// Track name synthesized from root-level `stepN_*` directories.
pub const DEFAULT_TRACK_NAME: &str = "default";

/// Prefix every `stepN_<name>` directory must start with; `N` is the
/// progression digit.
pub const STEP_DIR_PREFIX: &str = "step";

/// Relative path (inside a step directory) whose presence marks primary tests.
pub const TESTS_MARKER: &str = "tests/tests.test";

/// Relative path (inside a step directory) marking regional resources.
pub const REGIONAL_DIR: &str = "regional";

/// Relative path (inside a step's `regional/` directory) marking regional tests.
pub const REGIONAL_TESTS_MARKER: &str = "regional/tests/tests.test";

/// File extension probed at the repository root to trigger the synthetic
/// `default` track (spec.md §4.1 step 1).
pub const IAC_FILE_EXTENSION: &str = ".tf";
