// Discovery: walks the repository tree and produces an immutable Plan.
// Implements spec.md §4.1's five-step algorithm exactly.

use crate::plan::{Plan, Progression, Track};
use std::collections::BTreeMap;
use std::path::Path;
use track_common::constants::{
    IAC_FILE_EXTENSION, REGIONAL_DIR, REGIONAL_TESTS_MARKER, STEP_DIR_PREFIX, TESTS_MARKER,
    TRACKS_DIR,
};
use track_common::{Configuration, EngineError};
use track_sdk::{Filesystem, RunnerRegistry, Step, StepId};

/// Walk `config.root`, synthesize the default track if needed, and build the
/// Plan. A hard init failure (unreadable root) is the only case that returns
/// `Err`; per-step parse errors are logged and the offending step dropped.
pub fn discover(
    config: &Configuration,
    filesystem: &dyn Filesystem,
    registry: &dyn RunnerRegistry,
) -> Result<Plan, EngineError> {
    let root = &config.root;
    if !filesystem.is_dir(root) {
        return Err(EngineError::Discovery(format!(
            "root directory {} is not readable",
            root.display()
        )));
    }

    let tracks_dir = root.join(TRACKS_DIR);
    let synthesized_default = !filesystem
        .files_with_extension(root, IAC_FILE_EXTENSION)
        .is_empty();

    if synthesized_default {
        synthesize_default_track(root, &tracks_dir, filesystem);
    }

    let mut tracks = Vec::new();
    let mut explicit_track_seen = false;

    for entry in filesystem.list_dir(&tracks_dir) {
        if !entry.is_dir {
            continue;
        }
        let track_dir = tracks_dir.join(&entry.name);
        let track = build_track(&entry.name, &track_dir, config, filesystem, registry);

        // Step 4: a Track with zero Steps is dropped from the Plan.
        if track.step_count() == 0 {
            continue;
        }
        if !track.is_default() {
            explicit_track_seen = true;
        }
        tracks.push(track);
    }

    // Step 5: warn, but keep both, on default/explicit coexistence.
    if synthesized_default && explicit_track_seen {
        tracing::warn!(
            "both a synthesized default track and explicit tracks are present; running all"
        );
    }

    Ok(Plan { tracks })
}

/// Copy every root-level `stepN_*` directory into `tracks/default/`,
/// excluding the `tracks/` subtree itself (spec.md §4.1 step 1).
fn synthesize_default_track(root: &Path, tracks_dir: &Path, filesystem: &dyn Filesystem) {
    let default_dir = tracks_dir.join(track_common::constants::DEFAULT_TRACK_NAME);
    for entry in filesystem.list_dir(root) {
        if !entry.is_dir || entry.name == TRACKS_DIR || !entry.name.starts_with(STEP_DIR_PREFIX) {
            continue;
        }
        let src = root.join(&entry.name);
        let dst = default_dir.join(&entry.name);
        if let Err(err) = filesystem.copy_tree(&src, &dst) {
            tracing::warn!(
                step_dir = %entry.name,
                error = %err,
                "failed to synthesize default track entry, skipping"
            );
        }
    }
}

/// Build one Track from the immediate `step<digit>_<name>` children of `dir`.
fn build_track(
    name: &str,
    dir: &Path,
    config: &Configuration,
    filesystem: &dyn Filesystem,
    registry: &dyn RunnerRegistry,
) -> Track {
    let mut by_level: BTreeMap<u8, Vec<Step>> = BTreeMap::new();

    for entry in filesystem.list_dir(dir) {
        if !entry.is_dir {
            continue;
        }
        if let Some(step) = parse_step(&entry.name, name, dir, config, filesystem, registry) {
            by_level.entry(step.progression).or_default().push(step);
        }
    }

    let progressions = by_level
        .into_iter()
        .map(|(level, steps)| Progression { level, steps })
        .collect();

    Track {
        name: name.to_string(),
        directory: dir.to_path_buf(),
        progressions,
    }
}

/// Parse one candidate `step<digit>_<name>` directory into a `Step`, applying
/// the whitelist filter and probing for tests/regional markers. Returns
/// `None` for anything that is not a step directory, has a non-numeric
/// progression digit, or is excluded by the whitelist.
fn parse_step(
    entry_name: &str,
    track_name: &str,
    track_dir: &Path,
    config: &Configuration,
    filesystem: &dyn Filesystem,
    registry: &dyn RunnerRegistry,
) -> Option<Step> {
    let rest = entry_name.strip_prefix(STEP_DIR_PREFIX)?;
    let mut chars = rest.chars();
    let digit = chars.next()?;
    if !digit.is_ascii_digit() {
        tracing::warn!(
            track = track_name,
            step_dir = entry_name,
            "non-numeric progression digit, skipping step"
        );
        return None;
    }
    let progression = digit.to_digit(10).expect("checked ascii digit above") as u8;

    let step_name = chars.as_str().strip_prefix('_')?;
    if step_name.is_empty() {
        return None;
    }

    let id = StepId::new(&config.project, track_name, step_name);
    if !config.includes_step(id.as_str()) {
        return None;
    }

    let step_dir = track_dir.join(entry_name);
    let tests_exist = filesystem.exists(&step_dir.join(TESTS_MARKER));
    let regional_resources_exist = filesystem.is_dir(&step_dir.join(REGIONAL_DIR));
    let regional_tests_exist =
        regional_resources_exist && filesystem.exists(&step_dir.join(REGIONAL_TESTS_MARKER));

    let mut step = Step {
        name: step_name.to_string(),
        track_name: track_name.to_string(),
        directory: step_dir,
        progression,
        id,
        tests_exist,
        regional_resources_exist,
        regional_tests_exist,
        runner: None,
    };
    step.runner = Some(registry.select(&step, filesystem));
    Some(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::path::PathBuf;
    use std::sync::Arc;
    use track_sdk::{DirEntryInfo, RunnerContext, StepOutput, StepTestOutput};

    struct DummyRunner;

    #[async_trait]
    impl track_sdk::Runner for DummyRunner {
        async fn execute(&self, _ctx: &RunnerContext) -> StepOutput {
            StepOutput::success(Vec::new(), HashMap::new())
        }
        async fn execute_destroy(&self, _ctx: &RunnerContext) -> StepOutput {
            StepOutput::success(Vec::new(), HashMap::new())
        }
        async fn execute_tests(&self, _ctx: &RunnerContext) -> StepTestOutput {
            StepTestOutput::empty()
        }
    }

    struct StubRegistry;

    impl RunnerRegistry for StubRegistry {
        fn select(&self, _step: &Step, _filesystem: &dyn Filesystem) -> Arc<dyn track_sdk::Runner> {
            Arc::new(DummyRunner)
        }
    }

    #[derive(Default)]
    struct FakeFilesystem {
        dirs: RefCell<HashMap<PathBuf, Vec<DirEntryInfo>>>,
        files: RefCell<HashSet<PathBuf>>,
    }

    impl FakeFilesystem {
        fn new() -> Self {
            Self::default()
        }

        fn add_dir(&self, parent: &Path, name: &str) -> PathBuf {
            let path = parent.join(name);
            self.dirs
                .borrow_mut()
                .entry(parent.to_path_buf())
                .or_default()
                .push(DirEntryInfo { name: name.to_string(), is_dir: true });
            self.dirs.borrow_mut().entry(path.clone()).or_default();
            path
        }

        fn add_file(&self, parent: &Path, name: &str) {
            self.dirs
                .borrow_mut()
                .entry(parent.to_path_buf())
                .or_default()
                .push(DirEntryInfo { name: name.to_string(), is_dir: false });
            self.files.borrow_mut().insert(parent.join(name));
        }

        /// Mark a nested relative path (e.g. `tests/tests.test`) as existing
        /// under `dir`, without needing it to appear in a directory listing.
        fn touch(&self, dir: &Path, relative: &str) {
            self.files.borrow_mut().insert(dir.join(relative));
            // Also register the `regional` segment as a directory if needed
            // so `is_dir` probes for it succeed.
            if let Some(parent) = Path::new(relative).parent() {
                if parent.as_os_str() != "" {
                    self.dirs
                        .borrow_mut()
                        .entry(dir.join(parent))
                        .or_default();
                }
            }
        }

        fn mark_dir(&self, path: &Path) {
            self.dirs.borrow_mut().entry(path.to_path_buf()).or_default();
        }

        /// Register `path` as a directory and wire it into its parent's
        /// listing, walking up to the root — mimicking `create_dir_all`'s
        /// effect on what a real filesystem's `read_dir` would show.
        fn ensure_dir_entry(&self, path: &Path) {
            self.dirs.borrow_mut().entry(path.to_path_buf()).or_default();
            if let Some(parent) = path.parent() {
                if parent.as_os_str() != "" {
                    let name = path.file_name().unwrap().to_string_lossy().to_string();
                    let already_listed = self
                        .dirs
                        .borrow()
                        .get(parent)
                        .map(|entries| entries.iter().any(|e| e.name == name))
                        .unwrap_or(false);
                    if !already_listed {
                        self.dirs
                            .borrow_mut()
                            .entry(parent.to_path_buf())
                            .or_default()
                            .push(DirEntryInfo { name, is_dir: true });
                    }
                    self.ensure_dir_entry(parent);
                }
            }
        }

        fn copy_recursive(&self, src: &Path, dst: &Path) {
            let entries = self.dirs.borrow().get(src).cloned().unwrap_or_default();
            self.dirs.borrow_mut().entry(dst.to_path_buf()).or_default();
            for entry in entries {
                self.dirs
                    .borrow_mut()
                    .entry(dst.to_path_buf())
                    .or_default()
                    .push(entry.clone());
                let s = src.join(&entry.name);
                let d = dst.join(&entry.name);
                if entry.is_dir {
                    self.copy_recursive(&s, &d);
                } else {
                    self.files.borrow_mut().insert(d);
                }
            }
        }
    }

    impl Filesystem for FakeFilesystem {
        fn list_dir(&self, path: &Path) -> Vec<DirEntryInfo> {
            self.dirs.borrow().get(path).cloned().unwrap_or_default()
        }

        fn exists(&self, path: &Path) -> bool {
            self.dirs.borrow().contains_key(path) || self.files.borrow().contains(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            self.dirs.borrow().contains_key(path)
        }

        fn files_with_extension(&self, dir: &Path, extension: &str) -> Vec<PathBuf> {
            self.dirs
                .borrow()
                .get(dir)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|e| !e.is_dir && e.name.ends_with(extension))
                .map(|e| dir.join(e.name))
                .collect()
        }

        fn copy_tree(&self, src: &Path, dst: &Path) -> std::io::Result<()> {
            self.ensure_dir_entry(dst);
            self.copy_recursive(src, dst);
            Ok(())
        }
    }

    fn config(root: PathBuf) -> Configuration {
        Configuration {
            project: "proj".into(),
            primary_region: "r1".into(),
            regional_regions: vec![],
            step_whitelist: Default::default(),
            target_all: false,
            self_destroy: false,
            dry_run: false,
            root,
        }
    }

    #[test]
    fn discovers_explicit_track_with_tests_and_regional_markers() {
        let root = PathBuf::from("/repo");
        let fs = FakeFilesystem::new();
        fs.mark_dir(&root);
        let tracks_dir = fs.add_dir(&root, "tracks");
        let track_dir = fs.add_dir(&tracks_dir, "foo");
        let step_dir = fs.add_dir(&track_dir, "step1_a");
        fs.touch(&step_dir, "tests/tests.test");
        fs.mark_dir(&step_dir.join("regional"));
        fs.touch(&step_dir, "regional/tests/tests.test");
        // register the regional dir as a child entry too, for is_dir probing
        fs.dirs
            .borrow_mut()
            .entry(step_dir.clone())
            .or_default()
            .push(DirEntryInfo { name: "regional".into(), is_dir: true });

        let plan = discover(&config(root), &fs, &StubRegistry).unwrap();
        assert_eq!(plan.tracks.len(), 1);
        let track = &plan.tracks[0];
        assert_eq!(track.name, "foo");
        assert_eq!(track.step_count(), 1);
        let step = track.all_steps().next().unwrap();
        assert_eq!(step.name, "a");
        assert_eq!(step.progression, 1);
        assert!(step.tests_exist);
        assert!(step.regional_resources_exist);
        assert!(step.regional_tests_exist);
        assert_eq!(step.id.as_str(), "#proj#foo#a");
    }

    #[test]
    fn synthesizes_default_track_from_root_iac_files() {
        let root = PathBuf::from("/repo");
        let fs = FakeFilesystem::new();
        fs.mark_dir(&root);
        fs.add_file(&root, "main.tf");
        let step_dir = fs.add_dir(&root, "step1_a");
        let _ = step_dir;
        fs.mark_dir(&root.join("tracks"));

        let plan = discover(&config(root), &fs, &StubRegistry).unwrap();
        assert_eq!(plan.tracks.len(), 1);
        assert!(plan.tracks[0].is_default());
        assert_eq!(plan.tracks[0].step_count(), 1);
    }

    #[test]
    fn skips_step_with_non_numeric_progression_digit() {
        let root = PathBuf::from("/repo");
        let fs = FakeFilesystem::new();
        fs.mark_dir(&root);
        let tracks_dir = fs.add_dir(&root, "tracks");
        let track_dir = fs.add_dir(&tracks_dir, "foo");
        fs.add_dir(&track_dir, "stepX_a");

        let plan = discover(&config(root), &fs, &StubRegistry).unwrap();
        assert!(plan.tracks.is_empty());
    }

    #[test]
    fn whitelist_filters_steps() {
        let root = PathBuf::from("/repo");
        let fs = FakeFilesystem::new();
        fs.mark_dir(&root);
        let tracks_dir = fs.add_dir(&root, "tracks");
        let track_dir = fs.add_dir(&tracks_dir, "foo");
        fs.add_dir(&track_dir, "step1_a");
        fs.add_dir(&track_dir, "step1_b");

        let mut cfg = config(root);
        cfg.step_whitelist.insert("#proj#foo#a".to_string());

        let plan = discover(&cfg, &fs, &StubRegistry).unwrap();
        let track = &plan.tracks[0];
        assert_eq!(track.step_count(), 1);
        assert_eq!(track.all_steps().next().unwrap().name, "a");
    }

    #[test]
    fn track_with_zero_matching_steps_is_dropped() {
        let root = PathBuf::from("/repo");
        let fs = FakeFilesystem::new();
        fs.mark_dir(&root);
        let tracks_dir = fs.add_dir(&root, "tracks");
        fs.add_dir(&tracks_dir, "empty");

        let plan = discover(&config(root), &fs, &StubRegistry).unwrap();
        assert!(plan.tracks.is_empty());
    }

    #[test]
    fn unreadable_root_is_a_hard_failure() {
        let root = PathBuf::from("/does/not/exist");
        let fs = FakeFilesystem::new();
        let err = discover(&config(root), &fs, &StubRegistry).unwrap_err();
        assert!(matches!(err, EngineError::Discovery(_)));
    }

    #[test]
    fn default_and_explicit_tracks_coexist() {
        let root = PathBuf::from("/repo");
        let fs = FakeFilesystem::new();
        fs.mark_dir(&root);
        fs.add_file(&root, "main.tf");
        fs.add_dir(&root, "step1_a");
        let tracks_dir = fs.add_dir(&root, "tracks");
        let track_dir = fs.add_dir(&tracks_dir, "foo");
        fs.add_dir(&track_dir, "step1_b");

        let plan = discover(&config(root), &fs, &StubRegistry).unwrap();
        assert_eq!(plan.tracks.len(), 2);
        assert!(plan.tracks.iter().any(|t| t.is_default()));
        assert!(plan.tracks.iter().any(|t| t.name == "foo"));
    }
}
