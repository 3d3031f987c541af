// End-to-end scenarios S1-S6 and a handful of the property tests from
// spec.md §8, exercised against scripted Runner test doubles.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use track_common::Configuration;
use track_engine::execution::StepOutputVariables;
use track_engine::{plan::{Progression, Track}, region_executor, stage_orchestrator, track_executor, InMemoryStatusSink};
use track_sdk::{
    DeployType, DirEntryInfo, Filesystem, Runner, RunnerContext, RunnerRegistry, Status, Step,
    StepId, StepOutput, StepTestOutput,
};

/// A Runner whose deploy/destroy/test outputs are fixed ahead of time.
struct FixedRunner {
    execute_output: StepOutput,
    destroy_output: StepOutput,
    test_output: StepTestOutput,
}

impl FixedRunner {
    fn success(vars: HashMap<String, String>) -> Arc<dyn Runner> {
        Arc::new(FixedRunner {
            execute_output: StepOutput::success(vec![], vars),
            destroy_output: StepOutput::success(vec![], HashMap::new()),
            test_output: StepTestOutput::empty(),
        })
    }

    fn failure(error: &str) -> Arc<dyn Runner> {
        Arc::new(FixedRunner {
            execute_output: StepOutput::fail(error, vec![]),
            destroy_output: StepOutput::success(vec![], HashMap::new()),
            test_output: StepTestOutput::empty(),
        })
    }

    fn with_test(execute_output: StepOutput, test_output: StepTestOutput) -> Arc<dyn Runner> {
        Arc::new(FixedRunner {
            execute_output,
            destroy_output: StepOutput::success(vec![], HashMap::new()),
            test_output,
        })
    }
}

#[async_trait]
impl Runner for FixedRunner {
    async fn execute(&self, _ctx: &RunnerContext) -> StepOutput {
        self.execute_output.clone()
    }
    async fn execute_destroy(&self, _ctx: &RunnerContext) -> StepOutput {
        self.destroy_output.clone()
    }
    async fn execute_tests(&self, _ctx: &RunnerContext) -> StepTestOutput {
        self.test_output.clone()
    }
}

fn step(
    name: &str,
    track_name: &str,
    progression: u8,
    regional_resources_exist: bool,
    tests_exist: bool,
    regional_tests_exist: bool,
    runner: Arc<dyn Runner>,
) -> Step {
    Step {
        name: name.to_string(),
        track_name: track_name.to_string(),
        directory: PathBuf::new(),
        progression,
        id: StepId::new("proj", track_name, name),
        tests_exist,
        regional_resources_exist,
        regional_tests_exist,
        runner: Some(runner),
    }
}

fn track(name: &str, progressions: Vec<(u8, Vec<Step>)>) -> Track {
    Track {
        name: name.to_string(),
        directory: PathBuf::new(),
        progressions: progressions
            .into_iter()
            .map(|(level, steps)| Progression { level, steps })
            .collect(),
    }
}

fn config(primary_region: &str, regional_regions: Vec<&str>) -> Configuration {
    Configuration {
        project: "proj".into(),
        primary_region: primary_region.into(),
        regional_regions: regional_regions.into_iter().map(String::from).collect(),
        step_whitelist: HashSet::new(),
        target_all: false,
        self_destroy: false,
        dry_run: false,
        root: PathBuf::new(),
    }
}

struct NoopFilesystem;
impl Filesystem for NoopFilesystem {
    fn list_dir(&self, _path: &Path) -> Vec<DirEntryInfo> {
        Vec::new()
    }
    fn exists(&self, _path: &Path) -> bool {
        false
    }
    fn is_dir(&self, _path: &Path) -> bool {
        false
    }
    fn files_with_extension(&self, _dir: &Path, _extension: &str) -> Vec<PathBuf> {
        Vec::new()
    }
    fn copy_tree(&self, _src: &Path, _dst: &Path) -> std::io::Result<()> {
        Ok(())
    }
}

fn filesystem() -> Arc<dyn Filesystem> {
    Arc::new(NoopFilesystem)
}

#[tokio::test]
async fn s1_happy_path_single_region() {
    let t = track(
        "foo",
        vec![
            (1, vec![step("a", "foo", 1, false, false, false, FixedRunner::success(HashMap::new()))]),
            (2, vec![step("b", "foo", 2, false, false, false, FixedRunner::success(HashMap::new()))]),
        ],
    );
    let cfg = config("r1", vec![]);
    let sink = Arc::new(InMemoryStatusSink::new());

    let output = track_executor::run_deploy(&t, &cfg, None, sink, filesystem()).await;

    assert_eq!(output.regions.len(), 1);
    let primary = output.primary().unwrap();
    assert_eq!(primary.output.executed, 2);
    assert_eq!(primary.output.failure_count, 0);
    for executed in primary.output.steps.values() {
        assert_eq!(executed.output.status, Status::Success);
    }
}

#[tokio::test]
async fn s2_progression_gating_on_failure() {
    let t = track(
        "foo",
        vec![
            (1, vec![step("a", "foo", 1, false, false, false, FixedRunner::failure("boom"))]),
            (2, vec![step("b", "foo", 2, false, false, false, FixedRunner::success(HashMap::new()))]),
        ],
    );
    let cfg = config("r1", vec![]);
    let sink = Arc::new(InMemoryStatusSink::new());

    let output = track_executor::run_deploy(&t, &cfg, None, sink, filesystem()).await;
    let primary = output.primary().unwrap();

    assert_eq!(primary.output.steps["a"].output.status, Status::Fail);
    assert_eq!(primary.output.steps["b"].output.status, Status::Skipped);
    assert_eq!(primary.output.failure_count, 1);
    assert_eq!(primary.output.executed, 1);
    assert_eq!(primary.output.skipped, 1);
}

#[tokio::test]
async fn s3_primary_to_regional_propagation() {
    let mut primary_vars = HashMap::new();
    primary_vars.insert("k".to_string(), "v".to_string());

    let t = track(
        "foo",
        vec![(1, vec![step("a", "foo", 1, true, false, false, FixedRunner::success(primary_vars))])],
    );
    let cfg = config("r1", vec!["r2", "r3"]);
    let sink = Arc::new(InMemoryStatusSink::new());

    let output = track_executor::run_deploy(&t, &cfg, None, sink, filesystem()).await;

    assert_eq!(output.regions.len(), 3);
    let regionals: Vec<_> = output.regional().collect();
    assert_eq!(regionals.len(), 2);
    for regional in &regionals {
        let seeded = regional.output.step_output_variables.get("a").unwrap();
        assert_eq!(seeded.get("k"), Some(&"v".to_string()));
    }
}

#[tokio::test]
async fn mutation_isolation_regional_vs_primary_outer_map() {
    let mut primary_vars = HashMap::new();
    primary_vars.insert("k".to_string(), "v".to_string());

    let t = track(
        "foo",
        vec![(1, vec![step("a", "foo", 1, true, false, false, FixedRunner::success(primary_vars))])],
    );
    let cfg = config("r1", vec!["r2"]);
    let sink = Arc::new(InMemoryStatusSink::new());

    let mut output = track_executor::run_deploy(&t, &cfg, None, sink, filesystem()).await;
    let primary_snapshot = output.primary().unwrap().output.step_output_variables.clone();

    let regional = output.regions.iter_mut().find(|r| r.deploy_type == DeployType::Regional).unwrap();
    regional
        .output
        .step_output_variables
        .insert("new-key".to_string(), HashMap::new());

    assert!(!primary_snapshot.contains_key("new-key"));
}

#[tokio::test]
async fn s4_regional_short_circuit_on_primary_failure() {
    let t = track(
        "foo",
        vec![(1, vec![step("a", "foo", 1, true, false, false, FixedRunner::failure("boom"))])],
    );
    let cfg = config("r1", vec!["r2", "r3"]);
    let sink = Arc::new(InMemoryStatusSink::new());

    let output = track_executor::run_deploy(&t, &cfg, None, sink, filesystem()).await;

    let regionals: Vec<_> = output.regional().collect();
    assert_eq!(regionals.len(), 2);
    for regional in &regionals {
        let a = &regional.output.steps["a"];
        assert_eq!(a.output.status, Status::Skipped);
        assert_eq!(regional.output.failure_count, 0);
        assert_eq!(regional.output.executed, 0);
    }
}

struct PretrackRegistry;
impl RunnerRegistry for PretrackRegistry {
    fn select(&self, _step: &Step, _filesystem: &dyn Filesystem) -> Arc<dyn Runner> {
        FixedRunner::success(HashMap::new())
    }
}

struct FakeFilesystem {
    dirs: HashMap<PathBuf, Vec<DirEntryInfo>>,
}

impl Filesystem for FakeFilesystem {
    fn list_dir(&self, path: &Path) -> Vec<DirEntryInfo> {
        self.dirs.get(path).cloned().unwrap_or_default()
    }
    fn exists(&self, path: &Path) -> bool {
        self.dirs.contains_key(path)
    }
    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains_key(path)
    }
    fn files_with_extension(&self, _dir: &Path, _extension: &str) -> Vec<PathBuf> {
        Vec::new()
    }
    fn copy_tree(&self, _src: &Path, _dst: &Path) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn s5_pretrack_gate_skips_every_other_track() {
    let root = PathBuf::from("/repo");
    let tracks_dir = root.join("tracks");
    let pretrack_dir = tracks_dir.join("_pretrack");
    let pretrack_step_dir = pretrack_dir.join("step1_x");
    let foo_dir = tracks_dir.join("foo");
    let foo_step_dir = foo_dir.join("step1_a");

    let mut dirs = HashMap::new();
    dirs.insert(root.clone(), vec![DirEntryInfo { name: "tracks".into(), is_dir: true }]);
    dirs.insert(
        tracks_dir.clone(),
        vec![
            DirEntryInfo { name: "_pretrack".into(), is_dir: true },
            DirEntryInfo { name: "foo".into(), is_dir: true },
        ],
    );
    dirs.insert(pretrack_dir.clone(), vec![DirEntryInfo { name: "step1_x".into(), is_dir: true }]);
    dirs.insert(pretrack_step_dir, vec![]);
    dirs.insert(foo_dir.clone(), vec![DirEntryInfo { name: "step1_a".into(), is_dir: true }]);
    dirs.insert(foo_step_dir, vec![]);
    let fs: Arc<dyn Filesystem> = Arc::new(FakeFilesystem { dirs });

    // The registry hands back whatever runner Discovery's Step carries - but
    // Discovery builds Steps with `runner: None` until the registry assigns
    // one, so this registry must decide purely from the step's identity.
    struct ByNameRegistry;
    impl RunnerRegistry for ByNameRegistry {
        fn select(&self, step: &Step, _filesystem: &dyn Filesystem) -> Arc<dyn Runner> {
            if step.name == "x" {
                FixedRunner::failure("pretrack step failed")
            } else {
                FixedRunner::success(HashMap::new())
            }
        }
    }

    let mut cfg = config("r1", vec![]);
    cfg.root = root;
    let sink = Arc::new(InMemoryStatusSink::new());

    let stage = stage_orchestrator::run_stage(&cfg, fs, &ByNameRegistry, sink)
        .await
        .unwrap();

    assert_eq!(stage.track_outputs.len(), 1);
    assert!(stage.track_outputs[0].skipped);
    assert!(stage.track_outputs[0].regions.is_empty());
    assert!(stage.pretrack_output.unwrap().has_failure());
}

#[tokio::test]
async fn s6_test_interleaving_reports_independent_counters() {
    let deploy_output = StepOutput::success(vec![], HashMap::new());
    let test_output = StepTestOutput::fail("assertion failed", vec![]);
    let a = step(
        "a",
        "foo",
        1,
        false,
        true,
        false,
        FixedRunner::with_test(deploy_output, test_output),
    );
    let b = step("b", "foo", 2, false, false, false, FixedRunner::success(HashMap::new()));
    let t = track("foo", vec![(1, vec![a]), (2, vec![b])]);
    let cfg = config("r1", vec![]);
    let sink = Arc::new(InMemoryStatusSink::new());

    let output = track_executor::run_deploy(&t, &cfg, None, sink, filesystem()).await;
    let primary = output.primary().unwrap();

    assert_eq!(primary.output.steps["a"].output.status, Status::Success);
    assert_eq!(primary.output.steps["b"].output.status, Status::Success);
    assert_eq!(primary.output.failed_test_count, 1);
    assert_eq!(primary.output.failure_count, 0);
    assert!(primary.output.steps["a"].test_output.is_some());
}

#[tokio::test]
async fn invariant_destroy_completions_appear_in_decreasing_progression_order() {
    let t = track(
        "foo",
        vec![
            (1, vec![step("a", "foo", 1, false, false, false, FixedRunner::success(HashMap::new()))]),
            (2, vec![step("b", "foo", 2, false, false, false, FixedRunner::success(HashMap::new()))]),
            (3, vec![step("c", "foo", 3, false, false, false, FixedRunner::success(HashMap::new()))]),
        ],
    );
    let sink: Arc<dyn track_engine::StatusSink> = Arc::new(InMemoryStatusSink::new());

    let destroyed = region_executor::run_destroy(
        &t,
        "r1".to_string(),
        DeployType::Primary,
        StepOutputVariables::new(),
        false,
        sink,
        filesystem(),
    )
    .await;

    assert_eq!(destroyed.output.executed, 3);
    assert_eq!(destroyed.output.failure_count, 0);
}

#[tokio::test]
async fn invariant_whitelist_excludes_steps_from_the_plan() {
    use std::path::Path as StdPath;

    struct RootOnlyFilesystem {
        root: PathBuf,
        tracks_dir: PathBuf,
        track_dir: PathBuf,
    }
    impl Filesystem for RootOnlyFilesystem {
        fn list_dir(&self, path: &StdPath) -> Vec<DirEntryInfo> {
            if path == self.root {
                vec![DirEntryInfo { name: "tracks".into(), is_dir: true }]
            } else if path == self.tracks_dir {
                vec![DirEntryInfo { name: "foo".into(), is_dir: true }]
            } else if path == self.track_dir {
                vec![
                    DirEntryInfo { name: "step1_a".into(), is_dir: true },
                    DirEntryInfo { name: "step1_b".into(), is_dir: true },
                ]
            } else {
                Vec::new()
            }
        }
        fn exists(&self, _path: &StdPath) -> bool {
            false
        }
        fn is_dir(&self, path: &StdPath) -> bool {
            path == self.root || path == self.tracks_dir || path == self.track_dir
        }
        fn files_with_extension(&self, _dir: &StdPath, _extension: &str) -> Vec<PathBuf> {
            Vec::new()
        }
        fn copy_tree(&self, _src: &StdPath, _dst: &StdPath) -> std::io::Result<()> {
            Ok(())
        }
    }

    let root = PathBuf::from("/repo");
    let tracks_dir = root.join("tracks");
    let track_dir = tracks_dir.join("foo");
    let fs = RootOnlyFilesystem { root: root.clone(), tracks_dir, track_dir };

    let mut cfg = config("r1", vec![]);
    cfg.root = root;
    cfg.step_whitelist.insert("#proj#foo#a".to_string());

    let plan = track_engine::discovery::discover(&cfg, &fs, &PretrackRegistry).unwrap();
    let track = plan.tracks.iter().find(|t| t.name == "foo").unwrap();
    assert_eq!(track.step_count(), 1);
    assert_eq!(track.all_steps().next().unwrap().name, "a");
}
