// Plan/Track/Progression data model, mapping spec.md §3 exactly.
//
// The Plan is produced once by Discovery and is read-only thereafter (§3
// "Lifecycles"). It is intentionally dumb data: all orchestration logic
// lives in `region_executor`/`track_executor`/`stage_orchestrator`.

use std::path::PathBuf;
use track_sdk::Step;

/// All Steps at one progression level within a Track. Unordered among
/// themselves (§3: "Inside one Progression, Steps execute concurrently and
/// their relative order is unobservable").
#[derive(Debug, Clone)]
pub struct Progression {
    pub level: u8,
    pub steps: Vec<Step>,
}

/// A named deployment unit: an ordered sequence of Progressions.
#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub directory: PathBuf,
    /// Ordered by `level`, 1..K, with no gaps guaranteed (a level with zero
    /// matching steps on disk simply does not appear).
    pub progressions: Vec<Progression>,
}

impl Track {
    pub const PRETRACK_NAME: &'static str = track_common::constants::PRETRACK_NAME;
    pub const DEFAULT_NAME: &'static str = track_common::constants::DEFAULT_TRACK_NAME;

    pub fn is_pretrack(&self) -> bool {
        self.name == Self::PRETRACK_NAME
    }

    pub fn is_default(&self) -> bool {
        self.name == Self::DEFAULT_NAME
    }

    /// Maximum progression level observed (`StepProgressionsCount`, §4.1 step 4).
    pub fn progressions_count(&self) -> u8 {
        self.progressions.iter().map(|p| p.level).max().unwrap_or(0)
    }

    /// Total number of Steps across all progressions.
    pub fn step_count(&self) -> usize {
        self.progressions.iter().map(|p| p.steps.len()).sum()
    }

    /// Whether any Step in this track declares regional resources.
    pub fn has_regional_resources(&self) -> bool {
        self.all_steps().any(|s| s.regional_resources_exist)
    }

    /// Number of Steps with a primary test suite (`TrackStepsWithTestsCount`, §4.3).
    pub fn primary_tests_count(&self) -> usize {
        self.all_steps().filter(|s| s.tests_exist).count()
    }

    /// Number of Steps with a regional test suite (the regional-tests subcount, §4.3).
    pub fn regional_tests_count(&self) -> usize {
        self.all_steps().filter(|s| s.regional_tests_exist).count()
    }

    pub fn all_steps(&self) -> impl Iterator<Item = &Step> {
        self.progressions.iter().flat_map(|p| p.steps.iter())
    }

    /// Progressions in ascending order (1..K) — the deploy-direction order.
    pub fn progressions_ascending(&self) -> impl Iterator<Item = &Progression> {
        self.progressions.iter()
    }

    /// Progressions in descending order (K..1) — the destroy-direction order
    /// (§4.4: "Progressions iterate high to low").
    pub fn progressions_descending(&self) -> impl DoubleEndedIterator<Item = &Progression> {
        self.progressions.iter().rev()
    }
}

/// The immutable product of Discovery: an ordered sequence of Tracks.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub tracks: Vec<Track>,
}

impl Plan {
    pub fn pre_track(&self) -> Option<&Track> {
        self.tracks.iter().find(|t| t.is_pretrack())
    }

    /// All tracks other than the pre-track, in discovery order.
    pub fn parallel_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| !t.is_pretrack())
    }
}
