// Filesystem abstraction used by Discovery and the Runner Registry.
//
// The engine never touches the real filesystem directly outside of this
// trait's default implementation, so Discovery can be exercised against an
// in-memory fake in tests (see `track-engine`'s discovery tests).

use std::path::{Path, PathBuf};

/// A directory entry as seen by the engine: just a name and whether it's a
/// directory. Mirrors the subset of `std::fs::DirEntry` Discovery needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_dir: bool,
}

/// Filesystem probing abstraction.
pub trait Filesystem: Send + Sync {
    /// List the immediate children of `path`. Returns an empty vec if `path`
    /// does not exist or is not a directory.
    fn list_dir(&self, path: &Path) -> Vec<DirEntryInfo>;

    /// Whether `path` exists (file or directory).
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Find files directly under `dir` matching a glob-style suffix, e.g. `".tf"`.
    /// Non-recursive; used for the root `*.tf` probe and the regional resources probe.
    fn files_with_extension(&self, dir: &Path, extension: &str) -> Vec<PathBuf>;

    /// Copy a directory tree from `src` to `dst`, creating `dst` if needed.
    /// Used by Discovery to synthesize `tracks/default/` from root-level steps.
    fn copy_tree(&self, src: &Path, dst: &Path) -> std::io::Result<()>;
}

/// Real-disk implementation backed by `std::fs` and `walkdir`.
#[derive(Debug, Clone, Default)]
pub struct RealFilesystem;

impl Filesystem for RealFilesystem {
    fn list_dir(&self, path: &Path) -> Vec<DirEntryInfo> {
        let Ok(entries) = std::fs::read_dir(path) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                let is_dir = e.file_type().ok()?.is_dir();
                Some(DirEntryInfo { name, is_dir })
            })
            .collect()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn files_with_extension(&self, dir: &Path, extension: &str) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.extension()
                    .map(|ext| format!(".{}", ext.to_string_lossy()) == extension)
                    .unwrap_or(false)
            })
            .collect()
    }

    fn copy_tree(&self, src: &Path, dst: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dst)?;
        for entry in walkdir::WalkDir::new(src).min_depth(1) {
            let entry = entry.map_err(std::io::Error::other)?;
            let rel = entry.path().strip_prefix(src).map_err(std::io::Error::other)?;
            let target = dst.join(rel);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(entry.path(), &target)?;
            }
        }
        Ok(())
    }
}
