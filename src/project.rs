//! Project directory layout.
//!
//! Everything cdep writes lives under `<root>/.cdep`:
//!
//! ```text
//! .cdep/
//! ├── src/<name>/                  fetched + patched source
//! ├── build/<key>/<name>/          per dependency, per build configuration
//! ├── install/<key>/               shared install prefix per build configuration
//! └── locks/<name>.lock            per dependency lease
//! ```

use crate::target::Build;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "cdep.toml";
pub const LOCK_FILE: &str = "cdep.lock";
pub const STATE_DIR: &str = ".cdep";

/// Resolves where a dependency's source, build tree and install prefix live.
pub trait ProjectLayout {
    fn dir_for_dependency(&self, name: &str) -> PathBuf;

    /// Scoped per dependency and per build configuration.
    fn dir_for_dependency_build(&self, name: &str, build: &Build) -> PathBuf;

    /// Scoped per build configuration and shared by every dependency.
    fn dir_for_dependency_install(&self, build: &Build) -> PathBuf;

    /// Directory for per-dependency lease files, or `None` to run unlocked.
    fn lease_dir(&self) -> Option<PathBuf> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walk up from the current directory to the nearest `cdep.toml`.
    pub fn discover() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        Self::discover_from(&cwd)
    }

    pub fn discover_from(start: &Path) -> Result<Self> {
        start
            .ancestors()
            .find(|dir| dir.join(MANIFEST_FILE).is_file())
            .map(Self::new)
            .with_context(|| {
                format!(
                    "{} not found in {} or any parent directory.\n\n\
                    💡 Tip: create one with a [package] table and [dependencies.<name>] entries.",
                    MANIFEST_FILE,
                    start.display()
                )
            })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.state_dir().join("src")
    }

    /// All build trees for one configuration.
    pub fn builds_dir(&self, build: &Build) -> PathBuf {
        self.state_dir().join("build").join(build.key())
    }

    /// Resolve a manifest-relative path (e.g. a patch file) against the root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl ProjectLayout for Project {
    fn dir_for_dependency(&self, name: &str) -> PathBuf {
        self.sources_dir().join(name)
    }

    fn dir_for_dependency_build(&self, name: &str, build: &Build) -> PathBuf {
        self.builds_dir(build).join(name)
    }

    fn dir_for_dependency_install(&self, build: &Build) -> PathBuf {
        self.state_dir().join("install").join(build.key())
    }

    fn lease_dir(&self) -> Option<PathBuf> {
        Some(self.state_dir().join("locks"))
    }
}
