//! Per-dependency exclusive lease.
//!
//! The "directory exists" check in download is not atomic with the clone that
//! follows it. Holding `<locks>/<name>.lock` for the whole orchestration makes
//! a second process wait instead of cloning into the same directory.

use crate::config::validate_dependency_name;
use anyhow::{Context, Result};
use colored::*;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Lease {
    file: File,
    path: PathBuf,
}

impl Lease {
    /// Block until the lease for `name` is held.
    pub fn acquire(dir: &Path, name: &str) -> Result<Self> {
        validate_dependency_name(name)?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create lock directory {}", dir.display()))?;
        let path = dir.join(format!("{}.lock", name));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                println!(
                    "   {} Waiting for another cdep process working on {}...",
                    "⏳".yellow(),
                    name
                );
                file.lock_exclusive()
                    .with_context(|| format!("Failed to lock {}", path.display()))?;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to lock {}", path.display()));
            }
        }

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
