//! Version-control fetch and patch primitives.

mod git;

pub use git::{GitRepository, GitSource, head_rev};

use anyhow::Result;
use std::path::Path;

/// Source of a dependency.
///
/// Failures are reported as errors rooted in [`crate::DepError::Fetch`] or
/// [`crate::DepError::Patch`].
pub trait Repository {
    /// Clone into `destination` if it is absent, otherwise update it in place.
    fn download(&self, destination: &Path) -> Result<()>;

    /// Apply `patch_file` to the working tree at `directory`.
    ///
    /// Does nothing when either path is missing.
    fn patch(&self, directory: &Path, patch_file: &Path) -> Result<()>;
}
