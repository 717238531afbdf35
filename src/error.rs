//! Failure taxonomy of the dependency pipeline.
//!
//! Repository and backend implementations return `anyhow::Error` rooted in a
//! [`DepError`]; callers recover the stage with `err.downcast_ref::<DepError>()`.

use std::fmt;
use std::path::PathBuf;

/// One step of the build backend pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Configure,
    Build,
    Install,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Configure => f.write_str("configure"),
            Step::Build => f.write_str("build"),
            Step::Install => f.write_str("install"),
        }
    }
}

/// Error type for dependency operations
#[derive(Debug)]
pub enum DepError {
    /// Clone or update of the source repository failed
    Fetch { name: String, message: String },
    /// A patch could not be applied
    Patch { patch: PathBuf, message: String },
    /// A build backend step exited non-zero or could not be spawned
    Backend { step: Step, message: String },
    /// Two dependencies in one build share a name
    DuplicateName(String),
}

impl fmt::Display for DepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepError::Fetch { name, message } => {
                write!(f, "Failed to fetch '{}': {}", name, message)
            }
            DepError::Patch { patch, message } => {
                write!(f, "Failed to apply patch {}: {}", patch.display(), message)
            }
            DepError::Backend { step, message } => {
                write!(f, "CMake {} step failed: {}", step, message)
            }
            DepError::DuplicateName(name) => write!(
                f,
                "Dependency '{}' is declared more than once in this build",
                name
            ),
        }
    }
}

impl std::error::Error for DepError {}
