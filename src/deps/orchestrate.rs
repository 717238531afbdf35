//! Drive a dependency from "unfetched" to "installed".
//!
//! ```text
//! NotStarted -> Downloading -> Downloaded -> Building -> Ready
//!                   |                           |
//!                   +----------> Failed <-------+
//! ```
//!
//! `Failed` is terminal for the run. Recovery means removing the partial
//! source directory (`cdep clean <name>`) and running again.

use super::Dependency;
use crate::error::DepError;
use crate::lease::Lease;
use crate::project::ProjectLayout;
use crate::target::Build;
use anyhow::Result;
use colored::*;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NotStarted,
    Downloading,
    Downloaded,
    Building,
    Ready,
    Failed,
}

/// Receives stage transitions as they happen.
pub trait Reporter {
    fn stage(&self, name: &str, stage: Stage);
}

/// Prints `Downloading` / `Building` / `Ready` / `Failed` lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn stage(&self, name: &str, stage: Stage) {
        match stage {
            Stage::Downloading => println!("{} Downloading {}", "📦".blue(), name.bold()),
            Stage::Building => println!("{} Building {}", "🔨".yellow(), name.bold()),
            Stage::Ready => println!("{} Ready {}", "✓".green(), name.bold()),
            Stage::Failed => eprintln!("{} Failed {}", "x".red(), name.bold()),
            Stage::NotStarted | Stage::Downloaded => {}
        }
    }
}

pub fn get_dependency(
    project: &dyn ProjectLayout,
    build: &Build,
    dependency: &dyn Dependency,
) -> Result<()> {
    get_dependency_with(project, build, dependency, &ConsoleReporter)
}

/// Download, then build and install. Stops at the first failure and returns
/// it unchanged; nothing is retried or cleaned up.
pub fn get_dependency_with(
    project: &dyn ProjectLayout,
    build: &Build,
    dependency: &dyn Dependency,
    reporter: &dyn Reporter,
) -> Result<()> {
    let name = dependency.name();
    let _lease = match project.lease_dir() {
        Some(dir) => Some(Lease::acquire(&dir, name)?),
        None => None,
    };

    reporter.stage(name, Stage::Downloading);
    if let Err(err) = dependency.download(project, build) {
        reporter.stage(name, Stage::Failed);
        return Err(err);
    }
    reporter.stage(name, Stage::Downloaded);

    reporter.stage(name, Stage::Building);
    if let Err(err) = dependency.build_install(project, build) {
        reporter.stage(name, Stage::Failed);
        return Err(err);
    }
    reporter.stage(name, Stage::Ready);
    Ok(())
}

/// Fail with [`DepError::DuplicateName`] if two dependencies share a name.
pub fn ensure_unique_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(DepError::DuplicateName(name.to_string()).into());
        }
    }
    Ok(())
}

/// Run [`get_dependency_with`] for each dependency, one after another, in the
/// given order.
///
/// Names are checked for uniqueness before any work starts. Running serially
/// also keeps installs into the shared prefix from overlapping.
pub fn get_dependencies(
    project: &dyn ProjectLayout,
    build: &Build,
    dependencies: &[Box<dyn Dependency>],
    reporter: &dyn Reporter,
) -> Result<()> {
    ensure_unique_names(dependencies.iter().map(|d| d.name()))?;
    for dependency in dependencies {
        get_dependency_with(project, build, dependency.as_ref(), reporter)?;
    }
    Ok(())
}
