//! Inspection and cleanup of the project's `.cdep/` directory.
//!
//! ## Commands
//!
//! - `cdep list` - Show every declared dependency and how far it got
//! - `cdep clean <name>` - Remove a dependency's source (and build trees)
//! - `cdep clean --all` - Remove `.cdep/` entirely
//! - `cdep prune` - Remove sources no longer declared in `cdep.toml`

use crate::config::{CdepConfig, DependencyKind, validate_dependency_name};
use crate::project::{Project, ProjectLayout};
use crate::target::Build;
use crate::ui;
use anyhow::{Context, Result, bail};
use colored::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Where a dependency stands on disk for one build configuration.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DependencyStatus {
    pub name: String,
    pub kind: DependencyKind,
    pub patches: usize,
    pub downloaded: bool,
    /// A configure step has completed (`CMakeCache.txt` present).
    pub configured: bool,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub source_bytes: u64,
}

pub fn status(project: &Project, config: &CdepConfig, build: &Build) -> Vec<DependencyStatus> {
    config
        .dependencies
        .iter()
        .map(|(name, dep)| {
            let source_dir = project.dir_for_dependency(name);
            let build_dir = project.dir_for_dependency_build(name, build);
            DependencyStatus {
                name: name.clone(),
                kind: dep.kind(),
                patches: dep.patches().len(),
                downloaded: source_dir.exists(),
                configured: build_dir.join("CMakeCache.txt").exists(),
                source_bytes: dir_size(&source_dir),
                source_dir,
                build_dir,
            }
        })
        .collect()
}

pub fn list(project: &Project, config: &CdepConfig, build: &Build, json: bool) -> Result<()> {
    let statuses = status(project, config, build);

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    if statuses.is_empty() {
        println!("{} No dependencies declared in cdep.toml", "ℹ".blue());
        return Ok(());
    }

    println!(
        "{} {} ({})",
        "📦".blue(),
        config.package.name.bold(),
        build
    );
    let mut table = ui::Table::new(&["Dependency", "Kind", "Patches", "State", "Size"]);
    for s in &statuses {
        let state = match (s.downloaded, s.configured, s.kind) {
            (false, _, _) => "missing".red().to_string(),
            (true, _, DependencyKind::Source) => "ready".green().to_string(),
            (true, true, DependencyKind::Cmake) => "configured".green().to_string(),
            (true, false, DependencyKind::Cmake) => "downloaded".yellow().to_string(),
        };
        let kind = match s.kind {
            DependencyKind::Cmake => "cmake",
            DependencyKind::Source => "source",
        };
        table.add_row(vec![
            s.name.clone(),
            kind.to_string(),
            s.patches.to_string(),
            state,
            human_size(s.source_bytes),
        ]);
    }
    table.print();
    Ok(())
}

/// Remove the source directory of `name`, plus its build trees for every
/// configuration when `builds` is set.
///
/// This is the recovery step after a failed download: the next run sees the
/// directory missing and fetches again.
///
/// `name` must be a plain dependency name; anything that would resolve outside
/// `.cdep/` is refused before touching the filesystem.
pub fn clean_dependency(project: &Project, name: &str, builds: bool) -> Result<()> {
    validate_dependency_name(name)?;
    let sources = project.sources_dir();
    let source_dir = project.dir_for_dependency(name);
    ensure_child_of(&source_dir, &sources)?;
    let mut removed = remove_if_exists(&source_dir)?;

    if builds {
        let build_root = project.state_dir().join("build");
        if let Ok(entries) = fs::read_dir(&build_root) {
            for entry in entries.flatten() {
                let build_dir = entry.path().join(name);
                ensure_child_of(&build_dir, &entry.path())?;
                removed |= remove_if_exists(&build_dir)?;
            }
        }
    }

    if removed {
        println!("{} Removed {}", "✓".green(), name.bold());
    } else {
        println!("{} Nothing to clean for {}", "!".yellow(), name);
    }
    Ok(())
}

pub fn clean_all(project: &Project) -> Result<()> {
    let state_dir = project.state_dir();
    if remove_if_exists(&state_dir)? {
        println!("{} Removed {}", "✓".green(), state_dir.display());
    } else {
        println!("{} Nothing to clean", "!".yellow());
    }
    Ok(())
}

/// Remove source directories that no dependency in `keep` owns.
pub fn prune_unused(project: &Project, keep: &[String]) -> Result<usize> {
    let sources = project.sources_dir();
    if !sources.exists() {
        println!("{} No sources downloaded yet.", "✓".green());
        return Ok(0);
    }

    println!("{} Pruning unused sources...", "🧹".yellow());
    let mut removed_count = 0;
    for entry in fs::read_dir(&sources)?.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if path.is_dir() && !keep.contains(&name) {
            println!("   {} Removing unused: {}", "🗑️".red(), name);
            fs::remove_dir_all(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            removed_count += 1;
        }
    }

    if removed_count == 0 {
        println!("{} All sources are in use.", "✓".green());
    } else {
        println!("{} Removed {} unused sources.", "✓".green(), removed_count);
    }
    Ok(removed_count)
}

fn ensure_child_of(path: &Path, parent: &Path) -> Result<()> {
    if path.parent() != Some(parent) {
        bail!(
            "Refusing to remove {}: not inside {}",
            path.display(),
            parent.display()
        );
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(true)
}

fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
