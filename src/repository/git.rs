//! Git-backed repository using libgit2.
//!
//! - Clone with tag / branch / rev pinning, falling back to a locked commit
//! - Update in place (fetch `origin`, re-checkout the pinned target)
//! - Patches applied to the working tree with `git apply` semantics

use super::Repository;
use crate::error::DepError;
use anyhow::Result;
use colored::*;
use git2::{ApplyLocation, BranchType, Diff, Oid};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Where to fetch from and what to check out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitSource {
    pub url: String,
    pub tag: Option<String>,
    pub branch: Option<String>,
    pub rev: Option<String>,
}

impl GitSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitRepository {
    name: String,
    source: GitSource,
    locked_rev: Option<String>,
}

impl GitRepository {
    pub fn new(name: impl Into<String>, source: GitSource) -> Self {
        Self {
            name: name.into(),
            source,
            locked_rev: None,
        }
    }

    /// Commit to check out when the source pins neither tag, branch nor rev.
    pub fn with_locked_rev(mut self, rev: Option<String>) -> Self {
        self.locked_rev = rev;
        self
    }

    fn fetch_error(&self, message: impl std::fmt::Display) -> anyhow::Error {
        DepError::Fetch {
            name: self.name.clone(),
            message: message.to_string(),
        }
        .into()
    }

    fn clone_into(&self, destination: &Path) -> Result<git2::Repository> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.blue} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷"),
        );
        pb.set_message(format!("Cloning {}...", self.name));
        pb.enable_steady_tick(Duration::from_millis(100));

        match git2::Repository::clone(&self.source.url, destination) {
            Ok(repo) => {
                pb.finish_with_message(format!("{} Cloned {}", "✓".green(), self.name));
                Ok(repo)
            }
            Err(err) => {
                pb.finish_with_message(format!("{} Failed {}", "x".red(), self.name));
                Err(self.fetch_error(format!("clone of {} failed: {}", self.source.url, err)))
            }
        }
    }

    fn update_in_place(&self, destination: &Path) -> Result<git2::Repository> {
        let repo = git2::Repository::open(destination)
            .map_err(|e| self.fetch_error(format!("not a git repository: {}", e)))?;
        {
            let mut remote = repo
                .find_remote("origin")
                .map_err(|e| self.fetch_error(e))?;
            remote
                .fetch(&[] as &[&str], None, None)
                .map_err(|e| self.fetch_error(format!("fetch failed: {}", e)))?;
        }
        println!("   {} Updated {}", "⚡".green(), self.name);
        Ok(repo)
    }

    fn select_checkout_target(&self, repo: &git2::Repository) -> Option<(Oid, String)> {
        if let Some(rev) = self.source.rev.as_deref()
            && let Ok(oid) = Oid::from_str(rev)
            && repo.find_object(oid, None).is_ok()
        {
            return Some((oid, format!("commit {}", short_hash(rev))));
        }

        if let Some(tag) = self.source.tag.as_deref()
            && let Ok(reference) = repo.find_reference(&format!("refs/tags/{}", tag))
            && let Ok(commit) = reference.peel_to_commit()
        {
            return Some((commit.id(), format!("tag {}", tag)));
        }

        if let Some(branch) = self.source.branch.as_deref()
            && let Some(oid) = find_branch_commit(repo, branch)
        {
            return Some((oid, format!("branch {}", branch)));
        }

        if let Some(rev) = self.locked_rev.as_deref()
            && let Ok(oid) = Oid::from_str(rev)
            && repo.find_object(oid, None).is_ok()
        {
            return Some((oid, format!("locked {}", short_hash(rev))));
        }

        None
    }

    /// A pinned target that cannot be found is a fetch failure.
    fn ensure_pin_resolved(&self, resolved: bool) -> Result<()> {
        let pinned = self
            .source
            .rev
            .as_ref()
            .or(self.source.tag.as_ref())
            .or(self.source.branch.as_ref());
        match pinned {
            Some(pin) if !resolved => Err(self.fetch_error(format!(
                "'{}' not found in {}",
                pin, self.source.url
            ))),
            _ => Ok(()),
        }
    }

    fn checkout(&self, repo: &git2::Repository, oid: Oid, label: &str) -> Result<()> {
        let checkout = || -> std::result::Result<(), git2::Error> {
            repo.set_head_detached(oid)?;
            let obj = repo.find_object(oid, None)?;
            let mut opts = git2::build::CheckoutBuilder::new();
            opts.force();
            repo.checkout_tree(&obj, Some(&mut opts))
        };
        checkout().map_err(|e| self.fetch_error(format!("checkout of {} failed: {}", label, e)))?;
        println!("   {} Locked to {}", "📌".blue(), label);
        Ok(())
    }
}

impl Repository for GitRepository {
    fn download(&self, destination: &Path) -> Result<()> {
        let repo = if destination.exists() {
            self.update_in_place(destination)?
        } else {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|e| self.fetch_error(e))?;
            }
            self.clone_into(destination)?
        };

        let target = self.select_checkout_target(&repo);
        self.ensure_pin_resolved(target.is_some())?;
        if let Some((oid, label)) = target {
            self.checkout(&repo, oid, &label)?;
        }
        Ok(())
    }

    fn patch(&self, directory: &Path, patch_file: &Path) -> Result<()> {
        if !directory.exists() || !patch_file.exists() {
            return Ok(());
        }

        let patch_error = |message: String| -> anyhow::Error {
            DepError::Patch {
                patch: patch_file.to_path_buf(),
                message,
            }
            .into()
        };

        let bytes = fs::read(patch_file).map_err(|e| patch_error(e.to_string()))?;
        let diff = Diff::from_buffer(&bytes).map_err(|e| patch_error(e.to_string()))?;
        let repo = git2::Repository::open(directory).map_err(|e| patch_error(e.to_string()))?;
        repo.apply(&diff, ApplyLocation::WorkDir, None)
            .map_err(|e| patch_error(e.to_string()))?;

        println!(
            "   {} Applied {}",
            "🩹".yellow(),
            patch_file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        );
        Ok(())
    }
}

/// Commit currently checked out in `directory`, if it is a git repository.
pub fn head_rev(directory: &Path) -> Option<String> {
    let repo = git2::Repository::open(directory).ok()?;
    let head = repo.head().ok()?;
    let commit = head.peel_to_commit().ok()?;
    Some(commit.id().to_string())
}

/// Remote-tracking branch first so an update picks up new commits.
fn find_branch_commit(repo: &git2::Repository, branch: &str) -> Option<Oid> {
    let remote_ref = format!("origin/{}", branch);
    if let Ok(reference) = repo.find_branch(&remote_ref, BranchType::Remote)
        && let Ok(commit) = reference.get().peel_to_commit()
    {
        return Some(commit.id());
    }

    if let Ok(reference) = repo.find_branch(branch, BranchType::Local)
        && let Ok(commit) = reference.get().peel_to_commit()
    {
        return Some(commit.id());
    }

    None
}

fn short_hash(rev: &str) -> &str {
    if rev.len() > 7 { &rev[..7] } else { rev }
}
