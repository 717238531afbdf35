//! Lockfile (`cdep.lock`): the commit each dependency was fetched at.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct LockFile {
    #[serde(rename = "package", default)]
    pub packages: BTreeMap<String, PackageLock>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PackageLock {
    pub git: String,
    pub rev: String,
}

impl LockFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PackageLock> {
        self.packages.get(name)
    }

    /// Locked commit for `name`, only if it was recorded for the same URL.
    pub fn rev_for(&self, name: &str, url: &str) -> Option<String> {
        self.get(name)
            .filter(|entry| entry.git == url)
            .map(|entry| entry.rev.clone())
    }

    pub fn insert(&mut self, name: String, git: String, rev: String) {
        self.packages.insert(name, PackageLock { git, rev });
    }

    /// Drop entries for dependencies no longer declared.
    pub fn retain_declared<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) {
        let keep: Vec<&String> = names.into_iter().collect();
        self.packages.retain(|name, _| keep.contains(&name));
    }
}
