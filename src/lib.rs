//! # cdep - native dependency manager
//!
//! cdep fetches third-party C/C++ dependencies from git, applies source
//! patches, and builds them with CMake into a project-local install prefix
//! that the root project (and later dependencies) can consume.
//!
//! ## Quick Start
//!
//! ```bash
//! # cdep.toml declares [dependencies.<name>] entries
//! cdep fetch            # download, patch, build and install everything
//! cdep fetch --release  # same, for the release configuration
//! cdep list             # what is downloaded / configured
//! ```
//!
//! ## Module Organization
//!
//! - [`deps`] - Dependency variants and orchestration
//! - [`repository`] - Git fetch and patch
//! - [`backend`] - CMake configure / build / install
//! - [`project`] - Directory layout under `.cdep/`
//! - [`target`] - Build configuration (platform, architecture, release)

/// Build backends (CMake).
pub mod backend;

/// `.cdep/` inspection and cleanup.
pub mod cache;

/// Manifest parsing (`cdep.toml`).
pub mod config;

/// Dependency variants and orchestration.
pub mod deps;

/// Failure taxonomy.
pub mod error;

/// Per-dependency file lease.
pub mod lease;

/// Lockfile (`cdep.lock`) management.
pub mod lock;

/// Project directory layout.
pub mod project;

/// Version-control fetch and patch.
pub mod repository;

/// Build configuration.
pub mod target;

/// Terminal UI utilities.
pub mod ui;

pub use error::{DepError, Step};
