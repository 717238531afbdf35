//! Dependency fetching, building and orchestration.
//!
//! - **Variants**: [`RepositoryDependency`] (fetch + patch only) and
//!   [`CMakeDependency`] (fetch + patch, then configure / build / install)
//! - **Orchestration**: [`get_dependency`] drives one dependency through
//!   download and build-install, reporting each stage
//! - **Manifest**: [`dependencies_from_config`] builds the list from `cdep.toml`

mod dependency;
mod manifest;
mod orchestrate;

pub use dependency::{CMakeDependency, Dependency, DependencyDescriptor, RepositoryDependency};
pub use manifest::{dependencies_from_config, select};
pub use orchestrate::{
    ConsoleReporter, Reporter, Stage, ensure_unique_names, get_dependencies, get_dependency,
    get_dependency_with,
};
