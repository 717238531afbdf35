//! Turn `cdep.toml` entries into runnable dependencies.

use super::{CMakeDependency, Dependency, DependencyDescriptor, RepositoryDependency};
use crate::backend::CMake;
use crate::config::{CdepConfig, DependencyKind};
use crate::lock::LockFile;
use crate::project::Project;
use crate::repository::GitRepository;
use anyhow::{Result, bail};

/// Build one dependency per manifest entry, in name order.
///
/// `lockfile` supplies the commit to check out for entries that pin nothing.
/// Patch paths are resolved against the project root.
pub fn dependencies_from_config(
    project: &Project,
    config: &CdepConfig,
    lockfile: Option<&LockFile>,
    cmake: &CMake,
) -> Vec<Box<dyn Dependency>> {
    config
        .dependencies
        .iter()
        .map(|(name, entry)| {
            let locked = lockfile.and_then(|lock| lock.rev_for(name, entry.url()));
            let repository =
                GitRepository::new(name.clone(), entry.git_source()).with_locked_rev(locked);
            let descriptor =
                DependencyDescriptor::new(name.clone()).with_config_options(entry.options());
            let patches = entry.patches().iter().map(|p| project.resolve(p)).collect();

            let dependency: Box<dyn Dependency> = match entry.kind() {
                DependencyKind::Cmake => Box::new(CMakeDependency::new(
                    descriptor,
                    repository,
                    patches,
                    cmake.clone(),
                )),
                DependencyKind::Source => {
                    Box::new(RepositoryDependency::new(descriptor, repository, patches))
                }
            };
            dependency
        })
        .collect()
}

/// Keep only `names`, in the order given. Empty `names` keeps everything.
pub fn select(
    dependencies: Vec<Box<dyn Dependency>>,
    names: &[String],
) -> Result<Vec<Box<dyn Dependency>>> {
    if names.is_empty() {
        return Ok(dependencies);
    }

    let mut pool: Vec<Option<Box<dyn Dependency>>> = dependencies.into_iter().map(Some).collect();
    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        let slot = pool
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|d| d.name() == name.as_str()));
        match slot.and_then(Option::take) {
            Some(dependency) => selected.push(dependency),
            None if selected.iter().any(|d: &Box<dyn Dependency>| d.name() == name.as_str()) => {
                bail!("Dependency '{}' was named more than once", name)
            }
            None => bail!("Unknown dependency '{}' - is it declared in cdep.toml?", name),
        }
    }
    Ok(selected)
}
