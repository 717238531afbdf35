//! Dependency variants.
//!
//! A dependency is stateless: whether it has been downloaded is read from the
//! filesystem (its source directory exists) every time, never remembered.

use crate::backend::{BuildBackend, BuildOptions, ConfigOptions};
use crate::project::ProjectLayout;
use crate::repository::Repository;
use crate::target::Build;
use anyhow::Result;
use colored::*;
use std::path::PathBuf;

/// Declared name plus backend config options.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DependencyDescriptor {
    pub name: String,
    pub config_options: ConfigOptions,
}

impl DependencyDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config_options: ConfigOptions::new(),
        }
    }

    pub fn with_config_options(mut self, options: ConfigOptions) -> Self {
        self.config_options = options;
        self
    }
}

/// A named unit that can be downloaded and then built and installed.
pub trait Dependency {
    fn name(&self) -> &str;

    /// Patch files, applied in this order after a fresh download.
    fn patches(&self) -> &[PathBuf];

    fn download(&self, project: &dyn ProjectLayout, build: &Build) -> Result<()>;

    fn build_install(&self, project: &dyn ProjectLayout, build: &Build) -> Result<()>;
}

/// Source-only dependency: fetched and patched, nothing to build.
#[derive(Debug, Clone)]
pub struct RepositoryDependency<R> {
    descriptor: DependencyDescriptor,
    repository: R,
    patches: Vec<PathBuf>,
}

impl<R: Repository> RepositoryDependency<R> {
    pub fn new(descriptor: DependencyDescriptor, repository: R, patches: Vec<PathBuf>) -> Self {
        Self {
            descriptor,
            repository,
            patches,
        }
    }

    pub fn descriptor(&self) -> &DependencyDescriptor {
        &self.descriptor
    }
}

impl<R: Repository> Dependency for RepositoryDependency<R> {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn patches(&self) -> &[PathBuf] {
        &self.patches
    }

    /// An existing source directory means download and patching already
    /// happened; a partial download must be removed by hand before retrying.
    fn download(&self, project: &dyn ProjectLayout, _build: &Build) -> Result<()> {
        let dir = project.dir_for_dependency(self.name());
        if dir.exists() {
            return Ok(());
        }

        self.repository.download(&dir)?;
        for patch in &self.patches {
            if !dir.exists() {
                break;
            }
            if !patch.exists() {
                eprintln!(
                    "{} Skipping patch {} for {}: file not found",
                    "⚠".yellow(),
                    patch.display(),
                    self.name()
                );
                continue;
            }
            self.repository.patch(&dir, patch)?;
        }
        Ok(())
    }

    fn build_install(&self, _project: &dyn ProjectLayout, _build: &Build) -> Result<()> {
        Ok(())
    }
}

/// Dependency built and installed with a configure / build / install backend.
#[derive(Debug, Clone)]
pub struct CMakeDependency<R, B> {
    source: RepositoryDependency<R>,
    backend: B,
}

impl<R: Repository, B: BuildBackend> CMakeDependency<R, B> {
    pub fn new(
        descriptor: DependencyDescriptor,
        repository: R,
        patches: Vec<PathBuf>,
        backend: B,
    ) -> Self {
        Self {
            source: RepositoryDependency::new(descriptor, repository, patches),
            backend,
        }
    }

    pub fn descriptor(&self) -> &DependencyDescriptor {
        self.source.descriptor()
    }

    /// Options handed to `configure` for this build configuration.
    pub fn build_options(&self, project: &dyn ProjectLayout, build: &Build) -> BuildOptions {
        BuildOptions::new(project.dir_for_dependency_install(build), build)
            .with_config_options(self.descriptor().config_options.clone())
    }
}

impl<R: Repository, B: BuildBackend> Dependency for CMakeDependency<R, B> {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn patches(&self) -> &[PathBuf] {
        self.source.patches()
    }

    fn download(&self, project: &dyn ProjectLayout, build: &Build) -> Result<()> {
        self.source.download(project, build)
    }

    /// The build directory is left as-is on failure for inspection.
    fn build_install(&self, project: &dyn ProjectLayout, build: &Build) -> Result<()> {
        let source_dir = project.dir_for_dependency(self.name());
        let build_dir = project.dir_for_dependency_build(self.name(), build);
        let options = self.build_options(project, build);

        self.backend.configure(&source_dir, &build_dir, &options)?;
        self.backend.build(&build_dir)?;
        self.backend.install(&build_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ConfigValue;
    use crate::error::{DepError, Step};
    use crate::project::Project;
    use crate::target::{Architecture, Platform};
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Download(PathBuf),
        Patch(PathBuf),
        Configure(BuildOptions),
        Build,
        Install,
    }

    type Log = Rc<RefCell<Vec<Call>>>;

    struct FakeRepo {
        log: Log,
        create_dir: bool,
        fail_patch: Option<PathBuf>,
    }

    impl Repository for FakeRepo {
        fn download(&self, destination: &Path) -> Result<()> {
            self.log.borrow_mut().push(Call::Download(destination.to_path_buf()));
            if self.create_dir {
                fs::create_dir_all(destination)?;
            }
            Ok(())
        }

        fn patch(&self, _directory: &Path, patch_file: &Path) -> Result<()> {
            self.log.borrow_mut().push(Call::Patch(patch_file.to_path_buf()));
            if self.fail_patch.as_deref() == Some(patch_file) {
                return Err(DepError::Patch {
                    patch: patch_file.to_path_buf(),
                    message: "hunk failed".into(),
                }
                .into());
            }
            Ok(())
        }
    }

    struct FakeBackend {
        log: Log,
        fail_at: Option<Step>,
    }

    impl FakeBackend {
        fn step(&self, step: Step, call: Call) -> Result<()> {
            self.log.borrow_mut().push(call);
            if self.fail_at == Some(step) {
                return Err(DepError::Backend {
                    step,
                    message: "exit status 1".into(),
                }
                .into());
            }
            Ok(())
        }
    }

    impl BuildBackend for FakeBackend {
        fn configure(&self, _s: &Path, _b: &Path, options: &BuildOptions) -> Result<()> {
            self.step(Step::Configure, Call::Configure(options.clone()))
        }
        fn build(&self, _b: &Path) -> Result<()> {
            self.step(Step::Build, Call::Build)
        }
        fn install(&self, _b: &Path) -> Result<()> {
            self.step(Step::Install, Call::Install)
        }
    }

    fn repo(log: &Log) -> FakeRepo {
        FakeRepo {
            log: log.clone(),
            create_dir: true,
            fail_patch: None,
        }
    }

    fn touch_patches(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|n| {
                let p = dir.join(n);
                fs::write(&p, "").unwrap();
                p
            })
            .collect()
    }

    #[test]
    fn test_download_twice_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::new(tmp.path());
        let log = Log::default();
        let dep = RepositoryDependency::new(DependencyDescriptor::new("zlib"), repo(&log), vec![]);
        let build = Build::host(false);

        dep.download(&project, &build).unwrap();
        let after_first = log.borrow().len();
        dep.download(&project, &build).unwrap();

        assert_eq!(after_first, 1);
        assert_eq!(log.borrow().len(), after_first);
    }

    #[test]
    fn test_patches_in_order_after_download() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::new(tmp.path());
        let log = Log::default();
        let patches = touch_patches(tmp.path(), &["p1.patch", "p2.patch", "p3.patch"]);
        let dep = RepositoryDependency::new(
            DependencyDescriptor::new("zlib"),
            repo(&log),
            patches.clone(),
        );

        dep.download(&project, &Build::host(false)).unwrap();

        let mut expected = vec![Call::Download(project.dir_for_dependency("zlib"))];
        expected.extend(patches.into_iter().map(Call::Patch));
        assert_eq!(*log.borrow(), expected);
    }

    #[test]
    fn test_failing_patch_stops_sequence() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::new(tmp.path());
        let log = Log::default();
        let patches = touch_patches(tmp.path(), &["p1.patch", "p2.patch", "p3.patch"]);
        let repository = FakeRepo {
            fail_patch: Some(patches[1].clone()),
            ..repo(&log)
        };
        let dep = RepositoryDependency::new(DependencyDescriptor::new("zlib"), repository, patches);

        let err = dep.download(&project, &Build::host(false)).unwrap_err();

        assert!(matches!(err.downcast_ref::<DepError>(), Some(DepError::Patch { .. })));
        assert_eq!(log.borrow().len(), 3);
        assert!(!log.borrow().iter().any(|c| matches!(c, Call::Patch(p) if p.ends_with("p3.patch"))));
    }

    #[test]
    fn test_patch_skipped_when_directory_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::new(tmp.path());
        let log = Log::default();
        let patches = touch_patches(tmp.path(), &["p1.patch"]);
        let repository = FakeRepo {
            create_dir: false,
            ..repo(&log)
        };
        let dep = RepositoryDependency::new(DependencyDescriptor::new("zlib"), repository, patches);

        dep.download(&project, &Build::host(false)).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![Call::Download(project.dir_for_dependency("zlib"))]
        );
    }

    #[test]
    fn test_patch_skipped_when_patch_file_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::new(tmp.path());
        let log = Log::default();
        let dep = RepositoryDependency::new(
            DependencyDescriptor::new("zlib"),
            repo(&log),
            vec![tmp.path().join("absent.patch")],
        );

        dep.download(&project, &Build::host(false)).unwrap();

        assert!(!log.borrow().iter().any(|c| matches!(c, Call::Patch(_))));
    }

    #[test]
    fn test_source_dependency_build_install_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::new(tmp.path());
        let log = Log::default();
        let dep = RepositoryDependency::new(DependencyDescriptor::new("stb"), repo(&log), vec![]);

        dep.build_install(&project, &Build::host(true)).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_cmake_pipeline_order() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::new(tmp.path());
        let log = Log::default();
        let backend = FakeBackend {
            log: log.clone(),
            fail_at: None,
        };
        let dep = CMakeDependency::new(DependencyDescriptor::new("zlib"), repo(&log), vec![], backend);

        dep.build_install(&project, &Build::host(false)).unwrap();

        let log = log.borrow();
        assert_eq!(log.len(), 3);
        assert!(matches!(log[0], Call::Configure(_)));
        assert_eq!(log[1..], [Call::Build, Call::Install]);
    }

    #[test]
    fn test_build_failure_skips_install() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::new(tmp.path());
        let log = Log::default();
        let backend = FakeBackend {
            log: log.clone(),
            fail_at: Some(Step::Build),
        };
        let dep = CMakeDependency::new(DependencyDescriptor::new("zlib"), repo(&log), vec![], backend);

        let err = dep.build_install(&project, &Build::host(false)).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DepError>(),
            Some(DepError::Backend { step: Step::Build, .. })
        ));
        assert!(!log.borrow().contains(&Call::Install));
    }

    #[test]
    fn test_options_propagation() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::new(tmp.path());
        let log = Log::default();
        let mut config = ConfigOptions::new();
        config.insert("FOO".into(), "bar".into());
        let descriptor = DependencyDescriptor::new("zlib").with_config_options(config);
        let backend = FakeBackend {
            log: log.clone(),
            fail_at: None,
        };
        let dep = CMakeDependency::new(descriptor, repo(&log), vec![], backend);
        let build = Build::new(Platform::Host, Architecture::Host, true);

        dep.build_install(&project, &build).unwrap();

        let log = log.borrow();
        let Call::Configure(options) = &log[0] else {
            panic!("configure was not the first backend call: {:?}", log);
        };
        assert!(options.release);
        assert_eq!(options.platform, Platform::Host);
        assert_eq!(options.config_options["FOO"], ConfigValue::from("bar"));
        assert_eq!(options.install_prefix, project.dir_for_dependency_install(&build));
    }

    #[test]
    fn test_cmake_download_delegates_to_repository() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::new(tmp.path());
        let log = Log::default();
        let backend = FakeBackend {
            log: log.clone(),
            fail_at: None,
        };
        let patches = touch_patches(tmp.path(), &["fix.patch"]);
        let dep = CMakeDependency::new(DependencyDescriptor::new("zlib"), repo(&log), patches, backend);

        dep.download(&project, &Build::host(false)).unwrap();

        assert_eq!(dep.patches().len(), 1);
        assert_eq!(log.borrow().len(), 2);
        assert!(!log.borrow().iter().any(|c| matches!(c, Call::Configure(_))));
    }
}
