//! End-to-end orchestration tests
//!
//! These drive `get_dependency` through the public API with recording stand-ins
//! for the git repository and the CMake backend, so nothing touches the network
//! or needs a compiler.

use anyhow::Result;
use cdep::backend::{BuildBackend, BuildOptions, ConfigOptions};
use cdep::deps::{
    CMakeDependency, Dependency, DependencyDescriptor, Reporter, Stage, get_dependency,
    get_dependency_with,
};
use cdep::project::{Project, ProjectLayout};
use cdep::repository::Repository;
use cdep::target::{Architecture, Build, Platform};
use cdep::{DepError, Step};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

type CallLog = Rc<RefCell<Vec<String>>>;

/// Creates an empty directory on download and records every call.
struct StubRepository {
    calls: CallLog,
    fail_download: bool,
}

impl Repository for StubRepository {
    fn download(&self, destination: &Path) -> Result<()> {
        self.calls.borrow_mut().push("repo.download".to_string());
        if self.fail_download {
            // Leave a partial checkout behind, like an interrupted clone.
            fs::create_dir_all(destination)?;
            return Err(DepError::Fetch {
                name: "zlib".into(),
                message: "connection reset".into(),
            }
            .into());
        }
        fs::create_dir_all(destination)?;
        Ok(())
    }

    fn patch(&self, _directory: &Path, patch_file: &Path) -> Result<()> {
        let file = patch_file.file_name().unwrap().to_string_lossy();
        self.calls.borrow_mut().push(format!("repo.patch({})", file));
        Ok(())
    }
}

struct StubBackend {
    calls: CallLog,
    options: RefCell<Option<BuildOptions>>,
    fail_at: Option<Step>,
}

impl StubBackend {
    fn record(&self, step: Step) -> Result<()> {
        self.calls.borrow_mut().push(format!("backend.{}", step));
        if self.fail_at == Some(step) {
            return Err(DepError::Backend {
                step,
                message: "exit status: 1".into(),
            }
            .into());
        }
        Ok(())
    }
}

impl BuildBackend for &StubBackend {
    fn configure(&self, _source: &Path, _build: &Path, options: &BuildOptions) -> Result<()> {
        *self.options.borrow_mut() = Some(options.clone());
        self.record(Step::Configure)
    }

    fn build(&self, _build_dir: &Path) -> Result<()> {
        self.record(Step::Build)
    }

    fn install(&self, _build_dir: &Path) -> Result<()> {
        self.record(Step::Install)
    }
}

struct StageLog(CallLog);

impl Reporter for StageLog {
    fn stage(&self, name: &str, stage: Stage) {
        self.0.borrow_mut().push(format!("{}:{:?}", name, stage));
    }
}

struct Fixture {
    _tmp: tempfile::TempDir,
    project: Project,
    calls: CallLog,
    patches: Vec<PathBuf>,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let project = Project::new(tmp.path());
    let patch = tmp.path().join("patches").join("fix1.patch");
    fs::create_dir_all(patch.parent().unwrap()).unwrap();
    fs::write(&patch, "").unwrap();
    Fixture {
        _tmp: tmp,
        project,
        calls: CallLog::default(),
        patches: vec![patch],
    }
}

fn backend(calls: &CallLog, fail_at: Option<Step>) -> StubBackend {
    StubBackend {
        calls: calls.clone(),
        options: RefCell::new(None),
        fail_at,
    }
}

#[test]
fn test_zlib_end_to_end() {
    let fx = fixture();
    let backend = backend(&fx.calls, None);
    let repository = StubRepository {
        calls: fx.calls.clone(),
        fail_download: false,
    };
    let dep = CMakeDependency::new(
        DependencyDescriptor::new("zlib"),
        repository,
        fx.patches.clone(),
        &backend,
    );

    get_dependency(&fx.project, &Build::host(false), &dep).unwrap();

    assert_eq!(
        *fx.calls.borrow(),
        [
            "repo.download",
            "repo.patch(fix1.patch)",
            "backend.configure",
            "backend.build",
            "backend.install",
        ]
    );
    assert!(fx.project.dir_for_dependency("zlib").is_dir());
}

#[test]
fn test_second_run_skips_download_but_rebuilds() {
    let fx = fixture();
    let backend = backend(&fx.calls, None);
    let dep = CMakeDependency::new(
        DependencyDescriptor::new("zlib"),
        StubRepository {
            calls: fx.calls.clone(),
            fail_download: false,
        },
        fx.patches.clone(),
        &backend,
    );
    let build = Build::host(false);

    get_dependency(&fx.project, &build, &dep).unwrap();
    fx.calls.borrow_mut().clear();
    get_dependency(&fx.project, &build, &dep).unwrap();

    assert_eq!(
        *fx.calls.borrow(),
        ["backend.configure", "backend.build", "backend.install"]
    );
}

#[test]
fn test_failed_download_leaves_partial_dir_and_skips_build() {
    let fx = fixture();
    let backend = backend(&fx.calls, None);
    let dep = CMakeDependency::new(
        DependencyDescriptor::new("zlib"),
        StubRepository {
            calls: fx.calls.clone(),
            fail_download: true,
        },
        fx.patches.clone(),
        &backend,
    );

    let err = get_dependency_with(
        &fx.project,
        &Build::host(false),
        &dep,
        &StageLog(fx.calls.clone()),
    )
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DepError>(),
        Some(DepError::Fetch { .. })
    ));
    assert_eq!(
        *fx.calls.borrow(),
        ["zlib:Downloading", "repo.download", "zlib:Failed"]
    );
    // No cleanup: the partial directory stays until removed by hand.
    assert!(fx.project.dir_for_dependency("zlib").exists());
}

#[test]
fn test_build_failure_stops_before_install() {
    let fx = fixture();
    let backend = backend(&fx.calls, Some(Step::Build));
    let dep = CMakeDependency::new(
        DependencyDescriptor::new("zlib"),
        StubRepository {
            calls: fx.calls.clone(),
            fail_download: false,
        },
        vec![],
        &backend,
    );

    let err = get_dependency_with(
        &fx.project,
        &Build::host(true),
        &dep,
        &StageLog(fx.calls.clone()),
    )
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DepError>(),
        Some(DepError::Backend {
            step: Step::Build,
            ..
        })
    ));
    let calls = fx.calls.borrow();
    assert!(!calls.iter().any(|c| c == "backend.install"));
    assert!(!calls.iter().any(|c| c == "zlib:Ready"));
    assert_eq!(calls.last().map(String::as_str), Some("zlib:Failed"));
}

#[test]
fn test_options_reach_configure() {
    let fx = fixture();
    let backend = backend(&fx.calls, None);
    let mut options = ConfigOptions::new();
    options.insert("FOO".into(), "bar".into());
    let dep = CMakeDependency::new(
        DependencyDescriptor::new("zlib").with_config_options(options),
        StubRepository {
            calls: fx.calls.clone(),
            fail_download: false,
        },
        vec![],
        &backend,
    );
    let build = Build::new(Platform::Host, Architecture::Host, true);

    get_dependency(&fx.project, &build, &dep).unwrap();

    let seen = backend.options.borrow().clone().unwrap();
    assert!(seen.release);
    assert_eq!(seen.platform, Platform::Host);
    assert_eq!(seen.config_options["FOO"].to_string(), "bar");
    assert_eq!(
        seen.install_prefix,
        fx.project.dir_for_dependency_install(&build)
    );
    assert_eq!(dep.name(), "zlib");
}
