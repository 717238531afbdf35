//! CMake build backend.
//!
//! - configure: `cmake -S <src> -B <build> -DCMAKE_INSTALL_PREFIX=... -D<K>=<V>`
//! - build: `cmake --build <build> --config <cfg>`
//! - install: `cmake --install <build> --config <cfg>`
//!
//! The build type chosen at configure time is read back from `CMakeCache.txt`
//! so `build` and `install` need nothing but the build directory.

use super::{BuildBackend, BuildOptions, ConfigValue};
use crate::error::{DepError, Step};
use crate::target::Platform;
use anyhow::Result;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Lines of stderr kept in a step failure message.
const STDERR_TAIL: usize = 20;

#[derive(Debug, Clone)]
pub struct CMake {
    program: PathBuf,
    generator: Option<String>,
    jobs: Option<usize>,
    verbose: bool,
}

impl Default for CMake {
    fn default() -> Self {
        Self {
            program: PathBuf::from("cmake"),
            generator: None,
            jobs: None,
            verbose: false,
        }
    }
}

impl CMake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_generator(mut self, generator: Option<String>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Arguments for the configure step, without the program itself.
    pub fn configure_args(
        &self,
        source_dir: &Path,
        build_dir: &Path,
        options: &BuildOptions,
    ) -> Vec<String> {
        let prefix = options.install_prefix.to_string_lossy();
        let mut args = vec![
            "-S".to_string(),
            source_dir.to_string_lossy().to_string(),
            "-B".to_string(),
            build_dir.to_string_lossy().to_string(),
        ];
        if let Some(generator) = &self.generator {
            args.push("-G".to_string());
            args.push(generator.clone());
        }
        args.push(format!("-DCMAKE_INSTALL_PREFIX={}", prefix));
        // Earlier installs into the shared prefix are discoverable via find_package.
        args.push(format!("-DCMAKE_PREFIX_PATH={}", prefix));
        args.push(format!(
            "-DCMAKE_BUILD_TYPE={}",
            build_type(options.release)
        ));
        for (key, value) in &options.config_options {
            args.push(format!("-D{}={}", key, cmake_value(value)));
        }
        args
    }

    fn command(&self, platform: Platform) -> Command {
        if platform == Platform::Wasm {
            let mut cmd = Command::new("emcmake");
            cmd.arg(&self.program);
            cmd
        } else {
            Command::new(&self.program)
        }
    }

    fn run(&self, step: Step, mut cmd: Command) -> Result<()> {
        if self.verbose {
            println!("   {} {:?}", "$".dimmed(), cmd);
        }

        let output = cmd.output().map_err(|e| DepError::Backend {
            step,
            message: format!("could not run {}: {}", self.program.display(), e),
        })?;

        if self.verbose {
            print!("{}", String::from_utf8_lossy(&output.stdout));
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(DepError::Backend {
            step,
            message: format!("{}\n{}", output.status, stderr_tail(&stderr)),
        }
        .into())
    }
}

impl BuildBackend for CMake {
    fn configure(
        &self,
        source_dir: &Path,
        build_dir: &Path,
        options: &BuildOptions,
    ) -> Result<()> {
        fs::create_dir_all(build_dir).map_err(|e| DepError::Backend {
            step: Step::Configure,
            message: format!("could not create {}: {}", build_dir.display(), e),
        })?;

        let mut cmd = self.command(options.platform);
        cmd.args(self.configure_args(source_dir, build_dir, options));
        self.run(Step::Configure, cmd)
    }

    fn build(&self, build_dir: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--build").arg(build_dir);
        cmd.arg("--config").arg(cached_build_type(build_dir));
        if let Some(jobs) = self.jobs {
            cmd.arg("--parallel").arg(jobs.to_string());
        }
        self.run(Step::Build, cmd)
    }

    fn install(&self, build_dir: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--install").arg(build_dir);
        cmd.arg("--config").arg(cached_build_type(build_dir));
        self.run(Step::Install, cmd)
    }
}

fn build_type(release: bool) -> &'static str {
    if release { "Release" } else { "Debug" }
}

/// CMake spells booleans ON/OFF.
fn cmake_value(value: &ConfigValue) -> String {
    match value {
        ConfigValue::Bool(true) => "ON".to_string(),
        ConfigValue::Bool(false) => "OFF".to_string(),
        other => other.to_string(),
    }
}

/// `CMAKE_BUILD_TYPE` recorded by the configure step, `Debug` if unknown.
fn cached_build_type(build_dir: &Path) -> String {
    fs::read_to_string(build_dir.join("CMakeCache.txt"))
        .ok()
        .and_then(|cache| {
            cache.lines().find_map(|line| {
                line.strip_prefix("CMAKE_BUILD_TYPE:")
                    .and_then(|rest| rest.split_once('='))
                    .map(|(_, value)| value.trim().to_string())
            })
        })
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| build_type(false).to_string())
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL);
    lines[start..].join("\n")
}
