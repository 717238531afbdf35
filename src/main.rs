//! # cdep CLI Entry Point
//!
//! Parses CLI arguments with clap and routes commands to the library.
//!
//! ## Commands
//!
//! - `fetch` - Download, patch, build and install dependencies
//! - `list` - Show dependency state for a build configuration
//! - `path` - Print the directories of one dependency
//! - `clean` / `prune` - Remove downloaded sources and build trees
//! - `completion` - Shell completion scripts

use anyhow::{Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;

use cdep::backend::CMake;
use cdep::cache;
use cdep::config::{CdepConfig, load_config};
use cdep::deps::{self, ConsoleReporter};
use cdep::lock::LockFile;
use cdep::project::{Project, ProjectLayout};
use cdep::repository::head_rev;
use cdep::target::{Architecture, Build, Platform};
use cdep::DepError;

#[derive(Parser)]
#[command(name = "cdep")]
#[command(about = "Fetch, patch and build native dependencies", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, patch, build and install dependencies
    Fetch {
        /// Dependencies to fetch, in order (default: all, by name)
        names: Vec<String>,
        #[command(flatten)]
        target: TargetArgs,
        /// Ignore cdep.lock and record fresh revisions
        #[arg(long)]
        no_lock: bool,
        /// Echo every CMake command and its output
        #[arg(short, long)]
        verbose: bool,
    },
    /// Show what is downloaded and configured
    List {
        #[command(flatten)]
        target: TargetArgs,
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the source, build and install directories of a dependency
    Path {
        name: String,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Remove a dependency's downloaded source so the next fetch starts over
    Clean {
        /// Dependency to clean
        name: Option<String>,
        /// Also remove its build directories for every configuration
        #[arg(long)]
        build: bool,
        /// Remove the whole .cdep directory
        #[arg(long, conflicts_with_all = ["name", "build"])]
        all: bool,
    },
    /// Remove downloaded sources no longer declared in cdep.toml
    Prune,
    /// Generate shell completion scripts
    Completion { shell: Shell },
}

#[derive(Args)]
struct TargetArgs {
    /// Build in release mode
    #[arg(long)]
    release: bool,
    /// Target platform [default: from cdep.toml, else host]
    #[arg(long, value_enum)]
    platform: Option<Platform>,
    /// Target architecture [default: from cdep.toml, else host]
    #[arg(long, value_enum)]
    arch: Option<Architecture>,
}

impl TargetArgs {
    fn build(&self, config: &CdepConfig) -> Build {
        Build::new(
            self.platform.unwrap_or(config.build.platform),
            self.arch.unwrap_or(config.build.arch),
            self.release,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Fetch {
            names,
            target,
            no_lock,
            verbose,
        } => fetch(names, target, *no_lock, *verbose),

        Commands::List { target, json } => {
            let project = Project::discover()?;
            let config = load_config(&project)?;
            cache::list(&project, &config, &target.build(&config), *json)
        }

        Commands::Path { name, target } => {
            let project = Project::discover()?;
            let config = load_config(&project)?;
            if !config.dependencies.contains_key(name) {
                bail!("Unknown dependency '{}' - is it declared in cdep.toml?", name);
            }
            let build = target.build(&config);
            println!("source  {}", project.dir_for_dependency(name).display());
            println!("build   {}", project.dir_for_dependency_build(name, &build).display());
            println!("install {}", project.dir_for_dependency_install(&build).display());
            Ok(())
        }

        Commands::Clean { name, build, all } => {
            let project = Project::discover()?;
            match (name, all) {
                (_, true) => cache::clean_all(&project),
                (Some(name), false) => cache::clean_dependency(&project, name, *build),
                (None, false) => bail!("Name a dependency to clean, or pass --all"),
            }
        }

        Commands::Prune => {
            let project = Project::discover()?;
            let config = load_config(&project)?;
            let keep: Vec<String> = config.dependencies.keys().cloned().collect();
            cache::prune_unused(&project, &keep).map(|_| ())
        }

        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "cdep", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn fetch(names: &[String], target: &TargetArgs, no_lock: bool, verbose: bool) -> Result<()> {
    let project = Project::discover()?;
    let config = load_config(&project)?;
    let build = target.build(&config);

    let lock_path = project.lock_path();
    let mut lockfile = if no_lock {
        LockFile::default()
    } else {
        LockFile::load(&lock_path)?
    };

    let cmake = CMake::new()
        .with_generator(config.build.generator.clone())
        .with_jobs(config.build.jobs)
        .verbose(verbose);
    let all = deps::dependencies_from_config(
        &project,
        &config,
        (!no_lock).then_some(&lockfile),
        &cmake,
    );
    let selected = deps::select(all, names)?;

    if selected.is_empty() {
        println!("{} No dependencies declared in cdep.toml", "ℹ".blue());
        return Ok(());
    }

    println!(
        "{} {}: fetching {} dependencies for {}",
        "🚀".blue(),
        config.package.name.bold(),
        selected.len(),
        build
    );
    let result = deps::get_dependencies(&project, &build, &selected, &ConsoleReporter);

    // Record whatever is checked out, including dependencies fetched before a failure.
    for (name, entry) in &config.dependencies {
        if let Some(rev) = head_rev(&project.dir_for_dependency(name)) {
            lockfile.insert(name.clone(), entry.url().to_string(), rev);
        }
    }
    lockfile.retain_declared(config.dependencies.keys());
    lockfile.save(&lock_path)?;

    if let Err(err) = result {
        if let Some(DepError::Fetch { name, .. }) = err.downcast_ref::<DepError>() {
            eprintln!(
                "   {} A partial download may remain. Run {} before retrying.",
                "💡".yellow(),
                format!("cdep clean {}", name).cyan()
            );
        } else if let Some(DepError::Patch { .. }) = err.downcast_ref::<DepError>() {
            eprintln!(
                "   {} Patches are only applied to fresh downloads. Clean the dependency before retrying.",
                "💡".yellow()
            );
        }
        return Err(err);
    }

    println!(
        "{} Installed into {}",
        "✓".green(),
        project.dir_for_dependency_install(&build).display()
    );
    Ok(())
}
