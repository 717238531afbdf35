//! Build configuration: the platform / architecture / release tuple that
//! parameterizes one build invocation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target platform of a build.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Whatever the running machine is.
    #[default]
    Host,
    Linux,
    Windows,
    #[value(name = "macos")]
    MacOS,
    /// WebAssembly through Emscripten.
    Wasm,
}

impl Platform {
    /// Replace `Host` with the concrete platform of the running machine.
    pub fn resolve(self) -> Platform {
        match self {
            Platform::Host if cfg!(target_os = "windows") => Platform::Windows,
            Platform::Host if cfg!(target_os = "macos") => Platform::MacOS,
            Platform::Host => Platform::Linux,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Host => "host",
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::MacOS => "macos",
            Platform::Wasm => "wasm",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target CPU architecture of a build.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    #[default]
    Host,
    #[value(name = "x86_64")]
    X86_64,
    Aarch64,
    X86,
    Wasm32,
}

impl Architecture {
    /// Replace `Host` with the architecture of the running machine.
    pub fn resolve(self) -> Architecture {
        match self {
            Architecture::Host if cfg!(target_arch = "aarch64") => Architecture::Aarch64,
            Architecture::Host if cfg!(target_arch = "x86") => Architecture::X86,
            Architecture::Host if cfg!(target_arch = "wasm32") => Architecture::Wasm32,
            Architecture::Host => Architecture::X86_64,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Architecture::Host => "host",
            Architecture::X86_64 => "x86_64",
            Architecture::Aarch64 => "aarch64",
            Architecture::X86 => "x86",
            Architecture::Wasm32 => "wasm32",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One build invocation. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Build {
    platform: Platform,
    architecture: Architecture,
    is_deploy: bool,
}

impl Build {
    pub const fn new(platform: Platform, architecture: Architecture, is_deploy: bool) -> Self {
        Self {
            platform,
            architecture,
            is_deploy,
        }
    }

    /// Build for the running machine.
    pub const fn host(is_deploy: bool) -> Self {
        Self::new(Platform::Host, Architecture::Host, is_deploy)
    }

    pub const fn platform(&self) -> Platform {
        self.platform
    }

    pub const fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// Release intent (`true`) vs debug (`false`).
    pub const fn is_deploy(&self) -> bool {
        self.is_deploy
    }

    pub const fn profile(&self) -> &'static str {
        if self.is_deploy { "release" } else { "debug" }
    }

    /// Directory key for this configuration, e.g. `linux-x86_64-release`.
    ///
    /// `Host` is resolved first so that `host` and the explicit platform of the
    /// running machine share build and install directories.
    pub fn key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.platform.resolve(),
            self.architecture.resolve(),
            self.profile()
        )
    }
}

impl fmt::Display for Build {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({})",
            self.platform,
            self.architecture,
            self.profile()
        )
    }
}
