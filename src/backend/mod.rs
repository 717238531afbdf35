//! Build backends.
//!
//! A backend turns fetched source into installed artifacts through three
//! steps: configure, build, install. Everything backend-specific travels in
//! [`BuildOptions`].

mod cmake;

pub use cmake::CMake;

use crate::target::{Build, Platform};
use anyhow::Result;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Value of a backend config option (a CMake cache variable, for CMake).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ConfigValueVisitor;

        impl Visitor<'_> for ConfigValueVisitor {
            type Value = ConfigValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, boolean or integer")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<ConfigValue, E> {
                Ok(ConfigValue::Bool(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<ConfigValue, E> {
                Ok(ConfigValue::Int(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<ConfigValue, E> {
                i64::try_from(v)
                    .map(ConfigValue::Int)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<ConfigValue, E> {
                Ok(ConfigValue::Str(v.to_string()))
            }
        }

        deserializer.deserialize_any(ConfigValueVisitor)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Int(i) => write!(f, "{}", i),
            ConfigValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Str(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::Str(s)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Int(i)
    }
}

pub type ConfigOptions = BTreeMap<String, ConfigValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    pub install_prefix: PathBuf,
    pub release: bool,
    pub platform: Platform,
    /// Passed to the backend verbatim.
    pub config_options: ConfigOptions,
}

impl BuildOptions {
    pub fn new(install_prefix: impl Into<PathBuf>, build: &Build) -> Self {
        Self {
            install_prefix: install_prefix.into(),
            release: build.is_deploy(),
            platform: build.platform(),
            config_options: ConfigOptions::new(),
        }
    }

    pub fn with_config_options(mut self, options: ConfigOptions) -> Self {
        self.config_options = options;
        self
    }
}

/// Configure / build / install primitive.
///
/// Each step blocks until the underlying tool exits. A failure is reported as
/// an error rooted in [`crate::DepError::Backend`].
pub trait BuildBackend {
    fn configure(&self, source_dir: &Path, build_dir: &Path, options: &BuildOptions)
    -> Result<()>;
    fn build(&self, build_dir: &Path) -> Result<()>;
    fn install(&self, build_dir: &Path) -> Result<()>;
}
