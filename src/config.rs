//! Manifest (`cdep.toml`) parsing.
//!
//! ```toml
//! [package]
//! name = "game"
//!
//! [build]
//! generator = "Ninja"
//!
//! [dependencies]
//! fmt = "https://github.com/fmtlib/fmt"
//!
//! [dependencies.zlib]
//! git = "https://github.com/madler/zlib"
//! tag = "v1.3.1"
//! patches = ["patches/zlib-fix.patch"]
//! options = { ZLIB_BUILD_EXAMPLES = false }
//! ```

use crate::backend::ConfigOptions;
use crate::project::Project;
use crate::repository::GitSource;
use crate::target::{Architecture, Platform};
use anyhow::{Context, Result, bail};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Deserialize, Debug, Default)]
pub struct CdepConfig {
    pub package: PackageConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub dependencies: BTreeMap<String, Dependency>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PackageConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct BuildConfig {
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub arch: Architecture,
    pub generator: Option<String>,
    pub jobs: Option<usize>,
}

/// How a dependency is turned into installed artifacts.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Configure, build and install with CMake.
    #[default]
    Cmake,
    /// Source only; nothing to build.
    Source,
}

/// Table form of a `[dependencies]` entry. Unknown keys are rejected so a
/// typo such as `tags` cannot silently leave a dependency unpinned.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct DependencyTable {
    pub git: String,
    pub tag: Option<String>,
    pub branch: Option<String>,
    pub rev: Option<String>,
    #[serde(default)]
    pub kind: DependencyKind,
    #[serde(default)]
    pub patches: Vec<PathBuf>,
    #[serde(default)]
    pub options: ConfigOptions,
}

/// A `[dependencies]` entry: either a bare git URL or a table.
#[derive(Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum Dependency {
    Simple(String),
    Complex(DependencyTable),
}

// Dispatch on the TOML value type by hand so table errors (unknown keys, bad
// option values) surface instead of "did not match any variant".
impl<'de> Deserialize<'de> for Dependency {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DependencyVisitor;

        impl<'de> Visitor<'de> for DependencyVisitor {
            type Value = Dependency;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a git URL or a dependency table")
            }

            fn visit_str<E: de::Error>(self, url: &str) -> std::result::Result<Dependency, E> {
                Ok(Dependency::Simple(url.to_string()))
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                map: A,
            ) -> std::result::Result<Dependency, A::Error> {
                DependencyTable::deserialize(de::value::MapAccessDeserializer::new(map))
                    .map(Dependency::Complex)
            }
        }

        deserializer.deserialize_any(DependencyVisitor)
    }
}

impl Dependency {
    pub fn git_source(&self) -> GitSource {
        match self {
            Dependency::Simple(url) => GitSource::new(url.clone()),
            Dependency::Complex(table) => GitSource {
                url: table.git.clone(),
                tag: table.tag.clone(),
                branch: table.branch.clone(),
                rev: table.rev.clone(),
            },
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Dependency::Simple(url) => url,
            Dependency::Complex(table) => &table.git,
        }
    }

    pub fn kind(&self) -> DependencyKind {
        match self {
            Dependency::Simple(_) => DependencyKind::default(),
            Dependency::Complex(table) => table.kind,
        }
    }

    pub fn patches(&self) -> &[PathBuf] {
        match self {
            Dependency::Simple(_) => &[],
            Dependency::Complex(table) => &table.patches,
        }
    }

    pub fn options(&self) -> ConfigOptions {
        match self {
            Dependency::Simple(_) => ConfigOptions::new(),
            Dependency::Complex(table) => table.options.clone(),
        }
    }
}

/// Dependency names become directory and lock file names, so a name must be a
/// single plain path component: not empty, not `.` or `..`, no separators,
/// not absolute.
pub fn validate_dependency_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !plain || name.contains(['/', '\\']) {
        bail!(
            "Invalid dependency name '{}': must be a plain directory name",
            name
        );
    }
    Ok(())
}

fn default_version() -> String {
    "0.1.0".to_string()
}

pub fn parse_config(content: &str) -> Result<CdepConfig> {
    let config: CdepConfig = toml::from_str(content)
        .context("Failed to parse cdep.toml - check for syntax errors (missing quotes, brackets)")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(project: &Project) -> Result<CdepConfig> {
    let path = project.manifest_path();
    let content = fs::read_to_string(&path).with_context(|| {
        format!(
            "Failed to read {} - check file permissions",
            path.display()
        )
    })?;
    parse_config(&content)
}

impl CdepConfig {
    /// Dependency names become directory names; reject anything that would
    /// escape or alias another dependency's directory.
    pub fn validate(&self) -> Result<()> {
        for (name, dep) in &self.dependencies {
            validate_dependency_name(name)?;
            if dep.url().trim().is_empty() {
                bail!("Dependency '{}' has an empty git URL", name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ConfigValue;

    const MANIFEST: &str = r#"
[package]
name = "game"
version = "1.2.0"

[build]
platform = "linux"
arch = "aarch64"
generator = "Ninja"
jobs = 8

[dependencies]
fmt = "https://github.com/fmtlib/fmt"

[dependencies.zlib]
git = "https://github.com/madler/zlib"
tag = "v1.3.1"
patches = ["patches/one.patch", "patches/two.patch"]
options = { ZLIB_BUILD_EXAMPLES = false, FOO = "bar" }

[dependencies.stb]
git = "https://github.com/nothings/stb"
kind = "source"
"#;

    #[test]
    fn test_parse_full_manifest() {
        let config = parse_config(MANIFEST).unwrap();
        assert_eq!(config.package.name, "game");
        assert_eq!(config.build.platform, Platform::Linux);
        assert_eq!(config.build.arch, Architecture::Aarch64);
        assert_eq!(config.build.generator.as_deref(), Some("Ninja"));
        assert_eq!(config.build.jobs, Some(8));
        assert_eq!(config.dependencies.len(), 3);
    }

    #[test]
    fn test_simple_dependency_defaults() {
        let config = parse_config(MANIFEST).unwrap();
        let fmt = &config.dependencies["fmt"];
        assert_eq!(fmt.kind(), DependencyKind::Cmake);
        assert!(fmt.patches().is_empty());
        assert!(fmt.options().is_empty());
        assert_eq!(fmt.git_source(), GitSource::new("https://github.com/fmtlib/fmt"));
    }

    #[test]
    fn test_complex_dependency_fields() {
        let config = parse_config(MANIFEST).unwrap();
        let zlib = &config.dependencies["zlib"];
        assert_eq!(zlib.git_source().tag.as_deref(), Some("v1.3.1"));
        assert_eq!(
            zlib.patches(),
            [PathBuf::from("patches/one.patch"), PathBuf::from("patches/two.patch")]
        );
        let options = zlib.options();
        assert_eq!(options["FOO"], ConfigValue::from("bar"));
        assert_eq!(options["ZLIB_BUILD_EXAMPLES"], ConfigValue::Bool(false));

        assert_eq!(config.dependencies["stb"].kind(), DependencyKind::Source);
    }

    #[test]
    fn test_build_section_optional() {
        let config = parse_config("[package]\nname = \"bare\"\n").unwrap();
        assert_eq!(config.build.platform, Platform::Host);
        assert_eq!(config.package.version, "0.1.0");
        assert!(config.dependencies.is_empty());
    }

    #[test]
    fn test_rejects_path_like_names() {
        let err = parse_config(
            "[package]\nname = \"x\"\n[dependencies]\n\"../evil\" = \"https://example.com/e\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid dependency name"));
    }

    #[test]
    fn test_validate_dependency_name() {
        assert!(validate_dependency_name("zlib").is_ok());
        assert!(validate_dependency_name("sdl2-image").is_ok());
        for bad in ["", ".", "..", "../..", "a/b", "a\\b", "/tmp/victim", "zlib/"] {
            assert!(validate_dependency_name(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_unknown_dependency_key_is_named() {
        let err = parse_config(
            "[package]\nname = \"x\"\n[dependencies.zlib]\ngit = \"https://github.com/madler/zlib\"\ntags = \"v1.3.1\"\n",
        )
        .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("unknown field `tags`"), "{}", message);
    }

    #[test]
    fn test_float_option_is_explained() {
        let err = parse_config(
            "[package]\nname = \"x\"\n[dependencies.zlib]\ngit = \"u\"\noptions = { LEVEL = 1.5 }\n",
        )
        .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("floating point"), "{}", message);
        assert!(message.contains("string, boolean or integer"), "{}", message);
    }

    #[test]
    fn test_rejects_empty_url() {
        let err = parse_config("[package]\nname = \"x\"\n[dependencies]\nz = \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("empty git URL"));
    }

    #[test]
    fn test_syntax_error_has_hint() {
        let err = parse_config("[package\nname = ").unwrap_err();
        assert!(err.to_string().contains("cdep.toml"));
    }
}
