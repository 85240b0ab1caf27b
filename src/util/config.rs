//! Configuration for kiln.
//!
//! Settings come from three layers, highest priority first:
//! - Command-line flags (applied by the binary on top of the loaded config)
//! - Environment variables (`CC`, `CCACHE_DISABLE`, `CI`, `KILN_SCAN_BUILD`)
//! - Project config: `kiln.toml` at the project root
//!
//! Anything not set falls back to the defaults below, which describe the
//! layout of the test suite kiln was written for.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the project config file.
pub const CONFIG_FILE_NAME: &str = "kiln.toml";

/// Kiln configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configure settings
    pub configure: ConfigureConfig,
}

/// Layout and naming settings for a configure run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigureConfig {
    /// Scratch build root, relative to the project root
    pub build_dir: PathBuf,

    /// Directories walked for sources, in order
    pub source_dirs: Vec<PathBuf>,

    /// Directory holding example programs (gets harness flags)
    pub examples_dir: PathBuf,

    /// Include directories for every compile
    pub include_dirs: Vec<PathBuf>,

    /// Extra include directories for C++ compiles
    pub cxx_include_dirs: Vec<PathBuf>,

    /// Include directory for the example harness
    pub harness_include_dir: PathBuf,

    /// Header force-included into every example program
    pub harness_header: String,

    /// Prefix for preprocessor macros the test harness understands
    pub macro_prefix: String,

    /// Files whose name contains this marker are skipped
    pub benchmark_marker: String,

    /// Script that extracts unit-test registrations from object files
    pub registration_generator: PathBuf,

    /// Variant families run by the `more` target
    pub more_variants: Vec<String>,

    /// Add a variant that runs the debug build under valgrind
    pub valgrind: bool,
}

impl Default for ConfigureConfig {
    fn default() -> Self {
        ConfigureConfig {
            build_dir: PathBuf::from("test/.build"),
            source_dirs: vec![
                PathBuf::from("test/src"),
                PathBuf::from("util"),
                PathBuf::from("examples"),
            ],
            examples_dir: PathBuf::from("examples"),
            include_dirs: vec![
                PathBuf::from("include"),
                PathBuf::from("util"),
                PathBuf::from("examples"),
                PathBuf::from("test/src"),
            ],
            cxx_include_dirs: vec![PathBuf::from("bindings/cxx/include")],
            harness_include_dir: PathBuf::from("test/src/pottery/isystem"),
            harness_header: "pottery/unit/test_pottery_example.h".to_string(),
            macro_prefix: "POTTERY".to_string(),
            benchmark_marker: "benchmark".to_string(),
            registration_generator: PathBuf::from(
                "test/tools/generate-unit-test-registrations.sh",
            ),
            more_variants: vec![
                "default".to_string(),
                "c++17".to_string(),
                "gnu89".to_string(),
            ],
            valgrind: false,
        }
    }
}

impl ConfigureConfig {
    /// Name of a harness macro, e.g. `POTTERY_UNIT_TEST`.
    pub fn macro_name(&self, suffix: &str) -> String {
        if self.macro_prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.macro_prefix, suffix)
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }
}

/// Load the project config from `<project_root>/kiln.toml`.
pub fn load_config(project_root: &Path) -> Config {
    Config::load_or_default(&project_root.join(CONFIG_FILE_NAME))
}

/// Environment variables that influence a configure run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// `CC`: compiler override
    pub cc: Option<String>,
    /// `CCACHE_DISABLE=true`: never wrap compiles in ccache
    pub ccache_disabled: bool,
    /// `CI` set: running under continuous integration
    pub ci: bool,
    /// `KILN_SCAN_BUILD=true`: static-analysis-only run
    pub scan_build: bool,
}

impl Environment {
    /// Read the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Environment {
            cc: lookup("CC").filter(|cc| !cc.is_empty()),
            ccache_disabled: lookup("CCACHE_DISABLE").as_deref() == Some("true"),
            ci: lookup("CI").is_some(),
            scan_build: lookup("KILN_SCAN_BUILD").as_deref() == Some("true"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.configure.build_dir, PathBuf::from("test/.build"));
        assert_eq!(config.configure.source_dirs.len(), 3);
        assert!(!config.configure.valgrind);
        assert_eq!(config.configure.macro_name("UNIT_TEST"), "POTTERY_UNIT_TEST");
    }

    #[test]
    fn test_config_load_partial() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE_NAME);

        std::fs::write(
            &config_path,
            r#"
[configure]
build_dir = "out"
macro_prefix = "MYLIB"
more_variants = ["default"]
valgrind = true
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.configure.build_dir, PathBuf::from("out"));
        assert_eq!(config.configure.macro_name("JEMALLOC"), "MYLIB_JEMALLOC");
        assert_eq!(config.configure.more_variants, vec!["default"]);
        assert!(config.configure.valgrind);
        // Unset keys keep their defaults
        assert_eq!(config.configure.benchmark_marker, "benchmark");
    }

    #[test]
    fn test_config_load_or_default_on_garbage() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "this is [not toml").unwrap();

        let config = Config::load_or_default(&config_path);
        assert_eq!(config.configure, ConfigureConfig::default());
    }

    #[test]
    fn test_missing_config_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path());
        assert_eq!(config.configure, ConfigureConfig::default());
    }

    #[test]
    fn test_environment_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("CC", "clang"),
            ("CCACHE_DISABLE", "true"),
            ("CI", ""),
            ("KILN_SCAN_BUILD", "false"),
        ]
        .into_iter()
        .collect();

        let env = Environment::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(env.cc.as_deref(), Some("clang"));
        assert!(env.ccache_disabled);
        assert!(env.ci);
        assert!(!env.scan_build);
    }

    #[test]
    fn test_environment_empty() {
        let env = Environment::from_lookup(|_| None);
        assert_eq!(env, Environment::default());
    }
}
