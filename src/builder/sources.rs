//! Source tree discovery.
//!
//! Walks the configured source directories and classifies files into C and
//! C++ translation units. Benchmarks are never compiled, and a
//! static-analysis run skips the example programs entirely.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use walkdir::WalkDir;

use crate::util::config::ConfigureConfig;
use crate::util::fs::{relative_path, to_slash};

/// Matches an entry point declared with no parameters.
const MAIN_VOID_PATTERN: &str = r"\bmain\s*\(\s*void\s*\)";

/// Source language for a translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Language {
    /// C language (default)
    #[default]
    C,
    /// C++ language
    Cxx,
}

impl Language {
    /// Get the language name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
        }
    }

    /// Classify a file by extension: `.c` is C, `.cxx` is C++.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("c") => Some(Language::C),
            Some("cxx") => Some(Language::Cxx),
            _ => None,
        }
    }
}

/// A translation unit found in the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the project root, with `/` separators
    pub path: String,
    pub language: Language,
    /// Lives under the examples directory and gets the example harness
    pub example: bool,
    /// Example whose `main` takes no arguments
    pub main_void: bool,
}

impl SourceFile {
    /// The path without its extension; object files are named after it.
    pub fn stem_path(&self) -> &str {
        match self.path.rfind('.') {
            Some(dot) if !self.path[dot..].contains('/') => &self.path[..dot],
            _ => &self.path,
        }
    }

    /// Object path relative to a variant's object directory.
    pub fn object_name(&self, object_extension: &str) -> String {
        format!("{}{}", self.stem_path(), object_extension)
    }

    /// The example name macro value: path separators become `_`, cut at the first `.`.
    pub fn example_slug(&self) -> String {
        let slug = self.path.replace(['/', '\\'], "_");
        match slug.split('.').next() {
            Some(head) => head.to_string(),
            None => slug,
        }
    }
}

/// Walk the configured source directories below `root`.
///
/// Directories are visited in configured order and entries sorted by name,
/// so the result is stable across runs. Missing directories are skipped.
pub fn collect_sources(
    root: &Path,
    config: &ConfigureConfig,
    scan_build: bool,
) -> Result<Vec<SourceFile>> {
    let main_void = Regex::new(MAIN_VOID_PATTERN).context("invalid entry-point pattern")?;
    let mut seen = BTreeSet::new();
    let mut sources = Vec::new();

    for dir in &config.source_dirs {
        let base = root.join(dir);
        if !base.is_dir() {
            tracing::debug!("Skipping missing source directory {}", base.display());
            continue;
        }

        for entry in WalkDir::new(&base).sort_by_file_name() {
            let entry =
                entry.with_context(|| format!("failed to walk {}", base.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel: PathBuf = relative_path(root, entry.path());
            let name = entry.file_name().to_string_lossy();
            tracing::debug!("{}", to_slash(&rel));

            if !config.benchmark_marker.is_empty() && name.contains(&config.benchmark_marker) {
                continue;
            }

            let example = rel.starts_with(&config.examples_dir);
            if example && scan_build {
                continue;
            }

            let Some(language) = Language::from_path(&rel) else {
                continue;
            };

            let path = to_slash(&rel);
            if !seen.insert(path.clone()) {
                continue;
            }

            let main_void = example && {
                // Only ASCII matters to the pattern
                let bytes = std::fs::read(entry.path())
                    .with_context(|| format!("failed to read {}", entry.path().display()))?;
                main_void.is_match(&String::from_utf8_lossy(&bytes))
            };

            sources.push(SourceFile {
                path,
                language,
                example,
                main_void,
            });
        }
    }

    Ok(sources)
}
