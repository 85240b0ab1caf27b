//! Empirical compiler-flag probing with a persistent cache.
//!
//! A flag set is supported when the compiler builds a tiny probe program
//! with strict warnings-as-errors plus that flag set. Nothing is assumed
//! from the compiler's brand or version. Results are memoized in a
//! [`ProbeCache`] that is loaded once at the start of a run and saved once
//! at the end.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::toolchain::Toolchain;
use crate::util::fs::{write_atomic, write_string};
use crate::util::process::CommandRunner;

/// Probe program compiled for every uncached flag set.
///
/// The array dereference pulls in sanitizer runtimes when probing
/// `-fsanitize`; comparing two pointers from the array keeps
/// `-Wzero-as-null-pointer-constant` quiet. `stdlib.h` pulls in
/// `features.h` so `_FORTIFY_SOURCE` is checked properly.
pub const PROBE_SOURCE: &str = r#"
#include <stdlib.h>

int main(int argc, char** argv) {
    return argv[argc - 1] == argv[0];
}
"#;

/// Stem of the probe source and executable inside the build root.
pub const PROBE_STEM: &str = "flagtest";

/// Separator between tokens in the on-disk cache key.
const KEY_SEPARATOR: char = '|';
const KEY_ESCAPE: char = '\\';

/// An ordered set of flag tokens; the cache key.
///
/// Order matters: `["-x", "c++", "-std=c++17"]` and `["-std=c++17", "-x", "c++"]`
/// are different probes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FlagSet(Vec<String>);

impl FlagSet {
    pub fn new(tokens: Vec<String>) -> Self {
        FlagSet(tokens)
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.0
    }

    /// Encode as a single string key. Tokens are joined with `|`; literal
    /// `|` and `\` inside tokens are backslash-escaped.
    pub fn encode(&self) -> String {
        let mut key = String::new();
        for (i, token) in self.0.iter().enumerate() {
            if i > 0 {
                key.push(KEY_SEPARATOR);
            }
            for c in token.chars() {
                if c == KEY_SEPARATOR || c == KEY_ESCAPE {
                    key.push(KEY_ESCAPE);
                }
                key.push(c);
            }
        }
        key
    }

    /// Inverse of [`FlagSet::encode`]. A trailing unpaired `\` is kept
    /// as a literal.
    pub fn decode(key: &str) -> Self {
        if key.is_empty() {
            return FlagSet::default();
        }
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut chars = key.chars();
        while let Some(c) = chars.next() {
            match c {
                KEY_ESCAPE => current.push(chars.next().unwrap_or(KEY_ESCAPE)),
                KEY_SEPARATOR => tokens.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        tokens.push(current);
        FlagSet(tokens)
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl From<&str> for FlagSet {
    fn from(flag: &str) -> Self {
        FlagSet(vec![flag.to_string()])
    }
}

impl From<String> for FlagSet {
    fn from(flag: String) -> Self {
        FlagSet(vec![flag])
    }
}

impl From<Vec<String>> for FlagSet {
    fn from(tokens: Vec<String>) -> Self {
        FlagSet(tokens)
    }
}

impl From<&[String]> for FlagSet {
    fn from(tokens: &[String]) -> Self {
        FlagSet(tokens.to_vec())
    }
}

impl From<&[&str]> for FlagSet {
    fn from(tokens: &[&str]) -> Self {
        FlagSet(tokens.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for FlagSet {
    fn from(tokens: [&str; N]) -> Self {
        FlagSet(tokens.iter().map(|s| s.to_string()).collect())
    }
}

/// On-disk cache layout.
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    compiler: String,
    flags: BTreeMap<String, bool>,
}

/// Probe results for one compiler identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCache {
    compiler: String,
    flags: BTreeMap<FlagSet, bool>,
}

impl ProbeCache {
    /// An empty cache for `compiler`.
    pub fn new(compiler: impl Into<String>) -> Self {
        ProbeCache {
            compiler: compiler.into(),
            flags: BTreeMap::new(),
        }
    }

    /// Load the cache for `compiler` from `path`.
    ///
    /// Never fails: a missing file, an unreadable file, or a file recorded
    /// under a different compiler all yield an empty cache.
    pub fn load(path: &Path, compiler: &str) -> Self {
        if !path.exists() {
            tracing::debug!("No cached configuration at {}", path.display());
            return ProbeCache::new(compiler);
        }

        tracing::info!("Loading cached configuration");
        let file = match read_cache_file(path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Error loading cached configuration. Discarding. ({:#})", e);
                return ProbeCache::new(compiler);
            }
        };

        if file.compiler != compiler {
            tracing::info!("Compiler is different. Discarding cached configuration.");
            return ProbeCache::new(compiler);
        }

        ProbeCache {
            compiler: file.compiler,
            flags: file
                .flags
                .into_iter()
                .map(|(key, supported)| (FlagSet::decode(&key), supported))
                .collect(),
        }
    }

    /// Write the cache to `path`, replacing any previous file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = CacheFile {
            compiler: self.compiler.clone(),
            flags: self
                .flags
                .iter()
                .map(|(set, &supported)| (set.encode(), supported))
                .collect(),
        };
        let json = serde_json::to_string_pretty(&file)
            .context("failed to serialize probe cache")?;
        write_atomic(path, &json)
    }

    pub fn compiler(&self) -> &str {
        &self.compiler
    }

    pub fn get(&self, flags: &FlagSet) -> Option<bool> {
        self.flags.get(flags).copied()
    }

    pub fn insert(&mut self, flags: FlagSet, supported: bool) {
        self.flags.insert(flags, supported);
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

fn read_cache_file(path: &Path) -> Result<CacheFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Tests flags against the detected compiler, memoizing into a cache.
pub struct FlagProber<'a> {
    toolchain: &'a dyn Toolchain,
    runner: &'a dyn CommandRunner,
    cache: &'a mut ProbeCache,
    source: PathBuf,
    exe: PathBuf,
    source_written: bool,
    invocations: usize,
}

impl<'a> FlagProber<'a> {
    /// Create a prober writing its scratch files into `scratch_dir`.
    pub fn new(
        toolchain: &'a dyn Toolchain,
        runner: &'a dyn CommandRunner,
        cache: &'a mut ProbeCache,
        scratch_dir: &Path,
    ) -> Self {
        let exe_name = format!("{}{}", PROBE_STEM, toolchain.exe_extension());
        FlagProber {
            toolchain,
            runner,
            cache,
            source: scratch_dir.join(format!("{}.c", PROBE_STEM)),
            exe: scratch_dir.join(exe_name),
            source_written: false,
            invocations: 0,
        }
    }

    pub fn toolchain(&self) -> &'a dyn Toolchain {
        self.toolchain
    }

    /// Path of the probe executable (also the stem for depfile probes).
    pub fn scratch_exe(&self) -> &Path {
        &self.exe
    }

    /// Number of compiler invocations made by this prober.
    pub fn invocations(&self) -> usize {
        self.invocations
    }

    /// Whether the compiler accepts `flags`.
    ///
    /// Cached verdicts are returned without running anything. A failed
    /// probe is an ordinary `false`; only scratch-file I/O errors are
    /// reported as errors.
    pub fn check_flags(&mut self, flags: impl Into<FlagSet>) -> Result<bool> {
        let flags = flags.into();
        if let Some(supported) = self.cache.get(&flags) {
            return Ok(supported);
        }

        self.ensure_source()?;
        let cmd = self
            .toolchain
            .probe_command(&self.source, &self.exe, flags.tokens());
        self.invocations += 1;

        let supported = match self.runner.run(&cmd) {
            Ok(output) => output.success(),
            Err(e) => {
                tracing::warn!("Probe `{}` could not run: {:#}", cmd.display_command(), e);
                false
            }
        };

        tracing::info!(
            "Testing flag(s): {} ... {}",
            flags,
            if supported { "Supported." } else { "Not supported." }
        );
        self.cache.insert(flags, supported);
        Ok(supported)
    }

    /// `flags` if supported, otherwise nothing.
    pub fn flags_if_supported(&mut self, flags: impl Into<FlagSet>) -> Result<Vec<String>> {
        let flags = flags.into();
        if self.check_flags(flags.clone())? {
            Ok(flags.into_tokens())
        } else {
            Ok(Vec::new())
        }
    }

    fn ensure_source(&mut self) -> Result<()> {
        if !self.source_written {
            write_string(&self.source, PROBE_SOURCE)?;
            self.source_written = true;
        }
        Ok(())
    }
}
