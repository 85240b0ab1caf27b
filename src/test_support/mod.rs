//! Test utilities and mocks for kiln unit tests.
//!
//! The outside world reaches kiln only through
//! [`CommandRunner`](crate::util::process::CommandRunner); [`MockRunner`]
//! scripts it. Probe compiles are recognised by their scratch file and
//! answered by a probe policy, so most tests only list the flags a fake
//! compiler should reject.
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln::test_support::{MockProcessOutput, MockRunner};
//!
//! #[test]
//! fn test_example() {
//!     let runner = MockRunner::new()
//!         .with_executable("cc", "/usr/bin/cc")
//!         .rejecting(["-flto"]);
//!     runner.expect_suffix(" --version", MockProcessOutput::success("clang version 17\n"));
//!     // Use the runner...
//! }
//! ```

pub mod fixtures;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Result};

use crate::builder::probe::PROBE_STEM;
use crate::util::process::{CommandRunner, ProcessBuilder, ProcessOutput};

pub use fixtures::*;

/// Mock process output for testing command execution.
#[derive(Debug, Clone)]
pub struct MockProcessOutput {
    /// Exit status code (0 = success).
    pub status: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl MockProcessOutput {
    /// Create a successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        MockProcessOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Create a failure output with the given stderr and status code.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Create an output with both stdout and stderr.
    pub fn with_output(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    fn to_output(&self) -> ProcessOutput {
        ProcessOutput {
            status: Some(self.status),
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }
}

/// Pattern for matching commands in [`MockRunner`].
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Match if command ends with suffix.
    EndsWith(String),
    /// Match if command contains substring.
    Contains(String),
}

impl CommandPattern {
    /// Check if this pattern matches the given command.
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::EndsWith(s) => cmd.ends_with(s),
            CommandPattern::Contains(s) => cmd.contains(s),
        }
    }
}

/// How probe compiles are answered.
#[derive(Debug, Clone)]
enum ProbePolicy {
    /// Reject probes containing any of these tokens; accept the rest.
    Reject(BTreeSet<String>),
    /// Reject every probe.
    RejectAll,
}

#[derive(Debug, Default)]
struct MockState {
    expectations: Vec<(CommandPattern, MockProcessOutput)>,
    calls: Vec<String>,
}

/// Scripted [`CommandRunner`].
///
/// Commands are matched against expectations first (in registration
/// order), then against the probe policy when they compile the probe
/// program. Anything else is an error,
/// the same as a program that cannot be spawned.
#[derive(Debug)]
pub struct MockRunner {
    executables: HashMap<String, PathBuf>,
    probes: ProbePolicy,
    state: Mutex<MockState>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    /// A runner with nothing on the search path that accepts every probe.
    pub fn new() -> Self {
        MockRunner {
            executables: HashMap::new(),
            probes: ProbePolicy::Reject(BTreeSet::new()),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Put an executable on the fake search path.
    pub fn with_executable(mut self, name: &str, path: impl AsRef<Path>) -> Self {
        self.executables
            .insert(name.to_string(), path.as_ref().to_path_buf());
        self
    }

    /// Fail probes that pass any of these flag tokens.
    pub fn rejecting<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rejected = match self.probes {
            ProbePolicy::Reject(set) => set,
            ProbePolicy::RejectAll => BTreeSet::new(),
        };
        rejected.extend(flags.into_iter().map(Into::into));
        self.probes = ProbePolicy::Reject(rejected);
        self
    }

    /// Fail every probe, as if no working compiler were present.
    pub fn rejecting_all(mut self) -> Self {
        self.probes = ProbePolicy::RejectAll;
        self
    }

    /// Add an expectation for a command ending with a suffix.
    pub fn expect_suffix(&self, suffix: &str, output: MockProcessOutput) {
        self.push(CommandPattern::EndsWith(suffix.to_string()), output);
    }

    /// Add an expectation for a command containing a substring.
    pub fn expect_contains(&self, substring: &str, output: MockProcessOutput) {
        self.push(CommandPattern::Contains(substring.to_string()), output);
    }

    /// Every command run so far, as display strings.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Commands run so far that compiled the probe program.
    pub fn probe_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.contains(PROBE_STEM))
            .collect()
    }

    fn push(&self, pattern: CommandPattern, output: MockProcessOutput) {
        self.lock().expectations.push((pattern, output));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn is_probe(cmd: &ProcessBuilder) -> bool {
        cmd.get_args().iter().any(|a| {
            Path::new(a)
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n == format!("{}.c", PROBE_STEM))
        })
    }

    fn answer_probe(&self, cmd: &ProcessBuilder) -> MockProcessOutput {
        let rejected = match &self.probes {
            ProbePolicy::RejectAll => true,
            ProbePolicy::Reject(flags) => cmd.get_args().iter().any(|a| flags.contains(a)),
        };
        if rejected {
            MockProcessOutput::failure(1, "error: unrecognized command-line option")
        } else {
            MockProcessOutput::success("")
        }
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, cmd: &ProcessBuilder) -> Result<ProcessOutput> {
        let full = cmd.display_command();
        let mut state = self.lock();
        state.calls.push(full.clone());

        if let Some((_, output)) = state
            .expectations
            .iter()
            .find(|(pattern, _)| pattern.matches(&full))
        {
            return Ok(output.to_output());
        }
        drop(state);

        if Self::is_probe(cmd) {
            return Ok(self.answer_probe(cmd).to_output());
        }

        bail!("unexpected command: {}", full)
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        self.executables.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_pattern_matching() {
        assert!(CommandPattern::EndsWith(" -v".into()).matches("/usr/bin/cc -v"));
        assert!(!CommandPattern::EndsWith(" -v".into()).matches("/usr/bin/cc --version"));
        assert!(CommandPattern::Contains("version".into()).matches("gcc --version"));
    }

    #[test]
    fn test_expectations_and_call_log() {
        let runner = MockRunner::new();
        runner.expect_suffix(" --version", MockProcessOutput::success("gcc 12\n"));

        let out = runner
            .run(&ProcessBuilder::new("/usr/bin/gcc").arg("--version"))
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "gcc 12\n");
        assert_eq!(runner.calls(), vec!["/usr/bin/gcc --version"]);
    }

    #[test]
    fn test_unmatched_command_is_error() {
        let runner = MockRunner::new();
        assert!(runner.run(&ProcessBuilder::new("make")).is_err());
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_probe_policy() {
        let runner = MockRunner::new().rejecting(["-flto"]);
        let probe = |flag: &str| {
            ProcessBuilder::new("cc")
                .arg(flag)
                .arg("/tmp/flagtest.c")
                .arg("-o")
                .arg("/tmp/flagtest")
        };
        assert!(runner.run(&probe("-Wall")).unwrap().success());
        assert!(!runner.run(&probe("-flto")).unwrap().success());
        assert_eq!(runner.probe_calls().len(), 2);

        let strict = MockRunner::new().rejecting_all();
        assert!(!strict.run(&probe("-Wall")).unwrap().success());
    }

    #[test]
    fn test_executables() {
        let runner = MockRunner::new().with_executable("cc", "/usr/bin/cc");
        assert_eq!(runner.find_executable("cc"), Some(PathBuf::from("/usr/bin/cc")));
        assert_eq!(runner.find_executable("cl.exe"), None);
    }
}
