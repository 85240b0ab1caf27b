//! GNU-style toolchain (GCC, Clang and the small C compilers that mimic them).

use std::path::Path;

use crate::builder::graph::Rule;
use crate::util::process::ProcessBuilder;

use super::{Capabilities, CompilerIdentity, Toolchain};

/// Flags every probe is compiled with on top of the candidate flags.
const PROBE_STRICT_FLAGS: &[&str] = &["-Wall", "-Wextra", "-Wpedantic", "-Werror"];

/// GCC-compatible toolchain.
#[derive(Debug, Clone)]
pub struct GccToolchain {
    identity: CompilerIdentity,
    caps: Capabilities,
}

impl GccToolchain {
    /// Create a new GCC-style toolchain.
    pub fn new(identity: CompilerIdentity) -> Self {
        let caps = identity.family.capabilities();
        GccToolchain { identity, caps }
    }
}

impl Toolchain for GccToolchain {
    fn identity(&self) -> &CompilerIdentity {
        &self.identity
    }

    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    fn probe_command(&self, source: &Path, exe: &Path, flags: &[String]) -> ProcessBuilder {
        ProcessBuilder::new(&self.identity.path)
            .args(PROBE_STRICT_FLAGS)
            .args(flags)
            .arg(source)
            .arg("-o")
            .arg(exe)
    }

    fn depfile_probe(&self, depfile: &Path) -> Option<Vec<String>> {
        Some(vec![
            "-MD".to_string(),
            "-MF".to_string(),
            depfile.display().to_string(),
        ])
    }

    fn compile_rule(&self, launcher: Option<&str>, depfile: bool) -> Rule {
        let mut command = String::new();
        if let Some(launcher) = launcher {
            command.push_str(launcher);
            command.push(' ');
        }
        command.push_str(&self.identity.cc);
        command.push(' ');
        if depfile {
            command.push_str("-MD -MF $out.d ");
        }
        command.push_str("$flags -c $in -o $out");

        let rule = Rule::new("compile").var("command", command);
        if depfile {
            rule.var("deps", "gcc").var("depfile", "$out.d")
        } else {
            rule
        }
    }

    fn link_rule(&self) -> Rule {
        Rule::new("link").var("command", format!("{} $in $flags -o $out", self.identity.cc))
    }

    fn warning_flags(&self) -> Vec<String> {
        let mut flags = vec!["-Wall".to_string(), "-g".to_string()];
        if self.caps.warnings_as_errors {
            flags.push("-Werror".to_string());
        }
        flags
    }

    fn base_link_flags(&self) -> Vec<String> {
        Vec::new()
    }

    fn debug_opt_flags(&self, use_og: bool) -> Vec<String> {
        vec![if use_og { "-Og" } else { "-O0" }.to_string()]
    }

    fn release_opt_flags(&self) -> Vec<String> {
        vec!["-O2".to_string()]
    }

    fn c_language_flags(&self) -> Vec<String> {
        Vec::new()
    }

    fn cxx_language_flags(&self) -> Vec<String> {
        ["-x", "c++", "-std=c++11", "-Wmissing-declarations"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn include_flag(&self, dir: &Path) -> String {
        format!("-I{}", dir.display())
    }

    fn define_flag(&self, name: &str, value: Option<&str>) -> String {
        match value {
            Some(v) => format!("-D{}={}", name, v),
            None => format!("-D{}", name),
        }
    }

    fn forced_include_flags(&self, header: &str) -> Vec<String> {
        vec!["-include".to_string(), header.to_string()]
    }

    fn variant_dir_flags(&self, _dir: &Path) -> Vec<String> {
        Vec::new()
    }
}
