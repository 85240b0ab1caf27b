//! Toolchain detection functions.

use std::path::Path;

use anyhow::Result;

use crate::util::process::{CommandRunner, ProcessBuilder, ProcessOutput};

use super::{
    CompilerFamily, CompilerIdentity, FlagSyntax, GccToolchain, MsvcToolchain, Toolchain,
    ToolchainError,
};

/// Executable name of the MSVC launcher.
const MSVC_LAUNCHER: &str = "cl.exe";

/// Basename suffixes of small compilers, checked in order.
const SUFFIX_FAMILIES: &[(&str, CompilerFamily)] = &[
    ("cproc", CompilerFamily::Cproc),
    ("chibicc", CompilerFamily::Chibicc),
    ("8cc", CompilerFamily::EightCc),
];

/// Detect the compiler for this run.
///
/// Fails with [`ToolchainError::CompilerNotFound`] when the selected
/// executable is not on the search path.
pub fn detect_toolchain(
    cc_override: Option<&str>,
    runner: &dyn CommandRunner,
) -> Result<Box<dyn Toolchain>> {
    let identity = select_compiler(cc_override, runner)?;
    tracing::info!(
        "Using {} compiler with executable: {}",
        identity.family,
        identity.cc
    );
    Ok(toolchain_for(identity))
}

/// Wrap an identity in the toolchain matching its command-line syntax.
pub fn toolchain_for(identity: CompilerIdentity) -> Box<dyn Toolchain> {
    match identity.family.capabilities().syntax {
        FlagSyntax::Msvc => Box::new(MsvcToolchain::new(identity)),
        FlagSyntax::Gnu => Box::new(GccToolchain::new(identity)),
    }
}

/// Choose, locate and classify the compiler executable.
pub fn select_compiler(
    cc_override: Option<&str>,
    runner: &dyn CommandRunner,
) -> Result<CompilerIdentity, ToolchainError> {
    let cc = match cc_override {
        Some(cc) => cc.to_string(),
        None if runner.find_executable(MSVC_LAUNCHER).is_some() => "cl".to_string(),
        None => "cc".to_string(),
    };

    let path = runner
        .find_executable(&cc)
        .ok_or_else(|| ToolchainError::CompilerNotFound { name: cc.clone() })?;

    let family = classify_compiler(&cc, &path, runner);
    Ok(CompilerIdentity::new(family, cc, path))
}

/// Classify a compiler. The first matching rule wins.
///
/// 1. The MSVC launcher name.
/// 2. A known small-compiler basename suffix.
/// 3. `--version` output: starts with `cparser `, or mentions `clang`.
/// 4. `-v` output (stdout and stderr): a line starting with `tcc ` or `gcc `.
pub fn classify_compiler(cc: &str, path: &Path, runner: &dyn CommandRunner) -> CompilerFamily {
    let lower = cc.to_lowercase();
    if lower == "cl" || lower == MSVC_LAUNCHER {
        return CompilerFamily::Msvc;
    }

    let basename = Path::new(cc)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(cc);
    for (suffix, family) in SUFFIX_FAMILIES {
        if basename.ends_with(suffix) {
            return *family;
        }
    }

    if let Some(out) = query(runner, path, "--version") {
        if out.success() {
            if out.stdout.starts_with("cparser ") {
                return CompilerFamily::Cparser;
            }
            if out.stdout.contains("clang") {
                return CompilerFamily::Clang;
            }
        }
    }

    if let Some(out) = query(runner, path, "-v") {
        if out.success() {
            let combined = format!("{}\n{}", out.stdout, out.stderr);
            for line in combined.lines() {
                if line.starts_with("tcc ") {
                    return CompilerFamily::TinyCc;
                }
                if line.starts_with("gcc ") {
                    return CompilerFamily::Gcc;
                }
            }
        }
    }

    CompilerFamily::Unknown
}

fn query(
    runner: &dyn CommandRunner,
    path: &Path,
    arg: &str,
) -> Option<ProcessOutput> {
    match runner.run(&ProcessBuilder::new(path).arg(arg)) {
        Ok(out) => Some(out),
        Err(e) => {
            tracing::debug!("`{} {}` could not run: {:#}", path.display(), arg, e);
            None
        }
    }
}
