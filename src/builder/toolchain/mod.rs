//! Toolchain abstraction for C/C++ compilers.
//!
//! Detection resolves one compiler executable per run and classifies it into
//! a [`CompilerFamily`]. Everything downstream branches on the
//! [`Capabilities`] record computed from that family, never on the family
//! name itself, and asks the [`Toolchain`] for syntax-specific flags.
//!
//! Compiler selection priority:
//! 1. Explicit override (`--cc` or the `CC` environment variable)
//! 2. The MSVC launcher `cl.exe`, when it is on the search path
//! 3. The generic `cc`

use std::fmt;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use crate::builder::graph::Rule;
use crate::util::process::ProcessBuilder;

mod detect;
mod gcc;
mod msvc;

pub use detect::{classify_compiler, detect_toolchain, select_compiler, toolchain_for};
pub use gcc::GccToolchain;
pub use msvc::MsvcToolchain;

/// Errors raised while locating the compiler.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolchainError {
    #[error("compiler cannot be found: `{name}`")]
    #[diagnostic(
        code(kiln::toolchain::not_found),
        help("Install a C compiler or point CC (or --cc) at one that is on PATH")
    )]
    CompilerNotFound { name: String },
}

/// The known compiler families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CompilerFamily {
    /// Microsoft Visual C++ (`cl.exe`)
    Msvc,
    /// GNU Compiler Collection
    Gcc,
    /// Clang/LLVM
    Clang,
    /// Tiny C Compiler
    TinyCc,
    /// cproc
    Cproc,
    /// chibicc
    Chibicc,
    /// 8cc
    EightCc,
    /// cparser (libfirm)
    Cparser,
    /// Anything else; treated as a GCC-compatible driver
    Unknown,
}

impl CompilerFamily {
    /// Get the family name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilerFamily::Msvc => "MSVC",
            CompilerFamily::Gcc => "GCC",
            CompilerFamily::Clang => "Clang",
            CompilerFamily::TinyCc => "TinyCC",
            CompilerFamily::Cproc => "cproc",
            CompilerFamily::Chibicc => "chibicc",
            CompilerFamily::EightCc => "8cc",
            CompilerFamily::Cparser => "cparser",
            CompilerFamily::Unknown => "unknown",
        }
    }

    /// Compute the capability record for this family.
    pub fn capabilities(&self) -> Capabilities {
        use CompilerFamily::*;

        let syntax = match self {
            Msvc => FlagSyntax::Msvc,
            _ => FlagSyntax::Gnu,
        };

        let cxx = match self {
            Msvc => CxxSupport::Always,
            // TinyCC silently ignores `-x c++`
            TinyCc => CxxSupport::Never,
            Clang => CxxSupport::Probe { prefer_libcxx: true },
            _ => CxxSupport::Probe {
                prefer_libcxx: false,
            },
        };

        Capabilities {
            syntax,
            object_extension: if syntax == FlagSyntax::Msvc { ".obj" } else { ".o" },
            exe_extension: if syntax == FlagSyntax::Msvc { ".exe" } else { "" },
            // cparser warns about too much macro-expanded code to use -Werror
            warnings_as_errors: *self != Cparser,
            // Clang maps -Og to -O1, which breaks debugging
            prefers_og: *self == Gcc,
            // -Wfatal-errors is broken on GCC (gcc bug 97687)
            max_errors_flag: *self == Gcc,
            cxx,
            // TinyCC ignores most variant options; cproc accepts _Alignas in
            // C99 mode with no way to detect it
            gnu_variants: matches!(self, Gcc | Clang | Chibicc | EightCc | Cparser),
            msvc_variants: *self == Msvc,
            auto_registration: matches!(self, Gcc | Clang | Msvc),
        }
    }
}

impl fmt::Display for CompilerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command-line syntax understood by a compiler driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagSyntax {
    /// `-Wall -c foo.c -o foo.o`
    Gnu,
    /// `/W4 /c foo.c /Fofoo.obj`
    Msvc,
}

/// How C++ support is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CxxSupport {
    /// Always available.
    Always,
    /// Never attempted.
    Never,
    /// Probe `-x c++` with a C++ runtime; libc++ is tried first when preferred.
    Probe { prefer_libcxx: bool },
}

/// Everything downstream needs to know about a compiler family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub syntax: FlagSyntax,
    /// Object file suffix, including the dot
    pub object_extension: &'static str,
    /// Executable suffix, including the dot (empty on Unix-style drivers)
    pub exe_extension: &'static str,
    /// Whether `-Werror` is part of the baseline
    pub warnings_as_errors: bool,
    /// Whether to use `-Og` for debug builds (still probed)
    pub prefers_og: bool,
    /// Use `-fmax-errors=1` instead of probing `-Wfatal-errors`
    pub max_errors_flag: bool,
    pub cxx: CxxSupport,
    /// GNU-style standard/LTO/C++ variant families apply
    pub gnu_variants: bool,
    /// MSVC variant families apply
    pub msvc_variants: bool,
    /// Unit tests register themselves at startup
    pub auto_registration: bool,
}

/// The resolved compiler for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerIdentity {
    pub family: CompilerFamily,
    /// The compiler name as selected (`cc`, `cl`, the `CC` value...)
    pub cc: String,
    /// The executable found on the search path
    pub path: PathBuf,
}

impl CompilerIdentity {
    pub fn new(family: CompilerFamily, cc: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        CompilerIdentity {
            family,
            cc: cc.into(),
            path: path.into(),
        }
    }

    /// Key under which probe results are cached.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.family.as_str(), self.cc)
    }
}

impl fmt::Display for CompilerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.family, self.cc)
    }
}

/// Trait for toolchain implementations.
///
/// Each toolchain knows the flag spelling and rule commands for its
/// command-line syntax.
pub trait Toolchain: Send + Sync {
    /// The classified compiler.
    fn identity(&self) -> &CompilerIdentity;

    /// Capabilities of the compiler family.
    fn capabilities(&self) -> &Capabilities;

    /// Command that compiles `source` into `exe` with strict warnings plus `flags`.
    fn probe_command(&self, source: &Path, exe: &Path, flags: &[String]) -> ProcessBuilder;

    /// Flags that make the compiler write a dependency file, if it can.
    fn depfile_probe(&self, depfile: &Path) -> Option<Vec<String>>;

    /// The `compile` rule declaration.
    fn compile_rule(&self, launcher: Option<&str>, depfile: bool) -> Rule;

    /// The `link` rule declaration.
    fn link_rule(&self) -> Rule;

    /// Baseline warning and debug-info flags.
    fn warning_flags(&self) -> Vec<String>;

    /// Baseline linker flags.
    fn base_link_flags(&self) -> Vec<String>;

    /// Optimization flags for debug builds.
    fn debug_opt_flags(&self, use_og: bool) -> Vec<String>;

    /// Optimization flags for release builds.
    fn release_opt_flags(&self) -> Vec<String>;

    /// Flags that select C for a source file.
    fn c_language_flags(&self) -> Vec<String>;

    /// Flags that select C++ for a source file.
    fn cxx_language_flags(&self) -> Vec<String>;

    /// Add an include directory.
    fn include_flag(&self, dir: &Path) -> String;

    /// Define a preprocessor macro.
    fn define_flag(&self, name: &str, value: Option<&str>) -> String;

    /// Force-include a header before the source.
    fn forced_include_flags(&self, header: &str) -> Vec<String>;

    /// Flags scoping per-variant side files (e.g. PDBs) to the variant directory.
    fn variant_dir_flags(&self, dir: &Path) -> Vec<String>;

    /// Object file suffix.
    fn object_extension(&self) -> &str {
        self.capabilities().object_extension
    }

    /// Executable suffix.
    fn exe_extension(&self) -> &str {
        self.capabilities().exe_extension
    }
}
