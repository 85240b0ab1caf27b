//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Kiln - build configuration generator for C test suites
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root containing the sources and kiln.toml
    #[arg(long, global = true, env = "KILN_PROJECT_DIR", default_value = ".")]
    pub project_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe the compiler and write the build graph
    Configure(ConfigureArgs),

    /// Check whether the compiler accepts a set of flags
    Probe(ProbeArgs),

    /// List the build variants the compiler supports
    Variants(VariantsArgs),

    /// Show the detected compiler
    Toolchain(ToolchainArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct ConfigureArgs {
    /// Compiler to use (overrides CC)
    #[arg(long)]
    pub cc: Option<String>,

    /// Build root, relative to the project root
    #[arg(long, env = "KILN_BUILD_DIR")]
    pub build_dir: Option<PathBuf>,

    /// Ignore cached probe results
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Args)]
pub struct ProbeArgs {
    /// Flags to test together
    #[arg(required = true, allow_hyphen_values = true)]
    pub flags: Vec<String>,

    /// Compiler to use (overrides CC)
    #[arg(long)]
    pub cc: Option<String>,

    /// Build root, relative to the project root
    #[arg(long, env = "KILN_BUILD_DIR")]
    pub build_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct VariantsArgs {
    /// Compiler to use (overrides CC)
    #[arg(long)]
    pub cc: Option<String>,

    /// Build root, relative to the project root
    #[arg(long, env = "KILN_BUILD_DIR")]
    pub build_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct ToolchainArgs {
    /// Compiler to use (overrides CC)
    #[arg(long)]
    pub cc: Option<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
