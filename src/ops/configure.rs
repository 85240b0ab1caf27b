//! Implementation of `kiln configure`.
//!
//! The run is strictly linear: detect the compiler, load the probe cache,
//! derive the baseline and the variant matrix, walk the sources, emit and
//! write the build graph and help file, then save the cache. The cache is
//! saved even when a later step fails, so probe results are never lost.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::builder::emit::GraphEmitter;
use crate::builder::ninja;
use crate::builder::probe::{FlagProber, ProbeCache};
use crate::builder::sources::collect_sources;
use crate::builder::toolchain::{detect_toolchain, CompilerIdentity, FlagSyntax, Toolchain};
use crate::builder::variant::{build_matrix, derive_baseline, Baseline, HostFacts, VariantSet};
use crate::ops::help::{render_help, HELP_FILE_NAME};
use crate::util::config::{ConfigureConfig, Environment};
use crate::util::fs::{ensure_dir, to_slash, write_atomic};
use crate::util::process::CommandRunner;

/// Name of the probe cache inside the build root.
pub const CACHE_FILE_NAME: &str = "config.json";

/// Name of the generated build file inside the build root.
pub const NINJA_FILE_NAME: &str = "build.ninja";

/// Compiler launcher used when available.
pub const CCACHE: &str = "ccache";

/// Options for a configure run.
#[derive(Debug, Clone, Default)]
pub struct ConfigureOptions {
    /// Project root; sources and the build root are relative to it
    pub project_root: PathBuf,

    /// Build root override (relative to the project root unless absolute)
    pub build_dir: Option<PathBuf>,

    /// Compiler override; takes priority over `CC`
    pub cc: Option<String>,

    /// Ignore the existing probe cache
    pub no_cache: bool,
}

impl ConfigureOptions {
    /// The build root as written into the graph.
    pub fn build_dir<'a>(&'a self, config: &'a ConfigureConfig) -> &'a Path {
        self.build_dir.as_deref().unwrap_or(&config.build_dir)
    }
}

/// What a configure run produced.
#[derive(Debug, Clone)]
pub struct ConfigureResult {
    pub identity: CompilerIdentity,
    /// Variant names, sorted
    pub variants: Vec<String>,
    /// Number of translation units found
    pub sources: usize,
    /// Compiler invocations made for probing
    pub probes: usize,
    pub ninja_path: PathBuf,
    pub help_path: PathBuf,
    pub cache_path: PathBuf,
}

/// Detected compiler plus its probe cache for the duration of a run.
pub struct Session<'r> {
    toolchain: Box<dyn Toolchain>,
    cache: ProbeCache,
    build_root: PathBuf,
    cache_path: PathBuf,
    runner: &'r dyn CommandRunner,
}

impl<'r> Session<'r> {
    /// Detect the compiler and load its cache.
    ///
    /// Fails before touching the filesystem when no compiler is found.
    pub fn open(
        opts: &ConfigureOptions,
        config: &ConfigureConfig,
        env: &Environment,
        runner: &'r dyn CommandRunner,
    ) -> Result<Self> {
        let cc = opts.cc.as_deref().or(env.cc.as_deref());
        let toolchain = detect_toolchain(cc, runner)?;

        let build_root = opts.project_root.join(opts.build_dir(config));
        ensure_dir(&build_root)?;

        let cache_path = build_root.join(CACHE_FILE_NAME);
        let compiler_key = toolchain.identity().cache_key();
        let cache = if opts.no_cache {
            tracing::info!("Ignoring cached configuration");
            ProbeCache::new(compiler_key)
        } else {
            ProbeCache::load(&cache_path, &compiler_key)
        };

        Ok(Session {
            toolchain,
            cache,
            build_root,
            cache_path,
            runner,
        })
    }

    pub fn toolchain(&self) -> &dyn Toolchain {
        self.toolchain.as_ref()
    }

    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Run `work` with a prober over this session's cache, then save the
    /// cache whether or not `work` succeeded.
    pub fn run<T>(mut self, work: impl FnOnce(&mut FlagProber<'_>) -> Result<T>) -> Result<T> {
        let result = {
            let mut prober = FlagProber::new(
                self.toolchain.as_ref(),
                self.runner,
                &mut self.cache,
                &self.build_root,
            );
            work(&mut prober)
        };

        let saved = self.cache.save(&self.cache_path);
        match (result, saved) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(save_err)) => {
                tracing::warn!("Failed to save probe cache: {:#}", save_err);
                Err(e)
            }
        }
    }
}

/// The compile launcher to use, if any.
///
/// Only GNU-style drivers are wrapped, and never under CI or when ccache
/// is disabled through the environment.
pub fn select_launcher(toolchain: &dyn Toolchain, host: &HostFacts, env: &Environment) -> Option<String> {
    let gnu = toolchain.capabilities().syntax == FlagSyntax::Gnu;
    (gnu && host.ccache && !env.ccache_disabled && !env.ci).then(|| CCACHE.to_string())
}

/// The ninja invocation for the generated file. Graph paths are relative to
/// the project root, so ninja has to run from there.
pub fn ninja_command(opts: &ConfigureOptions, config: &ConfigureConfig) -> String {
    format!(
        "ninja -C {} -f {}",
        to_slash(&opts.project_root),
        to_slash(&opts.build_dir(config).join(NINJA_FILE_NAME))
    )
}

/// Probe the compiler and build the variant matrix.
pub fn plan_variants(
    prober: &mut FlagProber<'_>,
    config: &ConfigureConfig,
    env: &Environment,
    host: &HostFacts,
) -> Result<(Baseline, VariantSet)> {
    let baseline = derive_baseline(prober, config, env)?;
    let variants = build_matrix(prober, &baseline, host, config)?;
    Ok((baseline, variants))
}

/// Run the full configure pipeline.
pub fn configure(
    opts: &ConfigureOptions,
    config: &ConfigureConfig,
    env: &Environment,
    host: &HostFacts,
    runner: &dyn CommandRunner,
) -> Result<ConfigureResult> {
    let session = Session::open(opts, config, env, runner)?;
    let identity = session.toolchain().identity().clone();
    let build_root = session.build_root().to_path_buf();
    let cache_path = session.cache_path().to_path_buf();
    let build_dir = opts.build_dir(config).to_path_buf();

    let (variants, sources, probes) = session.run(|prober| {
        let (baseline, variants) = plan_variants(prober, config, env, host)?;

        let sources = collect_sources(&opts.project_root, config, env.scan_build)?;
        tracing::debug!("Found {} source files", sources.len());

        let tc = prober.toolchain();
        let graph = GraphEmitter::new(tc, &baseline, config, &build_dir)
            .launcher(select_launcher(tc, host, env))
            .emit(&variants, &sources)
            .context("generated build graph is inconsistent")?;

        let ninja_path = build_root.join(NINJA_FILE_NAME);
        write_atomic(&ninja_path, &ninja::render(&graph))?;
        tracing::info!("Generated {}", ninja_path.display());

        write_atomic(&build_root.join(HELP_FILE_NAME), &render_help(&variants))?;

        let names: Vec<String> = variants.names().map(String::from).collect();
        Ok((names, sources.len(), prober.invocations()))
    })?;

    Ok(ConfigureResult {
        identity,
        variants,
        sources,
        probes,
        ninja_path: build_root.join(NINJA_FILE_NAME),
        help_path: build_root.join(HELP_FILE_NAME),
        cache_path,
    })
}
