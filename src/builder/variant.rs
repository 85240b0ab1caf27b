//! Build variants and the variant matrix.
//!
//! A variant is a fully specified configuration producing its own objects
//! and runner. The matrix is derived in two steps: [`derive_baseline`]
//! probes the compiler once for the flags every variant shares, then
//! [`build_matrix`] expands the variant families the compiler's
//! capabilities and probe results allow, each into a `-debug`/`-release`
//! pair.
//!
//! Given the same compiler identity and probe cache, the result is
//! identical across runs.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::flags::{FlagList, Stage};
use crate::builder::probe::{FlagProber, FlagSet};
use crate::builder::sources::Language;
use crate::builder::toolchain::{CxxSupport, FlagSyntax};
use crate::util::config::{ConfigureConfig, Environment};
use crate::util::process::CommandRunner;

/// Header whose presence enables the jemalloc family on Linux.
pub const JEMALLOC_HEADER: &str = "/usr/include/jemalloc/jemalloc.h";

/// Run wrapper of the memory-checking family.
pub const VALGRIND: &str = "valgrind";

/// Probed and added to every GNU-style compile when supported.
const EXTRA_WARNINGS: &[&str] = &[
    "-Wextra",
    "-Wpedantic",
    "-Wmissing-variable-declarations",
    "-Wfloat-conversion",
    "-Wconversion",
    "-Wundef",
    "-Wshadow",
    "-Wcast-qual",
    "-fPIC",
    "-fstrict-aliasing",
    "-fno-omit-frame-pointer",
];

const STRICT_ALIASING: &[&str] = &["-Wstrict-aliasing=3", "-Wstrict-aliasing=2", "-Wstrict-aliasing"];

const COLOR_DIAGNOSTICS: &[&str] = &["-fdiagnostics-color=always", "-fcolor-diagnostics"];

/// Debug or release half of a variant pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Configuration {
    Debug,
    Release,
}

impl Configuration {
    pub const ALL: [Configuration; 2] = [Configuration::Debug, Configuration::Release];

    pub fn as_str(&self) -> &'static str {
        match self {
            Configuration::Debug => "debug",
            Configuration::Release => "release",
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts about the host gathered once per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostFacts {
    /// jemalloc headers are installed in the system include path
    pub jemalloc: bool,
    /// `valgrind` is on the search path
    pub valgrind: bool,
    /// `ccache` is on the search path
    pub ccache: bool,
}

impl HostFacts {
    pub fn detect(runner: &dyn CommandRunner) -> Self {
        HostFacts {
            jemalloc: cfg!(target_os = "linux") && Path::new(JEMALLOC_HEADER).exists(),
            valgrind: runner.find_executable(VALGRIND).is_some(),
            ccache: runner.find_executable("ccache").is_some(),
        }
    }
}

/// A named build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildVariant {
    pub name: String,
    /// Flags shared by every compile
    pub cppflags: Vec<String>,
    /// Language flags for C sources
    pub cflags: Vec<String>,
    /// Language flags for C++ sources
    pub cxxflags: Vec<String>,
    /// Language-agnostic overrides (LTO, allocator)
    pub overrides: Vec<String>,
    /// Debug or release flags
    pub config_flags: Vec<String>,
    pub ldflags: Vec<String>,
    /// Command the runner is executed under
    pub run_wrapper: Option<String>,
    /// Left out of the `all` aggregate
    pub exclude: bool,
}

impl BuildVariant {
    /// Compile flags for a source of the given language, in precedence order.
    ///
    /// Per-file flags can be added to the [`Stage::Source`] bucket of the
    /// result and still land before the configuration flags.
    pub fn compile_flags(&self, language: Language) -> FlagList {
        let lang = match language {
            Language::C => &self.cflags,
            Language::Cxx => &self.cxxflags,
        };
        FlagList::new()
            .with(Stage::Common, self.cppflags.iter().cloned())
            .with(Stage::Language, lang.iter().cloned())
            .with(Stage::Variant, self.overrides.iter().cloned())
            .with(Stage::Configuration, self.config_flags.iter().cloned())
    }
}

/// Variants by name. Registering a name again replaces the earlier entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantSet {
    variants: BTreeMap<String, BuildVariant>,
}

impl VariantSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variant, returning the one it replaced.
    pub fn insert(&mut self, variant: BuildVariant) -> Option<BuildVariant> {
        let previous = self.variants.insert(variant.name.clone(), variant);
        if let Some(ref old) = previous {
            tracing::debug!("Variant {} redefined", old.name);
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&BuildVariant> {
        self.variants.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variants.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Variants in name order.
    pub fn iter(&self) -> impl Iterator<Item = &BuildVariant> {
        self.variants.values()
    }

    /// Variant names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    fn add_pair(&mut self, family: &str, baseline: &Baseline, flavor: Flavor) {
        for config in Configuration::ALL {
            self.insert(flavor.variant(
                format!("{}-{}", family, config),
                baseline,
                baseline.config_flags(config).to_vec(),
            ));
        }
    }
}

/// Flags shared by all variants, derived once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    pub cppflags: Vec<String>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub debug: Vec<String>,
    pub release: Vec<String>,
    /// C++ sources can be compiled and linked
    pub supports_cxx: bool,
    /// The compiler writes dependency files
    pub depfile: bool,
    /// Unit tests need a generated registration file
    pub manual_registration: bool,
}

impl Baseline {
    pub fn config_flags(&self, config: Configuration) -> &[String] {
        match config {
            Configuration::Debug => &self.debug,
            Configuration::Release => &self.release,
        }
    }

    /// C++ flags with the default language standard removed.
    fn cxxflags_without_std(&self) -> Vec<String> {
        self.cxxflags
            .iter()
            .filter(|f| f.as_str() != "-std=c++11")
            .cloned()
            .collect()
    }
}

/// The per-family part of a variant.
#[derive(Debug, Clone)]
struct Flavor {
    cflags: Vec<String>,
    cxxflags: Vec<String>,
    overrides: Vec<String>,
    ldflags: Vec<String>,
}

impl Flavor {
    fn base(baseline: &Baseline) -> Self {
        Flavor {
            cflags: baseline.cflags.clone(),
            cxxflags: baseline.cxxflags.clone(),
            overrides: Vec::new(),
            ldflags: baseline.ldflags.clone(),
        }
    }

    /// Extra C-only flags (a language standard).
    fn c_flags(mut self, flags: &[String]) -> Self {
        self.cflags.extend(flags.iter().cloned());
        self
    }

    fn cxx_flags(mut self, flags: Vec<String>) -> Self {
        self.cxxflags = flags;
        self
    }

    /// Compile every source, C included, with these C++ flags.
    fn all_as_cxx(mut self, flags: Vec<String>) -> Self {
        self.cflags = flags.clone();
        self.cxxflags = flags;
        self
    }

    fn overriding(mut self, flags: &[String]) -> Self {
        self.overrides.extend(flags.iter().cloned());
        self
    }

    fn linking(mut self, flags: &[String]) -> Self {
        self.ldflags.extend(flags.iter().cloned());
        self
    }

    fn variant(&self, name: String, baseline: &Baseline, config_flags: Vec<String>) -> BuildVariant {
        BuildVariant {
            name,
            cppflags: baseline.cppflags.clone(),
            cflags: self.cflags.clone(),
            cxxflags: self.cxxflags.clone(),
            overrides: self.overrides.clone(),
            config_flags,
            ldflags: self.ldflags.clone(),
            run_wrapper: None,
            exclude: false,
        }
    }
}

fn strings(flags: &[&str]) -> Vec<String> {
    flags.iter().map(|s| s.to_string()).collect()
}

fn concat(base: &[String], extra: &[String]) -> Vec<String> {
    base.iter().chain(extra).cloned().collect()
}

/// Append `extra` to `list` when the compiler accepts `list` followed by `extra`.
fn push_if_supported(prober: &mut FlagProber<'_>, list: &mut Vec<String>, extra: &[&str]) -> Result<()> {
    let extra = strings(extra);
    if prober.check_flags(concat(list, &extra))? {
        list.extend(extra);
    }
    Ok(())
}

/// The first supported flag of `candidates`, if any.
fn first_supported(prober: &mut FlagProber<'_>, candidates: &[&str]) -> Result<Option<String>> {
    for flag in candidates {
        if prober.check_flags(*flag)? {
            return Ok(Some(flag.to_string()));
        }
    }
    Ok(None)
}

/// Derive the flags every variant shares.
pub fn derive_baseline(
    prober: &mut FlagProber<'_>,
    config: &ConfigureConfig,
    env: &Environment,
) -> Result<Baseline> {
    let tc = prober.toolchain();
    let caps = *tc.capabilities();
    let gnu = caps.syntax == FlagSyntax::Gnu;

    let mut cppflags = tc.warning_flags();
    cppflags.extend(config.include_dirs.iter().map(|d| tc.include_flag(d)));
    cppflags.push(tc.define_flag(&config.macro_name("UNIT_TEST"), None));
    let mut ldflags = tc.base_link_flags();

    // -Og is only worth it where it keeps debugging intact
    let use_og = caps.prefers_og && prober.check_flags("-Og")?;
    let mut debug = tc.debug_opt_flags(use_og);
    debug.push(tc.define_flag("DEBUG", None));
    let mut release = tc.release_opt_flags();
    release.push(tc.define_flag("NDEBUG", None));

    // Some distributions predefine _FORTIFY_SOURCE at -O2, so check the
    // define together with the optimization flags
    let fortify_debug = tc.define_flag("_FORTIFY_SOURCE", Some("2"));
    push_if_supported(prober, &mut debug, &[fortify_debug.as_str()])?;
    let fortify_release = tc.define_flag("_FORTIFY_SOURCE", Some("1"));
    push_if_supported(prober, &mut release, &[fortify_release.as_str()])?;

    let mut cflags = tc.c_language_flags();
    let mut cxxflags = tc.cxx_language_flags();
    cxxflags.extend(config.cxx_include_dirs.iter().map(|d| tc.include_flag(d)));
    push_if_supported(prober, &mut cxxflags, &["-Wold-style-cast"])?;

    if caps.max_errors_flag {
        cppflags.push("-fmax-errors=1".to_string());
    } else if gnu {
        cppflags.extend(prober.flags_if_supported("-Wfatal-errors")?);
    }

    let supports_cxx = match caps.cxx {
        CxxSupport::Always => true,
        CxxSupport::Never => false,
        CxxSupport::Probe { prefer_libcxx } => {
            let runtimes = if prefer_libcxx {
                ["c++", "stdc++"]
            } else {
                ["stdc++", "c++"]
            };
            let mut found = false;
            for runtime in runtimes {
                let probe = vec![
                    "-x".to_string(),
                    "c++".to_string(),
                    format!("-Wl,-l{}", runtime),
                ];
                if prober.check_flags(probe)? {
                    ldflags.push(format!("-l{}", runtime));
                    found = true;
                    break;
                }
            }
            found
        }
    };

    let mut depfile = false;
    if gnu {
        // Forced colour survives ninja piping compiler output
        if !env.ci {
            cppflags.extend(first_supported(prober, COLOR_DIAGNOSTICS)?);
        }
        cppflags.extend(first_supported(prober, STRICT_ALIASING)?);
        for flag in EXTRA_WARNINGS {
            cppflags.extend(prober.flags_if_supported(*flag)?);
        }
        push_if_supported(prober, &mut cxxflags, &["-Wzero-as-null-pointer-constant"])?;

        let depfile_path = PathBuf::from(format!("{}.d", prober.scratch_exe().display()));
        if let Some(flags) = tc.depfile_probe(&depfile_path) {
            depfile = prober.check_flags(flags)?;
        }

        cflags.extend(prober.flags_if_supported("-Wmissing-prototypes")?);
        cflags.extend(prober.flags_if_supported("-Wc++-compat")?);
    }

    let manual_registration = !caps.auto_registration;
    if manual_registration {
        cppflags.push(tc.define_flag(&config.macro_name("MANUAL_UNIT_TEST_REGISTRATION"), None));
    }

    Ok(Baseline {
        cppflags,
        cflags,
        cxxflags,
        ldflags,
        debug,
        release,
        supports_cxx,
        depfile,
        manual_registration,
    })
}

/// Expand every variant family the compiler supports.
pub fn build_matrix(
    prober: &mut FlagProber<'_>,
    baseline: &Baseline,
    host: &HostFacts,
    config: &ConfigureConfig,
) -> Result<VariantSet> {
    let caps = *prober.toolchain().capabilities();
    let mut set = VariantSet::new();

    set.add_pair("default", baseline, Flavor::base(baseline));

    if caps.msvc_variants {
        add_msvc_families(prober, baseline, &mut set)?;
    }
    if caps.gnu_variants {
        add_gnu_families(prober, baseline, &mut set)?;
    }

    if host.jemalloc {
        let define = prober
            .toolchain()
            .define_flag(&config.macro_name("JEMALLOC"), Some("1"));
        let flavor = Flavor::base(baseline)
            .overriding(&[define])
            .linking(&strings(&["-ljemalloc"]));
        set.add_pair("jemalloc", baseline, flavor);
    }

    if config.valgrind && host.valgrind {
        let mut variant = Flavor::base(baseline).variant(
            "valgrind-debug".to_string(),
            baseline,
            baseline.debug.clone(),
        );
        variant.run_wrapper = Some(VALGRIND.to_string());
        variant.exclude = true;
        set.insert(variant);
    }

    Ok(set)
}

fn add_msvc_families(
    prober: &mut FlagProber<'_>,
    baseline: &Baseline,
    set: &mut VariantSet,
) -> Result<()> {
    let lto = Flavor::base(baseline)
        .overriding(&strings(&["/GL"]))
        .linking(&strings(&["/LTCG"]));
    set.add_pair("lto", baseline, lto);

    let cxx = baseline.cxxflags.clone();
    set.add_pair("c++", baseline, Flavor::base(baseline).all_as_cxx(cxx.clone()));

    let cxx17 = concat(&cxx, &strings(&["/std:c++17"]));
    if prober.check_flags(cxx17.clone())? {
        set.add_pair("c++17", baseline, Flavor::base(baseline).all_as_cxx(cxx17));
    }

    let nounwind: Vec<String> = cxx.iter().filter(|f| f.as_str() != "/EHsc").cloned().collect();
    set.add_pair(
        "c++-nounwind",
        baseline,
        Flavor::base(baseline).all_as_cxx(nounwind.clone()),
    );

    // Managed C++; implies /EHa
    let clr = concat(&nounwind, &strings(&["/clr"]));
    if prober.check_flags(clr.clone())? {
        set.add_pair("c++-clr", baseline, Flavor::base(baseline).all_as_cxx(clr));
    }
    Ok(())
}

fn add_gnu_families(
    prober: &mut FlagProber<'_>,
    baseline: &Baseline,
    set: &mut VariantSet,
) -> Result<()> {
    // The library is C11 underneath; gnu89 needs extensions, so pedantic
    // C89 warnings are off
    let gnu89 = strings(&["-std=gnu89", "-Wno-pedantic"]);
    if prober.check_flags(gnu89.clone())? {
        set.add_pair("gnu89", baseline, Flavor::base(baseline).c_flags(&gnu89));
    }

    let c11 = strings(&["-std=c11"]);
    let has_c11 = prober.check_flags(c11.clone())?;
    if has_c11 {
        set.add_pair("c11", baseline, Flavor::base(baseline).c_flags(&c11));
    }

    let c99 = strings(&["-std=c99"]);
    if prober.check_flags(c99.clone())? {
        set.add_pair("c99", baseline, Flavor::base(baseline).c_flags(&c99));
    }

    if prober.check_flags("-flto")? {
        add_lto_pair(baseline, set);
    }

    if !baseline.supports_cxx {
        return Ok(());
    }

    let nostd = baseline.cxxflags_without_std();
    let has_cxx17 = prober.check_flags(["-x", "c++", "-std=c++17"])?;

    if has_cxx17 && has_c11 {
        let flavor = Flavor::base(baseline)
            .c_flags(&c11)
            .cxx_flags(concat(&nostd, &strings(&["-std=c++17"])));
        set.add_pair("c11-c++17", baseline, flavor);
    }

    let gnuxx11 = concat(&nostd, &strings(&["-std=gnu++11"]));
    set.add_pair("gnu++11", baseline, Flavor::base(baseline).all_as_cxx(gnuxx11));

    if has_cxx17 {
        let cxx17 = concat(&nostd, &strings(&["-std=c++17"]));
        set.add_pair("c++17", baseline, Flavor::base(baseline).all_as_cxx(cxx17));
    }

    if prober.check_flags(FlagSet::from(["-x", "c++", "-std=c++17", "-fno-exceptions"]))? {
        let noexcept = concat(&nostd, &strings(&["-std=c++17", "-fno-exceptions"]));
        set.add_pair(
            "c++17-noexcept",
            baseline,
            Flavor::base(baseline).all_as_cxx(noexcept),
        );
    }
    Ok(())
}

/// LTO pair: release trades `-O2` for `-O3`, and the link repeats the
/// compile flags so code generation sees the same options.
fn add_lto_pair(baseline: &Baseline, set: &mut VariantSet) {
    let lto = strings(&["-flto"]);
    let release: Vec<String> = baseline
        .release
        .iter()
        .map(|f| if f == "-O2" { "-O3".to_string() } else { f.clone() })
        .collect();

    for (config, config_flags) in [
        (Configuration::Debug, baseline.debug.clone()),
        (Configuration::Release, release),
    ] {
        let ldflags: Vec<String> = baseline
            .cppflags
            .iter()
            .chain(&lto)
            .chain(&config_flags)
            .chain(&baseline.ldflags)
            .cloned()
            .collect();
        let mut variant = Flavor::base(baseline).overriding(&lto).variant(
            format!("lto-{}", config),
            baseline,
            config_flags,
        );
        variant.ldflags = ldflags;
        set.insert(variant);
    }
}
