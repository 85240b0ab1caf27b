//! Graph emission: variants x sources -> [`BuildGraph`].
//!
//! Per variant, every source becomes one compile edge under
//! `<build>/<variant>/objs/`, all objects feed one link edge producing
//! `<build>/<variant>/runner`, and a `run-<variant>` edge executes it.
//! Compilers without startup registration get an extra generate step that
//! collects unit-test registrations from the compiled objects.

use std::path::Path;

use crate::builder::flags::{FlagList, Stage};
use crate::builder::graph::{BuildGraph, Edge, GraphError, Rule};
use crate::builder::sources::{Language, SourceFile};
use crate::builder::toolchain::Toolchain;
use crate::builder::variant::{Baseline, BuildVariant, Configuration, VariantSet, VALGRIND};
use crate::util::config::ConfigureConfig;
use crate::util::fs::to_slash;

/// Rule running a runner, optionally under `$run_wrapper`.
pub const RUN_RULE: &str = "run";
pub const COMPILE_RULE: &str = "compile";
pub const LINK_RULE: &str = "link";
pub const GENERATE_RULE: &str = "generate_unit_test_registrations";

/// Aggregate targets.
pub const DEFAULT_TARGET: &str = "default";
pub const ALL_TARGET: &str = "all";
pub const MORE_TARGET: &str = "more";

/// The variant built and run by default.
pub const DEFAULT_VARIANT: &str = "default-debug";

/// Stem of the generated registration source.
const REGISTRATION_STEM: &str = "register_unit_tests";

const VALGRIND_FLAGS: &str = "--leak-check=full --error-exitcode=1 \
    --suppressions=tools/valgrind-suppressions \
    --show-leak-kinds=all --errors-for-leak-kinds=all";

/// The `run_wrapper` binding for a wrapper command.
///
/// Ends in a space since the rule pastes it directly in front of `$in`.
pub fn wrapper_command(wrapper: &str) -> String {
    if wrapper == VALGRIND {
        format!("{} {} ", wrapper, VALGRIND_FLAGS)
    } else {
        format!("{} ", wrapper)
    }
}

/// Name of the edge running a variant.
pub fn run_target(variant: &str) -> String {
    format!("run-{}", variant)
}

/// Turns a variant set and a source list into a build graph.
pub struct GraphEmitter<'a> {
    toolchain: &'a dyn Toolchain,
    baseline: &'a Baseline,
    config: &'a ConfigureConfig,
    build_dir: String,
    launcher: Option<String>,
}

impl<'a> GraphEmitter<'a> {
    pub fn new(
        toolchain: &'a dyn Toolchain,
        baseline: &'a Baseline,
        config: &'a ConfigureConfig,
        build_dir: &Path,
    ) -> Self {
        GraphEmitter {
            toolchain,
            baseline,
            config,
            build_dir: to_slash(build_dir).trim_end_matches('/').to_string(),
            launcher: None,
        }
    }

    /// Prefix compile commands with a launcher such as `ccache`.
    pub fn launcher(mut self, launcher: Option<String>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Emit and validate the whole graph.
    pub fn emit(&self, variants: &VariantSet, sources: &[SourceFile]) -> Result<BuildGraph, GraphError> {
        let mut graph = BuildGraph::new();
        self.declare_rules(&mut graph);

        for src in sources {
            graph.add_source(src.path.clone());
        }

        for variant in variants.iter() {
            self.emit_variant(&mut graph, variant, sources)?;
        }

        self.emit_aggregates(&mut graph, variants)?;
        graph.validate()?;
        Ok(graph)
    }

    fn declare_rules(&self, graph: &mut BuildGraph) {
        graph.add_global("run_wrapper", "");
        graph.add_rule(Rule::new(RUN_RULE).var("command", "$run_wrapper$in"));
        graph.add_rule(
            self.toolchain
                .compile_rule(self.launcher.as_deref(), self.baseline.depfile),
        );
        if self.baseline.manual_registration {
            graph.add_rule(Rule::new(GENERATE_RULE).var(
                "command",
                format!("{} $out $in", to_slash(&self.config.registration_generator)),
            ));
        }
        graph.add_rule(self.toolchain.link_rule());
    }

    fn variant_dir(&self, variant: &str) -> String {
        format!("{}/{}", self.build_dir, variant)
    }

    /// Flags for one compile of `variant`. Each call returns an owned list,
    /// so per-variant additions never leak into another variant.
    fn compile_flags(&self, variant: &BuildVariant, language: Language, vdir: &str) -> FlagList {
        let mut flags = variant.compile_flags(language);
        flags.extend(Stage::Variant, self.toolchain.variant_dir_flags(Path::new(vdir)));
        flags
    }

    fn emit_variant(
        &self,
        graph: &mut BuildGraph,
        variant: &BuildVariant,
        sources: &[SourceFile],
    ) -> Result<(), GraphError> {
        let tc = self.toolchain;
        let vdir = self.variant_dir(&variant.name);
        let obj_ext = tc.object_extension();
        let mut objects = Vec::new();

        for src in sources {
            if src.language == Language::Cxx && !self.baseline.supports_cxx {
                continue;
            }

            let mut flags = self.compile_flags(variant, src.language, &vdir);
            if src.example {
                flags.push(Stage::Source, tc.include_flag(&self.config.harness_include_dir));
                flags.push(
                    Stage::Source,
                    tc.define_flag(
                        &self.config.macro_name("EXAMPLE_NAME"),
                        Some(&src.example_slug()),
                    ),
                );
                flags.extend(Stage::Source, tc.forced_include_flags(&self.config.harness_header));
                if src.main_void {
                    flags.push(
                        Stage::Source,
                        tc.define_flag(&self.config.macro_name("EXAMPLE_MAIN_VOID"), None),
                    );
                }
            }

            let object = format!("{}/objs/{}", vdir, src.object_name(obj_ext));
            graph.add_edge(
                Edge::new(object.clone(), COMPILE_RULE)
                    .input(src.path.clone())
                    .bind("flags", flags.join()),
            )?;
            objects.push(object);
        }

        if self.baseline.manual_registration {
            let generated = format!("{}/{}.c", vdir, REGISTRATION_STEM);
            let object = format!("{}/objs/{}{}", vdir, REGISTRATION_STEM, obj_ext);
            graph.add_edge(Edge::new(generated.clone(), GENERATE_RULE).inputs(objects.clone()))?;
            graph.add_edge(
                Edge::new(object.clone(), COMPILE_RULE)
                    .input(generated)
                    .bind("flags", self.compile_flags(variant, Language::C, &vdir).join()),
            )?;
            objects.push(object);
        }

        let runner = format!("{}/runner{}", vdir, tc.exe_extension());
        graph.add_edge(
            Edge::new(runner.clone(), LINK_RULE)
                .inputs(objects)
                .bind("flags", variant.ldflags.join(" ")),
        )?;

        // The bare variant name builds without running
        graph.add_edge(Edge::phony(variant.name.clone(), vec![runner.clone()]))?;

        let mut run = Edge::new(run_target(&variant.name), RUN_RULE).input(runner);
        if let Some(ref wrapper) = variant.run_wrapper {
            run = run.bind("run_wrapper", wrapper_command(wrapper));
        }
        graph.add_edge(run)
    }

    fn emit_aggregates(&self, graph: &mut BuildGraph, variants: &VariantSet) -> Result<(), GraphError> {
        if variants.contains(DEFAULT_VARIANT) {
            let run_default = run_target(DEFAULT_VARIANT);
            graph.add_edge(Edge::phony(DEFAULT_TARGET, vec![run_default.clone()]))?;
            graph.add_default(run_default);
        }

        let all = variants
            .iter()
            .filter(|v| !v.exclude)
            .map(|v| run_target(&v.name));
        graph.add_edge(Edge::phony(ALL_TARGET, all.collect::<Vec<_>>()))?;

        let more: Vec<String> = self
            .config
            .more_variants
            .iter()
            .flat_map(|family| {
                Configuration::ALL
                    .iter()
                    .map(move |config| format!("{}-{}", family, config))
            })
            .filter(|name| variants.contains(name))
            .map(|name| run_target(&name))
            .collect();
        graph.add_edge(Edge::phony(MORE_TARGET, more))
    }
}
