//! `kiln variants` command
//!
//! Prints the variant matrix without walking sources or writing the graph.

use std::path::Path;

use anyhow::Result;

use crate::cli::VariantsArgs;
use kiln::builder::sources::Language;
use kiln::builder::variant::HostFacts;
use kiln::ops::{plan_variants, ConfigureOptions, Session};
use kiln::util::config::{load_config, Environment};
use kiln::util::process::SystemRunner;

pub fn execute(args: VariantsArgs, project_dir: &Path) -> Result<()> {
    let config = load_config(project_dir);
    let env = Environment::from_env();
    let runner = SystemRunner;
    let host = HostFacts::detect(&runner);

    let opts = ConfigureOptions {
        project_root: project_dir.to_path_buf(),
        build_dir: args.build_dir,
        cc: args.cc,
        no_cache: false,
    };

    let session = Session::open(&opts, &config.configure, &env, &runner)?;
    let (baseline, variants) =
        session.run(|prober| plan_variants(prober, &config.configure, &env, &host))?;

    for variant in variants.iter() {
        let exclude = if variant.exclude { " (not in all)" } else { "" };
        println!("{}{}", variant.name, exclude);
        println!("  cflags:   {}", variant.compile_flags(Language::C).join());
        if baseline.supports_cxx {
            println!("  cxxflags: {}", variant.compile_flags(Language::Cxx).join());
        }
        println!("  ldflags:  {}", variant.ldflags.join(" "));
        if let Some(wrapper) = &variant.run_wrapper {
            println!("  run with: {}", wrapper);
        }
    }

    Ok(())
}
