//! `kiln configure` command

use std::path::Path;

use anyhow::Result;

use crate::cli::ConfigureArgs;
use kiln::builder::variant::HostFacts;
use kiln::ops::{configure, ninja_command, ConfigureOptions};
use kiln::util::config::{load_config, Environment};
use kiln::util::process::SystemRunner;

pub fn execute(args: ConfigureArgs, project_dir: &Path) -> Result<()> {
    let config = load_config(project_dir);
    let env = Environment::from_env();
    let runner = SystemRunner;
    let host = HostFacts::detect(&runner);

    let opts = ConfigureOptions {
        project_root: project_dir.to_path_buf(),
        build_dir: args.build_dir,
        cc: args.cc,
        no_cache: args.no_cache,
    };

    let result = configure(&opts, &config.configure, &env, &host, &runner)?;

    println!(
        "Configured {} variant(s) over {} source file(s) with {}",
        result.variants.len(),
        result.sources,
        result.identity
    );
    println!(
        "Run `{}` to build and test",
        ninja_command(&opts, &config.configure)
    );
    println!("See {} for the available targets", result.help_path.display());

    Ok(())
}
