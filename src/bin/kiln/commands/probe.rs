//! `kiln probe` command

use std::path::Path;

use anyhow::Result;

use crate::cli::ProbeArgs;
use kiln::builder::probe::FlagSet;
use kiln::ops::{ConfigureOptions, Session};
use kiln::util::config::{load_config, Environment};
use kiln::util::process::SystemRunner;

pub fn execute(args: ProbeArgs, project_dir: &Path) -> Result<()> {
    let config = load_config(project_dir);
    let env = Environment::from_env();
    let runner = SystemRunner;

    let opts = ConfigureOptions {
        project_root: project_dir.to_path_buf(),
        build_dir: args.build_dir,
        cc: args.cc,
        no_cache: false,
    };

    let flags = FlagSet::from(args.flags);
    let session = Session::open(&opts, &config.configure, &env, &runner)?;
    let supported = session.run(|prober| prober.check_flags(flags.clone()))?;

    let verdict = if supported { "supported" } else { "unsupported" };
    println!("{}: {}", flags, verdict);

    Ok(())
}
