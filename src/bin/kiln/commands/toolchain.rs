//! `kiln toolchain` command

use anyhow::Result;

use crate::cli::ToolchainArgs;
use kiln::builder::toolchain::{detect_toolchain, CxxSupport};
use kiln::util::config::Environment;
use kiln::util::process::SystemRunner;

pub fn execute(args: ToolchainArgs) -> Result<()> {
    let env = Environment::from_env();
    let cc = args.cc.as_deref().or(env.cc.as_deref());
    let toolchain = detect_toolchain(cc, &SystemRunner)?;
    let identity = toolchain.identity();
    let caps = toolchain.capabilities();

    println!("Toolchain:");
    println!();
    println!("  Family: {}", identity.family);
    println!("  CC:     {}", identity.cc);
    println!("  Path:   {}", identity.path.display());
    println!();

    let cxx = match caps.cxx {
        CxxSupport::Always => "always",
        CxxSupport::Never => "never",
        CxxSupport::Probe { .. } => "probed",
    };
    let yes_no = |b: bool| if b { "yes" } else { "no" };

    println!("Capabilities:");
    println!("  Syntax:             {:?}", caps.syntax);
    println!("  Object suffix:      {}", caps.object_extension);
    println!("  C++ support:        {}", cxx);
    println!("  Warnings as errors: {}", yes_no(caps.warnings_as_errors));
    println!("  Variant families:   {}", yes_no(caps.gnu_variants || caps.msvc_variants));
    println!("  Auto registration:  {}", yes_no(caps.auto_registration));

    if let Some(cc) = &env.cc {
        println!();
        println!("Environment:");
        println!("  CC={}", cc);
    }

    Ok(())
}
