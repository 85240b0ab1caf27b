//! The human-readable target list written next to the build file.

use crate::builder::emit::{run_target, ALL_TARGET, MORE_TARGET};
use crate::builder::variant::VariantSet;

/// File name of the help file inside the build root.
pub const HELP_FILE_NAME: &str = "help";

/// Render the target list.
pub fn render_help(variants: &VariantSet) -> String {
    let mut out = String::from("\nAvailable targets:\n\n");
    for target in ["(default)", MORE_TARGET, ALL_TARGET, "clean", "help"] {
        out.push_str(&format!("    {}\n", target));
    }
    out.push('\n');
    for name in variants.names() {
        out.push_str(&format!("    {}\n", run_target(name)));
    }
    out
}
