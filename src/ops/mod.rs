//! High-level operations.
//!
//! This module contains the implementation of Kiln commands.

pub mod configure;
pub mod help;

pub use configure::{
    configure, ninja_command, plan_variants, select_launcher, ConfigureOptions, ConfigureResult,
    Session,
};
pub use help::render_help;
