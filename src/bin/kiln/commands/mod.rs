//! Command implementations

pub mod completions;
pub mod configure;
pub mod probe;
pub mod toolchain;
pub mod variants;
