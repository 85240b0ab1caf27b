//! Kiln - build configuration generator for C test suites
//!
//! This crate detects the C compiler, probes which flags it accepts,
//! expands a matrix of build variants and emits a ninja build graph that
//! compiles and runs the test suite once per variant.

pub mod builder;
pub mod ops;
pub mod util;

/// Test utilities and mocks for Kiln unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides a scripted command runner and on-disk source tree fixtures.
#[cfg(test)]
pub mod test_support;

pub use builder::toolchain::{CompilerFamily, CompilerIdentity, Toolchain};
pub use ops::configure::{configure, ConfigureOptions, ConfigureResult};
pub use util::config::Config;
