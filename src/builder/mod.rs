//! Build graph generation.
//!
//! This module holds the compiler driver, flag probing, variant expansion
//! and graph emission used by `kiln configure`.

pub mod emit;
pub mod flags;
pub mod graph;
pub mod ninja;
pub mod probe;
pub mod sources;
pub mod toolchain;
pub mod variant;

pub use emit::GraphEmitter;
pub use flags::{FlagList, Stage};
pub use graph::{BuildGraph, Edge, GraphError, Rule};
pub use probe::{FlagProber, FlagSet, ProbeCache};
pub use sources::{collect_sources, Language, SourceFile};
pub use toolchain::{
    detect_toolchain, CompilerFamily, CompilerIdentity, GccToolchain, MsvcToolchain, Toolchain,
};
pub use variant::{BuildVariant, Configuration, HostFacts, VariantSet};
