//! Ordered compiler-flag composition.
//!
//! Compilers let later flags override earlier ones, so the order in which
//! flag groups land on the command line is part of correctness. A
//! [`FlagList`] keeps one bucket per [`Stage`] and always concatenates
//! them in stage order, no matter in which order callers push.

/// Precedence stage of a flag group, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Baseline flags shared by every compile in a variant
    Common,
    /// Flags selecting and tuning the source language
    Language,
    /// Language-agnostic variant overrides (LTO, allocator, PDB path)
    Variant,
    /// Per-file additions (example harness)
    Source,
    /// Debug/release flags; always last
    Configuration,
}

const STAGES: usize = 5;

impl Stage {
    fn slot(self) -> usize {
        match self {
            Stage::Common => 0,
            Stage::Language => 1,
            Stage::Variant => 2,
            Stage::Source => 3,
            Stage::Configuration => 4,
        }
    }
}

/// An append-only flag list ordered by [`Stage`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagList {
    stages: [Vec<String>; STAGES],
}

impl FlagList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one flag to a stage.
    pub fn push(&mut self, stage: Stage, flag: impl Into<String>) -> &mut Self {
        self.stages[stage.slot()].push(flag.into());
        self
    }

    /// Append several flags to a stage, keeping their order.
    pub fn extend<I, S>(&mut self, stage: Stage, flags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stages[stage.slot()].extend(flags.into_iter().map(Into::into));
        self
    }

    /// Builder-style [`FlagList::extend`].
    pub fn with<I, S>(mut self, stage: Stage, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extend(stage, flags);
        self
    }

    /// Flags of a single stage.
    pub fn stage(&self, stage: Stage) -> &[String] {
        &self.stages[stage.slot()]
    }

    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    /// The composed command-line order.
    pub fn to_vec(&self) -> Vec<String> {
        self.stages.iter().flatten().cloned().collect()
    }

    /// Space-joined, as bound to a `flags` variable.
    pub fn join(&self) -> String {
        self.to_vec().join(" ")
    }
}
