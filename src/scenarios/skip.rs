//! Skip policy for scenarios that depend on external systems.
//!
//! The tag-to-flag relationship lives in one table so umbrella flags stay data,
//! not branching.
use super::DependencyTag;
use std::collections::BTreeSet;
use std::fmt;

/// Runtime switch that suppresses one dependency family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SkipFlag {
    DatabaseA,
    DatabaseB,
    DataframeEngine,
    RelationalEngine,
    DistributedEngine,
    /// Umbrella switch for everything reached through the SQL toolkit.
    SqlToolkit,
}

impl SkipFlag {
    /// Command-line spelling of the flag.
    pub fn cli_name(self) -> &'static str {
        match self {
            SkipFlag::DatabaseA => "--skip-database-a",
            SkipFlag::DatabaseB => "--skip-database-b",
            SkipFlag::DataframeEngine => "--skip-dataframe-engine",
            SkipFlag::RelationalEngine => "--skip-relational-engine",
            SkipFlag::DistributedEngine => "--skip-distributed-engine",
            SkipFlag::SqlToolkit => "--skip-sql-toolkit",
        }
    }
}

impl fmt::Display for SkipFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

/// Flags that suppress each tag, in the order they are reported.
const SKIP_RULES: &[(DependencyTag, &[SkipFlag])] = &[
    (
        DependencyTag::DatabaseA,
        &[SkipFlag::DatabaseA, SkipFlag::SqlToolkit],
    ),
    (
        DependencyTag::DatabaseB,
        &[SkipFlag::DatabaseB, SkipFlag::SqlToolkit],
    ),
    (
        DependencyTag::RelationalEngine,
        &[SkipFlag::RelationalEngine, SkipFlag::SqlToolkit],
    ),
    (
        DependencyTag::DistributedEngine,
        &[SkipFlag::DistributedEngine],
    ),
    (DependencyTag::DataframeEngine, &[SkipFlag::DataframeEngine]),
    (DependencyTag::SqlToolkit, &[SkipFlag::SqlToolkit]),
];

/// Set of active skip switches for one run. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipFlags {
    active: BTreeSet<SkipFlag>,
}

impl SkipFlags {
    pub fn new(flags: impl IntoIterator<Item = SkipFlag>) -> Self {
        Self {
            active: flags.into_iter().collect(),
        }
    }

    pub fn is_set(&self, flag: SkipFlag) -> bool {
        self.active.contains(&flag)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Why a scenario was not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipReason {
    pub tag: DependencyTag,
    pub flag: SkipFlag,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skipping {} scenario ({} is set)", self.tag, self.flag)
    }
}

/// Decide whether a scenario must be skipped before any setup happens.
pub fn should_skip(flags: &SkipFlags, tag: Option<DependencyTag>) -> Option<SkipReason> {
    let tag = tag?;
    let (_, rule_flags) = SKIP_RULES.iter().find(|(rule_tag, _)| *rule_tag == tag)?;
    rule_flags
        .iter()
        .copied()
        .find(|flag| flags.is_set(*flag))
        .map(|flag| SkipReason { tag, flag })
}
