//! Discriminator lookup: record `kind` string to typed constructor.

use std::collections::HashMap;

use super::{reachability, trace, PathTrace, ReachabilityProbe, TestDefinition, TestKind};
use crate::coerce::{require, RawRecord};
use crate::error::{AntError, Result};

/// Builds a typed definition from a normalized record.
pub type Constructor = fn(&RawRecord) -> Result<TestDefinition>;

impl TestKind {
    /// Discriminator strings accepted for this kind (compared case-insensitively).
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            TestKind::Reachability => &["reachability", "ping", "icmp"],
            TestKind::PathTrace => &["path-trace", "path_trace", "traceroute", "trace"],
        }
    }

    /// Record fields the kind's constructor reads.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            TestKind::Reachability => reachability::FIELDS,
            TestKind::PathTrace => trace::FIELDS,
        }
    }

    pub fn constructor(self) -> Constructor {
        match self {
            TestKind::Reachability => build_reachability,
            TestKind::PathTrace => build_path_trace,
        }
    }

    pub fn from_discriminator(value: &str) -> Result<Self> {
        let wanted = value.trim().to_ascii_lowercase();
        TestKind::ALL
            .into_iter()
            .find(|kind| kind.aliases().contains(&wanted.as_str()))
            .ok_or_else(|| AntError::UnknownTestKind(value.to_string()))
    }
}

fn build_reachability(record: &RawRecord) -> Result<TestDefinition> {
    ReachabilityProbe::from_record(record).map(TestDefinition::Reachability)
}

fn build_path_trace(record: &RawRecord) -> Result<TestDefinition> {
    PathTrace::from_record(record).map(TestDefinition::PathTrace)
}

/// Construct a definition from a record carrying a `kind` field.
pub fn build(record: &RawRecord) -> Result<TestDefinition> {
    let discriminator: String = require("kind", record.get("kind"))?;
    let kind = TestKind::from_discriminator(&discriminator)?;
    (kind.constructor())(record)
}

/// Check that every kind resolves from its own name and that no alias is shared.
pub fn validate() -> Result<()> {
    let mut seen: HashMap<&'static str, TestKind> = HashMap::new();
    for kind in TestKind::ALL {
        if TestKind::from_discriminator(kind.name())? != kind {
            return Err(AntError::UnknownTestKind(kind.name().to_string()));
        }
        for alias in kind.aliases() {
            if let Some(other) = seen.insert(alias, kind) {
                return Err(AntError::UnknownTestKind(format!(
                    "{} (claimed by both {} and {})",
                    alias, other, kind
                )));
            }
        }
    }
    Ok(())
}

/// Whether any registered kind reads the named field.
pub fn is_known_field(name: &str) -> bool {
    name == "kind" || TestKind::ALL.iter().any(|kind| kind.fields().contains(&name))
}
