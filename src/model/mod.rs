//! Test definitions and their results.
//!
//! Both sides are closed enums with one variant per diagnostic kind. Every
//! consumer (registry, sinks, formatter) matches exhaustively, so a new kind
//! is a compile error until every consumer handles it.

pub mod reachability;
pub mod registry;
pub mod trace;

use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::coerce::{Coerce, RawValue};
use crate::error::{AntError, Result};
use crate::probes::Collaborators;
use crate::report::indent_report;

pub use reachability::{ReachabilityProbe, ReachabilityResult};
pub use trace::{Hop, PathTrace, PathTraceResult, Probe};

/// The diagnostic kinds the pipeline knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestKind {
    Reachability,
    PathTrace,
}

impl TestKind {
    pub const ALL: [TestKind; 2] = [TestKind::Reachability, TestKind::PathTrace];

    /// Canonical discriminator, as written in record sources.
    pub fn name(self) -> &'static str {
        match self {
            TestKind::Reachability => "reachability",
            TestKind::PathTrace => "path-trace",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// IP address family a diagnostic is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Family switch understood by Linux `ping` and `traceroute`.
    pub fn flag(self) -> &'static str {
        match self {
            AddressFamily::V4 => "-4",
            AddressFamily::V6 => "-6",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => write!(f, "4"),
            AddressFamily::V6 => write!(f, "6"),
        }
    }
}

impl Coerce for AddressFamily {
    const TARGET: &'static str = "address family (4 or 6)";

    fn from_raw(raw: &RawValue) -> Option<Self> {
        match raw {
            RawValue::Int(4) => Some(AddressFamily::V4),
            RawValue::Int(6) => Some(AddressFamily::V6),
            RawValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "4" | "ipv4" | "inet" => Some(AddressFamily::V4),
                "6" | "ipv6" | "inet6" => Some(AddressFamily::V6),
                _ => None,
            },
            _ => None,
        }
    }
}

/// One diagnostic to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum TestDefinition {
    Reachability(ReachabilityProbe),
    PathTrace(PathTrace),
}

impl TestDefinition {
    pub fn kind(&self) -> TestKind {
        match self {
            TestDefinition::Reachability(_) => TestKind::Reachability,
            TestDefinition::PathTrace(_) => TestKind::PathTrace,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            TestDefinition::Reachability(t) => t.id,
            TestDefinition::PathTrace(t) => t.id,
        }
    }

    pub fn destination(&self) -> &str {
        match self {
            TestDefinition::Reachability(t) => &t.destination,
            TestDefinition::PathTrace(t) => &t.destination,
        }
    }

    /// When execution started. `None` until `run` is called.
    pub fn timestamp(&self) -> Option<DateTime<Local>> {
        match self {
            TestDefinition::Reachability(t) => t.timestamp(),
            TestDefinition::PathTrace(t) => t.timestamp(),
        }
    }

    /// Every field of the test, in declaration order.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        match self {
            TestDefinition::Reachability(t) => t.describe(),
            TestDefinition::PathTrace(t) => t.describe(),
        }
    }

    fn stamp(&mut self, at: DateTime<Local>) {
        match self {
            TestDefinition::Reachability(t) => t.stamp(at),
            TestDefinition::PathTrace(t) => t.stamp(at),
        }
    }

    /// Execute the diagnostic.
    ///
    /// Stamps the start time and logs the test's fields, then hands over to
    /// the variant's collaborator. Collaborator errors are returned as-is.
    pub async fn run(mut self, tools: &Collaborators) -> Result<TestResult> {
        let started = Local::now();
        self.stamp(started);

        let id = self.id();
        let kind = self.kind();
        trace!(id, %kind, fields = %render_fields(&self.describe()), "running test");

        let result = match self {
            TestDefinition::Reachability(test) => {
                TestResult::Reachability(test.execute(started, tools).await?)
            }
            TestDefinition::PathTrace(test) => {
                TestResult::PathTrace(test.execute(started, tools).await?)
            }
        };

        info!(id, %kind, "test complete");
        debug!(id, "result:\n{}", indent_report(&result.to_string(), "    "));
        Ok(result)
    }
}

/// Render `describe()` output as `name=value` pairs for a single log line.
pub fn render_fields(fields: &[(&'static str, String)]) -> String {
    fields
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe_timestamp(ts: Option<DateTime<Local>>) -> String {
    ts.map(|t| t.to_rfc3339()).unwrap_or_else(|| "unset".to_string())
}

/// Outcome of one executed [`TestDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestResult {
    Reachability(ReachabilityResult),
    PathTrace(PathTraceResult),
}

impl TestResult {
    pub fn kind(&self) -> TestKind {
        match self {
            TestResult::Reachability(_) => TestKind::Reachability,
            TestResult::PathTrace(_) => TestKind::PathTrace,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            TestResult::Reachability(r) => r.id,
            TestResult::PathTrace(r) => r.id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        match self {
            TestResult::Reachability(r) => r.timestamp,
            TestResult::PathTrace(r) => r.timestamp,
        }
    }

    /// The destination as the test named it, or as it resolved.
    pub fn destination(&self) -> &str {
        match self {
            TestResult::Reachability(r) => &r.destination,
            TestResult::PathTrace(r) => &r.destination_name,
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestResult::Reachability(r) => fmt::Display::fmt(r, f),
            TestResult::PathTrace(r) => fmt::Display::fmt(r, f),
        }
    }
}

pub(crate) fn check_destination(destination: &str) -> Result<()> {
    let invalid = destination.is_empty()
        || destination.starts_with('-')
        || destination
            .chars()
            .any(|c| !c.is_alphanumeric() && c != '.' && c != '-' && c != ':' && c != '_');
    if invalid {
        return Err(AntError::InvalidParameter {
            field: "destination".to_string(),
            value: format!("{:?}", destination),
            target: "hostname or address",
        });
    }
    Ok(())
}
