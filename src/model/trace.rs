//! Hop-by-hop path trace.

use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use super::{check_destination, describe_timestamp, AddressFamily};
use crate::coerce::{coerce, require, RawRecord};
use crate::error::{AntError, Result};
use crate::probes::{Collaborators, TraceReport, TraceRequest};
use crate::report::format_hops;

pub const DEFAULT_RESOLVE_NAMES: bool = true;
pub const DEFAULT_TIMEOUT: u32 = 5;
pub const DEFAULT_QUERIES: u32 = 3;
pub const DEFAULT_MAX_HOPS: u32 = 30;
pub const DEFAULT_INTERVAL: f64 = 0.0;
pub const DEFAULT_FAMILY: AddressFamily = AddressFamily::V4;

pub const FIELDS: &[&str] = &[
    "id",
    "destination",
    "resolve_names",
    "timeout",
    "queries",
    "max_hops",
    "interval",
    "family",
];

#[derive(Debug, Clone, PartialEq)]
pub struct PathTrace {
    pub id: u64,
    pub destination: String,
    /// Reverse-resolve router addresses.
    pub resolve_names: bool,
    /// Seconds to wait for each probe.
    pub timeout: u32,
    /// Probes sent per hop.
    pub queries: u32,
    pub max_hops: u32,
    /// Seconds between probes.
    pub interval: f64,
    pub family: AddressFamily,
    timestamp: Option<DateTime<Local>>,
}

impl PathTrace {
    pub fn new(id: u64, destination: &str) -> Result<Self> {
        check_destination(destination)?;
        Ok(Self {
            id,
            destination: destination.to_string(),
            resolve_names: DEFAULT_RESOLVE_NAMES,
            timeout: DEFAULT_TIMEOUT,
            queries: DEFAULT_QUERIES,
            max_hops: DEFAULT_MAX_HOPS,
            interval: DEFAULT_INTERVAL,
            family: DEFAULT_FAMILY,
            timestamp: None,
        })
    }

    pub fn from_record(record: &RawRecord) -> Result<Self> {
        let id = require("id", record.get("id"))?;
        let destination: String = require("destination", record.get("destination"))?;
        check_destination(&destination)?;

        let interval: f64 = coerce("interval", record.get("interval"), DEFAULT_INTERVAL)?;
        if interval.is_nan() || interval < 0.0 {
            return Err(AntError::InvalidParameter {
                field: "interval".to_string(),
                value: interval.to_string(),
                target: "non-negative float",
            });
        }

        Ok(Self {
            id,
            destination,
            resolve_names: coerce(
                "resolve_names",
                record.get("resolve_names"),
                DEFAULT_RESOLVE_NAMES,
            )?,
            timeout: coerce("timeout", record.get("timeout"), DEFAULT_TIMEOUT)?,
            queries: coerce("queries", record.get("queries"), DEFAULT_QUERIES)?,
            max_hops: coerce("max_hops", record.get("max_hops"), DEFAULT_MAX_HOPS)?,
            interval,
            family: coerce("family", record.get("family"), DEFAULT_FAMILY)?,
            timestamp: None,
        })
    }

    pub fn timestamp(&self) -> Option<DateTime<Local>> {
        self.timestamp
    }

    pub(crate) fn stamp(&mut self, at: DateTime<Local>) {
        if self.timestamp.is_none() {
            self.timestamp = Some(at);
        }
    }

    pub fn describe(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.to_string()),
            ("destination", self.destination.clone()),
            ("resolve_names", self.resolve_names.to_string()),
            ("timeout", self.timeout.to_string()),
            ("queries", self.queries.to_string()),
            ("max_hops", self.max_hops.to_string()),
            ("interval", self.interval.to_string()),
            ("family", self.family.to_string()),
            ("timestamp", describe_timestamp(self.timestamp)),
        ]
    }

    pub(crate) async fn execute(
        self,
        started: DateTime<Local>,
        tools: &Collaborators,
    ) -> Result<PathTraceResult> {
        let request = TraceRequest {
            destination: self.destination.clone(),
            resolve_names: self.resolve_names,
            timeout: self.timeout,
            queries: self.queries,
            max_hops: self.max_hops,
            interval_ms: interval_millis(self.interval),
            family: self.family,
        };

        let output = tools.tracer.trace(&request).await?;
        let report = tools.converter.convert(&output)?;

        info!(
            id = self.id,
            destination = %report.destination_name,
            address = %report.destination_address,
            hops = report.hops.len(),
            "path trace finished"
        );

        PathTraceResult::from_report(self.id, started, report)
    }
}

/// Convert an interval in seconds to whole milliseconds, rounding to nearest.
pub fn interval_millis(seconds: f64) -> u64 {
    (seconds * 1000.0).round().max(0.0) as u64
}

/// One router reply at a given hop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Probe {
    pub address: String,
    /// Reverse-resolved name; equals `address` when not resolved.
    pub name: String,
    /// Round-trip time in milliseconds.
    pub rtt: f64,
}

/// One TTL step along the path. No probes means no router replied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hop {
    /// 1-based hop index.
    pub index: u32,
    pub probes: Vec<Probe>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathTraceResult {
    pub id: u64,
    pub timestamp: DateTime<Local>,
    pub destination_address: String,
    pub destination_name: String,
    pub hops: Vec<Hop>,
}

impl PathTraceResult {
    /// Build a result from converter output, rejecting non-contiguous hop indices.
    pub fn from_report(id: u64, timestamp: DateTime<Local>, report: TraceReport) -> Result<Self> {
        for (position, hop) in report.hops.iter().enumerate() {
            let expected = position as u32 + 1;
            if hop.index != expected {
                return Err(AntError::collaborator(
                    "trace converter",
                    format!("expected hop {} but found hop {}", expected, hop.index),
                ));
            }
        }
        Ok(Self {
            id,
            timestamp,
            destination_address: report.destination_address,
            destination_name: report.destination_name,
            hops: report.hops,
        })
    }
}

impl fmt::Display for PathTraceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Path to {} ({}), {} hops",
            self.destination_name,
            self.destination_address,
            self.hops.len()
        )?;
        let hops = format_hops(&self.hops);
        if !hops.is_empty() {
            write!(f, "\n{}", hops.trim_end_matches('\n'))?;
        }
        Ok(())
    }
}
