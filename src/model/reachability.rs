//! ICMP echo reachability probe.

use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use super::{check_destination, describe_timestamp, AddressFamily};
use crate::coerce::{coerce, require, RawRecord};
use crate::error::{AntError, Result};
use crate::probes::{Collaborators, EchoReply, EchoRequest};

pub const DEFAULT_COUNT: u32 = 5;
pub const DEFAULT_INTERVAL: f64 = 0.2;
pub const DEFAULT_PAYLOAD_SIZE: u32 = 56;
pub const DEFAULT_TIMEOUT: u32 = 1;
pub const DEFAULT_FAMILY: AddressFamily = AddressFamily::V4;
pub const DEFAULT_PRIVILEGED: bool = false;

/// Record fields understood by [`ReachabilityProbe::from_record`].
pub const FIELDS: &[&str] = &[
    "id",
    "destination",
    "count",
    "interval",
    "payload_size",
    "timeout",
    "family",
    "privileged",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ReachabilityProbe {
    pub id: u64,
    pub destination: String,
    /// Echo requests to send.
    pub count: u32,
    /// Seconds between requests.
    pub interval: f64,
    /// ICMP payload size in bytes.
    pub payload_size: u32,
    /// Seconds to wait for each reply.
    pub timeout: u32,
    pub family: AddressFamily,
    /// Ask for raw sockets instead of unprivileged datagram sockets.
    pub privileged: bool,
    timestamp: Option<DateTime<Local>>,
}

impl ReachabilityProbe {
    /// A probe with every tunable at its default.
    pub fn new(id: u64, destination: &str) -> Result<Self> {
        check_destination(destination)?;
        Ok(Self {
            id,
            destination: destination.to_string(),
            count: DEFAULT_COUNT,
            interval: DEFAULT_INTERVAL,
            payload_size: DEFAULT_PAYLOAD_SIZE,
            timeout: DEFAULT_TIMEOUT,
            family: DEFAULT_FAMILY,
            privileged: DEFAULT_PRIVILEGED,
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
            count: coerce("count", record.get("count"), DEFAULT_COUNT)?,
            interval,
            payload_size: coerce("payload_size", record.get("payload_size"), DEFAULT_PAYLOAD_SIZE)?,
            timeout: coerce("timeout", record.get("timeout"), DEFAULT_TIMEOUT)?,
            family: coerce("family", record.get("family"), DEFAULT_FAMILY)?,
            privileged: coerce("privileged", record.get("privileged"), DEFAULT_PRIVILEGED)?,
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
            ("count", self.count.to_string()),
            ("interval", self.interval.to_string()),
            ("payload_size", self.payload_size.to_string()),
            ("timeout", self.timeout.to_string()),
            ("family", self.family.to_string()),
            ("privileged", self.privileged.to_string()),
            ("timestamp", describe_timestamp(self.timestamp)),
        ]
    }

    pub(crate) async fn execute(
        self,
        started: DateTime<Local>,
        tools: &Collaborators,
    ) -> Result<ReachabilityResult> {
        let request = EchoRequest {
            destination: self.destination.clone(),
            count: self.count,
            interval: self.interval,
            payload_size: self.payload_size,
            timeout: self.timeout,
            family: self.family,
            privileged: self.privileged,
        };

        let reply = tools.echo.probe(&request).await?;
        let status = if reply.is_alive { "UP" } else { "DOWN" };

        info!(
            id = self.id,
            address = %reply.address,
            status,
            min_rtt = reply.min_rtt,
            avg_rtt = reply.avg_rtt,
            max_rtt = reply.max_rtt,
            jitter = reply.jitter,
            sent = reply.packets_sent,
            received = reply.packets_received,
            loss_pct = reply.packet_loss * 100.0,
            "echo probe finished"
        );

        ReachabilityResult::from_reply(self.id, started, reply)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReachabilityResult {
    pub id: u64,
    pub timestamp: DateTime<Local>,
    /// Address the echo requests were sent to.
    pub destination: String,
    pub is_alive: bool,
    pub min_rtt: f64,
    pub avg_rtt: f64,
    pub max_rtt: f64,
    pub jitter: f64,
    /// Round-trip time of every reply, in milliseconds.
    pub rtts: Vec<f64>,
    pub packets_sent: u32,
    pub packets_received: u32,
    /// Fraction of requests without a reply, 0.0 to 1.0.
    pub packet_loss: f64,
}

impl ReachabilityResult {
    pub fn from_reply(id: u64, timestamp: DateTime<Local>, reply: EchoReply) -> Result<Self> {
        if !(0.0..=1.0).contains(&reply.packet_loss) {
            return Err(AntError::collaborator(
                "echo probe",
                format!("packet loss {} outside 0..=1", reply.packet_loss),
            ));
        }
        Ok(Self {
            id,
            timestamp,
            destination: reply.address,
            is_alive: reply.is_alive,
            min_rtt: reply.min_rtt,
            avg_rtt: reply.avg_rtt,
            max_rtt: reply.max_rtt,
            jitter: reply.jitter,
            rtts: reply.rtts,
            packets_sent: reply.packets_sent,
            packets_received: reply.packets_received,
            packet_loss: reply.packet_loss,
        })
    }
}

impl fmt::Display for ReachabilityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Destination address: {}", self.destination)?;
        writeln!(f, "Is reachable: {}", self.is_alive)?;
        writeln!(
            f,
            "RTT min/avg/max: {:.3} / {:.3} / {:.3} ms",
            self.min_rtt, self.avg_rtt, self.max_rtt
        )?;
        writeln!(
            f,
            "Packets sent/received/%loss: {} / {} / {:.1}%",
            self.packets_sent,
            self.packets_received,
            self.packet_loss * 100.0
        )?;
        write!(f, "Jitter: {:.3} ms", self.jitter)
    }
}
