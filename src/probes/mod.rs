//! Seams to the external diagnostics: ICMP echo and path tracing.
//!
//! The model only talks to these traits. The system implementations shell
//! out to the host `ping` and `traceroute` utilities.

use std::sync::Arc;

use crate::config::ToolsConfig;
use crate::error::Result;
use crate::model::{AddressFamily, Hop};

pub mod icmp;
pub mod trace;

/// Command-line conventions of the host's `ping` and `traceroute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolDialect {
    /// iputils `ping` and Linux `traceroute`: `-4`/`-6` switches, seconds everywhere.
    Linux,
    /// macOS and BSD: separate IPv6 binaries, `ping -W` and `traceroute -z` in milliseconds.
    Bsd,
}

impl ToolDialect {
    pub fn host() -> Self {
        if cfg!(target_os = "linux") {
            ToolDialect::Linux
        } else {
            ToolDialect::Bsd
        }
    }
}

/// Fully resolved parameters for one echo burst. No field is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct EchoRequest {
    pub destination: String,
    pub count: u32,
    /// Seconds between requests.
    pub interval: f64,
    pub payload_size: u32,
    /// Seconds to wait per reply.
    pub timeout: u32,
    pub family: AddressFamily,
    pub privileged: bool,
}

/// Aggregate statistics for one echo burst. RTTs are in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct EchoReply {
    pub address: String,
    pub is_alive: bool,
    pub min_rtt: f64,
    pub avg_rtt: f64,
    pub max_rtt: f64,
    pub rtts: Vec<f64>,
    pub packets_sent: u32,
    pub packets_received: u32,
    pub packet_loss: f64,
    pub jitter: f64,
}

impl EchoReply {
    /// Derive the aggregate statistics from the raw samples.
    pub fn from_samples(address: &str, packets_sent: u32, rtts: Vec<f64>) -> Self {
        let packets_received = rtts.len() as u32;
        let (min_rtt, avg_rtt, max_rtt) = if rtts.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let min = rtts.iter().copied().fold(f64::INFINITY, f64::min);
            let max = rtts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let avg = rtts.iter().sum::<f64>() / rtts.len() as f64;
            (min, avg, max)
        };

        let jitter = if rtts.len() < 2 {
            0.0
        } else {
            let diffs: Vec<f64> = rtts.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
            diffs.iter().sum::<f64>() / diffs.len() as f64
        };

        let packet_loss = if packets_sent == 0 {
            0.0
        } else {
            (1.0 - packets_received as f64 / packets_sent as f64).clamp(0.0, 1.0)
        };

        Self {
            address: address.to_string(),
            is_alive: packets_received > 0,
            min_rtt,
            avg_rtt,
            max_rtt,
            rtts,
            packets_sent,
            packets_received,
            packet_loss,
            jitter,
        }
    }
}

/// Sends ICMP echo requests and reports round-trip statistics.
#[async_trait::async_trait]
pub trait EchoProber: Send + Sync {
    async fn probe(&self, request: &EchoRequest) -> Result<EchoReply>;
}

/// Fully resolved parameters for one trace subprocess.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRequest {
    pub destination: String,
    pub resolve_names: bool,
    /// Seconds to wait per probe.
    pub timeout: u32,
    /// Probes per hop.
    pub queries: u32,
    pub max_hops: u32,
    /// Pause between probes, in whole milliseconds.
    pub interval_ms: u64,
    pub family: AddressFamily,
}

/// Runs a trace and returns its raw, combined stdout/stderr text.
#[async_trait::async_trait]
pub trait PathTracer: Send + Sync {
    async fn trace(&self, request: &TraceRequest) -> Result<String>;
}

/// Structured form of a trace's text output.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceReport {
    pub destination_address: String,
    pub destination_name: String,
    pub hops: Vec<Hop>,
}

/// Turns raw trace output into hop/probe records.
pub trait TraceConverter: Send + Sync {
    fn convert(&self, output: &str) -> Result<TraceReport>;
}

/// The external mechanisms a test may call.
#[derive(Clone)]
pub struct Collaborators {
    pub echo: Arc<dyn EchoProber>,
    pub tracer: Arc<dyn PathTracer>,
    pub converter: Arc<dyn TraceConverter>,
}

impl Collaborators {
    pub fn new(
        echo: Arc<dyn EchoProber>,
        tracer: Arc<dyn PathTracer>,
        converter: Arc<dyn TraceConverter>,
    ) -> Self {
        Self {
            echo,
            tracer,
            converter,
        }
    }

    /// Host `ping` and `traceroute`, with the built-in output converter.
    pub fn system(tools: &ToolsConfig) -> Self {
        Self::new(
            Arc::new(icmp::SystemPing::new(&tools.ping, &tools.ping6)),
            Arc::new(trace::SystemTraceroute::new(&tools.traceroute, &tools.traceroute6)),
            Arc::new(trace::TracerouteConverter),
        )
    }
}
