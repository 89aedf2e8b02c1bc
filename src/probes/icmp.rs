use super::{EchoProber, EchoReply, EchoRequest, ToolDialect};
use crate::error::{AntError, Result};
use crate::model::AddressFamily;
use tracing::{debug, warn};

/// ICMP echo via the system `ping` utility.
/// `ping` carries its own privileges (setuid or CAP_NET_RAW), so the
/// `privileged` flag is logged but not forwarded.
pub struct SystemPing {
    binary: String,
    binary6: String,
    dialect: ToolDialect,
}

impl SystemPing {
    pub fn new(binary: &str, binary6: &str) -> Self {
        Self {
            binary: binary.to_string(),
            binary6: binary6.to_string(),
            dialect: ToolDialect::host(),
        }
    }

    pub fn with_dialect(mut self, dialect: ToolDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Program and arguments for one request.
    fn command(&self, request: &EchoRequest) -> (&str, Vec<String>) {
        let mut args = vec!["-n".to_string()];
        let binary = match (self.dialect, request.family) {
            (ToolDialect::Linux, family) => {
                args.push(family.flag().to_string());
                self.binary.as_str()
            }
            (ToolDialect::Bsd, AddressFamily::V4) => self.binary.as_str(),
            (ToolDialect::Bsd, AddressFamily::V6) => self.binary6.as_str(),
        };

        let wait = match self.dialect {
            ToolDialect::Linux => request.timeout.to_string(),
            ToolDialect::Bsd => (u64::from(request.timeout) * 1000).to_string(),
        };
        args.extend([
            "-c".to_string(),
            request.count.to_string(),
            "-i".to_string(),
            request.interval.to_string(),
            "-s".to_string(),
            request.payload_size.to_string(),
            "-W".to_string(),
            wait,
            request.destination.clone(),
        ]);
        (binary, args)
    }
}

#[async_trait::async_trait]
impl EchoProber for SystemPing {
    async fn probe(&self, request: &EchoRequest) -> Result<EchoReply> {
        let (binary, args) = self.command(request);
        debug!(binary, ?args, privileged = request.privileged, "spawning ping");

        let output = tokio::process::Command::new(binary)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                AntError::collaborator(
                    "ping",
                    format!("failed to launch '{}': {}. Is it installed?", binary, e),
                )
            })?;

        // Exit status 1 means "no reply", which is still a valid measurement.
        match output.status.code() {
            Some(0) | Some(1) => {}
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(destination = %request.destination, error = %stderr.trim(), "ping execution failed");
                return Err(AntError::collaborator(
                    "ping",
                    format!("{}: {}", output.status, stderr.trim()),
                ));
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_ping_output(&stdout, &request.destination)
    }
}

/// Parse `ping` output into aggregate statistics.
///
/// Reads the resolved address from the `PING host (addr)` banner, one RTT
/// per `time=` reply line, and the sent count from the
/// `N packets transmitted` summary.
pub fn parse_ping_output(output: &str, destination: &str) -> Result<EchoReply> {
    let mut address = destination.to_string();
    let mut rtts = Vec::new();
    let mut sent = None;

    for line in output.lines() {
        let line = line.trim();

        if line.starts_with("PING ") {
            if let Some(addr) = between(line, '(', ')') {
                address = addr.to_string();
            }
            continue;
        }

        if line.contains("DUP!") {
            continue;
        }

        if let Some(pos) = line.find("time=") {
            let rest = &line[pos + 5..];
            let value = rest
                .split(|c: char| c.is_whitespace() || c.is_ascii_alphabetic())
                .next()
                .unwrap_or("");
            match value.parse::<f64>() {
                Ok(rtt) => rtts.push(rtt),
                Err(_) => warn!(line, "unparseable ping reply time"),
            }
            continue;
        }

        if line.contains("packets transmitted") {
            sent = line
                .split_whitespace()
                .next()
                .and_then(|n| n.parse::<u32>().ok());
        }
    }

    let Some(sent) = sent else {
        return Err(AntError::collaborator(
            "ping",
            "output has no packet summary line",
        ));
    };

    Ok(EchoReply::from_samples(&address, sent, rtts))
}

fn between(line: &str, open: char, close: char) -> Option<&str> {
    let start = line.find(open)? + open.len_utf8();
    let end = start + line[start..].find(close)?;
    Some(&line[start..end])
}
