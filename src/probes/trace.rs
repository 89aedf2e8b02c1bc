use super::{PathTracer, ToolDialect, TraceConverter, TraceReport, TraceRequest};
use crate::error::{AntError, Result};
use crate::model::{AddressFamily, Hop, Probe};
use tracing::{debug, info, warn};

/// Path trace via the system `traceroute` utility.
pub struct SystemTraceroute {
    binary: String,
    binary6: String,
    dialect: ToolDialect,
}

impl SystemTraceroute {
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
    fn command(&self, request: &TraceRequest) -> (&str, Vec<String>) {
        let mut args = Vec::new();
        if !request.resolve_names {
            args.push("-n".to_string());
        }
        let (binary, send_wait) = match self.dialect {
            ToolDialect::Linux => {
                args.push(request.family.flag().to_string());
                (self.binary.as_str(), linux_send_wait(request.interval_ms))
            }
            ToolDialect::Bsd => {
                let binary = match request.family {
                    AddressFamily::V4 => self.binary.as_str(),
                    AddressFamily::V6 => self.binary6.as_str(),
                };
                (binary, request.interval_ms.to_string())
            }
        };
        args.extend([
            "-w".to_string(),
            request.timeout.to_string(),
            "-q".to_string(),
            request.queries.to_string(),
            "-m".to_string(),
            request.max_hops.to_string(),
            "-z".to_string(),
            send_wait,
            request.destination.clone(),
        ]);
        (binary, args)
    }
}

/// Linux `traceroute -z` reads values up to 10 as seconds and larger ones as milliseconds.
fn linux_send_wait(interval_ms: u64) -> String {
    if interval_ms > 10_000 {
        interval_ms.to_string()
    } else {
        (interval_ms as f64 / 1000.0).to_string()
    }
}

#[async_trait::async_trait]
impl PathTracer for SystemTraceroute {
    async fn trace(&self, request: &TraceRequest) -> Result<String> {
        let (binary, args) = self.command(request);
        info!(destination = %request.destination, binary, ?args, "starting traceroute");

        let output = tokio::process::Command::new(binary)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                warn!(destination = %request.destination, error = %e, "failed to launch traceroute");
                AntError::collaborator(
                    "traceroute",
                    format!("failed to launch '{}': {}. Is it installed?", binary, e),
                )
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            warn!(destination = %request.destination, error = %stderr.trim(), "traceroute execution failed");
            return Err(AntError::collaborator(
                "traceroute",
                format!("{}: {}", output.status, stderr.trim()),
            ));
        }

        // macOS writes the banner to stderr, so it goes first.
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(format!("{}{}", stderr, stdout))
    }
}

/// Parses the conventional traceroute text layout.
///
/// ```text
/// traceroute to dns.google (8.8.8.8), 30 hops max, 60 byte packets
///  1  gateway (192.168.1.1)  1.123 ms  0.987 ms  1.010 ms
///  2  * * *
///  3  core1 (10.20.0.1)  9.512 ms core2 (10.20.0.2)  10.004 ms  9.876 ms
/// ```
///
/// Lines indented under a hop without an index of their own (as macOS
/// prints router changes) continue the previous hop.
pub struct TracerouteConverter;

impl TraceConverter for TracerouteConverter {
    fn convert(&self, output: &str) -> Result<TraceReport> {
        parse_traceroute_text(output)
    }
}

pub fn parse_traceroute_text(output: &str) -> Result<TraceReport> {
    let mut destination: Option<(String, String)> = None;
    let mut hops: Vec<Hop> = Vec::new();
    let mut current: Option<(String, String)> = None;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(rest) = trimmed
            .strip_prefix("traceroute to ")
            .or_else(|| trimmed.strip_prefix("traceroute6 to "))
        {
            let name = rest
                .split(|c: char| c.is_whitespace() || c == ',')
                .next()
                .unwrap_or_default()
                .to_string();
            let address = rest
                .find('(')
                .and_then(|start| {
                    rest[start + 1..]
                        .find(')')
                        .map(|end| rest[start + 1..start + 1 + end].to_string())
                })
                .unwrap_or_else(|| name.clone());
            destination = Some((name, address));
            continue;
        }

        let mut tokens = trimmed.split_whitespace().peekable();
        let first = tokens.peek().copied().unwrap_or_default();

        if let Ok(index) = first.parse::<u32>() {
            tokens.next();
            hops.push(Hop {
                index,
                probes: Vec::new(),
            });
            current = None;
        } else if !line.starts_with(char::is_whitespace) || hops.is_empty() {
            debug!(line, "skipping non-hop traceroute line");
            continue;
        }

        let Some(hop) = hops.last_mut() else {
            continue;
        };

        while let Some(token) = tokens.next() {
            if token == "*" || token == "ms" || token.starts_with('!') {
                continue;
            }

            if let Some(inner) = token.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
                if let Some((_, address)) = current.as_mut() {
                    *address = inner.to_string();
                }
                continue;
            }

            let rtt = match token.strip_suffix("ms") {
                Some(number) => number.parse::<f64>().ok(),
                None if tokens.peek() == Some(&"ms") => token.parse::<f64>().ok(),
                None => None,
            };
            if let Some(rtt) = rtt {
                match &current {
                    Some((name, address)) => hop.probes.push(Probe {
                        address: address.clone(),
                        name: name.clone(),
                        rtt,
                    }),
                    None => warn!(line, "round-trip time without a responding host"),
                }
                continue;
            }

            current = Some((token.to_string(), token.to_string()));
        }
    }

    let Some((destination_name, destination_address)) = destination else {
        return Err(AntError::collaborator(
            "trace converter",
            "output has no 'traceroute to' banner",
        ));
    };

    Ok(TraceReport {
        destination_address,
        destination_name,
        hops,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace_request(interval_ms: u64, family: AddressFamily) -> TraceRequest {
        TraceRequest {
            destination: "dns.google".to_string(),
            resolve_names: false,
            timeout: 2,
            queries: 3,
            max_hops: 20,
            interval_ms,
            family,
        }
    }

    #[test]
    fn test_bsd_command_uses_milliseconds() {
        let tracer = SystemTraceroute::new("traceroute", "traceroute6").with_dialect(ToolDialect::Bsd);

        let (binary, args) = tracer.command(&trace_request(250, AddressFamily::V4));
        assert_eq!(binary, "traceroute");
        assert_eq!(
            args,
            vec!["-n", "-w", "2", "-q", "3", "-m", "20", "-z", "250", "dns.google"]
        );

        let (binary, args) = tracer.command(&trace_request(250, AddressFamily::V6));
        assert_eq!(binary, "traceroute6");
        assert!(!args.iter().any(|a| a == "-6"));
    }

    #[test]
    fn test_linux_command_uses_seconds() {
        let tracer = SystemTraceroute::new("traceroute", "traceroute6").with_dialect(ToolDialect::Linux);

        let (binary, args) = tracer.command(&trace_request(5, AddressFamily::V6));
        assert_eq!(binary, "traceroute");
        assert_eq!(
            args,
            vec!["-n", "-6", "-w", "2", "-q", "3", "-m", "20", "-z", "0.005", "dns.google"]
        );

        let (_, args) = tracer.command(&trace_request(250, AddressFamily::V4));
        assert_eq!(args[1], "-4");
        assert_eq!(args[args.len() - 2], "0.25");
    }

    #[test]
    fn test_linux_send_wait_switches_to_milliseconds_above_ten_seconds() {
        assert_eq!(linux_send_wait(0), "0");
        assert_eq!(linux_send_wait(10_000), "10");
        assert_eq!(linux_send_wait(12_000), "12000");
    }

    #[test]
    fn test_parse_numeric_output() {
        let out = "\
traceroute to 8.8.8.8 (8.8.8.8), 30 hops max, 60 byte packets
 1  192.168.1.1  0.512 ms  0.488 ms  0.470 ms
 2  * * *
 3  10.0.0.1  5.1 ms *  5.3 ms
";
        let report = parse_traceroute_text(out).unwrap();
        assert_eq!(report.destination_address, "8.8.8.8");
        assert_eq!(report.destination_name, "8.8.8.8");
        assert_eq!(report.hops.len(), 3);
        assert_eq!(report.hops[0].probes.len(), 3);
        assert_eq!(report.hops[0].probes[0].name, "192.168.1.1");
        assert!(report.hops[1].probes.is_empty());
        assert_eq!(report.hops[2].probes.len(), 2);
        assert_eq!(report.hops[2].probes[1].rtt, 5.3);
    }

    #[test]
    fn test_parse_annotations_ignored() {
        let out = "traceroute to h (192.0.2.9), 5 hops max\n 1  h (192.0.2.9)  3.0 ms !H  3.1 ms !H\n";
        let report = parse_traceroute_text(out).unwrap();
        assert_eq!(report.hops[0].probes.len(), 2);
        assert_eq!(report.hops[0].probes[0].address, "192.0.2.9");
    }

    #[test]
    fn test_parse_without_banner_fails() {
        let err = parse_traceroute_text(" 1  10.0.0.1  1.0 ms\n").unwrap_err();
        assert!(matches!(err, AntError::CollaboratorFailure { .. }));
    }

    #[test]
    fn test_warning_lines_skipped() {
        let out = "traceroute: Warning: dns.google has multiple addresses; using 8.8.8.8\n\
                   traceroute to dns.google (8.8.8.8), 64 hops max, 52 byte packets\n \
                   1  gw (192.168.1.1)  1.0 ms\n";
        let report = parse_traceroute_text(out).unwrap();
        assert_eq!(report.destination_name, "dns.google");
        assert_eq!(report.hops.len(), 1);
    }
}
