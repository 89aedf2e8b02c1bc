//! Path trace rendering in the conventional traceroute console layout.

use crate::model::Hop;

/// Render hops the way traceroute prints them.
///
/// Consecutive probes answered by the same address share a line; a probe
/// from a different address starts a new line indented by four spaces.
pub fn format_hops(hops: &[Hop]) -> String {
    let mut out = String::new();

    for hop in hops {
        out.push_str(&format!("{:>2}  ", hop.index));

        let Some((first, rest)) = hop.probes.split_first() else {
            out.push_str("* * *\n");
            continue;
        };

        let mut current_address = first.address.as_str();
        out.push_str(&format!("{} ({}) {:.3} ms", first.name, first.address, first.rtt));

        for probe in rest {
            if probe.address == current_address {
                out.push_str(&format!("  {:.3} ms", probe.rtt));
            } else {
                out.push_str(&format!(
                    "\n    {} ({}) {:.3} ms",
                    probe.name, probe.address, probe.rtt
                ));
                current_address = probe.address.as_str();
            }
        }
        out.push('\n');
    }

    out
}

/// Prefix every line of `report`, for embedding in a single log record.
pub fn indent_report(report: &str, prefix: &str) -> String {
    report
        .lines()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}
