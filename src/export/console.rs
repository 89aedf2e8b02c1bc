use std::io::{self, Stdout, Write};

use super::{ExportSink, HEADER_TIME_FORMAT};
use crate::error::{AntError, Result};
use crate::model::TestResult;

/// Prints each result under a one-line header.
pub struct ConsoleSink<W: Write + Send = Stdout> {
    out: W,
}

impl ConsoleSink<Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_result(&mut self, result: &TestResult) -> io::Result<()> {
        writeln!(
            self.out,
            "\nResults for {} test {} to {} at {}",
            result.kind(),
            result.id(),
            result.destination(),
            result.timestamp().format(HEADER_TIME_FORMAT)
        )?;
        writeln!(self.out, "{}", result)
    }
}

impl<W: Write + Send> ExportSink for ConsoleSink<W> {
    fn consume(&mut self, result: TestResult) -> Result<()> {
        self.write_result(&result)
            .map_err(|e| AntError::io("<console>", e))
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush().map_err(|e| AntError::io("<console>", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Hop, PathTraceResult, Probe, ReachabilityResult};
    use crate::probes::{EchoReply, TraceReport};
    use chrono::{Local, TimeZone};

    #[test]
    fn test_header_and_body() {
        let timestamp = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let result = PathTraceResult::from_report(
            4,
            timestamp,
            TraceReport {
                destination_address: "10.0.0.9".to_string(),
                destination_name: "host.lan".to_string(),
                hops: vec![Hop {
                    index: 1,
                    probes: vec![Probe {
                        address: "10.0.0.9".to_string(),
                        name: "host.lan".to_string(),
                        rtt: 0.25,
                    }],
                }],
            },
        )
        .unwrap();

        let mut sink = ConsoleSink::new(Vec::new());
        sink.consume(TestResult::PathTrace(result)).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            "\nResults for path-trace test 4 to host.lan at 07:05:01 09-03-2024\n\
             Path to host.lan (10.0.0.9), 1 hops\n \
             1  host.lan (10.0.0.9) 0.250 ms\n"
        );
    }

    #[test]
    fn test_reachability_labelled_layout() {
        let timestamp = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let reply = EchoReply::from_samples("8.8.8.8", 4, vec![10.0, 12.0, 11.0]);
        let result = ReachabilityResult::from_reply(2, timestamp, reply).unwrap();

        let mut sink = ConsoleSink::new(Vec::new());
        sink.consume(TestResult::Reachability(result)).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            concat!(
                "\nResults for reachability test 2 to 8.8.8.8 at 07:05:01 09-03-2024\n",
                "Destination address: 8.8.8.8\n",
                "Is reachable: true\n",
                "RTT min/avg/max: 10.000 / 11.000 / 12.000 ms\n",
                "Packets sent/received/%loss: 4 / 3 / 25.0%\n",
                "Jitter: 1.500 ms\n",
            )
        );
    }
}
