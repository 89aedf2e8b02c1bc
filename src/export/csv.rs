use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::ExportSink;
use crate::error::{AntError, Result};
use crate::model::{ReachabilityResult, TestResult};

const HEADER: &str =
    "id,timestamp,destination,is_alive,min_rtt,avg_rtt,max_rtt,jitter,sent,received,loss_pct";

/// One CSV row per reachability result. Path traces have no row shape and
/// are rejected with `UnsupportedResult`.
pub struct CsvSummarySink<W: Write + Send = BufWriter<File>> {
    label: PathBuf,
    out: W,
    wrote_header: bool,
}

impl CsvSummarySink<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| AntError::io(&path, e))?;
        Ok(Self {
            label: path,
            out: BufWriter::new(file),
            wrote_header: false,
        })
    }
}

impl<W: Write + Send> CsvSummarySink<W> {
    pub fn new(out: W) -> Self {
        Self {
            label: PathBuf::from("<writer>"),
            out,
            wrote_header: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_row(&mut self, r: &ReachabilityResult) -> std::io::Result<()> {
        if !self.wrote_header {
            writeln!(self.out, "{}", HEADER)?;
            self.wrote_header = true;
        }
        writeln!(
            self.out,
            "{},{},{},{},{:.3},{:.3},{:.3},{:.3},{},{},{:.1}",
            r.id,
            r.timestamp.to_rfc3339(),
            escape_csv(&r.destination),
            r.is_alive,
            r.min_rtt,
            r.avg_rtt,
            r.max_rtt,
            r.jitter,
            r.packets_sent,
            r.packets_received,
            r.packet_loss * 100.0
        )
    }
}

impl<W: Write + Send> ExportSink for CsvSummarySink<W> {
    fn consume(&mut self, result: TestResult) -> Result<()> {
        match &result {
            TestResult::Reachability(r) => self
                .write_row(r)
                .map_err(|e| AntError::io(&self.label, e)),
            TestResult::PathTrace(_) => Err(AntError::UnsupportedResult {
                sink: "csv-summary",
                kind: result.kind(),
            }),
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush().map_err(|e| AntError::io(&self.label, e))
    }
}

/// Quote a cell if it contains a comma, quote, or newline.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
