use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::ExportSink;
use crate::error::{AntError, Result};
use crate::model::TestResult;

/// Appends each result to a file as one JSON object per line.
pub struct JsonLinesSink {
    path: PathBuf,
    out: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AntError::io(&path, e))?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
        })
    }
}

impl ExportSink for JsonLinesSink {
    fn consume(&mut self, result: TestResult) -> Result<()> {
        let line = serde_json::to_string(&result)?;
        writeln!(self.out, "{}", line).map_err(|e| AntError::io(&self.path, e))?;
        debug!(id = result.id(), path = %self.path.display(), "result written");
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush().map_err(|e| AntError::io(&self.path, e))
    }
}
