//! Result sinks.

pub mod console;
pub mod csv;
pub mod jsonl;

pub use self::console::ConsoleSink;
pub use self::csv::CsvSummarySink;
pub use self::jsonl::JsonLinesSink;

use crate::error::Result;
use crate::model::TestResult;

/// Receives each result as soon as its test finishes.
///
/// A sink that cannot represent a result kind returns
/// `AntError::UnsupportedResult` rather than dropping it.
pub trait ExportSink: Send {
    fn consume(&mut self, result: TestResult) -> Result<()>;

    /// Called once after the last result.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: ExportSink + ?Sized> ExportSink for Box<T> {
    fn consume(&mut self, result: TestResult) -> Result<()> {
        (**self).consume(result)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Timestamp layout used in human-readable headers.
pub const HEADER_TIME_FORMAT: &str = "%H:%M:%S %d-%m-%Y";
