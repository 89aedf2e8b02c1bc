//! Test sources.
//!
//! The engine pulls one definition at a time, so a source may either
//! materialize everything in `initialise` (a file) or fetch lazily in
//! `next_test` (a remote feed).

pub mod csv;
pub mod manual;

pub use self::csv::CsvImportSource;
pub use self::manual::ManualImportSource;

use crate::error::Result;
use crate::model::TestDefinition;

#[async_trait::async_trait]
pub trait ImportSource: Send {
    /// One-time setup. Construction errors in the origin surface here.
    async fn initialise(&mut self) -> Result<()>;

    /// Remove and return the next definition; `None` at end of stream.
    async fn next_test(&mut self) -> Result<Option<TestDefinition>>;
}

#[async_trait::async_trait]
impl<T: ImportSource + ?Sized> ImportSource for Box<T> {
    async fn initialise(&mut self) -> Result<()> {
        (**self).initialise().await
    }

    async fn next_test(&mut self) -> Result<Option<TestDefinition>> {
        (**self).next_test().await
    }
}
