//! ant -- Automated network tests.
//!
//! Runs a batch of ICMP reachability probes and path traces pulled from an
//! import source, and hands each result to an export sink as it completes.

pub mod coerce;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod import;
pub mod logging;
pub mod model;
pub mod probes;
pub mod report;

pub use engine::{Engine, EngineOptions, EngineState, RunSummary};
pub use error::AntError;
pub use model::{TestDefinition, TestKind, TestResult};

use export::ExportSink;
use import::ImportSource;
use probes::Collaborators;

/// Initialise `source`, run everything it yields, and export into `sink`.
pub async fn run_batch<S, K>(
    source: S,
    sink: K,
    tools: Collaborators,
    options: EngineOptions,
) -> error::Result<RunSummary>
where
    S: ImportSource,
    K: ExportSink,
{
    let mut engine = Engine::new(source, sink, tools, options).await?;
    engine.run_all().await
}
