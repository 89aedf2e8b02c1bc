//! Batch execution: pull, run, time, log, export.

use std::time::{Duration, Instant};

use futures::stream::{FuturesOrdered, StreamExt};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::export::ExportSink;
use crate::import::ImportSource;
use crate::model::{TestDefinition, TestResult};
use crate::probes::Collaborators;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Drained,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Tests allowed in flight at once. Results are still exported in source order.
    pub workers: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub executed: usize,
    pub elapsed: Duration,
}

/// Binds one import source to one export sink.
pub struct Engine<S, K> {
    source: S,
    sink: K,
    tools: Collaborators,
    options: EngineOptions,
    state: EngineState,
}

impl<S: ImportSource, K: ExportSink> Engine<S, K> {
    /// Bind the source and sink and initialise the source immediately.
    pub async fn new(
        mut source: S,
        sink: K,
        tools: Collaborators,
        options: EngineOptions,
    ) -> Result<Self> {
        source.initialise().await?;
        Ok(Self {
            source,
            sink,
            tools,
            options,
            state: EngineState::Idle,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Run every test the source yields, exporting each result in source order.
    ///
    /// The first failing test or sink aborts the batch. An engine runs once;
    /// later calls return an empty summary.
    pub async fn run_all(&mut self) -> Result<RunSummary> {
        if self.state != EngineState::Idle {
            warn!(state = ?self.state, "engine already ran; not resuming");
            return Ok(RunSummary::default());
        }
        self.state = EngineState::Running;

        let batch_started = Instant::now();
        let workers = self.options.workers.max(1);
        let source = &mut self.source;
        let sink = &mut self.sink;
        let tools = &self.tools;

        let mut in_flight = FuturesOrdered::new();
        let mut exhausted = false;
        let mut executed = 0;

        loop {
            while !exhausted && in_flight.len() < workers {
                match source.next_test().await? {
                    Some(test) => {
                        info!(id = test.id(), kind = %test.kind(), destination = test.destination(), "dispatching test");
                        in_flight.push_back(timed_run(test, tools));
                    }
                    None => exhausted = true,
                }
            }

            let Some((id, elapsed, outcome)) = in_flight.next().await else {
                break;
            };

            let result = outcome.map_err(|e| {
                error!(id, error = %e, "test failed; aborting batch");
                e.for_test(id)
            })?;
            info!(id, elapsed_ms = elapsed.as_millis() as u64, "test finished");

            sink.consume(result).map_err(|e| {
                error!(id, error = %e, "export failed; aborting batch");
                e.for_test(id)
            })?;
            executed += 1;
        }

        sink.flush()?;
        self.state = EngineState::Drained;

        let elapsed = batch_started.elapsed();
        info!(executed, elapsed_ms = elapsed.as_millis() as u64, "all tests complete");
        Ok(RunSummary { executed, elapsed })
    }

    pub fn into_parts(self) -> (S, K) {
        (self.source, self.sink)
    }
}

async fn timed_run(
    test: TestDefinition,
    tools: &Collaborators,
) -> (u64, Duration, Result<TestResult>) {
    let id = test.id();
    let started = Instant::now();
    let outcome = test.run(tools).await;
    (id, started.elapsed(), outcome)
}
