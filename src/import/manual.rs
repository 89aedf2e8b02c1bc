use std::collections::VecDeque;

use tracing::debug;

use super::ImportSource;
use crate::error::Result;
use crate::model::{ReachabilityProbe, TestDefinition};

/// A fixed, in-memory list of tests. Mostly for development.
#[derive(Debug, Default)]
pub struct ManualImportSource {
    pending: Vec<TestDefinition>,
    queue: VecDeque<TestDefinition>,
}

impl ManualImportSource {
    pub fn new(tests: Vec<TestDefinition>) -> Self {
        Self {
            pending: tests,
            queue: VecDeque::new(),
        }
    }

    /// One reachability probe with default parameters.
    pub fn ping(destination: &str) -> Result<Self> {
        let probe = ReachabilityProbe::new(1, destination)?;
        Ok(Self::new(vec![TestDefinition::Reachability(probe)]))
    }
}

#[async_trait::async_trait]
impl ImportSource for ManualImportSource {
    async fn initialise(&mut self) -> Result<()> {
        self.queue.extend(self.pending.drain(..));
        debug!(tests = self.queue.len(), "manual source ready");
        Ok(())
    }

    async fn next_test(&mut self) -> Result<Option<TestDefinition>> {
        Ok(self.queue.pop_front())
    }
}
