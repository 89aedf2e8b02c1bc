//! Error taxonomy for the test pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::TestKind;

#[derive(Debug, Error)]
pub enum AntError {
    /// A raw value could not be coerced into the field's target type.
    #[error("invalid parameter `{field}`: cannot convert {value} to {target}")]
    InvalidParameter {
        field: String,
        value: String,
        target: &'static str,
    },

    #[error("unknown test kind `{0}`")]
    UnknownTestKind(String),

    #[error("export sink `{sink}` cannot handle {kind} results")]
    UnsupportedResult { sink: &'static str, kind: TestKind },

    /// The probing library, the trace subprocess or the trace converter failed.
    #[error("{tool} failed: {detail}")]
    CollaboratorFailure { tool: String, detail: String },

    #[error("record at line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: Box<AntError>,
    },

    #[error("test {id}: {source}")]
    Test {
        id: u64,
        #[source]
        source: Box<AntError>,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl AntError {
    pub fn collaborator(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        AntError::CollaboratorFailure {
            tool: tool.into(),
            detail: detail.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AntError::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the id of the test that was executing when this error surfaced.
    pub fn for_test(self, id: u64) -> Self {
        AntError::Test {
            id,
            source: Box::new(self),
        }
    }

    /// Attach the 1-based source line of the record that failed to import.
    pub fn at_line(self, line: usize) -> Self {
        AntError::Record {
            line,
            source: Box::new(self),
        }
    }
}

pub type Result<T, E = AntError> = std::result::Result<T, E>;
