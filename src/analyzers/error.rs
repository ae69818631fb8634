use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Reasons an analyzer invocation produced no usable result.
///
/// The orchestrator converts every variant into a failed `AnalysisResult`;
/// nothing here ever escapes a validation call.
#[derive(Debug, Clone, Error)]
pub enum AnalyzerFailure {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("analyzer '{analyzer}' timed out after {timeout_ms}ms")]
    Timeout { analyzer: String, timeout_ms: u64 },

    #[error("'{program}' exited with status {}: {stderr}", .status.map(|s| s.to_string()).unwrap_or_else(|| "signal".to_string()))]
    NonZeroExit {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("analyzer '{analyzer}' panicked: {message}")]
    Panicked { analyzer: String, message: String },

    #[error("analyzer '{analyzer}' cannot apply fixes")]
    FixUnsupported { analyzer: String },
}

impl AnalyzerFailure {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnalyzerFailure::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}
