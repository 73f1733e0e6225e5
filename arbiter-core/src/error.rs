//! Error taxonomy for the orchestration core
//!
//! Three severities drive the scheduler's reaction:
//! - fatal-per-engine removes one worker, never the tournament
//! - fatal-startup excludes an engine within the factory's retry budget
//! - operator errors surface before anything starts
//!
//! Recoverable parse problems are not errors at all: adapters attach them
//! to the event as diagnostics and keep reading.

use std::path::PathBuf;

/// Errors raised by the process channel, adapters and workers
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to spawn {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write to engine stdin failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("unsupported protocol for {0}")]
    UnsupportedProtocol(String),

    #[error("engine process disconnected")]
    Disconnected,

    #[error("move history diverged: `{sent}` is not a prefix of `{current}`")]
    MoveHistoryDiverged { sent: String, current: String },

    #[error("handshake did not complete within {waited_ms} ms")]
    HandshakeTimeout { waited_ms: u64 },

    #[error("engine startup failed: {0}")]
    Startup(String),
}

impl EngineError {
    /// True for conditions that invalidate the adapter instance;
    /// callers must not retry on the same worker.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Disconnected | EngineError::MoveHistoryDiverged { .. }
        )
    }
}

/// Errors raised by tournament construction and persistence
#[derive(Debug, thiserror::Error)]
pub enum TournamentError {
    #[error("roster is empty")]
    EmptyRoster,

    #[error("gauntlet topology needs at least one designated engine")]
    NoGauntletEngine,

    #[error("openings file missing: {0}")]
    MissingOpenings(PathBuf),

    #[error("malformed saved tournament at line {line}: {reason}")]
    MalformedSave { line: usize, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the board exchange
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("unknown provider id {0}")]
    UnknownProvider(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(EngineError::Disconnected.is_fatal());
        assert!(EngineError::MoveHistoryDiverged {
            sent: "e2e4 d7d5".into(),
            current: "d2d4".into(),
        }
        .is_fatal());
        assert!(!EngineError::HandshakeTimeout { waited_ms: 5000 }.is_fatal());
        assert!(!EngineError::UnsupportedProtocol("x".into()).is_fatal());
    }
}
