//! Engine events - the semantic output of protocol adapters
//!
//! Every adapter read produces exactly one event. The payload lives in the
//! variant, so at most one of best-move / ponder-move / search-info /
//! game-result is ever populated. Timestamps are monotonically
//! non-decreasing per engine (single reader thread per process).

use serde::{Deserialize, Serialize};

use crate::game::GameOutcome;

/// Metrics parsed from one search-info line
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchInfo {
    /// Search depth in plies
    pub depth: u32,
    /// Score in centipawns from the engine's perspective
    pub score_cp: i32,
    /// Elapsed search time in milliseconds
    pub time_ms: u64,
    /// Nodes searched
    pub nodes: u64,
    /// Selective depth, when the engine reports one
    pub sel_depth: Option<u32>,
    /// Nodes per second, when the engine reports one
    pub nps: Option<u64>,
    /// Principal variation tokens
    pub pv: Vec<String>,
}

/// Classification of one adapter read
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// Read produced nothing actionable (e.g. an empty line)
    None,
    /// Handshake completed
    ProtocolOk,
    /// Engine answered a readiness probe
    ReadyOk,
    /// Engine committed to a move; streaming engines may attach the
    /// expected reply for pondering
    BestMove { mv: String, ponder: Option<String> },
    /// Engine volunteered a ponder suggestion outside a best-move line
    PonderMove(String),
    /// One line of search telemetry
    SearchInfo(SearchInfo),
    /// Engine resigned
    Resign,
    /// Engine reported a game result
    GameResult(GameOutcome),
    /// Engine-side error report
    Error(String),
    /// Line arrived after the process exited; fatal for this adapter
    Disconnected,
    /// Structurally unexpected line; logged, never fatal
    Unknown,
    /// No complete line was available
    NoData,
    /// Engine asked for more handshake time (`done=0`); the caller must
    /// extend its wait instead of failing
    ExtendTimeout,
}

/// One event read from an engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Originating engine identifier (config name)
    pub engine: String,
    /// Receive timestamp in milliseconds, monotonic per engine
    pub timestamp_ms: u64,
    /// Raw line the event was parsed from
    pub raw: String,
    /// Classification and payload
    pub kind: EventKind,
    /// Recoverable parse diagnostics (malformed numeric fields etc.);
    /// never abort the read loop
    pub parse_errors: Vec<String>,
}

impl EngineEvent {
    /// Event with no raw line (NoData, Disconnected)
    pub fn synthetic(engine: impl Into<String>, timestamp_ms: u64, kind: EventKind) -> Self {
        Self {
            engine: engine.into(),
            timestamp_ms,
            raw: String::new(),
            kind,
            parse_errors: Vec::new(),
        }
    }

    /// Event parsed from a raw line
    pub fn from_line(
        engine: impl Into<String>,
        timestamp_ms: u64,
        raw: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            engine: engine.into(),
            timestamp_ms,
            raw: raw.into(),
            kind,
            parse_errors: Vec::new(),
        }
    }

    /// Attach a recoverable diagnostic
    pub fn with_parse_error(mut self, diag: impl Into<String>) -> Self {
        self.parse_errors.push(diag.into());
        self
    }

    /// True when the scheduler must discard the owning worker
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, EventKind::Disconnected)
    }
}
