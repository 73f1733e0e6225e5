//! Protocol adapters - engine wire protocols behind one trait
//!
//! Two incompatible text protocols are supported:
//! - `HandshakeAdapter`: turn-based, explicit feature-declaration section
//! - `StreamAdapter`: streaming analysis output, mandatory handshake
//!
//! The variant is selected once at construction from
//! `EngineConfig::protocol`; there is no runtime switching. Adapters never
//! return errors across the read loop for parse problems - those become
//! diagnostics on the event. Errors are reserved for protocol-contract
//! violations and transport failures.

mod handshake;
mod stream;

pub use handshake::HandshakeAdapter;
pub use stream::StreamAdapter;

use std::collections::BTreeMap;

use arbiter_core::{EngineError, EngineEvent, EventKind, GameRecord, SearchLimits};

use crate::channel::{ReadError, ReadLine};

/// Consecutive unknown lines tolerated at warn level before logging
/// drops to debug. Counting continues either way.
const UNKNOWN_LOG_LIMIT: u32 = 5;

/// Common contract of both protocol variants
pub trait ProtocolAdapter: Send {
    /// Begin the handshake
    fn start_protocol(&mut self) -> Result<(), EngineError>;

    /// Prepare the engine for a new game
    fn new_game(&mut self, game: &GameRecord, is_white: bool) -> Result<(), EngineError>;

    /// Ask for a move; returns the dispatch timestamp (fire-and-forget)
    fn compute_move(
        &mut self,
        game: &GameRecord,
        limits: &SearchLimits,
        ponder_hit: bool,
    ) -> Result<u64, EngineError>;

    /// Enable or disable pondering
    fn allow_ponder(&mut self, allow: bool) -> Result<(), EngineError>;

    /// Interrupt the current search
    fn move_now(&mut self) -> Result<(), EngineError>;

    /// Send option name/value pairs
    fn set_option_values(&mut self, options: &BTreeMap<String, String>) -> Result<(), EngineError>;

    /// Read one event; `NoData` when no complete line is available
    fn read_event(&mut self) -> EngineEvent;

    /// Whether a missing handshake completion is a fatal startup error
    fn is_protocol_ok_required(&self) -> bool;

    /// Engine name reported during the handshake, if any
    fn reported_name(&self) -> Option<&str> {
        None
    }

    /// Shut the engine down and terminate the process
    fn terminate_engine(&mut self);
}

/// Rate-limited accounting of structurally unexpected lines
#[derive(Debug, Default)]
pub(crate) struct UnknownTracker {
    consecutive: u32,
    total: u64,
}

impl UnknownTracker {
    /// Record one unknown line and log it at the appropriate level
    pub(crate) fn record(&mut self, engine: &str, raw: &str) {
        self.consecutive += 1;
        self.total += 1;
        if self.consecutive <= UNKNOWN_LOG_LIMIT {
            tracing::warn!(engine, line = raw, "unexpected engine output");
        } else {
            tracing::debug!(
                engine,
                line = raw,
                total = self.total,
                "unexpected engine output (suppressed)"
            );
        }
    }

    /// A recognized line resets the consecutive run
    pub(crate) fn reset_run(&mut self) {
        self.consecutive = 0;
    }

    #[cfg(test)]
    pub(crate) fn total(&self) -> u64 {
        self.total
    }
}

/// What one raw channel read produced
pub(crate) enum RawRead {
    Line(ReadLine),
    NoData,
    Terminated(u64),
}

/// Classify a non-blocking channel read
pub(crate) fn classify_read(line: Option<ReadLine>) -> RawRead {
    match line {
        None => RawRead::NoData,
        Some(line) if line.error == ReadError::Terminated => RawRead::Terminated(line.timestamp_ms),
        Some(line) => RawRead::Line(line),
    }
}

/// Parse one unsigned numeric field, producing a diagnostic on failure
pub(crate) fn parse_field_u64(field: &str, name: &str, diags: &mut Vec<String>) -> u64 {
    match field.parse() {
        Ok(value) => value,
        Err(_) => {
            diags.push(format!("malformed {name} field `{field}`"));
            0
        }
    }
}

/// Parse one signed numeric field, producing a diagnostic on failure
pub(crate) fn parse_field_i64(field: &str, name: &str, diags: &mut Vec<String>) -> i64 {
    match field.parse() {
        Ok(value) => value,
        Err(_) => {
            diags.push(format!("malformed {name} field `{field}`"));
            0
        }
    }
}

/// Split principal-variation text into move tokens, stripping
/// parenthesized refutation segments (nesting included)
pub(crate) fn parse_pv_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut depth = 0u32;
    let mut current = String::new();
    for ch in text.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() => {
                if depth == 0 && !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => {
                if depth == 0 {
                    current.push(c);
                }
            }
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Event for a line that arrived after the process exited.
/// Fatal: the caller must not retry on this adapter instance.
pub(crate) fn disconnected_event(engine: &str, timestamp_ms: u64) -> EngineEvent {
    tracing::error!(engine, "engine process disconnected");
    EngineEvent::synthetic(engine, timestamp_ms, EventKind::Disconnected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tracker_counts_past_limit() {
        let mut tracker = UnknownTracker::default();
        for _ in 0..8 {
            tracker.record("alpha", "garbage");
        }
        // Suppressed from warn level after 5, still counted
        assert_eq!(tracker.total(), 8);
    }

    #[test]
    fn test_unknown_tracker_resets_on_recognized_line() {
        let mut tracker = UnknownTracker::default();
        for _ in 0..4 {
            tracker.record("alpha", "garbage");
        }
        tracker.reset_run();
        assert_eq!(tracker.consecutive, 0);
        assert_eq!(tracker.total(), 4);
    }

    #[test]
    fn test_pv_tokens_strip_refutations() {
        let pv = parse_pv_tokens("e4 e5 (Nf3 Nc6) Nf3");
        assert_eq!(pv, vec!["e4", "e5", "Nf3"]);
    }

    #[test]
    fn test_pv_tokens_attached_parens() {
        let pv = parse_pv_tokens("e4 (e5) d4 (d5 (Nf6)) c4");
        assert_eq!(pv, vec!["e4", "d4", "c4"]);
    }

    #[test]
    fn test_parse_field_diagnostics() {
        let mut diags = Vec::new();
        assert_eq!(parse_field_u64("91000", "nodes", &mut diags), 91000);
        assert!(diags.is_empty());
        assert_eq!(parse_field_u64("91k", "nodes", &mut diags), 0);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("nodes"));
        assert_eq!(parse_field_i64("-250", "score", &mut diags), -250);
    }
}
