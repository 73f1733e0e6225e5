//! Stream protocol adapter - streaming analysis engines
//!
//! Handshake completion is mandatory for this variant: an engine that
//! never confirms the protocol is a fatal startup failure. Search
//! telemetry arrives as positional lines - depth, score, time (10ms
//! unit), nodes - optionally extended by tab-delimited trailing fields
//! (selective depth, nodes per second) and finished by principal
//! variation tokens whose parenthesized refutation segments are
//! stripped. Malformed numeric fields become diagnostics on the event;
//! the read loop never aborts over them.

use std::collections::BTreeMap;

use arbiter_core::{
    EngineConfig, EngineError, EngineEvent, EventKind, GameRecord, SearchInfo, SearchLimits,
    TimeControl,
};

use crate::channel::ProcessChannel;
use crate::protocol::{
    classify_read, disconnected_event, parse_field_i64, parse_field_u64, parse_pv_tokens,
    ProtocolAdapter, RawRead, UnknownTracker,
};

/// Adapter for the streaming analysis protocol
pub struct StreamAdapter {
    channel: ProcessChannel,
    engine: String,
    handshake_done: bool,
    reported_name: Option<String>,
    reported_author: Option<String>,
    unknown: UnknownTracker,
}

impl StreamAdapter {
    /// Spawn the engine process for the given config
    pub fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        let channel = ProcessChannel::start(&config.path, config.working_dir.as_deref())?;
        Ok(Self::over_channel(channel, config.name.clone()))
    }

    /// Wrap an already-started channel (used by tests with stub engines)
    pub fn over_channel(channel: ProcessChannel, engine: String) -> Self {
        Self {
            channel,
            engine,
            handshake_done: false,
            reported_name: None,
            reported_author: None,
            unknown: UnknownTracker::default(),
        }
    }

    /// Engine author reported during the handshake, if any
    pub fn reported_author(&self) -> Option<&str> {
        self.reported_author.as_deref()
    }

    fn parse_line(&mut self, raw: &str, timestamp_ms: u64) -> EngineEvent {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return EngineEvent::from_line(&self.engine, timestamp_ms, raw, EventKind::None);
        }

        let mut fields = trimmed.split_whitespace();
        let first = fields.next().unwrap_or_default();

        match first {
            "uciok" => {
                self.unknown.reset_run();
                self.handshake_done = true;
                return EngineEvent::from_line(&self.engine, timestamp_ms, raw, EventKind::ProtocolOk);
            }
            "readyok" => {
                self.unknown.reset_run();
                return EngineEvent::from_line(&self.engine, timestamp_ms, raw, EventKind::ReadyOk);
            }
            "id" => {
                self.unknown.reset_run();
                let rest: Vec<&str> = fields.collect();
                match rest.split_first() {
                    Some((&"name", value)) => self.reported_name = Some(value.join(" ")),
                    Some((&"author", value)) => self.reported_author = Some(value.join(" ")),
                    _ => {}
                }
                return EngineEvent::from_line(&self.engine, timestamp_ms, raw, EventKind::None);
            }
            "option" => {
                // Declarations are informational for this layer
                self.unknown.reset_run();
                return EngineEvent::from_line(&self.engine, timestamp_ms, raw, EventKind::None);
            }
            "bestmove" => {
                self.unknown.reset_run();
                let mv = fields.next().unwrap_or_default().to_string();
                if mv.is_empty() {
                    return EngineEvent::from_line(&self.engine, timestamp_ms, raw, EventKind::None)
                        .with_parse_error("bestmove line without a move");
                }
                let ponder = match (fields.next(), fields.next()) {
                    (Some("ponder"), Some(p)) => Some(p.to_string()),
                    _ => None,
                };
                return EngineEvent::from_line(
                    &self.engine,
                    timestamp_ms,
                    raw,
                    EventKind::BestMove { mv, ponder },
                );
            }
            "info" => {
                // Keyword-style info is not part of this variant's grammar
                self.unknown.reset_run();
                return EngineEvent::from_line(&self.engine, timestamp_ms, raw, EventKind::None);
            }
            _ => {}
        }

        if first.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            self.unknown.reset_run();
            return self.parse_info_line(trimmed, raw, timestamp_ms);
        }

        self.unknown.record(&self.engine, raw);
        EngineEvent::from_line(&self.engine, timestamp_ms, raw, EventKind::Unknown)
    }

    /// Positional search-info parse
    ///
    /// Segment 0: depth score time nodes. Further tab-delimited segments
    /// extend the metrics (sel-depth, nps); the final segment holds the
    /// principal variation.
    fn parse_info_line(&self, trimmed: &str, raw: &str, timestamp_ms: u64) -> EngineEvent {
        let segments: Vec<&str> = trimmed.split('\t').collect();
        let mut diags = Vec::new();

        let head: Vec<&str> = segments[0].split_whitespace().collect();
        if head.len() < 4 {
            return EngineEvent::from_line(&self.engine, timestamp_ms, raw, EventKind::None)
                .with_parse_error("search-info head with fewer than 4 fields");
        }
        let depth = parse_field_u64(head[0], "depth", &mut diags) as u32;
        let score_cp = parse_field_i64(head[1], "score", &mut diags) as i32;
        // Time arrives in a 10ms unit
        let time_ms = parse_field_u64(head[2], "time", &mut diags) * 10;
        let nodes = parse_field_u64(head[3], "nodes", &mut diags);

        let mut sel_depth = None;
        let mut nps = None;

        let pv = match segments.len() {
            // PV shares the head segment
            1 => parse_pv_tokens(&head[4..].join(" ")),
            2 => parse_pv_tokens(segments[1]),
            _ => {
                let extras: Vec<&str> = segments[1].split_whitespace().collect();
                if let Some(field) = extras.first() {
                    sel_depth = Some(parse_field_u64(field, "sel-depth", &mut diags) as u32);
                }
                if let Some(field) = extras.get(1) {
                    nps = Some(parse_field_u64(field, "nps", &mut diags));
                }
                parse_pv_tokens(segments[segments.len() - 1])
            }
        };

        let mut event = EngineEvent::from_line(
            &self.engine,
            timestamp_ms,
            raw,
            EventKind::SearchInfo(SearchInfo {
                depth,
                score_cp,
                time_ms,
                nodes,
                sel_depth,
                nps,
                pv,
            }),
        );
        event.parse_errors = diags;
        event
    }

    fn position_line(game: &GameRecord) -> String {
        let base = if game.start_position.is_empty() {
            "position startpos".to_string()
        } else {
            format!("position fen {}", game.start_position)
        };
        if game.moves.is_empty() {
            base
        } else {
            format!("{base} moves {}", game.moves_joined())
        }
    }
}

impl ProtocolAdapter for StreamAdapter {
    fn start_protocol(&mut self) -> Result<(), EngineError> {
        self.channel.write_line("uci")?;
        Ok(())
    }

    fn new_game(&mut self, _game: &GameRecord, _is_white: bool) -> Result<(), EngineError> {
        self.channel.write_line("ucinewgame")?;
        self.channel.write_line("isready")?;
        Ok(())
    }

    fn compute_move(
        &mut self,
        game: &GameRecord,
        limits: &SearchLimits,
        ponder_hit: bool,
    ) -> Result<u64, EngineError> {
        if ponder_hit {
            // The engine is already searching the predicted position
            return self.channel.write_line("ponderhit");
        }

        self.channel.write_line(&Self::position_line(game))?;
        let go = match limits.control {
            TimeControl::Classical { increment_ms, .. } => format!(
                "go wtime {} btime {} winc {} binc {}",
                limits.white_ms, limits.black_ms, increment_ms, increment_ms
            ),
            TimeControl::MoveTime { ms } => format!("go movetime {ms}"),
            TimeControl::Depth { plies } => format!("go depth {plies}"),
            TimeControl::NodesPerSecond { nps } => format!("go nodes {nps}"),
        };
        self.channel.write_line(&go)
    }

    fn allow_ponder(&mut self, allow: bool) -> Result<(), EngineError> {
        self.channel
            .write_line(&format!("setoption name Ponder value {allow}"))?;
        Ok(())
    }

    fn move_now(&mut self) -> Result<(), EngineError> {
        self.channel.write_line("stop")?;
        Ok(())
    }

    fn set_option_values(&mut self, options: &BTreeMap<String, String>) -> Result<(), EngineError> {
        for (name, value) in options {
            self.channel
                .write_line(&format!("setoption name {name} value {value}"))?;
        }
        Ok(())
    }

    fn read_event(&mut self) -> EngineEvent {
        match classify_read(self.channel.try_read_line()) {
            RawRead::NoData => {
                EngineEvent::synthetic(&self.engine, self.channel.now_ms(), EventKind::NoData)
            }
            RawRead::Terminated(ts) => disconnected_event(&self.engine, ts),
            RawRead::Line(line) => {
                let raw = line.content;
                self.parse_line(&raw, line.timestamp_ms)
            }
        }
    }

    fn is_protocol_ok_required(&self) -> bool {
        // Absence of handshake confirmation is a fatal startup error
        true
    }

    fn reported_name(&self) -> Option<&str> {
        self.reported_name.as_deref()
    }

    fn terminate_engine(&mut self) {
        let _ = self.channel.write_line("quit");
        self.channel.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn stub_adapter() -> StreamAdapter {
        let channel =
            ProcessChannel::start(std::path::Path::new("/bin/cat"), None).unwrap();
        StreamAdapter::over_channel(channel, "sigma".to_string())
    }

    fn feed(adapter: &mut StreamAdapter, line: &str) -> EngineEvent {
        adapter.channel.write_line(line).unwrap();
        for _ in 0..200 {
            let event = adapter.read_event();
            if event.kind != EventKind::NoData {
                return event;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("no event for line `{line}`");
    }

    #[test]
    fn test_handshake_completion() {
        let mut adapter = stub_adapter();
        assert!(adapter.is_protocol_ok_required());
        assert!(!adapter.handshake_done);

        let ev = feed(&mut adapter, "id name Sigma 2.1");
        assert_eq!(ev.kind, EventKind::None);
        let ev = feed(&mut adapter, "id author S. Example");
        assert_eq!(ev.kind, EventKind::None);
        let ev = feed(&mut adapter, "option name Hash type spin default 16");
        assert_eq!(ev.kind, EventKind::None);
        let ev = feed(&mut adapter, "uciok");
        assert_eq!(ev.kind, EventKind::ProtocolOk);

        assert!(adapter.handshake_done);
        assert_eq!(adapter.reported_name(), Some("Sigma 2.1"));
        assert_eq!(adapter.reported_author(), Some("S. Example"));
    }

    #[test]
    fn test_readyok_event() {
        let mut adapter = stub_adapter();
        let ev = feed(&mut adapter, "readyok");
        assert_eq!(ev.kind, EventKind::ReadyOk);
    }

    #[test]
    fn test_bestmove_with_ponder() {
        let mut adapter = stub_adapter();
        let ev = feed(&mut adapter, "bestmove e2e4 ponder e7e5");
        assert_eq!(
            ev.kind,
            EventKind::BestMove {
                mv: "e2e4".to_string(),
                ponder: Some("e7e5".to_string())
            }
        );
    }

    #[test]
    fn test_bestmove_without_ponder() {
        let mut adapter = stub_adapter();
        let ev = feed(&mut adapter, "bestmove g1f3");
        assert_eq!(
            ev.kind,
            EventKind::BestMove {
                mv: "g1f3".to_string(),
                ponder: None
            }
        );
    }

    #[test]
    fn test_info_line_full_vector() {
        let mut adapter = stub_adapter();
        let ev = feed(&mut adapter, "5 120 3400 91000\t12 850000\te4 e5 Nf3");
        match ev.kind {
            EventKind::SearchInfo(info) => {
                assert_eq!(info.depth, 5);
                assert_eq!(info.score_cp, 120);
                assert_eq!(info.time_ms, 34000); // 10ms unit scaled
                assert_eq!(info.nodes, 91000);
                assert_eq!(info.sel_depth, Some(12));
                assert_eq!(info.nps, Some(850000));
                assert_eq!(info.pv, vec!["e4", "e5", "Nf3"]);
            }
            other => panic!("expected SearchInfo, got {other:?}"),
        }
        assert!(ev.parse_errors.is_empty());
    }

    #[test]
    fn test_info_line_without_extras() {
        let mut adapter = stub_adapter();
        let ev = feed(&mut adapter, "5 -40 200 15000\td2d4 d7d5");
        match ev.kind {
            EventKind::SearchInfo(info) => {
                assert_eq!(info.score_cp, -40);
                assert_eq!(info.sel_depth, None);
                assert_eq!(info.nps, None);
                assert_eq!(info.pv, vec!["d2d4", "d7d5"]);
            }
            other => panic!("expected SearchInfo, got {other:?}"),
        }
    }

    #[test]
    fn test_info_line_refutations_stripped() {
        let mut adapter = stub_adapter();
        let ev = feed(&mut adapter, "7 33 90 120000\te4 (e5 Nf3) c5 Nf3");
        match ev.kind {
            EventKind::SearchInfo(info) => {
                assert_eq!(info.pv, vec!["e4", "c5", "Nf3"]);
            }
            other => panic!("expected SearchInfo, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_numeric_is_recoverable() {
        let mut adapter = stub_adapter();
        let ev = feed(&mut adapter, "5 12q 3400 91000\te4");
        assert!(matches!(ev.kind, EventKind::SearchInfo(_)));
        assert_eq!(ev.parse_errors.len(), 1);
        assert!(ev.parse_errors[0].contains("score"));
    }

    #[test]
    fn test_unknown_line_classified() {
        let mut adapter = stub_adapter();
        let ev = feed(&mut adapter, "warming up tablebases...");
        assert_eq!(ev.kind, EventKind::Unknown);
        assert!(!ev.is_fatal());
    }

    #[test]
    fn test_position_line_formats() {
        let mut game = GameRecord::default();
        assert_eq!(StreamAdapter::position_line(&game), "position startpos");
        game.push_move("e2e4");
        assert_eq!(
            StreamAdapter::position_line(&game),
            "position startpos moves e2e4"
        );
        let with_fen = GameRecord::from_position("8/8/8/8/8/8/8/K1k5 w - - 0 1");
        assert_eq!(
            StreamAdapter::position_line(&with_fen),
            "position fen 8/8/8/8/8/8/8/K1k5 w - - 0 1"
        );
    }

    #[test]
    fn test_disconnected_after_terminate() {
        let mut adapter = stub_adapter();
        adapter.channel.terminate();
        for _ in 0..200 {
            let ev = adapter.read_event();
            match ev.kind {
                EventKind::Disconnected => return,
                EventKind::NoData => std::thread::sleep(Duration::from_millis(2)),
                _ => continue,
            }
        }
        panic!("never saw Disconnected");
    }
}
