//! Handshake protocol adapter - turn-based engines
//!
//! The engine declares its capabilities in a feature section opened by an
//! explicit start command. While the section is open every line must be a
//! sequence of `feature key=value` tokens; `done=1` closes it, `done=0`
//! asks the caller to keep waiting. Missing `done=1` is tolerated via the
//! caller's timeout, never treated as fatal.
//!
//! Game continuation resends only the delta of moves the engine has not
//! acknowledged yet. The last-sent move list must remain a prefix of the
//! current one; a mismatch is a protocol-contract violation and fatal for
//! the adapter instance.

use std::collections::BTreeMap;

use arbiter_core::{
    EngineConfig, EngineError, EngineEvent, EventKind, GameOutcome, GameRecord, SearchInfo,
    SearchLimits, TimeControl,
};

use crate::channel::ProcessChannel;
use crate::protocol::{
    classify_read, disconnected_event, parse_field_i64, parse_field_u64, parse_pv_tokens,
    ProtocolAdapter, RawRead, UnknownTracker,
};

/// Boolean feature defaults applied when the engine does not declare them
const FEATURE_DEFAULTS: &[(&str, bool)] = &[
    ("ping", false),
    ("setboard", false),
    ("playother", false),
    ("usermove", false),
    ("san", false),
    ("time", true),
    ("draw", true),
    ("sigint", true),
    ("sigterm", true),
    ("reuse", true),
    ("analyze", true),
    ("colors", true),
    ("ics", false),
    ("name", false),
    ("pause", false),
    ("debug", false),
    ("memory", false),
    ("smp", false),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Idle,
    FeatureSection,
    Active,
}

/// Adapter for the turn-based handshake protocol
pub struct HandshakeAdapter {
    channel: ProcessChannel,
    engine: String,
    stage: Stage,
    features: BTreeMap<String, String>,
    unknown: UnknownTracker,
    /// Moves the engine has seen or made, for delta resends
    sent_moves: Vec<String>,
    engine_is_white: bool,
    control_sent: bool,
}

impl HandshakeAdapter {
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
            stage: Stage::Idle,
            features: BTreeMap::new(),
            unknown: UnknownTracker::default(),
            sent_moves: Vec::new(),
            engine_is_white: false,
            control_sent: false,
        }
    }

    fn feature_bool(&self, key: &str) -> bool {
        if let Some(value) = self.features.get(key) {
            return value == "1";
        }
        FEATURE_DEFAULTS
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, default)| *default)
            .unwrap_or(false)
    }

    /// Split a feature line into key=value tokens, honoring quoted values
    fn feature_tokens(rest: &str) -> Result<Vec<(String, String)>, String> {
        let mut tokens = Vec::new();
        let mut chars = rest.chars().peekable();
        while chars.peek().is_some() {
            while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                chars.next();
            }
            if chars.peek().is_none() {
                break;
            }
            let mut key = String::new();
            let mut saw_equals = false;
            for c in chars.by_ref() {
                if c == '=' {
                    saw_equals = true;
                    break;
                }
                if c.is_whitespace() {
                    return Err(format!("token `{key}` is not key=value"));
                }
                key.push(c);
            }
            if key.is_empty() {
                return Err("empty feature key".to_string());
            }
            // A bare token at end of input is just as malformed as one
            // mid-line
            if !saw_equals {
                return Err(format!("token `{key}` is not key=value"));
            }
            let mut value = String::new();
            if chars.peek() == Some(&'"') {
                chars.next();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '"' {
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
                if !closed {
                    return Err(format!("unterminated quote in feature `{key}`"));
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
            }
            tokens.push((key, value));
        }
        Ok(tokens)
    }

    fn parse_feature_line(&mut self, raw: &str, timestamp_ms: u64) -> EngineEvent {
        let Some(rest) = raw.strip_prefix("feature ") else {
            // Inside the feature section every line must declare features
            tracing::warn!(engine = %self.engine, line = raw, "non-feature line in feature section");
            return EngineEvent::from_line(
                &self.engine,
                timestamp_ms,
                raw,
                EventKind::Error(format!("unexpected line in feature section: `{raw}`")),
            );
        };

        let tokens = match Self::feature_tokens(rest) {
            Ok(tokens) => tokens,
            Err(reason) => {
                return EngineEvent::from_line(
                    &self.engine,
                    timestamp_ms,
                    raw,
                    EventKind::Error(reason),
                );
            }
        };

        let mut kind = EventKind::None;
        for (key, value) in tokens {
            if key == "done" {
                if value == "1" {
                    self.stage = Stage::Active;
                    kind = EventKind::ProtocolOk;
                } else {
                    // Engine needs more setup time; the caller extends
                    // its wait instead of failing
                    kind = EventKind::ExtendTimeout;
                }
            } else {
                self.features.insert(key, value);
            }
        }
        EngineEvent::from_line(&self.engine, timestamp_ms, raw, kind)
    }

    fn parse_play_line(&mut self, raw: &str, timestamp_ms: u64) -> EngineEvent {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return EngineEvent::from_line(&self.engine, timestamp_ms, raw, EventKind::None);
        }

        let mut fields = trimmed.split_whitespace();
        let first = fields.next().unwrap_or_default();

        if first == "move" {
            if let Some(mv) = fields.next() {
                self.unknown.reset_run();
                // The engine knows its own move; count it as sent
                self.sent_moves.push(mv.to_string());
                return EngineEvent::from_line(
                    &self.engine,
                    timestamp_ms,
                    raw,
                    EventKind::BestMove {
                        mv: mv.to_string(),
                        ponder: None,
                    },
                );
            }
        }

        if first == "Hint:" {
            if let Some(mv) = fields.next() {
                self.unknown.reset_run();
                return EngineEvent::from_line(
                    &self.engine,
                    timestamp_ms,
                    raw,
                    EventKind::PonderMove(mv.to_string()),
                );
            }
        }

        if first == "resign" {
            self.unknown.reset_run();
            return EngineEvent::from_line(&self.engine, timestamp_ms, raw, EventKind::Resign);
        }

        if let Some(outcome) = GameOutcome::from_token(first) {
            self.unknown.reset_run();
            return EngineEvent::from_line(
                &self.engine,
                timestamp_ms,
                raw,
                EventKind::GameResult(outcome),
            );
        }

        if first.starts_with("Error") || trimmed.starts_with("Illegal move") || first == "tellusererror" {
            self.unknown.reset_run();
            return EngineEvent::from_line(
                &self.engine,
                timestamp_ms,
                raw,
                EventKind::Error(trimmed.to_string()),
            );
        }

        if first.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            self.unknown.reset_run();
            return self.parse_thinking_line(trimmed, raw, timestamp_ms);
        }

        self.unknown.record(&self.engine, raw);
        EngineEvent::from_line(&self.engine, timestamp_ms, raw, EventKind::Unknown)
    }

    /// Thinking output: depth score time nodes, then the PV
    fn parse_thinking_line(&self, trimmed: &str, raw: &str, timestamp_ms: u64) -> EngineEvent {
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() < 4 {
            return EngineEvent::from_line(&self.engine, timestamp_ms, raw, EventKind::None)
                .with_parse_error("thinking line with fewer than 4 fields");
        }
        let mut diags = Vec::new();
        let depth = parse_field_u64(fields[0], "depth", &mut diags) as u32;
        let score_cp = parse_field_i64(fields[1], "score", &mut diags) as i32;
        // Time arrives in a 10ms unit
        let time_ms = parse_field_u64(fields[2], "time", &mut diags) * 10;
        let nodes = parse_field_u64(fields[3], "nodes", &mut diags);
        let pv = parse_pv_tokens(&fields[4..].join(" "));

        let mut event = EngineEvent::from_line(
            &self.engine,
            timestamp_ms,
            raw,
            EventKind::SearchInfo(SearchInfo {
                depth,
                score_cp,
                time_ms,
                nodes,
                sel_depth: None,
                nps: None,
                pv,
            }),
        );
        event.parse_errors = diags;
        event
    }

    fn send_time_control(&mut self, limits: &SearchLimits) -> Result<(), EngineError> {
        match limits.control {
            TimeControl::Classical {
                base_ms,
                increment_ms,
                moves_per_session,
            } => {
                let minutes = base_ms / 60_000;
                let seconds = (base_ms % 60_000) / 1000;
                let base = if seconds == 0 {
                    format!("{minutes}")
                } else {
                    format!("{minutes}:{seconds:02}")
                };
                self.channel.write_line(&format!(
                    "level {moves_per_session} {base} {}",
                    increment_ms / 1000
                ))?;
            }
            TimeControl::MoveTime { ms } => {
                self.channel.write_line(&format!("st {}", ms.div_ceil(1000)))?;
            }
            TimeControl::Depth { plies } => {
                self.channel.write_line(&format!("sd {plies}"))?;
            }
            TimeControl::NodesPerSecond { nps } => {
                self.channel.write_line(&format!("nps {nps}"))?;
            }
        }
        Ok(())
    }
}

impl ProtocolAdapter for HandshakeAdapter {
    fn start_protocol(&mut self) -> Result<(), EngineError> {
        self.channel.write_line("xboard")?;
        self.channel.write_line("protover 2")?;
        self.stage = Stage::FeatureSection;
        Ok(())
    }

    fn new_game(&mut self, game: &GameRecord, is_white: bool) -> Result<(), EngineError> {
        // A caller that timed out waiting for done=1 proceeds anyway
        self.stage = Stage::Active;
        self.engine_is_white = is_white;
        self.sent_moves.clear();
        self.control_sent = false;

        self.channel.write_line("new")?;
        self.channel.write_line("force")?;
        if !game.start_position.is_empty() {
            if self.feature_bool("setboard") {
                self.channel
                    .write_line(&format!("setboard {}", game.start_position))?;
            } else {
                tracing::warn!(
                    engine = %self.engine,
                    "engine lacks setboard; opening position ignored"
                );
            }
        }
        Ok(())
    }

    fn compute_move(
        &mut self,
        game: &GameRecord,
        limits: &SearchLimits,
        _ponder_hit: bool,
    ) -> Result<u64, EngineError> {
        // The stored move list must be a prefix of the new one; anything
        // else means caller and engine disagree about the game
        if game.moves.len() < self.sent_moves.len()
            || game.moves[..self.sent_moves.len()] != self.sent_moves[..]
        {
            return Err(EngineError::MoveHistoryDiverged {
                sent: self.sent_moves.join(" "),
                current: game.moves_joined(),
            });
        }

        if !self.control_sent {
            self.send_time_control(limits)?;
            self.control_sent = true;
        }

        self.channel.write_line("force")?;
        let use_usermove = self.feature_bool("usermove");
        let delta: Vec<String> = game.moves[self.sent_moves.len()..].to_vec();
        for mv in &delta {
            if use_usermove {
                self.channel.write_line(&format!("usermove {mv}"))?;
            } else {
                self.channel.write_line(mv)?;
            }
        }
        self.sent_moves = game.moves.clone();

        if self.feature_bool("time") {
            let (own, other) = if self.engine_is_white {
                (limits.white_ms, limits.black_ms)
            } else {
                (limits.black_ms, limits.white_ms)
            };
            self.channel.write_line(&format!("time {}", own / 10))?;
            self.channel.write_line(&format!("otim {}", other / 10))?;
        }

        self.channel.write_line("go")
    }

    fn allow_ponder(&mut self, allow: bool) -> Result<(), EngineError> {
        self.channel.write_line(if allow { "hard" } else { "easy" })?;
        Ok(())
    }

    fn move_now(&mut self) -> Result<(), EngineError> {
        self.channel.write_line("?")?;
        Ok(())
    }

    fn set_option_values(&mut self, options: &BTreeMap<String, String>) -> Result<(), EngineError> {
        for (name, value) in options {
            if value.is_empty() {
                self.channel.write_line(&format!("option {name}"))?;
            } else {
                self.channel.write_line(&format!("option {name}={value}"))?;
            }
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
                match self.stage {
                    Stage::FeatureSection => self.parse_feature_line(&raw, line.timestamp_ms),
                    Stage::Active => self.parse_play_line(&raw, line.timestamp_ms),
                    Stage::Idle => {
                        self.unknown.record(&self.engine, &raw);
                        EngineEvent::from_line(
                            &self.engine,
                            line.timestamp_ms,
                            raw,
                            EventKind::Unknown,
                        )
                    }
                }
            }
        }
    }

    fn is_protocol_ok_required(&self) -> bool {
        // A missing done=1 is tolerated via the caller's timeout
        false
    }

    fn terminate_engine(&mut self) {
        let _ = self.channel.write_line("quit");
        self.channel.terminate();
    }
}

impl HandshakeAdapter {
    /// Best-effort memory telemetry from the underlying process
    pub fn memory_usage(&self) -> Option<u64> {
        self.channel.memory_usage()
    }

    #[cfg(test)]
    pub(crate) fn start_stub(engine: &str) -> Self {
        let channel = ProcessChannel::start(std::path::Path::new("/bin/cat"), None).unwrap();
        Self::over_channel(channel, engine.to_string())
    }
}
