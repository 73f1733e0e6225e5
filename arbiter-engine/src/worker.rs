//! Engine worker - one live engine with bookkeeping
//!
//! Pairs a protocol adapter with the engine's identity, startup state and
//! failure flag. A worker lives for one engine lifetime: restarting an
//! engine means destroying the worker and creating a new one.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use arbiter_core::{EngineConfig, EngineError, EngineEvent, EventKind, GameRecord, SearchLimits};

use crate::protocol::ProtocolAdapter;

/// Where the worker is in its startup sequence
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartupState {
    /// Handshake sent, completion not yet observed
    Pending,
    /// Handshake completed (or tolerably absent)
    Ready,
    /// Startup failed; the worker must be recreated
    Failed(String),
}

/// One live engine: adapter plus bookkeeping
pub struct EngineWorker {
    config: EngineConfig,
    adapter: Box<dyn ProtocolAdapter>,
    startup: StartupState,
    failed: bool,
}

impl EngineWorker {
    /// Wrap a started adapter; the handshake must already be dispatched
    pub fn new(config: EngineConfig, adapter: Box<dyn ProtocolAdapter>) -> Self {
        Self {
            config,
            adapter,
            startup: StartupState::Pending,
            failed: false,
        }
    }

    /// Configured engine name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Engine-reported name when available, configured name otherwise
    pub fn display_name(&self) -> &str {
        self.adapter.reported_name().unwrap_or(&self.config.name)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn startup(&self) -> &StartupState {
        &self.startup
    }

    pub fn is_ready(&self) -> bool {
        self.startup == StartupState::Ready && !self.failed
    }

    pub fn is_failed(&self) -> bool {
        self.failed || matches!(self.startup, StartupState::Failed(_))
    }

    /// Mark the worker unusable (fatal-per-engine condition observed)
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(engine = self.name(), reason, "worker failed");
        self.failed = true;
        if self.startup == StartupState::Pending {
            self.startup = StartupState::Failed(reason);
        }
    }

    /// Drive the handshake until completion or timeout
    ///
    /// `ExtendTimeout` events push the deadline back by the original
    /// timeout. On expiry the protocol decides: variants that require
    /// completion fail, the others are considered ready.
    pub fn wait_ready(&mut self, timeout: Duration) -> Result<(), EngineError> {
        let start = Instant::now();
        let mut deadline = start + timeout;

        loop {
            // Checked every iteration: an engine streaming lines without
            // ever completing the handshake must still hit the deadline
            if Instant::now() >= deadline {
                if self.adapter.is_protocol_ok_required() {
                    let waited_ms = start.elapsed().as_millis() as u64;
                    self.startup =
                        StartupState::Failed(format!("no handshake after {waited_ms} ms"));
                    self.failed = true;
                    return Err(EngineError::HandshakeTimeout { waited_ms });
                }
                // Tolerated: proceed without confirmation
                break;
            }

            let event = self.adapter.read_event();
            match event.kind {
                EventKind::ProtocolOk => break,
                EventKind::ExtendTimeout => {
                    tracing::debug!(engine = self.name(), "engine asked for more handshake time");
                    deadline = Instant::now() + timeout;
                }
                EventKind::Disconnected => {
                    self.startup = StartupState::Failed("disconnected during handshake".into());
                    self.failed = true;
                    return Err(EngineError::Disconnected);
                }
                EventKind::Error(ref reason) => {
                    tracing::warn!(engine = self.name(), reason, "handshake protocol error");
                }
                EventKind::NoData => {
                    std::thread::sleep(Duration::from_millis(5));
                }
                _ => {}
            }
        }

        self.startup = StartupState::Ready;
        if !self.config.options.is_empty() {
            self.adapter.set_option_values(&self.config.options)?;
        }
        tracing::info!(engine = self.display_name(), "engine ready");
        Ok(())
    }

    pub fn new_game(&mut self, game: &GameRecord, is_white: bool) -> Result<(), EngineError> {
        self.adapter.new_game(game, is_white)
    }

    pub fn compute_move(
        &mut self,
        game: &GameRecord,
        limits: &SearchLimits,
        ponder_hit: bool,
    ) -> Result<u64, EngineError> {
        self.adapter.compute_move(game, limits, ponder_hit)
    }

    pub fn allow_ponder(&mut self, allow: bool) -> Result<(), EngineError> {
        self.adapter.allow_ponder(allow)
    }

    pub fn move_now(&mut self) -> Result<(), EngineError> {
        self.adapter.move_now()
    }

    pub fn set_option_values(
        &mut self,
        options: &BTreeMap<String, String>,
    ) -> Result<(), EngineError> {
        self.adapter.set_option_values(options)
    }

    /// Read one event, tracking fatal conditions on the worker
    pub fn read_event(&mut self) -> EngineEvent {
        let event = self.adapter.read_event();
        if event.is_fatal() {
            self.failed = true;
        }
        event
    }

    /// Shut the engine down
    pub fn terminate(&mut self) {
        self.adapter.terminate_engine();
    }
}
