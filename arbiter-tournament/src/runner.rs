//! Engine match runner - plays one game between two live engines
//!
//! The runner owns the full lifecycle of a game: it starts both engines
//! through the factory, relays best-move events between them, keeps the
//! clocks, and classifies how the game ended. An engine that resigns,
//! disconnects, errors out of `compute_move` or oversteps its clock
//! forfeits; hitting the ply cap without a terminal result leaves the
//! game unterminated.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arbiter_core::{
    BoardExchange, EngineData, EventKind, GameOutcome, GameRecord, ProviderId, SearchInfo,
    SearchLimits, TimeControl,
};
use arbiter_engine::{EngineWorker, EngineWorkerFactory};

use crate::pool::{GameJob, GameRunner};

const DEFAULT_MOVE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_PLIES: u32 = 512;
const EVENT_POLL: Duration = Duration::from_millis(2);

/// Plays jobs on freshly started engine pairs
pub struct EngineMatchRunner {
    factory: EngineWorkerFactory,
    move_timeout: Duration,
    max_plies: u32,
    exchange: Option<Arc<BoardExchange>>,
}

impl EngineMatchRunner {
    pub fn new() -> Self {
        Self {
            factory: EngineWorkerFactory::new(),
            move_timeout: DEFAULT_MOVE_TIMEOUT,
            max_plies: DEFAULT_MAX_PLIES,
            exchange: None,
        }
    }

    /// Replace the worker factory (startup timeout etc.)
    pub fn with_factory(mut self, factory: EngineWorkerFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Hard ceiling on how long one move computation may take
    pub fn with_move_timeout(mut self, timeout: Duration) -> Self {
        self.move_timeout = timeout;
        self
    }

    /// Ply cap after which the game is left unterminated
    pub fn with_max_plies(mut self, max_plies: u32) -> Self {
        self.max_plies = max_plies;
        self
    }

    /// Publish live game state to an exchange while playing
    pub fn with_exchange(mut self, exchange: Arc<BoardExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    fn play(
        &self,
        white: &mut EngineWorker,
        black: &mut EngineWorker,
        record: &mut GameRecord,
        limits: &mut SearchLimits,
        provider: Option<(&BoardExchange, ProviderId)>,
    ) -> GameOutcome {
        if white.new_game(record, true).is_err() {
            return GameOutcome::BlackWins;
        }
        if black.new_game(record, false).is_err() {
            return GameOutcome::WhiteWins;
        }

        for _ in 0..self.max_plies {
            let white_to_move = record.moves.len() % 2 == 0;
            let mut last_info: Option<SearchInfo> = None;

            let move_start = Instant::now();
            let deadline = move_start + self.move_timeout;
            let played = {
                let mover = if white_to_move { &mut *white } else { &mut *black };
                if let Err(err) = mover.compute_move(record, limits, false) {
                    tracing::warn!(engine = mover.name(), %err, "move dispatch failed");
                    return loss_for_side(white_to_move);
                }
                loop {
                    let event = mover.read_event();
                    match event.kind {
                        EventKind::BestMove { mv, .. } => break mv,
                        EventKind::Resign => {
                            tracing::info!(engine = mover.name(), "engine resigned");
                            return loss_for_side(white_to_move);
                        }
                        EventKind::GameResult(outcome) => {
                            tracing::info!(
                                engine = mover.name(),
                                result = outcome.as_token(),
                                "engine reported game over"
                            );
                            return outcome;
                        }
                        EventKind::Disconnected => {
                            tracing::warn!(engine = mover.name(), "engine disconnected mid-game");
                            return loss_for_side(white_to_move);
                        }
                        EventKind::SearchInfo(info) => last_info = Some(info),
                        EventKind::Error(reason) => {
                            tracing::warn!(
                                engine = mover.name(),
                                reason,
                                "engine error during game"
                            );
                        }
                        EventKind::NoData => {
                            if Instant::now() >= deadline {
                                tracing::warn!(engine = mover.name(), "move timeout");
                                return loss_for_side(white_to_move);
                            }
                            std::thread::sleep(EVENT_POLL);
                        }
                        _ => {}
                    }
                }
            };

            // Clock bookkeeping; a fallen flag forfeits the game
            let elapsed_ms = move_start.elapsed().as_millis() as u64;
            if let TimeControl::Classical { increment_ms, .. } = limits.control {
                let clock = if white_to_move {
                    &mut limits.white_ms
                } else {
                    &mut limits.black_ms
                };
                if elapsed_ms >= *clock {
                    tracing::info!(
                        engine = if white_to_move { white.name() } else { black.name() },
                        "flag fell"
                    );
                    return loss_for_side(white_to_move);
                }
                *clock = *clock - elapsed_ms + increment_ms;
            }

            record.push_move(played);
            if let Some((exchange, id)) = provider {
                let mv = record.moves.last().cloned().unwrap_or_default();
                let _ = exchange.modify_game_record(id, move |r| r.push_move(mv));
                publish_engine_data(exchange, id, white, black, limits, last_info.as_ref());
            }
        }

        tracing::warn!(plies = self.max_plies, "ply cap reached, game unterminated");
        GameOutcome::Unterminated
    }
}

impl Default for EngineMatchRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl GameRunner for EngineMatchRunner {
    fn run(&self, job: &GameJob) -> GameOutcome {
        let configs = [job.white.clone(), job.black.clone()];
        let mut workers = self.factory.create_engines(&configs, false);
        if workers.len() < 2 {
            let outcome = match workers.first() {
                Some(survivor) if survivor.name() == job.white.name => GameOutcome::WhiteWins,
                Some(_) => GameOutcome::BlackWins,
                None => GameOutcome::Unterminated,
            };
            tracing::warn!(
                white = %job.white.name,
                black = %job.black.name,
                result = outcome.as_token(),
                "game decided by startup forfeit"
            );
            for worker in &mut workers {
                worker.terminate();
            }
            return outcome;
        }
        let mut black = workers.pop().unwrap();
        let mut white = workers.pop().unwrap();

        let provider = self
            .exchange
            .as_deref()
            .map(|exchange| (exchange, exchange.register_provider()));
        let mut record = GameRecord::from_position(job.opening.clone());
        if let Some((exchange, id)) = provider {
            let _ = exchange.set_game_record(id, record.clone());
            publish_engine_data(exchange, id, &white, &black, &job.limits, None);
        }

        let mut limits = job.limits;
        let outcome = self.play(&mut white, &mut black, &mut record, &mut limits, provider);

        white.terminate();
        black.terminate();
        record.outcome = Some(outcome);
        if let Some((exchange, id)) = provider {
            let _ = exchange.set_game_record(id, record);
            let _ = exchange.unregister_provider(id);
        }
        outcome
    }
}

fn loss_for_side(white_to_move: bool) -> GameOutcome {
    if white_to_move {
        GameOutcome::BlackWins
    } else {
        GameOutcome::WhiteWins
    }
}

fn publish_engine_data(
    exchange: &BoardExchange,
    id: ProviderId,
    white: &EngineWorker,
    black: &EngineWorker,
    limits: &SearchLimits,
    info: Option<&SearchInfo>,
) {
    let _ = exchange.set_engine_data_list(
        id,
        vec![
            EngineData {
                name: white.display_name().to_string(),
                info: info.cloned(),
                clock_ms: limits.white_ms,
            },
            EngineData {
                name: black.display_name().to_string(),
                info: None,
                clock_ms: limits.black_ms,
            },
        ],
    );
}
