//! Pair tournament - the ordered games between two engine configurations

use arbiter_core::{EngineConfig, GameOutcome, GamePhase};

/// One scheduled game within a pairing
#[derive(Clone, Debug)]
pub struct ScheduledGame {
    /// Lifecycle phase
    pub phase: GamePhase,
    /// Color assignment: alternates per game index
    pub first_is_white: bool,
    /// Opening position for this game (opaque; empty = standard)
    pub opening: String,
    /// Outcome once recorded
    pub outcome: Option<GameOutcome>,
}

/// Running result aggregate for a pairing
///
/// Only terminal outcomes count; an unterminated game contributes nothing
/// to the totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PairResult {
    pub first_wins: u32,
    pub second_wins: u32,
    pub draws: u32,
}

impl PairResult {
    /// Completed games in this pairing
    pub fn total(&self) -> u32 {
        self.first_wins + self.second_wins + self.draws
    }

    /// Score for the first engine (win 1.0, draw 0.5)
    pub fn score_for_first(&self) -> f64 {
        self.first_wins as f64 + 0.5 * self.draws as f64
    }

    /// Score for the second engine
    pub fn score_for_second(&self) -> f64 {
        self.second_wins as f64 + 0.5 * self.draws as f64
    }
}

/// The scheduling unit: an ordered set of games between two specific
/// engine configurations
#[derive(Clone, Debug)]
pub struct PairTournament {
    first: EngineConfig,
    second: EngineConfig,
    games: Vec<ScheduledGame>,
}

impl PairTournament {
    /// Schedule `game_count` games, alternating colors and cycling the
    /// opening list
    pub fn new(
        first: EngineConfig,
        second: EngineConfig,
        game_count: u32,
        openings: &[String],
    ) -> Self {
        let games = (0..game_count)
            .map(|idx| ScheduledGame {
                phase: GamePhase::Scheduled,
                first_is_white: idx % 2 == 0,
                opening: if openings.is_empty() {
                    String::new()
                } else {
                    openings[idx as usize % openings.len()].clone()
                },
                outcome: None,
            })
            .collect();
        Self {
            first,
            second,
            games,
        }
    }

    pub fn first(&self) -> &EngineConfig {
        &self.first
    }

    pub fn second(&self) -> &EngineConfig {
        &self.second
    }

    pub fn games(&self) -> &[ScheduledGame] {
        &self.games
    }

    pub fn scheduled_games(&self) -> u32 {
        self.games.len() as u32
    }

    /// Identity match used by state-preserving rebuilds
    pub fn matches_identity(&self, first: &EngineConfig, second: &EngineConfig) -> bool {
        self.first.identity() == first.identity() && self.second.identity() == second.identity()
    }

    /// True iff every scheduled game reached `Finished`. An unterminated
    /// game blocks completion even though it has an outcome recorded.
    pub fn is_finished(&self) -> bool {
        self.games.iter().all(|g| g.phase == GamePhase::Finished)
    }

    /// Mark a game as dispatched
    pub fn mark_in_progress(&mut self, game_idx: usize) {
        if let Some(game) = self.games.get_mut(game_idx) {
            if game.phase == GamePhase::Scheduled {
                game.phase = GamePhase::InProgress;
            }
        }
    }

    /// Record a game's outcome, advancing its phase
    pub fn record_outcome(&mut self, game_idx: usize, outcome: GameOutcome) {
        if let Some(game) = self.games.get_mut(game_idx) {
            game.outcome = Some(outcome);
            game.phase = if outcome.is_terminal() {
                GamePhase::Finished
            } else {
                GamePhase::Unterminated
            };
        }
    }

    /// Reset every game to `Scheduled`, dropping outcomes
    pub fn clear(&mut self) {
        for game in &mut self.games {
            game.phase = GamePhase::Scheduled;
            game.outcome = None;
        }
    }

    /// Carry over recorded games from a prior build of the same pairing
    pub(crate) fn adopt_games(&mut self, prior: &PairTournament) {
        let limit = self.games.len().min(prior.games.len());
        for idx in 0..limit {
            let old = &prior.games[idx];
            if old.outcome.is_some() {
                self.games[idx].outcome = old.outcome;
                self.games[idx].phase = old.phase;
            }
        }
    }

    /// Aggregate over terminal outcomes
    pub fn result(&self) -> PairResult {
        let mut result = PairResult::default();
        for game in &self.games {
            let Some(outcome) = game.outcome else { continue };
            match outcome {
                GameOutcome::Draw => result.draws += 1,
                GameOutcome::WhiteWins => {
                    if game.first_is_white {
                        result.first_wins += 1;
                    } else {
                        result.second_wins += 1;
                    }
                }
                GameOutcome::BlackWins => {
                    if game.first_is_white {
                        result.second_wins += 1;
                    } else {
                        result.first_wins += 1;
                    }
                }
                GameOutcome::Unterminated => {}
            }
        }
        result
    }
}
