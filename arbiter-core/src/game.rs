//! Game records and outcomes
//!
//! Positions and moves are opaque strings supplied by the rules layer;
//! the orchestration core never interprets them beyond equality and
//! prefix comparison.

use serde::{Deserialize, Serialize};

/// Terminal classification of a game
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOutcome {
    WhiteWins,
    BlackWins,
    Draw,
    /// Ended without an engine-reported terminal result (e.g. aborted).
    /// Blocks pairing completion.
    Unterminated,
}

impl GameOutcome {
    /// True for outcomes that count as completed games
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameOutcome::Unterminated)
    }

    /// Score from white's perspective (win 1.0, draw 0.5)
    pub fn score_for_white(&self) -> f64 {
        match self {
            GameOutcome::WhiteWins => 1.0,
            GameOutcome::Draw => 0.5,
            _ => 0.0,
        }
    }

    /// Score from black's perspective
    pub fn score_for_black(&self) -> f64 {
        match self {
            GameOutcome::BlackWins => 1.0,
            GameOutcome::Draw => 0.5,
            _ => 0.0,
        }
    }

    /// Result-line token used by the persisted tournament format
    pub fn as_token(&self) -> &'static str {
        match self {
            GameOutcome::WhiteWins => "1-0",
            GameOutcome::BlackWins => "0-1",
            GameOutcome::Draw => "1/2-1/2",
            GameOutcome::Unterminated => "*",
        }
    }

    /// Parse a result-line token
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "1-0" => Some(GameOutcome::WhiteWins),
            "0-1" => Some(GameOutcome::BlackWins),
            "1/2-1/2" => Some(GameOutcome::Draw),
            "*" => Some(GameOutcome::Unterminated),
            _ => None,
        }
    }
}

/// Lifecycle phase of a scheduled game
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Scheduled,
    InProgress,
    Finished,
    Unterminated,
}

/// One game's record: opaque start position plus played moves
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Start position (opaque; empty means the standard start position)
    pub start_position: String,
    /// Moves played so far, in coordinate notation
    pub moves: Vec<String>,
    /// Outcome once the game reached a terminal or aborted state
    pub outcome: Option<GameOutcome>,
}

impl GameRecord {
    /// Record starting from a given opening position
    pub fn from_position(position: impl Into<String>) -> Self {
        Self {
            start_position: position.into(),
            ..Default::default()
        }
    }

    /// Append a move
    pub fn push_move(&mut self, mv: impl Into<String>) {
        self.moves.push(mv.into());
    }

    /// Moves joined for wire transmission
    pub fn moves_joined(&self) -> String {
        self.moves.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_terminal() {
        assert!(GameOutcome::WhiteWins.is_terminal());
        assert!(GameOutcome::Draw.is_terminal());
        assert!(!GameOutcome::Unterminated.is_terminal());
    }

    #[test]
    fn test_outcome_scores() {
        assert_eq!(GameOutcome::WhiteWins.score_for_white(), 1.0);
        assert_eq!(GameOutcome::WhiteWins.score_for_black(), 0.0);
        assert_eq!(GameOutcome::Draw.score_for_white(), 0.5);
        assert_eq!(GameOutcome::Unterminated.score_for_white(), 0.0);
    }

    #[test]
    fn test_outcome_token_round_trip() {
        for outcome in [
            GameOutcome::WhiteWins,
            GameOutcome::BlackWins,
            GameOutcome::Draw,
            GameOutcome::Unterminated,
        ] {
            assert_eq!(GameOutcome::from_token(outcome.as_token()), Some(outcome));
        }
        assert_eq!(GameOutcome::from_token("2-0"), None);
    }

    #[test]
    fn test_record_moves_joined() {
        let mut record = GameRecord::from_position("startpos");
        record.push_move("e2e4");
        record.push_move("e7e5");
        assert_eq!(record.moves_joined(), "e2e4 e7e5");
    }
}
