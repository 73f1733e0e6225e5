//! Result aggregation and standings

use std::collections::BTreeMap;

use crate::pair::PairTournament;

/// Standing of one engine in the aggregate
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Standing {
    /// Engine display name
    pub name: String,
    /// Total wins
    pub wins: u32,
    /// Total losses
    pub losses: u32,
    /// Total draws
    pub draws: u32,
}

impl Standing {
    /// Completed games
    pub fn games(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    /// Score (wins + 0.5 * draws)
    pub fn score(&self) -> f64 {
        self.wins as f64 + 0.5 * self.draws as f64
    }

    /// Performance Elo estimate against a base rating
    ///
    /// Clamped to base ± 800 at perfect or zero scores, where the
    /// logistic estimate diverges.
    pub fn performance_elo(&self, base: f64) -> f64 {
        let games = self.games();
        if games == 0 {
            return base;
        }
        let p = self.score() / games as f64;
        if p <= 0.0 {
            return base - 800.0;
        }
        if p >= 1.0 {
            return base + 800.0;
        }
        base + 400.0 * (p / (1.0 - p)).log10()
    }
}

/// Aggregate over any set of pairings
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultAggregate {
    rows: BTreeMap<String, Standing>,
    games: u32,
}

impl ResultAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one pairing's result into the aggregate
    pub fn absorb(&mut self, pair: &PairTournament) {
        let result = pair.result();
        {
            let first = self.row_mut(&pair.first().name);
            first.wins += result.first_wins;
            first.losses += result.second_wins;
            first.draws += result.draws;
        }
        {
            let second = self.row_mut(&pair.second().name);
            second.wins += result.second_wins;
            second.losses += result.first_wins;
            second.draws += result.draws;
        }
        self.games += result.total();
    }

    fn row_mut(&mut self, name: &str) -> &mut Standing {
        self.rows.entry(name.to_string()).or_insert_with(|| Standing {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Completed games across all absorbed pairings
    pub fn games(&self) -> u32 {
        self.games
    }

    /// Standing for one engine, if it appears in the aggregate
    pub fn standing_for(&self, name: &str) -> Option<&Standing> {
        self.rows.get(name)
    }

    /// Standings sorted by score (descending)
    pub fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self.rows.values().cloned().collect();
        standings.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        standings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::{EngineConfig, GameOutcome};

    fn played_pair(first_wins: u32, second_wins: u32, draws: u32) -> PairTournament {
        let total = first_wins + second_wins + draws;
        let mut pair = PairTournament::new(
            EngineConfig::new("alpha", "/a"),
            EngineConfig::new("beta", "/b"),
            total,
            &[],
        );
        let mut idx = 0;
        for _ in 0..first_wins {
            // First's color alternates; translate wins into white/black terms
            let outcome = if pair.games()[idx].first_is_white {
                GameOutcome::WhiteWins
            } else {
                GameOutcome::BlackWins
            };
            pair.record_outcome(idx, outcome);
            idx += 1;
        }
        for _ in 0..second_wins {
            let outcome = if pair.games()[idx].first_is_white {
                GameOutcome::BlackWins
            } else {
                GameOutcome::WhiteWins
            };
            pair.record_outcome(idx, outcome);
            idx += 1;
        }
        for _ in 0..draws {
            pair.record_outcome(idx, GameOutcome::Draw);
            idx += 1;
        }
        pair
    }

    #[test]
    fn test_absorb_maps_both_sides() {
        let mut aggregate = ResultAggregate::new();
        aggregate.absorb(&played_pair(3, 1, 2));

        let alpha = aggregate.standing_for("alpha").unwrap();
        assert_eq!((alpha.wins, alpha.losses, alpha.draws), (3, 1, 2));
        let beta = aggregate.standing_for("beta").unwrap();
        assert_eq!((beta.wins, beta.losses, beta.draws), (1, 3, 2));
        assert_eq!(aggregate.games(), 6);
    }

    #[test]
    fn test_standings_sorted_by_score() {
        let mut aggregate = ResultAggregate::new();
        aggregate.absorb(&played_pair(0, 4, 0));
        let standings = aggregate.standings();
        assert_eq!(standings[0].name, "beta");
        assert_eq!(standings[0].score(), 4.0);
    }

    #[test]
    fn test_performance_elo() {
        let standing = Standing {
            name: "alpha".into(),
            wins: 5,
            losses: 5,
            draws: 0,
        };
        assert_eq!(standing.performance_elo(2400.0), 2400.0);

        let crusher = Standing {
            name: "beta".into(),
            wins: 4,
            losses: 0,
            draws: 0,
        };
        assert_eq!(crusher.performance_elo(2400.0), 3200.0);

        let none = Standing::default();
        assert_eq!(none.performance_elo(2400.0), 2400.0);
    }
}
