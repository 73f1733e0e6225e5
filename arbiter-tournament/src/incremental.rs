//! Incremental result aggregation
//!
//! Rescanning every pairing on every poll gets expensive once a schedule
//! holds hundreds of games. `IncrementalResult` keeps an append-only
//! aggregate of pairings that have finished and only recomputes the ones
//! still in flight, using the tournament's change token to skip work
//! entirely when nothing happened.

use arbiter_core::{Change, ChangeToken};

use crate::result::{ResultAggregate, Standing};
use crate::tournament::Tournament;

/// Consecutive pairings without any recorded game probed per
/// incremental poll before the promotion scan gives up for this round.
const DEFAULT_EXTRA_CHECKS: u32 = 10;

/// Incrementally maintained tournament aggregate
pub struct IncrementalResult {
    token: ChangeToken,
    /// Append-only aggregate over pairings observed fully finished.
    /// Sound because a finished pairing only changes through a rebuild
    /// or a clear, both of which present as structural.
    finished: ResultAggregate,
    /// Indices of pairings not yet finished
    unfinished: Vec<usize>,
    /// Where the next promotion scan resumes within `unfinished`
    cursor: usize,
    extra_checks: u32,
    /// Most recent combined aggregate (finished + in-flight partials)
    current: ResultAggregate,
    total_scheduled: u32,
}

impl Default for IncrementalResult {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementalResult {
    pub fn new() -> Self {
        Self {
            token: ChangeToken::unseen(),
            finished: ResultAggregate::new(),
            unfinished: Vec::new(),
            cursor: 0,
            extra_checks: DEFAULT_EXTRA_CHECKS,
            current: ResultAggregate::new(),
            total_scheduled: 0,
        }
    }

    /// Set the promotion-scan budget
    pub fn with_extra_checks(mut self, extra_checks: u32) -> Self {
        self.extra_checks = extra_checks;
        self
    }

    /// Refresh against the tournament. Returns true iff the aggregate
    /// may have changed; two consecutive polls with no new results in
    /// between return false on the second.
    pub fn poll(&mut self, tournament: &Tournament) -> bool {
        let change = tournament.check_modification(self.token);
        match change {
            Change::Unchanged => return false,
            Change::Structural => self.handle_modification(tournament),
            Change::Incremental => {
                self.promote_finished(tournament);
                self.refresh_current(tournament);
            }
        }
        self.token = tournament.token();
        true
    }

    /// Full pass after a rebuild: repartition finished/unfinished and
    /// reseed the stable aggregate
    fn handle_modification(&mut self, tournament: &Tournament) {
        self.finished = ResultAggregate::new();
        self.unfinished.clear();
        self.cursor = 0;
        for (idx, pair) in tournament.pairs().iter().enumerate() {
            if pair.is_finished() {
                self.finished.absorb(pair);
            } else {
                self.unfinished.push(idx);
            }
        }
        self.total_scheduled = tournament.total_scheduled_games();
        self.refresh_current(tournament);
        tracing::debug!(
            unfinished = self.unfinished.len(),
            games = self.current.games(),
            "full result rescan"
        );
    }

    /// Move newly finished pairings into the stable aggregate
    ///
    /// Resumes at the stored cursor and stops after `extra_checks`
    /// consecutive pairings with no games recorded yet; a pairing with
    /// partial results resets the count. Stragglers are picked up by
    /// later polls.
    fn promote_finished(&mut self, tournament: &Tournament) {
        if self.unfinished.is_empty() {
            return;
        }
        // Probe count is bounded by the length at entry, not the
        // shrinking list
        let scan_len = self.unfinished.len();
        let mut consecutive_empty = 0u32;
        let mut probed = 0usize;
        let mut pos = self.cursor.min(scan_len - 1);
        while probed < scan_len && consecutive_empty < self.extra_checks {
            if pos >= self.unfinished.len() {
                pos = 0;
            }
            let idx = self.unfinished[pos];
            let Some(pair) = tournament.get_pair(idx) else {
                pos += 1;
                probed += 1;
                continue;
            };
            if pair.is_finished() {
                self.finished.absorb(pair);
                self.unfinished.remove(pos);
                if self.unfinished.is_empty() {
                    break;
                }
                consecutive_empty = 0;
            } else {
                if pair.result().total() == 0 {
                    consecutive_empty += 1;
                } else {
                    consecutive_empty = 0;
                }
                pos += 1;
            }
            probed += 1;
        }
        self.cursor = if self.unfinished.is_empty() { 0 } else { pos % self.unfinished.len() };
    }

    /// Rebuild the combined aggregate: stable part plus a fresh scan of
    /// everything still open
    fn refresh_current(&mut self, tournament: &Tournament) {
        let mut current = self.finished.clone();
        for &idx in &self.unfinished {
            if let Some(pair) = tournament.get_pair(idx) {
                current.absorb(pair);
            }
        }
        self.current = current;
    }

    /// Combined aggregate as of the last poll
    pub fn result(&self) -> &ResultAggregate {
        &self.current
    }

    /// Standings sorted by score
    pub fn standings(&self) -> Vec<Standing> {
        self.current.standings()
    }

    /// Games the schedule contains in total
    pub fn total_scheduled_games(&self) -> u32 {
        self.total_scheduled
    }

    /// Games completed so far
    pub fn played_games(&self) -> u32 {
        self.current.games()
    }

    /// True while any pairing has games outstanding
    pub fn has_games_left(&self) -> bool {
        !self.unfinished.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::{EngineConfig, GameOutcome, TournamentSettings};

    fn tournament() -> Tournament {
        Tournament::create(
            vec![
                EngineConfig::new("alpha", "/opt/engines/alpha"),
                EngineConfig::new("beta", "/opt/engines/beta"),
                EngineConfig::new("gamma", "/opt/engines/gamma"),
            ],
            TournamentSettings::round_robin(1, 2),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_first_poll_is_structural() {
        let t = tournament();
        let mut inc = IncrementalResult::new();
        assert!(inc.poll(&t));
        assert_eq!(inc.total_scheduled_games(), 6);
        assert_eq!(inc.played_games(), 0);
        assert!(inc.has_games_left());
    }

    #[test]
    fn test_poll_idempotent_without_results() {
        let t = tournament();
        let mut inc = IncrementalResult::new();
        assert!(inc.poll(&t));
        assert!(!inc.poll(&t));
        assert!(!inc.poll(&t));
    }

    #[test]
    fn test_incremental_absorbs_new_outcomes() {
        let mut t = tournament();
        let mut inc = IncrementalResult::new();
        inc.poll(&t);

        t.apply_outcome(0, 0, GameOutcome::WhiteWins);
        assert!(inc.poll(&t));
        assert_eq!(inc.played_games(), 1);
        assert_eq!(inc.result().standing_for("alpha").unwrap().wins, 1);
        assert!(!inc.poll(&t));
    }

    #[test]
    fn test_played_matches_pair_totals_when_done() {
        let mut t = tournament();
        let mut inc = IncrementalResult::new();
        inc.poll(&t);

        for pair_idx in 0..t.pairs().len() {
            for game_idx in 0..2 {
                t.apply_outcome(pair_idx, game_idx, GameOutcome::Draw);
                inc.poll(&t);
            }
        }
        let pair_total: u32 = t.pairs().iter().map(|p| p.result().total()).sum();
        assert_eq!(inc.played_games(), pair_total);
        assert!(!inc.has_games_left());
    }

    #[test]
    fn test_finished_pairs_promoted_out_of_scan() {
        let mut t = tournament();
        let mut inc = IncrementalResult::new();
        inc.poll(&t);

        t.apply_outcome(0, 0, GameOutcome::WhiteWins);
        t.apply_outcome(0, 1, GameOutcome::Draw);
        inc.poll(&t);
        assert_eq!(inc.unfinished, vec![1, 2]);
        assert_eq!(inc.finished.games(), 2);
    }

    #[test]
    fn test_promotion_budget_defers_stragglers() {
        let mut t = tournament();
        // Budget of one empty probe per poll
        let mut inc = IncrementalResult::new().with_extra_checks(1);
        inc.poll(&t);

        // Finish the *last* pairing; the scan hits pairing 0 (no games
        // yet), exhausts the budget, defers promotion
        t.apply_outcome(2, 0, GameOutcome::Draw);
        t.apply_outcome(2, 1, GameOutcome::Draw);
        inc.poll(&t);
        assert_eq!(inc.unfinished.len(), 3);
        // The aggregate is still exact, only the promotion lagged
        assert_eq!(inc.played_games(), 2);

        // Later polls advance the cursor and catch up
        t.apply_outcome(0, 0, GameOutcome::Draw);
        inc.poll(&t);
        inc.poll(&tournament_bump(&mut t));
        assert!(inc.unfinished.len() < 3);
        assert_eq!(inc.played_games(), 3);
    }

    fn tournament_bump(t: &mut Tournament) -> &Tournament {
        // Any incremental bump retriggers the scan
        t.apply_outcome(0, 0, GameOutcome::Draw);
        t
    }

    #[test]
    fn test_partial_pairs_do_not_burn_scan_budget() {
        let mut t = tournament();
        let mut inc = IncrementalResult::new().with_extra_checks(1);
        inc.poll(&t);

        // Pairing 0 has a partial result, pairing 1 is done, pairing 2
        // has no games yet
        t.apply_outcome(0, 0, GameOutcome::Draw);
        t.apply_outcome(1, 0, GameOutcome::WhiteWins);
        t.apply_outcome(1, 1, GameOutcome::BlackWins);
        inc.poll(&t);

        // Pairing 0 is passed over without spending the budget, so the
        // finished pairing right behind it is still promoted
        assert_eq!(inc.unfinished, vec![0, 2]);
        assert_eq!(inc.finished.games(), 2);
        assert_eq!(inc.played_games(), 3);
    }

    #[test]
    fn test_clear_presents_as_structural() {
        let mut t = tournament();
        let mut inc = IncrementalResult::new();
        inc.poll(&t);

        t.apply_outcome(0, 0, GameOutcome::WhiteWins);
        t.apply_outcome(0, 1, GameOutcome::Draw);
        inc.poll(&t);
        assert_eq!(inc.played_games(), 2);

        t.clear();
        assert!(inc.poll(&t));
        assert_eq!(inc.played_games(), 0);
        assert!(inc.has_games_left());
    }

    #[test]
    fn test_structural_on_rebuild() {
        let t = tournament();
        let mut inc = IncrementalResult::new();
        inc.poll(&t);

        let rebuilt = t
            .recreate(t.roster().to_vec(), TournamentSettings::round_robin(2, 2))
            .unwrap();
        assert!(inc.poll(&rebuilt));
        assert_eq!(inc.total_scheduled_games(), 12);
    }
}
