//! Tournament - pairing composition over a roster
//!
//! A tournament is recreated wholesale whenever the roster or settings
//! change. The rebuild is state-preserving: a pairing that matches a
//! prior one by engine identity keeps its already-played games, dropped
//! pairings take their results with them, and new pairings start empty.
//! Matching is by engine name and path, never by roster position.

use std::io::{BufRead, Write};
use std::path::Path;

use arbiter_core::{
    Change, ChangeToken, ChangeTracker, EngineConfig, GameOutcome, GamePhase, SearchLimits,
    Topology, TournamentError, TournamentSettings,
};

use crate::pair::PairTournament;
use crate::pool::{GameJob, GamePool};
use crate::result::ResultAggregate;

const SAVE_HEADER: &str = "arbiter-tournament v1";

/// A roster snapshot with its ordered pairings
pub struct Tournament {
    roster: Vec<EngineConfig>,
    settings: TournamentSettings,
    pairs: Vec<PairTournament>,
    tracker: ChangeTracker,
}

impl Tournament {
    /// Build a tournament, preserving prior results where pairings match
    /// by engine identity
    pub fn create(
        roster: Vec<EngineConfig>,
        settings: TournamentSettings,
        prior: Option<&Tournament>,
    ) -> Result<Self, TournamentError> {
        if roster.len() < 2 {
            return Err(TournamentError::EmptyRoster);
        }
        if settings.topology == Topology::Gauntlet && !roster.iter().any(|e| e.gauntlet) {
            return Err(TournamentError::NoGauntletEngine);
        }

        let games_per_pair = settings.rounds * settings.games_per_pairing;
        let mut pairs = Vec::new();
        for (first, second) in pairings(&roster, settings.topology) {
            let mut pair = PairTournament::new(
                first.clone(),
                second.clone(),
                games_per_pair,
                &settings.openings,
            );
            if let Some(prior) = prior {
                if let Some(old) = prior
                    .pairs
                    .iter()
                    .find(|p| p.matches_identity(first, second))
                {
                    pair.adopt_games(old);
                }
            }
            pairs.push(pair);
        }

        tracing::info!(
            engines = roster.len(),
            pairings = pairs.len(),
            topology = ?settings.topology,
            "tournament created"
        );

        Ok(Self {
            roster,
            settings,
            pairs,
            // Fresh owner id: consumers holding old tokens observe a
            // structural modification
            tracker: ChangeTracker::new(),
        })
    }

    /// Rebuild with a new roster/settings, preserving matching pairings
    pub fn recreate(
        &self,
        roster: Vec<EngineConfig>,
        settings: TournamentSettings,
    ) -> Result<Self, TournamentError> {
        Tournament::create(roster, settings, Some(self))
    }

    /// Total games the configuration schedules
    pub fn calculate_total_games(roster: &[EngineConfig], settings: &TournamentSettings) -> u32 {
        pairings(roster, settings.topology).len() as u32
            * settings.rounds
            * settings.games_per_pairing
    }

    pub fn roster(&self) -> &[EngineConfig] {
        &self.roster
    }

    pub fn settings(&self) -> &TournamentSettings {
        &self.settings
    }

    pub fn pairs(&self) -> &[PairTournament] {
        &self.pairs
    }

    pub fn get_pair(&self, idx: usize) -> Option<&PairTournament> {
        self.pairs.get(idx)
    }

    pub fn total_scheduled_games(&self) -> u32 {
        self.pairs.iter().map(PairTournament::scheduled_games).sum()
    }

    /// Live change token for incremental consumers
    pub fn token(&self) -> ChangeToken {
        self.tracker.token()
    }

    /// Compare a stored token against the live tracker
    pub fn check_modification(&self, stored: ChangeToken) -> Change {
        self.tracker.check(stored)
    }

    /// Full-scan result aggregate (the cheap incremental path lives in
    /// `IncrementalResult`)
    pub fn result(&self) -> ResultAggregate {
        let mut aggregate = ResultAggregate::new();
        for pair in &self.pairs {
            aggregate.absorb(pair);
        }
        aggregate
    }

    /// Record one game's outcome and bump the change tracker
    pub fn apply_outcome(&mut self, pair_idx: usize, game_idx: usize, outcome: GameOutcome) {
        if let Some(pair) = self.pairs.get_mut(pair_idx) {
            pair.record_outcome(game_idx, outcome);
            self.tracker.bump();
        }
    }

    /// Enqueue every still-scheduled game on the pool; returns how many
    /// jobs were dispatched
    pub fn schedule_all(&mut self, pool: &GamePool) -> u32 {
        let mut dispatched = 0u32;
        for (pair_idx, pair) in self.pairs.iter_mut().enumerate() {
            let first = pair.first().clone();
            let second = pair.second().clone();
            for game_idx in 0..pair.games().len() {
                if pair.games()[game_idx].phase != GamePhase::Scheduled {
                    continue;
                }
                let game = &pair.games()[game_idx];
                let (white, black) = if game.first_is_white {
                    (first.clone(), second.clone())
                } else {
                    (second.clone(), first.clone())
                };
                // Clocks start full; the runner decrements them per move
                let limits = SearchLimits::for_control(white.time_control);
                pool.submit(GameJob {
                    pair: pair_idx,
                    game: game_idx,
                    white,
                    black,
                    opening: game.opening.clone(),
                    limits,
                });
                pair.mark_in_progress(game_idx);
                dispatched += 1;
            }
        }
        tracing::info!(dispatched, "games scheduled");
        dispatched
    }

    /// Apply all reports the pool has produced so far
    pub fn drain_reports(&mut self, pool: &GamePool) -> u32 {
        let mut applied = 0;
        for report in pool.try_reports() {
            self.apply_outcome(report.pair, report.game, report.outcome);
            applied += 1;
        }
        applied
    }

    /// Stop the pool; in-flight games finish, queued games are dropped
    pub fn stop_pool(&self, pool: &mut GamePool) {
        pool.stop();
    }

    /// Reset every pairing to an unplayed state
    ///
    /// Replaces the tracker so consumers see a structural change; an
    /// incremental signal would leave stale finished aggregates standing.
    pub fn clear(&mut self) {
        for pair in &mut self.pairs {
            pair.clear();
        }
        self.tracker = ChangeTracker::new();
    }

    /// Persist recorded results: a header per round, one line per game
    pub fn save_to(&self, mut writer: impl Write) -> Result<(), TournamentError> {
        writeln!(writer, "{SAVE_HEADER}")?;
        let games_per_round = self.settings.games_per_pairing as usize;
        for round in 0..self.settings.rounds as usize {
            writeln!(writer, "round {}", round + 1)?;
            for pair in &self.pairs {
                let from = round * games_per_round;
                let to = ((round + 1) * games_per_round).min(pair.games().len());
                for idx in from..to {
                    let Some(outcome) = pair.games()[idx].outcome else {
                        continue;
                    };
                    writeln!(
                        writer,
                        "game\t{}\t{}\t{}\t{}",
                        pair.first().name,
                        pair.second().name,
                        idx,
                        outcome.as_token()
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Save to a file
    pub fn save(&self, path: &Path) -> Result<(), TournamentError> {
        let file = std::fs::File::create(path)?;
        self.save_to(std::io::BufWriter::new(file))
    }

    /// Load recorded results into the current pairing set
    ///
    /// Result lines naming engines absent from the roster are skipped,
    /// not treated as corruption.
    pub fn load_from(&mut self, reader: impl BufRead) -> Result<(), TournamentError> {
        let mut lines = reader.lines().enumerate();
        let header = lines
            .next()
            .ok_or(TournamentError::MalformedSave {
                line: 1,
                reason: "empty file".into(),
            })?
            .1?;
        if header.trim() != SAVE_HEADER {
            return Err(TournamentError::MalformedSave {
                line: 1,
                reason: format!("unexpected header `{header}`"),
            });
        }

        let mut loaded = 0u32;
        for (line_no, line) in lines {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("round ") {
                continue;
            }
            let fields: Vec<&str> = trimmed.split('\t').collect();
            if fields.len() != 5 || fields[0] != "game" {
                return Err(TournamentError::MalformedSave {
                    line: line_no + 1,
                    reason: format!("unparseable line `{trimmed}`"),
                });
            }
            let game_idx: usize =
                fields[3]
                    .parse()
                    .map_err(|_| TournamentError::MalformedSave {
                        line: line_no + 1,
                        reason: format!("bad game index `{}`", fields[3]),
                    })?;
            let outcome =
                GameOutcome::from_token(fields[4]).ok_or(TournamentError::MalformedSave {
                    line: line_no + 1,
                    reason: format!("bad result token `{}`", fields[4]),
                })?;

            let found = self
                .pairs
                .iter_mut()
                .find(|p| p.first().name == fields[1] && p.second().name == fields[2]);
            match found {
                Some(pair) => {
                    pair.record_outcome(game_idx, outcome);
                    loaded += 1;
                }
                None => {
                    tracing::debug!(
                        first = fields[1],
                        second = fields[2],
                        "saved result for engines outside the roster, skipping"
                    );
                }
            }
        }
        if loaded > 0 {
            self.tracker.bump();
        }
        tracing::info!(loaded, "tournament results loaded");
        Ok(())
    }

    /// Load from a file
    pub fn load(&mut self, path: &Path) -> Result<(), TournamentError> {
        let file = std::fs::File::open(path)?;
        self.load_from(std::io::BufReader::new(file))
    }
}

/// Generate the pairing list for a topology
fn pairings(roster: &[EngineConfig], topology: Topology) -> Vec<(&EngineConfig, &EngineConfig)> {
    let mut pairs = Vec::new();
    match topology {
        Topology::RoundRobin => {
            for i in 0..roster.len() {
                for j in (i + 1)..roster.len() {
                    pairs.push((&roster[i], &roster[j]));
                }
            }
        }
        Topology::Gauntlet => {
            for designated in roster.iter().filter(|e| e.gauntlet) {
                for opponent in roster.iter().filter(|e| !e.gauntlet) {
                    pairs.push((designated, opponent));
                }
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::GameRunner;
    use arbiter_core::TimeControl;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    fn engine(name: &str) -> EngineConfig {
        EngineConfig::new(name, format!("/opt/engines/{name}"))
    }

    fn roster3() -> Vec<EngineConfig> {
        vec![engine("alpha"), engine("beta"), engine("gamma")]
    }

    #[test]
    fn test_round_robin_pairings() {
        let t = Tournament::create(roster3(), TournamentSettings::round_robin(1, 2), None).unwrap();
        assert_eq!(t.pairs().len(), 3); // C(3,2)
        assert_eq!(t.total_scheduled_games(), 6);
    }

    #[test]
    fn test_gauntlet_total_games() {
        // 1 designated vs 2 opponents, 2 games per pairing
        let roster = vec![engine("hero").with_gauntlet(true), engine("a"), engine("b")];
        let settings = TournamentSettings::gauntlet(1, 2);
        assert_eq!(Tournament::calculate_total_games(&roster, &settings), 4);

        // A round multiplier of 3 scales linearly
        let settings = TournamentSettings::gauntlet(3, 2);
        assert_eq!(Tournament::calculate_total_games(&roster, &settings), 12);
    }

    #[test]
    fn test_empty_roster_rejected() {
        let err = Tournament::create(vec![], TournamentSettings::default(), None);
        assert!(matches!(err, Err(TournamentError::EmptyRoster)));
        let err = Tournament::create(vec![engine("solo")], TournamentSettings::default(), None);
        assert!(matches!(err, Err(TournamentError::EmptyRoster)));
    }

    #[test]
    fn test_gauntlet_without_designated_rejected() {
        let err = Tournament::create(roster3(), TournamentSettings::gauntlet(1, 2), None);
        assert!(matches!(err, Err(TournamentError::NoGauntletEngine)));
    }

    #[test]
    fn test_same_path_distinct_configs_allowed() {
        // The same executable may appear as several configurations
        let roster = vec![
            EngineConfig::new("alpha-fast", "/opt/engines/alpha"),
            EngineConfig::new("alpha-slow", "/opt/engines/alpha"),
        ];
        let t = Tournament::create(roster, TournamentSettings::round_robin(1, 2), None).unwrap();
        assert_eq!(t.pairs().len(), 1);
    }

    #[test]
    fn test_rebuild_preserves_matching_pairings() {
        let mut t =
            Tournament::create(roster3(), TournamentSettings::round_robin(1, 2), None).unwrap();
        // alpha-beta is pair 0; play a game there and one in beta-gamma
        t.apply_outcome(0, 0, GameOutcome::WhiteWins);
        t.apply_outcome(2, 0, GameOutcome::Draw);

        // Drop gamma, add delta; reorder the survivors
        let rebuilt = t
            .recreate(
                vec![engine("beta"), engine("alpha"), engine("delta")],
                TournamentSettings::round_robin(1, 2),
            )
            .unwrap();

        // beta-alpha is a *new* ordering, so no identity match; the
        // original alpha-beta pairing is gone along with gamma's
        let totals: u32 = rebuilt.pairs().iter().map(|p| p.result().total()).sum();
        assert_eq!(totals, 0);

        // Same roster order keeps results
        let preserved = t
            .recreate(roster3(), TournamentSettings::round_robin(1, 2))
            .unwrap();
        let totals: u32 = preserved.pairs().iter().map(|p| p.result().total()).sum();
        assert_eq!(totals, 2);
        assert_eq!(preserved.pairs()[0].result().total(), 1);
    }

    #[test]
    fn test_rebuild_drops_removed_pairings() {
        let mut t =
            Tournament::create(roster3(), TournamentSettings::round_robin(1, 2), None).unwrap();
        t.apply_outcome(2, 0, GameOutcome::Draw); // beta-gamma

        let rebuilt = t
            .recreate(
                vec![engine("alpha"), engine("beta")],
                TournamentSettings::round_robin(1, 2),
            )
            .unwrap();
        assert_eq!(rebuilt.pairs().len(), 1);
        assert!(rebuilt.result().standing_for("gamma").is_none());
        assert_eq!(rebuilt.result().games(), 0);
    }

    #[test]
    fn test_rebuild_gets_fresh_tracker_owner() {
        let t = Tournament::create(roster3(), TournamentSettings::round_robin(1, 2), None).unwrap();
        let token = t.token();
        assert_eq!(t.check_modification(token), Change::Unchanged);

        let rebuilt = t
            .recreate(roster3(), TournamentSettings::round_robin(1, 2))
            .unwrap();
        assert_eq!(rebuilt.check_modification(token), Change::Structural);
    }

    #[test]
    fn test_outcome_bumps_tracker() {
        let mut t =
            Tournament::create(roster3(), TournamentSettings::round_robin(1, 2), None).unwrap();
        let token = t.token();
        t.apply_outcome(0, 0, GameOutcome::BlackWins);
        assert_eq!(t.check_modification(token), Change::Incremental);
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut t =
            Tournament::create(roster3(), TournamentSettings::round_robin(2, 1), None).unwrap();
        t.apply_outcome(0, 0, GameOutcome::WhiteWins);
        t.apply_outcome(1, 1, GameOutcome::Draw);
        t.apply_outcome(2, 0, GameOutcome::Unterminated);

        let mut saved = Vec::new();
        t.save_to(&mut saved).unwrap();
        let text = String::from_utf8(saved.clone()).unwrap();
        assert!(text.starts_with(SAVE_HEADER));
        assert!(text.contains("round 1"));
        assert!(text.contains("game\talpha\tbeta\t0\t1-0"));

        let mut fresh =
            Tournament::create(roster3(), TournamentSettings::round_robin(2, 1), None).unwrap();
        fresh.load_from(saved.as_slice()).unwrap();
        assert_eq!(fresh.result().games(), 2); // unterminated not counted
        assert_eq!(fresh.pairs()[0].result().first_wins, 1);
        assert!(!fresh.pairs()[2].is_finished());
    }

    #[test]
    fn test_load_skips_unknown_engines() {
        let mut t = Tournament::create(
            vec![engine("alpha"), engine("beta")],
            TournamentSettings::round_robin(1, 2),
            None,
        )
        .unwrap();
        let saved = format!(
            "{SAVE_HEADER}\nround 1\ngame\tzeta\tomega\t0\t1-0\ngame\talpha\tbeta\t0\t0-1\n"
        );
        t.load_from(saved.as_bytes()).unwrap();
        assert_eq!(t.result().games(), 1);
        assert!(t.result().standing_for("zeta").is_none());
    }

    #[test]
    fn test_load_rejects_malformed() {
        let mut t = Tournament::create(
            vec![engine("alpha"), engine("beta")],
            TournamentSettings::round_robin(1, 2),
            None,
        )
        .unwrap();
        let err = t.load_from("not a tournament\n".as_bytes());
        assert!(matches!(err, Err(TournamentError::MalformedSave { line: 1, .. })));

        let bad_token = format!("{SAVE_HEADER}\ngame\talpha\tbeta\t0\t2-0\n");
        let err = t.load_from(bad_token.as_bytes());
        assert!(matches!(err, Err(TournamentError::MalformedSave { line: 2, .. })));
    }

    struct CapturingRunner {
        limits: Mutex<Vec<SearchLimits>>,
    }

    impl GameRunner for CapturingRunner {
        fn run(&self, job: &GameJob) -> GameOutcome {
            self.limits.lock().unwrap().push(job.limits);
            GameOutcome::Draw
        }
    }

    #[test]
    fn test_schedule_all_seeds_classical_clocks() {
        let control = TimeControl::Classical {
            base_ms: 60_000,
            increment_ms: 1000,
            moves_per_session: 0,
        };
        let roster = vec![
            engine("alpha").with_time_control(control),
            engine("beta").with_time_control(control),
        ];
        let mut t =
            Tournament::create(roster, TournamentSettings::round_robin(1, 2), None).unwrap();

        let runner = Arc::new(CapturingRunner {
            limits: Mutex::new(Vec::new()),
        });
        let pool = GamePool::new(Arc::clone(&runner) as Arc<dyn GameRunner>, 1, 1);
        let dispatched = t.schedule_all(&pool);
        assert_eq!(dispatched, 2);

        let deadline = Instant::now() + Duration::from_secs(5);
        while (runner.limits.lock().unwrap().len() as u32) < dispatched
            && Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(10));
        }
        let seen = runner.limits.lock().unwrap();
        assert_eq!(seen.len(), 2);
        // Both sides open on a full clock, never a zeroed one
        assert!(seen.iter().all(|l| l.white_ms == 60_000 && l.black_ms == 60_000));
    }

    #[test]
    fn test_clear_resets_structurally() {
        let mut t =
            Tournament::create(roster3(), TournamentSettings::round_robin(1, 2), None).unwrap();
        t.apply_outcome(0, 0, GameOutcome::WhiteWins);
        let token = t.token();
        t.clear();
        assert_eq!(t.check_modification(token), Change::Structural);
        assert_eq!(t.result().games(), 0);
    }
}
