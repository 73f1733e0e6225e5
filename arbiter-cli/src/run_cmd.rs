//! Run command - play a whole tournament from a settings file

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;

use arbiter_tournament::{
    EngineMatchRunner, GamePool, GameRunner, IncrementalResult, Standing, Tournament,
};

use crate::settings;

#[derive(Args)]
pub struct RunArgs {
    /// Tournament settings TOML file
    #[arg(long, value_name = "FILE")]
    pub settings: PathBuf,

    /// Save results here when the tournament ends
    #[arg(long, value_name = "FILE")]
    pub save: Option<PathBuf>,

    /// Resume from a previously saved result file
    #[arg(long, value_name = "FILE")]
    pub resume: Option<PathBuf>,

    /// Concurrent games (overrides the settings file)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Seconds between standings reports
    #[arg(long, default_value = "10")]
    pub report_interval: u64,
}

pub fn run(args: RunArgs) -> Result<()> {
    let file = settings::load(&args.settings)?;
    let roster = file.roster()?;
    let tournament_settings = file.tournament_settings()?;
    let base_elo = tournament_settings.base_elo;

    let mut tournament = Tournament::create(roster, tournament_settings, None)
        .context("building the tournament")?;
    if let Some(resume) = &args.resume {
        tournament
            .load(resume)
            .with_context(|| format!("resuming from {}", resume.display()))?;
    }

    let concurrency = args
        .concurrency
        .unwrap_or(file.tournament.concurrency)
        .max(1);
    let runner: Arc<dyn GameRunner> = Arc::new(EngineMatchRunner::new());
    let mut pool = GamePool::new(runner, concurrency, concurrency);

    let dispatched = tournament.schedule_all(&pool);
    println!(
        "{} games to play ({} scheduled in total)",
        dispatched,
        tournament.total_scheduled_games()
    );

    let mut results = IncrementalResult::new();
    results.poll(&tournament);

    let report_interval = Duration::from_secs(args.report_interval.max(1));
    let mut last_report = Instant::now();
    let mut applied = 0u32;
    while applied < dispatched {
        applied += tournament.drain_reports(&pool);
        let changed = results.poll(&tournament);
        if changed || last_report.elapsed() >= report_interval {
            print_standings(&results.standings(), base_elo, results.played_games());
            last_report = Instant::now();
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    tournament.stop_pool(&mut pool);
    tracing::info!(games = applied, "tournament complete");

    results.poll(&tournament);
    println!("\nFinal standings:");
    print_standings(&results.standings(), base_elo, results.played_games());

    if let Some(save) = &args.save {
        tournament
            .save(save)
            .with_context(|| format!("saving results to {}", save.display()))?;
        println!("results saved to {}", save.display());
    }
    Ok(())
}

fn print_standings(standings: &[Standing], base_elo: f64, played: u32) {
    println!("--- {played} games played ---");
    println!(
        "{:<4} {:<20} {:>5} {:>5} {:>5} {:>7} {:>7}",
        "#", "engine", "W", "L", "D", "score", "elo"
    );
    for (rank, standing) in standings.iter().enumerate() {
        println!(
            "{:<4} {:<20} {:>5} {:>5} {:>5} {:>7.1} {:>7.0}",
            rank + 1,
            standing.name,
            standing.wins,
            standing.losses,
            standing.draws,
            standing.score(),
            standing.performance_elo(base_elo)
        );
    }
}
