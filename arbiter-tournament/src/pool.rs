//! Bounded game execution pool
//!
//! Games run on a fixed set of worker threads. The number of workers
//! allowed to pull jobs is an atomic the operator can raise or lower
//! while games are in flight; a lowered limit takes effect as workers
//! finish their current game, it never aborts one.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use arbiter_core::{EngineConfig, GameOutcome, SearchLimits};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

const IDLE_POLL: Duration = Duration::from_millis(50);

/// One game to play, addressed back to its slot in the schedule
#[derive(Clone, Debug)]
pub struct GameJob {
    /// Pairing index within the tournament
    pub pair: usize,
    /// Game index within the pairing
    pub game: usize,
    /// White engine configuration
    pub white: EngineConfig,
    /// Black engine configuration
    pub black: EngineConfig,
    /// Opening position (opaque; empty = standard start)
    pub opening: String,
    /// Clock limits for the game
    pub limits: SearchLimits,
}

/// Outcome of a completed job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameReport {
    pub pair: usize,
    pub game: usize,
    pub outcome: GameOutcome,
}

/// Plays a single game to completion
pub trait GameRunner: Send + Sync + 'static {
    fn run(&self, job: &GameJob) -> GameOutcome;
}

/// Worker pool executing game jobs
pub struct GamePool {
    job_tx: Option<Sender<GameJob>>,
    report_rx: Receiver<GameReport>,
    limit: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl GamePool {
    /// Spawn `max_workers` threads, of which `concurrency` may pull jobs
    pub fn new(runner: Arc<dyn GameRunner>, max_workers: usize, concurrency: usize) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<GameJob>();
        let (report_tx, report_rx) = crossbeam_channel::unbounded::<GameReport>();
        let limit = Arc::new(AtomicUsize::new(concurrency.min(max_workers)));
        let stop = Arc::new(AtomicBool::new(false));

        let workers = (0..max_workers)
            .map(|slot| {
                let runner = Arc::clone(&runner);
                let job_rx = job_rx.clone();
                let report_tx = report_tx.clone();
                let limit = Arc::clone(&limit);
                let stop = Arc::clone(&stop);
                std::thread::spawn(move || {
                    worker_loop(slot, runner, job_rx, report_tx, limit, stop)
                })
            })
            .collect();

        Self {
            job_tx: Some(job_tx),
            report_rx,
            limit,
            stop,
            workers,
        }
    }

    /// Queue a game. Silently dropped after `stop`.
    pub fn submit(&self, job: GameJob) {
        if let Some(tx) = &self.job_tx {
            let _ = tx.send(job);
        }
    }

    /// Drain every report produced so far without blocking
    pub fn try_reports(&self) -> Vec<GameReport> {
        self.report_rx.try_iter().collect()
    }

    /// Adjust how many workers may pull jobs
    pub fn set_concurrency(&self, concurrency: usize) {
        let capped = concurrency.min(self.workers.len());
        self.limit.store(capped, Ordering::SeqCst);
        tracing::info!(concurrency = capped, "pool concurrency adjusted");
    }

    pub fn concurrency(&self) -> usize {
        self.limit.load(Ordering::SeqCst)
    }

    /// Stop the pool: in-flight games finish, queued jobs are dropped,
    /// worker threads are joined
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.job_tx = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for GamePool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    slot: usize,
    runner: Arc<dyn GameRunner>,
    job_rx: Receiver<GameJob>,
    report_tx: Sender<GameReport>,
    limit: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
) {
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        // Slots past the limit idle instead of pulling work
        if slot >= limit.load(Ordering::SeqCst) {
            std::thread::sleep(IDLE_POLL);
            continue;
        }
        match job_rx.recv_timeout(IDLE_POLL) {
            Ok(job) => {
                tracing::debug!(
                    slot,
                    pair = job.pair,
                    game = job.game,
                    white = %job.white.name,
                    black = %job.black.name,
                    "game starting"
                );
                let outcome = runner.run(&job);
                let _ = report_tx.send(GameReport {
                    pair: job.pair,
                    game: job.game,
                    outcome,
                });
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
