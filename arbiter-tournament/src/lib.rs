//! Arbiter Tournament - scheduling and incremental result aggregation
//!
//! This crate provides the tournament layer:
//! - Pair tournaments (the ordered games between two engine configs)
//! - Tournament composition (gauntlet and round-robin topologies) with
//!   state-preserving rebuilds and text persistence
//! - Incremental result polling driven by change tokens
//! - A bounded game pool with runtime-adjustable concurrency
//! - A match runner driving live engine workers through whole games

mod incremental;
mod pair;
mod pool;
mod result;
mod runner;
mod tournament;

pub use incremental::IncrementalResult;
pub use pair::{PairResult, PairTournament, ScheduledGame};
pub use pool::{GameJob, GamePool, GameReport, GameRunner};
pub use result::{ResultAggregate, Standing};
pub use runner::EngineMatchRunner;
pub use tournament::Tournament;
