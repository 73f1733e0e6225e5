//! Arbiter Core - Shared data model for engine orchestration
//!
//! This crate provides the types shared by the engine layer and the
//! tournament scheduler:
//! - Engine configuration and time controls
//! - Game records with opaque position/move strings
//! - Engine events (the semantic output of the protocol adapters)
//! - Change tracking tokens for cheap dirty-checks
//! - Thread-safe board/state exchange between worker and consumer threads

pub mod change;
pub mod config;
pub mod error;
pub mod event;
pub mod exchange;
pub mod game;

// Re-exports for convenient access
pub use change::{Change, ChangeToken, ChangeTracker};
pub use config::{EngineConfig, ProtocolKind, SearchLimits, TimeControl, TournamentSettings, Topology};
pub use error::{EngineError, ExchangeError, TournamentError};
pub use event::{EngineEvent, EventKind, SearchInfo};
pub use exchange::{BoardExchange, EngineData, ProviderId, Versioned};
pub use game::{GameOutcome, GamePhase, GameRecord};
