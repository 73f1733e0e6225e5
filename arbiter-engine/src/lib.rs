//! Arbiter Engine - subprocess protocol clients
//!
//! This crate drives external chess-engine processes:
//! - ProcessChannel: line-oriented, timestamped I/O over a child's stdio
//! - ProtocolAdapter: two incompatible text protocols behind one trait
//! - EngineWorker: one live engine with identity and startup bookkeeping
//! - EngineWorkerFactory: bulk construction with per-engine retry

pub mod channel;
pub mod factory;
pub mod protocol;
pub mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use channel::{ProcessChannel, ReadError, ReadLine};
pub use factory::{create_engine, EngineWorkerFactory};
pub use protocol::{HandshakeAdapter, ProtocolAdapter, StreamAdapter};
pub use worker::{EngineWorker, StartupState};
