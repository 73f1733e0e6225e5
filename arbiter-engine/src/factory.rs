//! Engine worker factory - bulk construction with per-engine retry
//!
//! Startup failures are contained: a failed engine is recreated in place
//! for up to three passes while healthy engines are left untouched, and
//! callers receive whatever subset came up healthy. The tournament keeps
//! running with a reduced roster rather than aborting outright.

use std::time::Duration;

use arbiter_core::{EngineConfig, EngineError, ProtocolKind};

use crate::protocol::{HandshakeAdapter, ProtocolAdapter, StreamAdapter};
use crate::worker::EngineWorker;

/// Startup passes: one initial attempt plus retries for failed engines
const STARTUP_PASSES: u32 = 3;

/// Create one worker: spawn the process, pick the adapter matching the
/// configured protocol, dispatch the handshake
pub fn create_engine(config: &EngineConfig) -> Result<EngineWorker, EngineError> {
    let mut adapter: Box<dyn ProtocolAdapter> = match config.protocol {
        ProtocolKind::Handshake => Box::new(HandshakeAdapter::start(config)?),
        ProtocolKind::Stream => Box::new(StreamAdapter::start(config)?),
    };
    adapter.start_protocol()?;
    Ok(EngineWorker::new(config.clone(), adapter))
}

/// Constructs engine workers in bulk, tolerating individual failures
pub struct EngineWorkerFactory {
    startup_timeout: Duration,
}

impl EngineWorkerFactory {
    pub fn new() -> Self {
        Self {
            startup_timeout: Duration::from_secs(5),
        }
    }

    /// Set how long each engine may take to complete its handshake
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Create workers for all configs
    ///
    /// Runs up to three startup passes; only engines that failed are
    /// recreated in place. Returns the healthy subset - callers must be
    /// prepared to proceed with fewer engines than configured. With
    /// `no_wait` the readiness wait is skipped entirely and callers poll
    /// `wait_ready` themselves.
    pub fn create_engines(&self, configs: &[EngineConfig], no_wait: bool) -> Vec<EngineWorker> {
        let mut slots: Vec<Option<EngineWorker>> = configs.iter().map(|_| None).collect();

        for pass in 0..STARTUP_PASSES {
            let pending: Vec<usize> = slots
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_none())
                .map(|(i, _)| i)
                .collect();
            if pending.is_empty() {
                break;
            }
            if pass > 0 {
                tracing::info!(pass, engines = pending.len(), "retrying failed engine startups");
            }

            for &i in &pending {
                match create_engine(&configs[i]) {
                    Ok(worker) => slots[i] = Some(worker),
                    Err(err) => {
                        tracing::warn!(engine = %configs[i].name, %err, "engine startup failed");
                    }
                }
            }

            if no_wait {
                break;
            }

            self.wait_pass(&mut slots, &pending);

            // Failed handshakes free their slot for the next pass
            for &i in &pending {
                if slots[i].as_ref().is_some_and(EngineWorker::is_failed) {
                    if let Some(mut worker) = slots[i].take() {
                        worker.terminate();
                    }
                }
            }
        }

        let healthy: Vec<EngineWorker> = slots.into_iter().flatten().collect();
        if healthy.len() < configs.len() {
            tracing::warn!(
                healthy = healthy.len(),
                configured = configs.len(),
                "proceeding with a reduced roster"
            );
        }
        healthy
    }

    /// Wait for the pending workers' handshakes in parallel
    fn wait_pass(&self, slots: &mut [Option<EngineWorker>], pending: &[usize]) {
        let timeout = self.startup_timeout;
        std::thread::scope(|scope| {
            for (i, slot) in slots.iter_mut().enumerate() {
                if !pending.contains(&i) {
                    continue;
                }
                let Some(worker) = slot.as_mut() else { continue };
                scope.spawn(move || {
                    if let Err(err) = worker.wait_ready(timeout) {
                        tracing::warn!(engine = worker.name(), %err, "handshake failed");
                    }
                });
            }
        });
    }
}

impl Default for EngineWorkerFactory {
    fn default() -> Self {
        Self::new()
    }
}
