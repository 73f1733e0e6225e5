//! Board exchange - thread-safe hand-off of live game state
//!
//! Worker threads publish their current game record and per-engine data
//! here; the polling/UI thread reads them back. Every published value
//! carries a change counter so consumers can detect "changed since I last
//! looked" without deep comparison. One mutex guards the whole exchange
//! and is held only for the duration of each mutation.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::ExchangeError;
use crate::event::SearchInfo;
use crate::game::GameRecord;

/// Handle identifying one registered provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub u64);

/// Live display data for one engine
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineData {
    /// Engine display name
    pub name: String,
    /// Latest search telemetry
    pub info: Option<SearchInfo>,
    /// Clock remaining in milliseconds
    pub clock_ms: u64,
}

/// A value plus the change counter it was published under
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

impl<T> Versioned<T> {
    /// True when `seen` predates this publication
    pub fn changed_since(&self, seen: u64) -> bool {
        self.version > seen
    }
}

#[derive(Debug, Default)]
struct Slot {
    game: Versioned<GameRecord>,
    engines: Versioned<Vec<EngineData>>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    next_version: u64,
    slots: HashMap<u64, Slot>,
}

impl Inner {
    fn slot_mut(&mut self, id: ProviderId) -> Result<&mut Slot, ExchangeError> {
        self.slots
            .get_mut(&id.0)
            .ok_or(ExchangeError::UnknownProvider(id.0))
    }

    fn next_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }
}

/// Thread-safe exchange shared between worker threads and consumers
#[derive(Debug, Default)]
pub struct BoardExchange {
    inner: Mutex<Inner>,
}

impl BoardExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a unique provider id with empty state
    pub fn register_provider(&self) -> ProviderId {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.slots.insert(id, Slot::default());
        ProviderId(id)
    }

    /// Remove all state for a provider
    pub fn unregister_provider(&self, id: ProviderId) -> Result<(), ExchangeError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .slots
            .remove(&id.0)
            .map(|_| ())
            .ok_or(ExchangeError::UnknownProvider(id.0))
    }

    /// Publish a game record
    pub fn set_game_record(&self, id: ProviderId, record: GameRecord) -> Result<(), ExchangeError> {
        let mut inner = self.inner.lock().unwrap();
        let version = inner.next_version();
        let slot = inner.slot_mut(id)?;
        slot.game = Versioned {
            value: record,
            version,
        };
        Ok(())
    }

    /// Publish per-engine display data
    pub fn set_engine_data_list(
        &self,
        id: ProviderId,
        engines: Vec<EngineData>,
    ) -> Result<(), ExchangeError> {
        let mut inner = self.inner.lock().unwrap();
        let version = inner.next_version();
        let slot = inner.slot_mut(id)?;
        slot.engines = Versioned {
            value: engines,
            version,
        };
        Ok(())
    }

    /// Mutate the published game record in place under the lock
    pub fn modify_game_record<F>(&self, id: ProviderId, mutator: F) -> Result<(), ExchangeError>
    where
        F: FnOnce(&mut GameRecord),
    {
        let mut inner = self.inner.lock().unwrap();
        let version = inner.next_version();
        let slot = inner.slot_mut(id)?;
        mutator(&mut slot.game.value);
        slot.game.version = version;
        Ok(())
    }

    /// Snapshot the published game record
    pub fn game_record(&self, id: ProviderId) -> Result<Versioned<GameRecord>, ExchangeError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.slot_mut(id)?.game.clone())
    }

    /// Snapshot the published engine data
    pub fn engine_data_list(
        &self,
        id: ProviderId,
    ) -> Result<Versioned<Vec<EngineData>>, ExchangeError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.slot_mut(id)?.engines.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_issues_unique_ids() {
        let exchange = BoardExchange::new();
        let a = exchange.register_provider();
        let b = exchange.register_provider();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unknown_provider_fails() {
        let exchange = BoardExchange::new();
        let err = exchange.set_game_record(ProviderId(99), GameRecord::default());
        assert!(matches!(err, Err(ExchangeError::UnknownProvider(99))));
        assert!(exchange.game_record(ProviderId(99)).is_err());
    }

    #[test]
    fn test_version_advances_on_publish() {
        let exchange = BoardExchange::new();
        let id = exchange.register_provider();
        let before = exchange.game_record(id).unwrap().version;

        exchange
            .set_game_record(id, GameRecord::from_position("startpos"))
            .unwrap();
        let after = exchange.game_record(id).unwrap();
        assert!(after.changed_since(before));
        assert_eq!(after.value.start_position, "startpos");
    }

    #[test]
    fn test_modify_in_place_bumps_version() {
        let exchange = BoardExchange::new();
        let id = exchange.register_provider();
        exchange
            .set_game_record(id, GameRecord::from_position("startpos"))
            .unwrap();
        let seen = exchange.game_record(id).unwrap().version;

        exchange
            .modify_game_record(id, |record| record.push_move("e2e4"))
            .unwrap();
        let after = exchange.game_record(id).unwrap();
        assert!(after.changed_since(seen));
        assert_eq!(after.value.moves, vec!["e2e4".to_string()]);
    }

    #[test]
    fn test_unregister_removes_state() {
        let exchange = BoardExchange::new();
        let id = exchange.register_provider();
        exchange.unregister_provider(id).unwrap();
        assert!(exchange.unregister_provider(id).is_err());
        assert!(exchange.game_record(id).is_err());
    }

    #[test]
    fn test_engine_data_versioned_independently() {
        let exchange = BoardExchange::new();
        let id = exchange.register_provider();
        exchange
            .set_engine_data_list(
                id,
                vec![EngineData {
                    name: "alpha".into(),
                    ..Default::default()
                }],
            )
            .unwrap();
        let engines = exchange.engine_data_list(id).unwrap();
        assert_eq!(engines.value.len(), 1);
        assert!(engines.changed_since(0));
        // Game record untouched
        assert_eq!(exchange.game_record(id).unwrap().version, 0);
    }
}
