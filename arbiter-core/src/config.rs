//! Configuration types for engines and tournaments

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Wire protocol an engine speaks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolKind {
    /// Turn-based protocol with an explicit feature handshake
    Handshake,
    /// Streaming analysis protocol with a mandatory handshake
    Stream,
}

impl Default for ProtocolKind {
    fn default() -> Self {
        ProtocolKind::Handshake
    }
}

/// Time control for a game
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TimeControl {
    /// Classical: base time in milliseconds, increment per move, moves per session
    Classical {
        base_ms: u64,
        increment_ms: u64,
        moves_per_session: u32,
    },
    /// Fixed time per move in milliseconds
    MoveTime { ms: u64 },
    /// Fixed search depth in plies
    Depth { plies: u32 },
    /// Nodes-per-second throttle
    NodesPerSecond { nps: u64 },
}

impl Default for TimeControl {
    fn default() -> Self {
        TimeControl::MoveTime { ms: 1000 }
    }
}

/// Per-move search limits handed to an adapter
///
/// Remaining clock times are tracked by the scheduler; the time control
/// decides which protocol encoding the adapter emits.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SearchLimits {
    /// Time control in force for the game
    pub control: TimeControl,
    /// White clock remaining in milliseconds
    pub white_ms: u64,
    /// Black clock remaining in milliseconds
    pub black_ms: u64,
}

impl SearchLimits {
    /// Limits for a fixed-move-time game
    pub fn move_time(ms: u64) -> Self {
        Self {
            control: TimeControl::MoveTime { ms },
            white_ms: ms,
            black_ms: ms,
        }
    }

    /// Limits for a fixed-depth game
    pub fn depth(plies: u32) -> Self {
        Self {
            control: TimeControl::Depth { plies },
            ..Default::default()
        }
    }

    /// Limits with both clocks seeded from the control's starting time.
    /// Depth and nodes-per-second games carry no clock.
    pub fn for_control(control: TimeControl) -> Self {
        let clock = match control {
            TimeControl::Classical { base_ms, .. } => base_ms,
            TimeControl::MoveTime { ms } => ms,
            TimeControl::Depth { .. } | TimeControl::NodesPerSecond { .. } => 0,
        };
        Self {
            control,
            white_ms: clock,
            black_ms: clock,
        }
    }
}

/// Immutable description of one engine installation
///
/// Identity key is the executable path: the roster editor must keep paths
/// unique, but a tournament may reference the same path through several
/// distinct configurations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Display name
    pub name: String,
    /// Executable path (identity key)
    pub path: PathBuf,
    /// Working directory for the process (defaults to the executable's dir)
    pub working_dir: Option<PathBuf>,
    /// Protocol the engine speaks
    pub protocol: ProtocolKind,
    /// Option name/value pairs sent after the handshake
    pub options: BTreeMap<String, String>,
    /// Time control used when this engine plays
    pub time_control: TimeControl,
    /// Whether this engine is a designated gauntlet participant
    pub gauntlet: bool,
}

impl EngineConfig {
    /// Create a config with defaults for everything but name and path
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            working_dir: None,
            protocol: ProtocolKind::default(),
            options: BTreeMap::new(),
            time_control: TimeControl::default(),
            gauntlet: false,
        }
    }

    /// Set the protocol
    pub fn with_protocol(mut self, protocol: ProtocolKind) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the time control
    pub fn with_time_control(mut self, tc: TimeControl) -> Self {
        self.time_control = tc;
        self
    }

    /// Mark as a designated gauntlet engine
    pub fn with_gauntlet(mut self, gauntlet: bool) -> Self {
        self.gauntlet = gauntlet;
        self
    }

    /// Identity used to match pairings across tournament rebuilds
    ///
    /// Matching is by name and path, never by roster position.
    pub fn identity(&self) -> (&str, &std::path::Path) {
        (&self.name, &self.path)
    }
}

/// Tournament topology
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    /// Designated engines each play every non-designated engine
    Gauntlet,
    /// All distinct pairs play each other
    RoundRobin,
}

impl Default for Topology {
    fn default() -> Self {
        Topology::RoundRobin
    }
}

/// Tournament configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TournamentSettings {
    /// Topology used to build pairings
    pub topology: Topology,
    /// Round multiplier over the pairing set
    pub rounds: u32,
    /// Games per pairing per round
    pub games_per_pairing: u32,
    /// Opening positions cycled through the schedule (opaque strings)
    pub openings: Vec<String>,
    /// Base Elo anchoring performance estimates
    pub base_elo: f64,
}

impl Default for TournamentSettings {
    fn default() -> Self {
        Self {
            topology: Topology::RoundRobin,
            rounds: 1,
            games_per_pairing: 2,
            openings: Vec::new(),
            base_elo: 2400.0,
        }
    }
}

impl TournamentSettings {
    /// Round-robin settings
    pub fn round_robin(rounds: u32, games_per_pairing: u32) -> Self {
        Self {
            topology: Topology::RoundRobin,
            rounds,
            games_per_pairing,
            ..Default::default()
        }
    }

    /// Gauntlet settings
    pub fn gauntlet(rounds: u32, games_per_pairing: u32) -> Self {
        Self {
            topology: Topology::Gauntlet,
            rounds,
            games_per_pairing,
            ..Default::default()
        }
    }

    /// Set the opening list
    pub fn with_openings(mut self, openings: Vec<String>) -> Self {
        self.openings = openings;
        self
    }
}
