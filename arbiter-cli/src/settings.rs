//! TOML settings schema for the run command
//!
//! The file carries a `[tournament]` section plus one `[[engines]]` table
//! per participant. Protocol and topology are plain strings here and
//! validated on conversion, so a typo fails before any process starts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use arbiter_core::{
    EngineConfig, EngineError, ProtocolKind, TimeControl, Topology, TournamentError,
    TournamentSettings,
};

#[derive(Debug, Deserialize)]
pub struct SettingsFile {
    pub tournament: TournamentSection,
    #[serde(default)]
    pub engines: Vec<EngineSection>,
}

#[derive(Debug, Deserialize)]
pub struct TournamentSection {
    #[serde(default = "default_topology")]
    pub topology: String,
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    #[serde(default = "default_games_per_pairing")]
    pub games_per_pairing: u32,
    /// Opening positions, one per line; absent file is an operator error
    pub openings_file: Option<PathBuf>,
    #[serde(default = "default_base_elo")]
    pub base_elo: f64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Deserialize)]
pub struct EngineSection {
    pub name: String,
    pub path: PathBuf,
    pub working_dir: Option<PathBuf>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub gauntlet: bool,
    // Time control, first match wins: classical, move time, depth, nps
    pub base_ms: Option<u64>,
    #[serde(default)]
    pub increment_ms: u64,
    #[serde(default)]
    pub moves_per_session: u32,
    pub move_time_ms: Option<u64>,
    pub depth: Option<u32>,
    pub nps: Option<u64>,
}

fn default_topology() -> String {
    "round-robin".into()
}
fn default_rounds() -> u32 {
    1
}
fn default_games_per_pairing() -> u32 {
    2
}
fn default_base_elo() -> f64 {
    2400.0
}
fn default_concurrency() -> usize {
    1
}
fn default_protocol() -> String {
    "handshake".into()
}

impl EngineSection {
    fn time_control(&self) -> TimeControl {
        if let Some(base_ms) = self.base_ms {
            return TimeControl::Classical {
                base_ms,
                increment_ms: self.increment_ms,
                moves_per_session: self.moves_per_session,
            };
        }
        if let Some(ms) = self.move_time_ms {
            return TimeControl::MoveTime { ms };
        }
        if let Some(plies) = self.depth {
            return TimeControl::Depth { plies };
        }
        if let Some(nps) = self.nps {
            return TimeControl::NodesPerSecond { nps };
        }
        TimeControl::default()
    }

    fn to_config(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig::new(&self.name, &self.path)
            .with_protocol(parse_protocol(&self.protocol)?)
            .with_time_control(self.time_control())
            .with_gauntlet(self.gauntlet);
        config.working_dir = self.working_dir.clone();
        config.options = self.options.clone();
        Ok(config)
    }
}

impl SettingsFile {
    pub fn roster(&self) -> Result<Vec<EngineConfig>> {
        self.engines
            .iter()
            .map(|section| {
                section
                    .to_config()
                    .with_context(|| format!("engine `{}`", section.name))
            })
            .collect()
    }

    pub fn tournament_settings(&self) -> Result<TournamentSettings> {
        let openings = match &self.tournament.openings_file {
            Some(path) => load_openings(path)?,
            None => Vec::new(),
        };
        Ok(TournamentSettings {
            topology: parse_topology(&self.tournament.topology)?,
            rounds: self.tournament.rounds,
            games_per_pairing: self.tournament.games_per_pairing,
            openings,
            base_elo: self.tournament.base_elo,
        })
    }
}

/// Parse and validate a settings file
pub fn load(path: &Path) -> Result<SettingsFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing settings file {}", path.display()))
}

/// Map a protocol string to its adapter kind
pub fn parse_protocol(name: &str) -> Result<ProtocolKind, EngineError> {
    match name.to_ascii_lowercase().as_str() {
        "handshake" | "cecp" | "xboard" => Ok(ProtocolKind::Handshake),
        "stream" | "uci" => Ok(ProtocolKind::Stream),
        other => Err(EngineError::UnsupportedProtocol(other.to_string())),
    }
}

fn parse_topology(name: &str) -> Result<Topology> {
    match name.to_ascii_lowercase().as_str() {
        "round-robin" | "round_robin" | "roundrobin" => Ok(Topology::RoundRobin),
        "gauntlet" => Ok(Topology::Gauntlet),
        other => anyhow::bail!("unknown topology `{other}`"),
    }
}

fn load_openings(path: &Path) -> Result<Vec<String>, TournamentError> {
    if !path.exists() {
        return Err(TournamentError::MissingOpenings(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}
