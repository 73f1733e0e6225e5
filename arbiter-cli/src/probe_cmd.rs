//! Probe command - start one engine and report what it says about itself

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use arbiter_core::EngineConfig;
use arbiter_engine::create_engine;

use crate::settings;

#[derive(Args)]
pub struct ProbeArgs {
    /// Engine executable
    #[arg(long, value_name = "FILE")]
    pub engine: PathBuf,

    /// Protocol: handshake (cecp/xboard) or stream (uci)
    #[arg(long, default_value = "handshake")]
    pub protocol: String,

    /// Handshake timeout in milliseconds
    #[arg(long, default_value = "5000")]
    pub timeout_ms: u64,
}

pub fn run(args: ProbeArgs) -> Result<()> {
    let protocol = settings::parse_protocol(&args.protocol)?;
    let name = args
        .engine
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "engine".to_string());
    let config = EngineConfig::new(name, &args.engine).with_protocol(protocol);

    let mut worker = create_engine(&config)
        .with_context(|| format!("starting {}", args.engine.display()))?;
    let result = worker.wait_ready(Duration::from_millis(args.timeout_ms));
    match result {
        Ok(()) => {
            println!("engine ready");
            println!("  configured name: {}", worker.name());
            println!("  reported name:   {}", worker.display_name());
            println!("  protocol:        {}", args.protocol);
        }
        Err(err) => {
            println!("engine failed its handshake: {err}");
        }
    }
    worker.terminate();
    Ok(())
}
