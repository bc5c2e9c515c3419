use anyhow::{Context, Result};
use open_energy_allocator::{config, dispatch, telemetry};
use config::Config;
use dispatch::{dispatch_round, TickInput};
use telemetry::init_tracing;
use tracing::info;

const DEFAULT_TICK_PATH: &str = "demos/tick.toml";

fn main() -> Result<()> {
    init_tracing()?;

    let cfg = Config::load()?;

    let tick_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_TICK_PATH.to_string());
    let raw = std::fs::read_to_string(&tick_path)
        .with_context(|| format!("reading tick input {tick_path}"))?;
    let tick = TickInput::from_toml_str(&raw)
        .with_context(|| format!("parsing tick input {tick_path}"))?;

    info!(
        path = %tick_path,
        available = %tick.available,
        consumers = tick.consumers.len(),
        "replaying allocation tick"
    );

    let mut allocator = cfg.allocator.build_allocator(tick.available);
    let grants = dispatch_round(&mut allocator, &tick.consumers)?;

    println!("{}", serde_json::to_string_pretty(&grants)?);
    Ok(())
}
