use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,open_energy_allocator=info";

/// Filter from `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]
pub fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install the JSON tracing subscriber for the binary.
///
/// Event fields are flattened into the top-level object so a replayed tick
/// can be filtered on `consumer` or `phase` directly. The library only emits
/// events and never calls this itself.
pub fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(log_filter())
        .with(fmt::layer().json().flatten_event(true))
        .try_init()?;
    Ok(())
}
