use std::sync::OnceLock;
use tracing::warn;
use tracing_subscriber::EnvFilter;

static INIT_GUARD: OnceLock<()> = OnceLock::new();

/// Installs a fmt subscriber filtered by `RUST_LOG` (default `info`). Safe to call repeatedly.
pub fn init_tracing() {
    INIT_GUARD.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        if let Err(err) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
            warn!("failed to initialise tracing subscriber: {err}");
        }
    });
}
