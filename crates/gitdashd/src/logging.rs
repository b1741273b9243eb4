use gitdash_config::LogFormat;
use tracing_subscriber::EnvFilter;

/// Installs the process-wide subscriber on stderr. `RUST_LOG` overrides
/// the configured level. Returns `false` when a subscriber was already set.
pub fn init_tracing(format: LogFormat, level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Human => builder.compact().try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}
