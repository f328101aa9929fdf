use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a stderr subscriber filtered by `RUST_LOG`, falling back to `default_level`.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing(default_level: &str) {
    let env_filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .try_init();

    if installed.is_ok() {
        tracing::debug!("Tracing initialised at default level {}", default_level);
    }
}
