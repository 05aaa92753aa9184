// Logging bootstrap

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Install `env_logger` once per process. `RUST_LOG` overrides the default
/// `info` filter; a logger installed by the host application takes precedence.
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
    });
}
