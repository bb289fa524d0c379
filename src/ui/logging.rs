//! ui::logging
//!
//! Installs the global `tracing` subscriber.
//!
//! Events go to stderr in compact form. The default level follows the
//! verbosity flags; `RUST_LOG` overrides it with a full filter directive.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use super::output::Verbosity;

/// Default level for a verbosity.
pub fn level_from_verbosity(verbosity: Verbosity) -> LevelFilter {
    match verbosity {
        Verbosity::Quiet => LevelFilter::ERROR,
        Verbosity::Normal => LevelFilter::INFO,
        Verbosity::Debug => LevelFilter::DEBUG,
    }
}

/// Install the subscriber. Later calls are no-ops.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::builder()
        .with_default_directive(level_from_verbosity(verbosity).into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_verbosity() {
        assert_eq!(level_from_verbosity(Verbosity::Quiet), LevelFilter::ERROR);
        assert_eq!(level_from_verbosity(Verbosity::Normal), LevelFilter::INFO);
        assert_eq!(level_from_verbosity(Verbosity::Debug), LevelFilter::DEBUG);
    }

    #[test]
    fn repeated_init_is_harmless() {
        init(Verbosity::Quiet);
        init(Verbosity::Debug);
    }
}
