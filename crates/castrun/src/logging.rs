//! Process-wide log output.
//!
//! The library only emits `tracing` events. Applications (and the test suite) call
//! `init` once to install a stderr subscriber. `RUST_LOG` takes precedence over
//! the numeric level when set.

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

static INIT: Once = Once::new();

/// Maps the 0..=6 numeric level onto a tracing filter.
///
/// 0 disables output. 1 (fatal) and 2 (error) both map to `ERROR`, then
/// warn, info, debug and trace.
pub fn level_filter(level: u8) -> LevelFilter {
    match level {
        0 => LevelFilter::OFF,
        1 | 2 => LevelFilter::ERROR,
        3 => LevelFilter::WARN,
        4 => LevelFilter::INFO,
        5 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Installs the global subscriber. Calls after the first are no-ops.
pub fn init(level: u8) {
    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(level_filter(level).into())
            .from_env_lossy();
        // Another subscriber may already be installed by the application.
        let _ = tracing_subscriber::fmt()
            .compact()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .try_init();
    });
}
