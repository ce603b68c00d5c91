//! Structured logging setup.
//!
//! Configures the global `tracing` subscriber with formatted output. The
//! `debug` configuration option raises the level filter from INFO to DEBUG;
//! matching misses and other per-request noise only show up at debug level.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the global tracing subscriber with formatted output.
pub fn init_tracing(debug: bool) {
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_level(true)
                .with_filter(level),
        )
        .init();
}
