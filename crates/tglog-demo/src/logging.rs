//! Subscriber setup for the demo.

use tglog::LogSink;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Install a global subscriber whose only writer is `sink`.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init(level: &str, sink: LogSink) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_ansi(false)
        .with_writer(sink);

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .init();
}
