//! Process-level diagnostics setup for binaries and examples.
//!
//! Library code only ever emits `tracing` events; installing a subscriber is
//! the embedding application's call. [`init`] is the one-liner for hosts
//! that do not bring their own: an env-filtered fmt subscriber plus miette's
//! pretty panic reports.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the default subscriber. Safe to call more than once; later calls
/// are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,botmark=info"));
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();

    miette::set_panic_hook();
}
