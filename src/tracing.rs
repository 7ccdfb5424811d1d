//! Logging for the guest agent
//!
//! stdout is the protocol channel, so all log output goes to stderr.
//! ANSI colours are off because the usual destination is a serial console.
//!
//! ```text
//! guest_agent ─stdout─► AGNT: ... lines only
//!             ─stderr─► tracing fmt output (filtered by RUST_LOG)
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid
const DEFAULT_FILTER: &str = "warn";

/// Initialize the tracing subsystem
///
/// # Arguments
/// * `service_name` - Name recorded in the startup event
///
/// # Example
/// ```ignore
/// init_tracing("guest_agent")?;
/// ```
pub fn init_tracing(service_name: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(
        service = service_name,
        version = env!("CARGO_PKG_VERSION"),
        "tracing initialized"
    );

    Ok(())
}
