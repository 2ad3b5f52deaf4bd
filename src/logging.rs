//! Tracing setup for the command line tool.

use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "protovalidate_breaking=warn";
const VERBOSE_LOG_FILTER: &str = "protovalidate_breaking=debug";

/// Initialize tracing on stderr. `RUST_LOG` takes precedence over the
/// default filter; `verbose` switches the default to debug output.
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let default_filter = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .try_init()?;

    Ok(())
}
