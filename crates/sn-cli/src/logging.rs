use tracing_subscriber::{fmt, EnvFilter};

use crate::DEFAULT_LOG_FILTER;

/// Installs a stderr subscriber. `RUST_LOG` wins over `default_filter`; an
/// unparsable filter falls back to `warn`. Later calls keep the first
/// subscriber.
pub(crate) fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
