//! One-time tracing setup
//!
//! Installed on first database construction. `try_init` keeps this
//! cooperative: if the embedding application already installed a
//! subscriber, theirs wins.

use std::sync::Once;

static INIT: Once = Once::new();

pub(crate) fn init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .try_init();
    });
}
