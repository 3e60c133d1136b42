//! # TD Bridge Test Suite
//!
//! Cross-crate scenarios run against the scripted engine.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── scenarios/
//!     ├── handshake.rs      # Authorization end to end through Client::start
//!     ├── correlation.rs    # Timeouts, late replies, concurrent callers
//!     ├── fan_out.rs        # Listener ordering and lifecycle
//!     └── shutdown.rs       # Graceful and forced stop
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p td-tests
//! RUST_LOG=td_client=debug cargo test -p td-tests scenarios::handshake
//! ```

#![allow(dead_code)]

pub mod scenarios;

use std::sync::Once;
use std::time::Duration;
use td_client::ClientConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a test-friendly subscriber once per process. `RUST_LOG` overrides
/// the default `warn` filter.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_test_writer();

        // Another harness may have installed one already.
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init();
    });
}

/// Short timeouts so scenarios finish quickly.
pub fn test_config() -> ClientConfig {
    ClientConfig {
        receive_timeout: Duration::from_millis(20),
        send_timeout: Duration::from_secs(2),
        settle_delay: Duration::from_millis(10),
        ..Default::default()
    }
}
