//! Tracing setup and metric names.
//!
//! The plugin only emits `tracing` events and `metrics` counters. Hosts that
//! already install a subscriber and recorder need nothing from here; [`init`]
//! is for standalone tools and tests.
//!
//! ```ignore
//! use hashtags_index::telemetry::{self, TelemetryConfig};
//!
//! telemetry::init(TelemetryConfig::from_env("hashtags-reindex"));
//! tracing::info!("reindex started");
//! ```

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Posts that gained at least one tag relation.
pub const POSTS_INDEXED: &str = "hashtags_posts_indexed_total";
/// Posts with no hashtags and no inherited topic tags.
pub const POSTS_SKIPPED: &str = "hashtags_posts_skipped_total";
/// Posts whose indexing failed during a reindex.
pub const POSTS_FAILED: &str = "hashtags_posts_failed_total";
/// Tag pages projected.
pub const TAG_PAGES: &str = "hashtags_tag_pages_total";

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Console log level (default: INFO, DEBUG in debug builds)
    pub console_level: Level,
}

impl TelemetryConfig {
    /// `RUST_LOG`, when set, overrides `console_level`.
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let console_level = if cfg!(debug_assertions) {
            Level::DEBUG
        } else {
            Level::INFO
        };

        Self {
            service_name: service_name.into(),
            console_level,
        }
    }
}

/// Install a compact console subscriber.
///
/// Returns `false` if a global subscriber was already installed, in which case
/// nothing changes.
pub fn init(config: TelemetryConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.console_level.as_str().to_lowercase()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(env_filter);

    match tracing_subscriber::registry().with(console_layer).try_init() {
        Ok(()) => {
            tracing::info!(service = %config.service_name, "telemetry initialized");
            true
        }
        Err(_) => false,
    }
}
