//! Server configuration. Everything is read from the environment (or a `.env` file via dotenvy);
//! every value has a default that works for a local development instance.

use std::env;

use bkg_common::helpers::parse_boolean_flag;
use chrono::Duration;
use log::*;
use qpay_tools::QPayConfig;

pub const DEFAULT_TBS_HOST: &str = "127.0.0.1";
pub const DEFAULT_TBS_PORT: u16 = 8480;
/// Long enough to reach a checkout page, short enough that abandoned holds do not starve other
/// requesters.
pub const DEFAULT_HOLD_SECONDS: i64 = 120;
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_SHUTDOWN_TIMEOUT: u64 = 10;
pub const DEFAULT_CATALOG_URL: &str = "http://localhost:8481";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds actix waits for in-flight requests when shutting down.
    pub shutdown_timeout: u64,
    pub database_url: String,
    /// How long a fresh hold blocks its interval before the sweeper may release it.
    pub hold_duration: Duration,
    /// Pause between expiry sweeper passes.
    pub sweep_interval: std::time::Duration,
    /// When set, cancelling a booking also writes the refund row immediately instead of leaving
    /// it to the back office.
    pub auto_refunds: bool,
    pub catalog_url: String,
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    /// Skips webhook signature checks. Test rigs only. **Never** enable this in production.
    pub disable_webhook_signature: bool,
    pub qpay: QPayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TBS_HOST.into(),
            port: DEFAULT_TBS_PORT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            database_url: String::default(),
            hold_duration: Duration::seconds(DEFAULT_HOLD_SECONDS),
            sweep_interval: std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECONDS),
            auto_refunds: false,
            catalog_url: DEFAULT_CATALOG_URL.into(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            disable_webhook_signature: false,
            qpay: QPayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let host = env::var("TBS_HOST").ok().unwrap_or_else(|| DEFAULT_TBS_HOST.into());
        let port = env::var("TBS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port ({e}). Using the default, {DEFAULT_TBS_PORT}, instead.");
                    DEFAULT_TBS_PORT
                })
            })
            .unwrap_or(DEFAULT_TBS_PORT);
        let shutdown_timeout = env::var("TBS_SHUTDOWN_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        let database_url = env::var("TBS_DATABASE_URL").unwrap_or_else(|_| {
            error!("🪛️ TBS_DATABASE_URL is not set. Please set it to the database URL for the server.");
            String::default()
        });
        let catalog_url = env::var("TBS_CATALOG_URL").unwrap_or_else(|_| {
            warn!("🪛️ TBS_CATALOG_URL is not set. Using the default, {DEFAULT_CATALOG_URL}.");
            DEFAULT_CATALOG_URL.into()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("TBS_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("TBS_USE_FORWARDED").ok(), false);
        let auto_refunds = parse_boolean_flag(env::var("TBS_AUTO_REFUNDS").ok(), false);
        let disable_webhook_signature = parse_boolean_flag(env::var("TBS_DISABLE_WEBHOOK_SIGNATURE").ok(), false);
        if disable_webhook_signature {
            warn!(
                "🪛️ TBS_DISABLE_WEBHOOK_SIGNATURE is set. Anyone can post payment verdicts to this server. If you \
                 see this message in production, stop the server and unset the variable."
            );
        }
        Self {
            host,
            port,
            shutdown_timeout,
            database_url,
            hold_duration: configure_hold_duration(),
            sweep_interval: configure_sweep_interval(),
            auto_refunds,
            catalog_url,
            use_x_forwarded_for,
            use_forwarded,
            disable_webhook_signature,
            qpay: QPayConfig::new_from_env_or_default(),
        }
    }
}

fn configure_hold_duration() -> Duration {
    env::var("TBS_HOLD_SECONDS")
        .map_err(|_| info!("🪛️ TBS_HOLD_SECONDS is not set. Using the default of {DEFAULT_HOLD_SECONDS}s."))
        .and_then(|s| {
            s.parse::<i64>().map(Duration::seconds).map_err(|e| {
                warn!("🪛️ TBS_HOLD_SECONDS ({s}) is not a valid number of seconds ({e}). Using the default.");
            })
        })
        .ok()
        .unwrap_or_else(|| Duration::seconds(DEFAULT_HOLD_SECONDS))
}

fn configure_sweep_interval() -> std::time::Duration {
    env::var("TBS_SWEEP_INTERVAL_SECONDS")
        .map_err(|_| {
            info!("🪛️ TBS_SWEEP_INTERVAL_SECONDS is not set. Using the default of {DEFAULT_SWEEP_INTERVAL_SECONDS}s.")
        })
        .and_then(|s| {
            s.parse::<u64>().map(std::time::Duration::from_secs).map_err(|e| {
                warn!("🪛️ TBS_SWEEP_INTERVAL_SECONDS ({s}) is not a valid number of seconds ({e}). Using the default.");
            })
        })
        .ok()
        .unwrap_or_else(|| std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECONDS))
}

/// The subset of the configuration that request handlers need, attached to the app as shared
/// state. Keep it free of secrets.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub hold_duration: Duration,
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            hold_duration: config.hold_duration,
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
        }
    }
}
