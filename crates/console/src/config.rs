// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use chrono::NaiveTime;

/// Longest a pending authorization may stay valid.
pub const MAX_STATE_TTL_SECS: u64 = 86_400;

/// Widest refresh window; tokens the platform issues live for about a day.
pub const MAX_REFRESH_THRESHOLD_SECS: u64 = 7 * 86_400;

/// Configuration for the advertiser console.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "adconsole", version, about = "Advertiser credential and sync console.")]
pub struct ConsoleConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "ADCONSOLE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8090, env = "ADCONSOLE_PORT")]
    pub port: u16,

    /// Bearer token for operator API auth. If unset, auth is disabled.
    #[arg(long, env = "ADCONSOLE_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Database connection string.
    #[arg(long, default_value = "sqlite://adconsole.db?mode=rwc", env = "ADCONSOLE_DATABASE_URL")]
    pub database_url: String,

    /// Application id registered with the advertising platform.
    #[arg(long, env = "ADCONSOLE_APP_ID")]
    pub app_id: String,

    /// Application secret registered with the advertising platform.
    #[arg(long, env = "ADCONSOLE_APP_SECRET", hide_env_values = true)]
    pub app_secret: String,

    /// Base URL of the platform open API.
    #[arg(long, default_value = "https://ad.oceanengine.com/open_api", env = "ADCONSOLE_API_BASE_URL")]
    pub api_base_url: String,

    /// Authorization page advertisers are sent to.
    #[arg(
        long,
        default_value = "https://qianchuan.jinritemai.com/openapi/qc/audit/oauth.html",
        env = "ADCONSOLE_AUTH_URL"
    )]
    pub auth_url: String,

    /// Callback URL registered with the platform (`redirect_uri`).
    #[arg(long, env = "ADCONSOLE_REDIRECT_URI")]
    pub redirect_uri: Option<String>,

    /// Request material authorization alongside account authorization.
    #[arg(long, env = "ADCONSOLE_MATERIAL_AUTH")]
    pub material_auth: bool,

    /// Per-request timeout for platform calls in milliseconds.
    #[arg(long, default_value_t = 30000, env = "ADCONSOLE_HTTP_TIMEOUT_MS")]
    pub http_timeout_ms: u64,

    /// Retries for a retryable token refresh failure.
    #[arg(long, default_value_t = 2, env = "ADCONSOLE_REFRESH_RETRIES")]
    pub refresh_retries: u32,

    /// Lifetime of an OAuth state token in seconds.
    #[arg(long, default_value_t = 600, env = "ADCONSOLE_STATE_TTL_SECS")]
    pub state_ttl_secs: u64,

    /// Refresh tokens expiring within this many seconds.
    #[arg(long, default_value_t = 3600, env = "ADCONSOLE_REFRESH_THRESHOLD_SECS")]
    pub refresh_threshold_secs: u64,

    /// Balance sync interval in seconds.
    #[arg(long, default_value_t = 3600, env = "ADCONSOLE_BALANCE_SYNC_SECS")]
    pub balance_sync_secs: u64,

    /// Token refresh sweep interval in seconds.
    #[arg(long, default_value_t = 300, env = "ADCONSOLE_TOKEN_SWEEP_SECS")]
    pub token_sweep_secs: u64,

    /// Local time of day (HH:MM) for the daily report sync.
    #[arg(long, default_value = "02:00", env = "ADCONSOLE_REPORT_SYNC_AT")]
    pub report_sync_at: String,

    /// Local time of day (HH:MM) for operation-log cleanup.
    #[arg(long, default_value = "03:00", env = "ADCONSOLE_LOG_CLEANUP_AT")]
    pub log_cleanup_at: String,

    /// Days of operation log to keep.
    #[arg(long, default_value_t = 30, env = "ADCONSOLE_LOG_RETENTION_DAYS")]
    pub log_retention_days: u32,

    /// Upper bound on waiting for jobs to drain at shutdown, in milliseconds.
    #[arg(long, default_value_t = 10000, env = "ADCONSOLE_SHUTDOWN_TIMEOUT_MS")]
    pub shutdown_timeout_ms: u64,

    /// Serve the API without running background jobs.
    #[arg(long, env = "ADCONSOLE_NO_SCHEDULER")]
    pub no_scheduler: bool,

    /// Log format (text or json).
    #[arg(long, default_value = "text", env = "ADCONSOLE_LOG_FORMAT")]
    pub log_format: String,

    /// Log filter directive.
    #[arg(long, default_value = "info", env = "ADCONSOLE_LOG_LEVEL")]
    pub log_level: String,
}

impl ConsoleConfig {
    /// Check cross-field constraints clap cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.app_id.is_empty() || self.app_secret.is_empty() {
            anyhow::bail!("--app-id and --app-secret must be non-empty");
        }
        if self.balance_sync_secs == 0 || self.token_sweep_secs == 0 {
            anyhow::bail!("sync intervals must be greater than zero");
        }
        if self.state_ttl_secs == 0 || self.state_ttl_secs > MAX_STATE_TTL_SECS {
            anyhow::bail!("--state-ttl-secs must be between 1 and {MAX_STATE_TTL_SECS}");
        }
        if self.refresh_threshold_secs > MAX_REFRESH_THRESHOLD_SECS {
            anyhow::bail!("--refresh-threshold-secs must be at most {MAX_REFRESH_THRESHOLD_SECS}");
        }
        match self.log_format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        self.report_sync_time()?;
        self.log_cleanup_time()?;
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }

    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.refresh_threshold_secs)
    }

    pub fn balance_sync_interval(&self) -> Duration {
        Duration::from_secs(self.balance_sync_secs)
    }

    pub fn token_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.token_sweep_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn report_sync_time(&self) -> anyhow::Result<NaiveTime> {
        parse_time_of_day(&self.report_sync_at)
    }

    pub fn log_cleanup_time(&self) -> anyhow::Result<NaiveTime> {
        parse_time_of_day(&self.log_cleanup_at)
    }
}

/// Parse an `HH:MM` time of day.
pub fn parse_time_of_day(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| anyhow::anyhow!("invalid time of day {s:?} (expected HH:MM): {e}"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
