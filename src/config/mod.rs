use chrono::{FixedOffset, Offset, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub materialize: MaterializeConfig,
    pub notify: NotifyConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    /// Off for statement-pooling proxies that cannot hold a transaction
    pub enable_transactions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Local time of the school calendar, minutes east of UTC. This is a fixed
    /// offset: it does not follow daylight-saving changes, so a school in a
    /// DST zone sees its jobs shift by the DST delta for part of the year.
    pub utc_offset_minutes: i32,
    pub payment_due_hour: u32,
    pub holiday_hour: u32,
    pub payroll_day: u32,
    pub payroll_hour: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializeConfig {
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub endpoint: Option<String>,
    pub server_key: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_manual_triggers: bool,
}

impl SchedulerConfig {
    /// Same offset all year round. Falls back to UTC when the configured
    /// offset is out of range.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

impl MaterializeConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl NotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Parse `key` from the environment, keeping `current` when unset or malformed
fn env_or<T: FromStr>(key: &str, current: T) -> T {
    match env::var(key) {
        Ok(v) => v.trim().parse().unwrap_or(current),
        Err(_) => current,
    }
}

fn env_opt(key: &str, current: Option<String>) -> Option<String> {
    match env::var(key) {
        Ok(v) if v.trim().is_empty() => None,
        Ok(v) => Some(v.trim().to_string()),
        Err(_) => current,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Defaults by environment, then individual overrides
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        let db = &mut self.database;
        db.name = env_or("DATABASE_NAME", db.name.clone());
        db.max_connections = env_or("DATABASE_MAX_CONNECTIONS", db.max_connections);
        db.connection_timeout = env_or("DATABASE_CONNECTION_TIMEOUT", db.connection_timeout);
        db.enable_transactions = env_or("DATABASE_ENABLE_TRANSACTIONS", db.enable_transactions);

        let sched = &mut self.scheduler;
        sched.enabled = env_or("SCHEDULER_ENABLED", sched.enabled);
        sched.utc_offset_minutes = env_or("SCHEDULER_UTC_OFFSET_MINUTES", sched.utc_offset_minutes);
        sched.payment_due_hour = env_or("SCHEDULER_PAYMENT_DUE_HOUR", sched.payment_due_hour);
        sched.holiday_hour = env_or("SCHEDULER_HOLIDAY_HOUR", sched.holiday_hour);
        sched.payroll_day = env_or("SCHEDULER_PAYROLL_DAY", sched.payroll_day);
        sched.payroll_hour = env_or("SCHEDULER_PAYROLL_HOUR", sched.payroll_hour);

        let mat = &mut self.materialize;
        mat.max_attempts = env_or("MATERIALIZE_MAX_ATTEMPTS", mat.max_attempts).max(1);
        mat.retry_backoff_ms = env_or("MATERIALIZE_RETRY_BACKOFF_MS", mat.retry_backoff_ms);
        mat.concurrency = env_or("MATERIALIZE_CONCURRENCY", mat.concurrency).max(1);

        let notify = &mut self.notify;
        notify.endpoint = env_opt("NOTIFY_ENDPOINT", notify.endpoint.take());
        notify.server_key = env_opt("NOTIFY_SERVER_KEY", notify.server_key.take());
        notify.timeout_ms = env_or("NOTIFY_TIMEOUT_MS", notify.timeout_ms);

        self.api.port = env_or("API_PORT", env_or("PORT", self.api.port));
        self.api.enable_manual_triggers = env_or("API_ENABLE_MANUAL_TRIGGERS", self.api.enable_manual_triggers);

        self
    }

    fn base(environment: Environment) -> Self {
        Self {
            environment,
            database: DatabaseConfig {
                name: "campus_main".to_string(),
                max_connections: 10,
                connection_timeout: 30,
                enable_transactions: true,
            },
            scheduler: SchedulerConfig {
                enabled: true,
                utc_offset_minutes: 0,
                payment_due_hour: 0,
                holiday_hour: 0,
                payroll_day: 1,
                payroll_hour: 0,
            },
            materialize: MaterializeConfig {
                max_attempts: 3,
                retry_backoff_ms: 200,
                concurrency: 8,
            },
            notify: NotifyConfig {
                endpoint: None,
                server_key: None,
                timeout_ms: 5000,
            },
            api: ApiConfig {
                port: 9001,
                enable_manual_triggers: true,
            },
        }
    }

    pub fn development() -> Self {
        let mut config = Self::base(Environment::Development);
        // Nothing fires on its own locally; use the CLI or the trigger endpoint
        config.scheduler.enabled = false;
        config.materialize.retry_backoff_ms = 50;
        config
    }

    pub fn staging() -> Self {
        let mut config = Self::base(Environment::Staging);
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config
    }

    pub fn production() -> Self {
        let mut config = Self::base(Environment::Production);
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.materialize.max_attempts = 5;
        config.materialize.retry_backoff_ms = 500;
        config.materialize.concurrency = 16;
        config.notify.timeout_ms = 3000;
        config.api.enable_manual_triggers = false;
        config
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert!(!config.scheduler.enabled);
        assert!(config.api.enable_manual_triggers);
        assert_eq!(config.database.name, "campus_main");
        assert_eq!(config.scheduler.payroll_day, 1);
    }

    #[test]
    fn production_defaults() {
        let config = AppConfig::production();
        assert!(config.scheduler.enabled);
        assert!(!config.api.enable_manual_triggers);
        assert_eq!(config.materialize.max_attempts, 5);
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn utc_offset_falls_back_to_utc() {
        let mut sched = AppConfig::development().scheduler;
        sched.utc_offset_minutes = 330;
        assert_eq!(sched.utc_offset().local_minus_utc(), 330 * 60);
        sched.utc_offset_minutes = 24 * 60;
        assert_eq!(sched.utc_offset().local_minus_utc(), 0);
    }

    #[test]
    fn utc_offset_ignores_daylight_saving() {
        use chrono::TimeZone;

        let mut sched = AppConfig::development().scheduler;
        sched.utc_offset_minutes = 60;
        let offset = sched.utc_offset();
        let winter = offset.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let summer = offset.with_ymd_and_hms(2026, 7, 15, 0, 0, 0).unwrap();
        assert_eq!(winter.offset().fix(), summer.offset().fix());
        assert_eq!(summer.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn env_values_override_and_ignore_garbage() {
        std::env::set_var("CAMPUS_TEST_ENV_OR", "12");
        assert_eq!(env_or("CAMPUS_TEST_ENV_OR", 3u32), 12);
        std::env::set_var("CAMPUS_TEST_ENV_OR", "twelve");
        assert_eq!(env_or("CAMPUS_TEST_ENV_OR", 3u32), 3);
        assert_eq!(env_or("CAMPUS_TEST_ENV_OR_UNSET", true), true);

        std::env::set_var("CAMPUS_TEST_ENV_OPT", "");
        assert_eq!(env_opt("CAMPUS_TEST_ENV_OPT", Some("x".into())), None);
    }
}
