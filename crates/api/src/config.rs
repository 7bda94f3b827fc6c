//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use reservation::SmtpConfig;
use reservation::notification::DEFAULT_QUEUE_CAPACITY;
use slot_store::DEFAULT_LOCK_TIMEOUT;
use thiserror::Error;

/// Invalid configuration detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DATABASE_URL must start with postgres:// or postgresql://, got {0}")]
    UnsupportedDatabase(String),

    #[error("MAIL_FROM is required when MAIL_SERVER is set")]
    MissingSender,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL connection string; unset keeps everything in memory
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `LOCK_TIMEOUT_MS` — how long a reservation waits for its slot (default: `5000`)
/// - `RESERVE_MAX_ATTEMPTS` — attempts per reservation under contention (default: `5`)
/// - `NOTIFY_QUEUE_CAPACITY` — pending notifications before new ones are dropped (default: `1024`)
/// - `MAIL_SERVER`, `MAIL_PORT` (default: `587`), `MAIL_USERNAME`, `MAIL_PASSWORD`,
///   `MAIL_FROM` — SMTP delivery; without `MAIL_SERVER` notifications are only logged
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub lock_timeout: Duration,
    pub reserve_max_attempts: u32,
    pub notify_queue_capacity: usize,
    pub mail: Option<MailConfig>,
}

/// SMTP settings, present only when `MAIL_SERVER` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_var(&var, "PORT").unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: var("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_var(&var, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            lock_timeout: parse_var(&var, "LOCK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_timeout),
            reserve_max_attempts: parse_var(&var, "RESERVE_MAX_ATTEMPTS")
                .unwrap_or(defaults.reserve_max_attempts),
            notify_queue_capacity: parse_var(&var, "NOTIFY_QUEUE_CAPACITY")
                .unwrap_or(defaults.notify_queue_capacity),
            mail: var("MAIL_SERVER")
                .filter(|server| !server.trim().is_empty())
                .map(|server| MailConfig {
                    server,
                    port: parse_var(&var, "MAIL_PORT").unwrap_or(587),
                    username: var("MAIL_USERNAME"),
                    password: var("MAIL_PASSWORD"),
                    from: var("MAIL_FROM").or_else(|| var("MAIL_USERNAME")),
                }),
        }
    }

    /// Checks settings that can't be given a sensible default.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.database_url
            && !(url.starts_with("postgres://") || url.starts_with("postgresql://"))
        {
            return Err(ConfigError::UnsupportedDatabase(url.clone()));
        }
        if let Some(mail) = &self.mail
            && mail.from.is_none()
        {
            return Err(ConfigError::MissingSender);
        }
        Ok(())
    }

    /// SMTP settings for the notification sink, if mail delivery is configured.
    pub fn smtp(&self) -> Option<SmtpConfig> {
        let mail = self.mail.as_ref()?;
        Some(SmtpConfig {
            server: mail.server.clone(),
            port: mail.port,
            username: mail.username.clone(),
            password: mail.password.clone(),
            from: mail.from.clone()?,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    var(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            reserve_max_attempts: reservation::DEFAULT_MAX_ATTEMPTS,
            notify_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            mail: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert_eq!(config.reserve_max_attempts, 5);
        assert_eq!(config.notify_queue_capacity, 1024);
        assert!(config.mail.is_none());
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert!(config.validate().is_ok());
        assert!(config.smtp().is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/bookings"),
            ("LOCK_TIMEOUT_MS", "250"),
            ("RESERVE_MAX_ATTEMPTS", "8"),
            ("NOTIFY_QUEUE_CAPACITY", "16"),
        ]));
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/bookings")
        );
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.reserve_max_attempts, 8);
        assert_eq!(config.notify_queue_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = Config::from_lookup(lookup(&[("PORT", "http"), ("LOCK_TIMEOUT_MS", "-1")]));
        assert_eq!(config.port, 3000);
        assert_eq!(config.lock_timeout, DEFAULT_LOCK_TIMEOUT);
    }

    #[test]
    fn test_rejects_other_databases() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "sqlite://bookings.db")]));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedDatabase(_))
        ));
    }

    #[test]
    fn test_mail_settings() {
        let config = Config::from_lookup(lookup(&[
            ("MAIL_SERVER", "smtp.example.com"),
            ("MAIL_USERNAME", "bookings@example.com"),
            ("MAIL_PASSWORD", "secret"),
        ]));
        let smtp = config.smtp().unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.from, "bookings@example.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mail_needs_sender() {
        let config = Config::from_lookup(lookup(&[("MAIL_SERVER", "smtp.example.com")]));
        assert!(matches!(config.validate(), Err(ConfigError::MissingSender)));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
