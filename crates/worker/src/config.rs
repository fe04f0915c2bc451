//! Worker configuration loaded from environment variables.

use delivery::OutboxOptions;

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; the in-memory store is used when unset
/// - `OUTBOX_*`: see [`OutboxOptions`]
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub outbox: OutboxOptions,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LOG_LEVEL: &str = "info";

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: lookup("PORT")
                .and_then(|port| port.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            outbox: OutboxOptions::from_lookup(&lookup),
        }
    }

    /// Returns the `"host:port"` bind address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns true if the worker should run against PostgreSQL.
    pub fn uses_postgres(&self) -> bool {
        self.database_url.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults_without_environment() {
        let config = Config::default();
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.log_level, "info");
        assert!(!config.uses_postgres());
        assert_eq!(config.outbox, OutboxOptions::default());
    }

    #[test]
    fn test_reads_server_and_outbox_variables() {
        let config = Config::from_lookup(|key| match key {
            "HOST" => Some("127.0.0.1".to_string()),
            "PORT" => Some("8080".to_string()),
            "DATABASE_URL" => Some("postgres://localhost/outbox".to_string()),
            "OUTBOX_BATCH_SIZE" => Some("10".to_string()),
            "OUTBOX_POLLING_INTERVAL_MS" => Some("500".to_string()),
            _ => None,
        });

        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert!(config.uses_postgres());
        assert_eq!(config.outbox.batch_size, 10);
        assert_eq!(config.outbox.polling_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_blank_database_url_means_in_memory() {
        let config = Config::from_lookup(|key| (key == "DATABASE_URL").then(|| "  ".to_string()));
        assert!(!config.uses_postgres());
    }

    #[test]
    fn test_unparseable_port_falls_back() {
        let config = Config::from_lookup(|key| (key == "PORT").then(|| "http".to_string()));
        assert_eq!(config.port, 3000);
    }
}
