//! Server configuration shared by every service.

use std::str::FromStr;
use std::time::Duration;

/// Default upload limit (25 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 25 * 1024 * 1024;

/// Default health probe timeout in seconds.
pub const DEFAULT_HEALTH_PROBE_TIMEOUT_SECS: u64 = 30;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Whether `/metrics` is served
    pub metrics_enabled: bool,
    /// Upper bound on a health-check inference
    pub health_probe_timeout: Duration,
}

impl ServerConfig {
    /// Defaults for a service listening on `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port,
            cors_origins: vec!["*".to_string()],
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            environment: "development".to_string(),
            metrics_enabled: true,
            health_probe_timeout: Duration::from_secs(DEFAULT_HEALTH_PROBE_TIMEOUT_SECS),
        }
    }

    /// Create config from environment variables, falling back to `default_port`.
    pub fn from_env(default_port: u16) -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", default_port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| vec!["*".to_string()]),
            max_body_size: env_or("MAX_BODY_SIZE", DEFAULT_MAX_BODY_SIZE),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            health_probe_timeout: Duration::from_secs(env_or(
                "HEALTH_PROBE_TIMEOUT_SECS",
                DEFAULT_HEALTH_PROBE_TIMEOUT_SECS,
            )),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read and parse an environment variable, using `default` when it is unset
/// or does not parse.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::with_port(5001);
        assert_eq!(config.bind_addr(), "0.0.0.0:5001");
        assert_eq!(config.max_body_size, 25 * 1024 * 1024);
        assert!(!config.is_production());
    }

    #[test]
    fn test_env_or_falls_back() {
        assert_eq!(env_or("MLSVC_TEST_UNSET_VARIABLE", 42u16), 42);
    }
}
