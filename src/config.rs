//! Process configuration read from the environment.
//!
//! `.env` is loaded by `run()` through dotenvy before anything here is read.

use std::net::SocketAddr;

use crate::db::DbConfig;
use crate::logging::config::{LogConfig, LogLevel};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub log: LogConfig,
    /// Origins allowed by CORS. Empty means the local development defaults.
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub db: DbConfig,
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// `ALLOWED_ORIGINS` (comma-separated) wins over a single `FRONTEND_ORIGIN`.
fn parse_origins(allowed: Option<&str>, frontend: Option<&str>) -> Vec<String> {
    let origins: Vec<String> = allowed
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();

    if !origins.is_empty() {
        return origins;
    }

    frontend
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|o| vec![o.to_string()])
        .unwrap_or_default()
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = Environment::parse(&var("ENVIRONMENT").unwrap_or_default());

        let level = var("LOG_LEVEL")
            .and_then(|l| LogLevel::parse(&l))
            .unwrap_or(if environment.is_production() {
                LogLevel::Info
            } else {
                LogLevel::Debug
            });

        Self {
            host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            environment,
            log: LogConfig {
                level,
                directory: var("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
                json: environment.is_production(),
            },
            allowed_origins: parse_origins(
                var("ALLOWED_ORIGINS").as_deref(),
                var("FRONTEND_ORIGIN").as_deref(),
            ),
            max_body_bytes: var("MAX_BODY_BYTES")
                .and_then(|b| b.parse().ok())
                .filter(|&b| b > 0)
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
            db: DbConfig::default(),
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            environment: Environment::Development,
            log: LogConfig::default(),
            allowed_origins: Vec::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            db: DbConfig {
                url: None,
                ..DbConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse(" PROD "), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert_eq!(Environment::parse(""), Environment::Development);
    }

    #[test]
    fn test_allowed_origins_take_precedence() {
        let origins = parse_origins(
            Some("https://a.school.test, https://b.school.test,,"),
            Some("https://frontend.test"),
        );
        assert_eq!(origins, vec!["https://a.school.test", "https://b.school.test"]);
    }

    #[test]
    fn test_frontend_origin_fallback() {
        assert_eq!(
            parse_origins(Some(" , "), Some("https://frontend.test")),
            vec!["https://frontend.test"]
        );
        assert!(parse_origins(None, None).is_empty());
    }

    #[test]
    fn test_default_bind_addr() {
        let config = AppConfig::default();
        let addr = config.bind_addr().unwrap();
        assert_eq!(addr.port(), 3001);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn test_invalid_host_is_an_error() {
        let config = AppConfig {
            host: "not a host".to_string(),
            ..AppConfig::default()
        };
        assert!(config.bind_addr().is_err());
    }
}
