use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "AllerCare";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
/// One year.
pub const MAX_TOKEN_TTL_HOURS: i64 = 8760;
const MIN_SECRET_LEN: usize = 16;

/// Default log filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "allercare=info,allercare_lib=info,tower_http=info"
}

/// Get the application data directory: `<platform data dir>/AllerCare/`.
/// Falls back to the working directory when the platform has none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn default_database_path() -> PathBuf {
    app_data_dir().join("allercare.db")
}

pub fn default_uploads_dir() -> PathBuf {
    app_data_dir().join("uploads")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set")]
    MissingSecret,
    #[error("JWT_SECRET must be at least {MIN_SECRET_LEN} bytes")]
    WeakSecret,
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub jwt_secret: String,
    pub bind_addr: IpAddr,
    pub port: u16,
    pub token_ttl_hours: i64,
}

impl ServerConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret)?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }

        let port = parse_or("PORT", lookup("PORT"), DEFAULT_PORT)?;
        let bind_addr = parse_or(
            "BIND_ADDR",
            lookup("BIND_ADDR"),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        )?;
        let token_ttl_hours = parse_or(
            "TOKEN_TTL_HOURS",
            lookup("TOKEN_TTL_HOURS"),
            DEFAULT_TOKEN_TTL_HOURS,
        )?;
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours) {
            return Err(ConfigError::Invalid {
                name: "TOKEN_TTL_HOURS",
                value: token_ttl_hours.to_string(),
            });
        }

        Ok(Self {
            database_path: lookup("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_database_path),
            uploads_dir: lookup("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_uploads_dir),
            jwt_secret,
            bind_addr,
            port,
            token_ttl_hours,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.uploads_dir.join("reports")
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_applied_when_only_secret_set() {
        let cfg = ServerConfig::from_lookup(lookup(&[("JWT_SECRET", "0123456789abcdef")])).unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.token_ttl_hours, DEFAULT_TOKEN_TTL_HOURS);
        assert!(cfg.database_path.ends_with("allercare.db"));
        assert!(cfg.reports_dir().ends_with("uploads/reports"));
    }

    #[test]
    fn missing_secret_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "8080")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingSecret);
    }

    #[test]
    fn short_secret_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("JWT_SECRET", "short")])).unwrap_err();
        assert_eq!(err, ConfigError::WeakSecret);
    }

    #[test]
    fn explicit_values_parsed() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "0123456789abcdef"),
            ("PORT", "8080"),
            ("BIND_ADDR", "127.0.0.1"),
            ("DATABASE_PATH", "/tmp/clinic.db"),
            ("TOKEN_TTL_HOURS", "2"),
        ]))
        .unwrap();
        assert_eq!(cfg.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(cfg.database_path, PathBuf::from("/tmp/clinic.db"));
        assert_eq!(cfg.token_ttl_hours, 2);
    }

    #[test]
    fn bad_port_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "0123456789abcdef"),
            ("PORT", "http"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn token_ttl_bounded() {
        for bad in ["0", "-5", "8761", "9223372036854775807"] {
            let err = ServerConfig::from_lookup(lookup(&[
                ("JWT_SECRET", "0123456789abcdef"),
                ("TOKEN_TTL_HOURS", bad),
            ]))
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { name: "TOKEN_TTL_HOURS", .. }));
        }
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "0123456789abcdef"),
            ("TOKEN_TTL_HOURS", "8760"),
        ]))
        .unwrap();
        assert_eq!(cfg.token_ttl_hours, MAX_TOKEN_TTL_HOURS);
    }

    #[test]
    fn app_name_is_allercare() {
        assert_eq!(APP_NAME, "AllerCare");
    }
}
