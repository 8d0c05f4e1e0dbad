//! # Settings
//!
//! Layered configuration: built-in defaults, then an optional
//! `cookbook.toml`, then `COOKBOOK__SECTION__KEY` environment variables.
//! A `.env` file is read into the environment first.

use std::time::Duration;

use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "COOKBOOK";
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// Without a URL the in-memory store is used.
    pub url: Option<SecretString>,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: Option<SecretString>,
    pub issuer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverSettings {
    pub fetch_timeout_ms: u64,
    pub display_cache_ttl_secs: u64,
}

impl ResolverSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn display_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.display_cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub json: bool,
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub resolver: ResolverSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Reads `.env`, `cookbook.toml` (if present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::load_from(Some("cookbook"), env_source())
    }

    /// `file` is a path without extension; a missing file is not an error.
    pub fn load_from(file: Option<&str>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080_i64)?
            .set_default("server.cors_origins", Vec::<String>::new())?
            .set_default("database.max_connections", 10_i64)?
            .set_default("auth.issuer", "cookbook-auth")?
            .set_default("resolver.fetch_timeout_ms", 2000_i64)?
            .set_default("resolver.display_cache_ttl_secs", 30_i64)?
            .set_default("log.json", false)?
            .set_default("log.filter", "info,cookbook=debug")?;
        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }
        let settings: Settings = builder.add_source(env).build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "must be non-zero"));
        }
        if self.resolver.fetch_timeout_ms == 0 {
            return Err(invalid("resolver.fetch_timeout_ms", "must be non-zero"));
        }
        if self.database.max_connections == 0 {
            return Err(invalid("database.max_connections", "must be non-zero"));
        }
        #[cfg(feature = "auth-jwt")]
        {
            let secret_len = self
                .auth
                .jwt_secret
                .as_ref()
                .map_or(0, |s| s.expose_secret().len());
            if secret_len < MIN_JWT_SECRET_LEN {
                return Err(invalid(
                    "auth.jwt_secret",
                    format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
                ));
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database.url.as_ref().map(|u| u.expose_secret())
    }
}

/// `COOKBOOK__SERVER__PORT=9000`, `COOKBOOK__SERVER__CORS_ORIGINS=a,b`.
pub fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("server.cors_origins")
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        env_source().source(Some(map))
    }

    const SECRET: (&str, &str) = ("COOKBOOK__AUTH__JWT_SECRET", "0123456789abcdef0123456789abcdef");

    #[test]
    fn defaults_apply() {
        let settings = Settings::load_from(None, env(&[SECRET])).unwrap();
        assert_eq!(settings.bind_addr(), "0.0.0.0:8080");
        assert_eq!(settings.resolver.fetch_timeout(), Duration::from_secs(2));
        assert!(settings.database_url().is_none());
        assert!(!settings.log.json);
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = Settings::load_from(
            None,
            env(&[
                SECRET,
                ("COOKBOOK__SERVER__PORT", "9000"),
                ("COOKBOOK__SERVER__CORS_ORIGINS", "http://a.test,http://b.test"),
                ("COOKBOOK__RESOLVER__FETCH_TIMEOUT_MS", "250"),
                ("COOKBOOK__LOG__JSON", "true"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.cors_origins, ["http://a.test", "http://b.test"]);
        assert_eq!(settings.resolver.fetch_timeout(), Duration::from_millis(250));
        assert!(settings.log.json);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let vars = env(&[SECRET, ("COOKBOOK__RESOLVER__FETCH_TIMEOUT_MS", "0")]);
        let err = Settings::load_from(None, vars).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "resolver.fetch_timeout_ms", .. }));
    }

    #[cfg(feature = "auth-jwt")]
    #[test]
    fn short_jwt_secret_is_rejected() {
        let vars = env(&[("COOKBOOK__AUTH__JWT_SECRET", "short")]);
        let err = Settings::load_from(None, vars).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "auth.jwt_secret", .. }));
    }
}
