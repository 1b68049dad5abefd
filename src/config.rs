//! Unified configuration loading for EYWA MVC services.

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::info;

use crate::Result;

/// Wrapper for service configuration.
///
/// Automatically loads configuration from:
/// 1. `config/default.toml`
/// 2. `config/{env}.toml` (where {env} is RUN_MODE, defaults to "development")
/// 3. `config/local.toml`
/// 4. Environment variables (prefixed with `APP__`, nested with `__`)
/// 5. `.env` file
pub struct EywaConfig;

impl EywaConfig {
    /// Load configuration into a struct that implements `Deserialize`.
    pub fn load<T>() -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        dotenvy::dotenv().ok();

        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        info!("Loading configuration for environment: {}", run_mode);

        let settings = Config::builder()
            .add_source(File::new("config/default", FileFormat::Toml).required(false))
            .add_source(File::new(&format!("config/{}", run_mode), FileFormat::Toml).required(false))
            // Local overrides (gitignored)
            .add_source(File::new("config/local", FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("APP").prefix_separator("__").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load the framework settings.
    pub fn settings() -> Result<MvcSettings> {
        Self::load()
    }

    /// Parse settings from an inline TOML document.
    pub fn from_toml(document: &str) -> Result<MvcSettings> {
        let settings = Config::builder()
            .add_source(File::from_str(document, FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MvcSettings {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub http: HttpSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub enabled: bool,
    pub cookie_name: String,
    /// Idle time after which a stored session is dropped.
    pub ttl_secs: i64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cookie_name: "EYWA_SESSION".to_string(),
            ttl_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub max_body_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
