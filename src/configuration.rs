use std::time::Duration;

use crate::error::ConfigError;

const MIN_SECRET_LENGTH: usize = 32;
/// Upper bound for any token lifetime: ten years
const MAX_TOKEN_AGE: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub session: SessionSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Session protocol settings
///
/// All ages are in seconds.
#[derive(serde::Deserialize, Clone)]
pub struct SessionSettings {
    /// `iss` claim, typically the service's own root URL
    pub issuer: String,
    /// Shared HMAC key
    pub secret: String,
    pub refresh_max_age: i64,
    pub session_max_age: i64,
    /// Renew the session token once less than this much lifetime remains
    pub session_early_refresh: i64,
    pub cookie_secure: bool,
    pub store_timeout_ms: u64,
    /// Most trackers kept in the last-known identity cache
    pub cache_capacity: u64,
}

// Keep the secret out of logs
impl std::fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSettings")
            .field("issuer", &self.issuer)
            .field("secret", &"<redacted>")
            .field("refresh_max_age", &self.refresh_max_age)
            .field("session_max_age", &self.session_max_age)
            .field("session_early_refresh", &self.session_early_refresh)
            .field("cookie_secure", &self.cookie_secure)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("cache_capacity", &self.cache_capacity)
            .finish()
    }
}

impl SessionSettings {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// How long a resolved identity may be served from cache
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.session_max_age.max(0) as u64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::MissingRequired("session.issuer".to_string()));
        }
        if self.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "session.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if self.session_max_age <= 0 {
            return Err(ConfigError::InvalidValue(
                "session.session_max_age must be positive".to_string(),
            ));
        }
        if self.session_early_refresh < 0 || self.session_early_refresh >= self.session_max_age {
            return Err(ConfigError::InvalidValue(
                "session.session_early_refresh must be in [0, session_max_age)".to_string(),
            ));
        }
        if self.refresh_max_age > MAX_TOKEN_AGE {
            return Err(ConfigError::InvalidValue(format!(
                "session.refresh_max_age must not exceed {} seconds",
                MAX_TOKEN_AGE
            )));
        }
        if self.refresh_max_age < self.session_max_age {
            return Err(ConfigError::InvalidValue(
                "session.refresh_max_age must not be shorter than session_max_age".to_string(),
            ));
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "session.store_timeout_ms must be positive".to_string(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "session.cache_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
    builder
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8000)?
        .set_default("session.issuer", "http://localhost:8000")?
        .set_default("session.refresh_max_age", 365 * 24 * 60 * 60)?
        .set_default("session.session_max_age", 60 * 60)?
        .set_default("session.session_early_refresh", 10 * 60)?
        .set_default("session.cookie_secure", false)?
        .set_default("session.store_timeout_ms", 2000)?
        .set_default("session.cache_capacity", 10_000)
}

fn finish(settings: config::Config) -> Result<Settings, ConfigError> {
    let settings = settings.try_deserialize::<Settings>()?;
    settings.session.validate()?;
    Ok(settings)
}

/// Load settings from defaults, an optional `configuration` file and
/// `APP_`-prefixed environment variables (`APP_SESSION__SECRET=...`)
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = with_defaults(config::Config::builder())?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    finish(settings)
}

/// Load settings from defaults overlaid with an inline YAML document
pub fn configuration_from_yaml(yaml: &str) -> Result<Settings, ConfigError> {
    let settings = with_defaults(config::Config::builder())?
        .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
        .build()?;
    finish(settings)
}
