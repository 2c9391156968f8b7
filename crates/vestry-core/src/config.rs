use anyhow::Result;
use config::{Config, ConfigBuilder, builder::DefaultState};
use serde::Deserialize;

use crate::constants::{
    DEFAULT_HORIZON_MONTHS, DEFAULT_MFA_ISSUER, DEFAULT_TOTP_WINDOW, MAX_TOTP_WINDOW,
};
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub mfa: MfaConfig,
    pub scheduling: SchedulingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MfaConfig {
    /// Issuer label shown by authenticator apps.
    pub issuer: String,
    /// Number of 30-second steps accepted on either side of the current one.
    pub valid_window: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    /// Calendar months (current month included) materialized by the upcoming batch.
    pub horizon_months: u8,
}

impl Settings {
    /// ## Summary
    /// Returns a configuration builder with every default applied and no sources attached.
    ///
    /// ## Errors
    /// Returns an error if a default value cannot be registered.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder()
            .set_default("database.max_connections", 4)?
            .set_default("logging.level", "debug")?
            .set_default("mfa.issuer", DEFAULT_MFA_ISSUER)?
            .set_default("mfa.valid_window", DEFAULT_TOTP_WINDOW)?
            .set_default("scheduling.horizon_months", DEFAULT_HORIZON_MONTHS)?)
    }

    /// ## Summary
    /// Loads configuration from `.env` file and environment variables into a `Settings`.
    /// Environment variables take precedence over `.env` file values.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it fails.
    pub fn load() -> Result<Self> {
        Ok(Self::defaults()?
            // Env file
            .add_source(
                config::Environment::default()
                    .convert_case(config::Case::Snake)
                    .separator("_")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            // TOML file
            .add_source(config::File::with_name("config.toml").required(false))
            .build()?
            .try_deserialize::<Settings>()?)
    }

    /// ## Summary
    /// Rejects settings that would make generation or verification meaningless.
    ///
    /// ## Errors
    /// Returns `CoreError::ConfigError` naming the offending key.
    pub fn validate(&self) -> CoreResult<()> {
        if self.database.max_connections == 0 {
            return Err(CoreError::ConfigError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.scheduling.horizon_months == 0 {
            return Err(CoreError::ConfigError(
                "scheduling.horizon_months must be at least 1".to_string(),
            ));
        }
        if self.mfa.issuer.trim().is_empty() {
            return Err(CoreError::ConfigError("mfa.issuer must not be empty".to_string()));
        }
        if self.mfa.valid_window > MAX_TOTP_WINDOW {
            return Err(CoreError::ConfigError(format!(
                "mfa.valid_window must be at most {MAX_TOTP_WINDOW}"
            )));
        }
        Ok(())
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(error = %e, "No .env file loaded");
    }

    let settings = Settings::load()?;
    settings.validate()?;
    Ok(settings)
}
