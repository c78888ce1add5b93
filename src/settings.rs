use chrono_tz::Tz;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use url::Url;

/// Largest accepted margin around the requested day, in days.
pub const MAX_WINDOW_DAYS: u32 = 366;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub api_base_url: Url,
    pub gym_id: String,
    /// Bearer token for the schedule backend.
    pub access_token: Option<String>,
    /// Token guarding the local API.
    pub auth_token: String,
    pub timezone: String,
    pub window_days_before: u32,
    pub window_days_after: u32,
    pub calendar_name: String,
    pub debug: bool,
    pub enable_swagger: bool,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // APP_GYM_ID, APP_ACCESS_TOKEN, ...
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("api_base_url", "http://localhost:8000")?
            .set_default("gym_id", "1")?
            .set_default("auth_token", "default-token-change-me")?
            .set_default("timezone", "Europe/Warsaw")?
            .set_default("window_days_before", 3)?
            .set_default("window_days_after", 7)?
            .set_default("calendar_name", "My gym classes")?
            .set_default("debug", false)?
            .set_default("enable_swagger", true)?
            .set_default("port", 8080)?
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.tz()?;
        settings.check_window()?;
        Ok(settings)
    }

    fn check_window(&self) -> Result<(), ConfigError> {
        for (key, days) in [
            ("window_days_before", self.window_days_before),
            ("window_days_after", self.window_days_after),
        ] {
            if days > MAX_WINDOW_DAYS {
                return Err(ConfigError::Message(format!(
                    "{key} must be at most {MAX_WINDOW_DAYS}, got {days}"
                )));
            }
        }
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|err| ConfigError::Message(format!("invalid timezone '{}': {err}", self.timezone)))
    }
}
