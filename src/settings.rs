use std::env;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: PathBuf,
    pub usda_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl Settings {
    /// Defaults, then `meal_planner.toml` if present, then `MEALPLAN_*` env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Self::defaults()?
            .add_source(File::with_name("meal_planner").required(false))
            .add_source(Environment::with_prefix("MEALPLAN"));
        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.drop_empty_keys();

        // Unprefixed names used by older setups.
        if settings.usda_api_key.is_none() {
            settings.usda_api_key = env::var("USDA_API_KEY").ok().filter(|k| !k.is_empty());
        }
        if settings.google_api_key.is_none() {
            settings.google_api_key = env::var("GOOGLE_API_KEY").ok().filter(|k| !k.is_empty());
        }
        Ok(settings)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("db_path", "data/recipes.sqlite")?
            .set_default("http_timeout_secs", 20)?
            .set_default("user_agent", DEFAULT_USER_AGENT)
    }

    /// `KEY=""` counts as unset.
    fn drop_empty_keys(&mut self) {
        self.usda_api_key = self.usda_api_key.take().filter(|k| !k.is_empty());
        self.google_api_key = self.google_api_key.take().filter(|k| !k.is_empty());
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}
