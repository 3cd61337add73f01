use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub weather: WeatherConfig,
    pub predictor: PredictorConfig,
    pub analysis: AnalysisConfig,
    pub db: DbConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            enable_cors: false,
            request_timeout_secs: 60,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig { pub token: String }

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    /// OpenWeatherMap key. Without one every lookup degrades to "unavailable".
    pub api_key: Option<String>,
    pub http_timeout_seconds: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openweathermap.org".to_string(),
            api_key: None,
            http_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4".to_string(),
            timeout_seconds: 5,
            max_tokens: 50,
            temperature: 0.1,
        }
    }
}

impl PredictorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Background batch cadence; 0 leaves analysis on-demand only.
    pub interval_minutes: u64,
    pub history_limit: usize,
    pub max_concurrency: usize,
    /// Offset of the fleet's local time from UTC, used for the solar hour.
    pub utc_offset_minutes: i32,
    pub seed_buildings: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 0,
            history_limit: 50,
            max_concurrency: 1,
            utc_offset_minutes: 330,
            seed_buildings: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DbConfig { pub url: String }

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("SOLAR__").split("__"));
        Ok(figment.extract()?)
    }
}
