//! External output estimate.
//!
//! An OpenAI-compatible chat-completions endpoint is asked for a single kW
//! figure given the weather, capacity and a few recent readings.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::debug;

use crate::config::PredictorConfig;
use crate::domain::{HistoricalObservation, WeatherSnapshot};

/// Number of recent readings included in a request.
pub const HISTORY_IN_PROMPT: usize = 5;

#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Estimated output in kW.
    async fn estimate_kw(&self, request: &InferenceRequest) -> Result<f64>;
}

#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    pub weather: WeatherSnapshot,
    pub capacity_kw: f64,
    /// Most recent first.
    pub history: Vec<HistoricalObservation>,
}

impl InferenceRequest {
    /// `history` is most recent first; only the newest few are kept.
    pub fn new(weather: WeatherSnapshot, capacity_kw: f64, history: &[HistoricalObservation]) -> Self {
        Self {
            weather,
            capacity_kw,
            history: history.iter().take(HISTORY_IN_PROMPT).copied().collect(),
        }
    }

    pub fn prompt(&self) -> String {
        let w = &self.weather;
        let radiation = w
            .solar_irradiance_wm2
            .map(|r| format!("{r}"))
            .unwrap_or_else(|| "estimated".to_string());

        let mut prompt = format!(
            "You are an expert solar power prediction model. Based on the following weather \
             conditions and solar panel capacity, predict the power output in kW.\n\n\
             Weather Conditions:\n\
             - Temperature: {}°C\n\
             - Humidity: {}%\n\
             - Cloud Cover: {}%\n\
             - Wind Speed: {} m/s\n\
             - UV Index: {}\n\
             - Visibility: {} km\n\
             - Solar Radiation: {} W/m²\n\n\
             Solar Panel Capacity: {} kW\n",
            w.temperature_c,
            w.humidity_percent,
            w.cloud_cover_percent,
            w.wind_speed_ms,
            w.uv_index,
            w.visibility_km,
            radiation,
            self.capacity_kw,
        );

        if !self.history.is_empty() {
            prompt.push_str("\nRecent observations (most recent first):\n");
            for (i, obs) in self.history.iter().enumerate() {
                let weather = serde_json::to_string(&obs.weather).unwrap_or_default();
                let _ = writeln!(prompt, "{}. Weather: {} -> Actual Output: {} kW", i + 1, weather, obs.actual_kw);
            }
        }

        prompt.push_str(
            "\nConsider these factors:\n\
             1. Optimal panel temperature is around 25°C, efficiency drops ~0.4% per degree above\n\
             2. Cloud cover directly reduces solar irradiance\n\
             3. High humidity can reduce efficiency\n\
             4. Wind helps cool panels, improving efficiency\n\
             5. UV index correlates with solar energy potential\n\n\
             Respond with ONLY a number representing the predicted power output in kW. No explanation needed.\n",
        );
        prompt
    }
}

/// Reads the leading kW figure out of a model reply, so `"512 kW"` gives 512.
/// Replies that do not start with a number count as 0.
pub fn parse_estimate(content: &str) -> f64 {
    let text = content.trim_start();
    let end = numeric_prefix_len(text.as_bytes());
    text[..end]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Length of the longest `[+-]digits[.digits][e[+-]digits]` prefix.
fn numeric_prefix_len(bytes: &[u8]) -> usize {
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_end = digits_from(i);
    let mut end = int_end;
    let mut has_digits = int_end > i;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if frac_end > end + 1 || has_digits {
            has_digits |= frac_end > end + 1;
            end = frac_end;
        }
    }
    if !has_digits {
        return 0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut j = end + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_end = digits_from(j);
        if exp_end > j {
            end = exp_end;
        }
    }
    end
}

/// Chat-completions client.
pub struct ChatCompletionsClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl ChatCompletionsClient {
    pub fn new(cfg: &PredictorConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout() + Duration::from_secs(1))
            .build()
            .context("failed to build inference HTTP client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
            api_key,
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[async_trait]
impl InferenceProvider for ChatCompletionsClient {
    async fn estimate_kw(&self, request: &InferenceRequest) -> Result<f64> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(request.prompt()),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("inference request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("inference API error: {}", response.status());
        }

        let reply: ChatResponse = response
            .json()
            .await
            .context("failed to parse inference response")?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let estimate = parse_estimate(&content);
        debug!(estimate_kw = estimate, "external estimate received");
        Ok(estimate)
    }
}
