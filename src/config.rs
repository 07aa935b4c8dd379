//! Runtime configuration
//!
//! Layers, lowest to highest precedence: field defaults, an optional TOML file
//! (`moodbot.toml` or `--config`), then `MOODBOT_*` environment variables.
//! Credentials never live in the file; they are read from the process environment.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BotError;
use crate::models::PriceObservation;
use crate::Result;

pub const DEFAULT_CONFIG_FILE: &str = "moodbot";
pub const ENV_PREFIX: &str = "MOODBOT";
pub const DEFAULT_ALPACA_BASE_URL: &str = "https://paper-api.alpaca.markets";
pub const DEFAULT_SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

/// Tick cadence presets
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TickMode {
    /// 10 second ticks (testing against a paper account)
    Fast,
    /// 60 second ticks
    #[default]
    Standard,
    /// 240 second ticks
    Patient,
}

impl TickMode {
    pub fn interval(self) -> Duration {
        match self {
            TickMode::Fast => Duration::from_secs(10),
            TickMode::Standard => Duration::from_secs(60),
            TickMode::Patient => Duration::from_secs(240),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_order_quantity")]
    pub order_quantity: i64,
    #[serde(default)]
    pub mode: TickMode,
    /// Overrides the mode's interval when set
    #[serde(default)]
    pub tick_interval_secs: Option<u64>,
    #[serde(default = "default_closed_backoff_secs")]
    pub closed_backoff_secs: u64,
    #[serde(default = "default_closing_window_mins")]
    pub closing_window_mins: u64,
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_observations")]
    pub observations: Vec<PriceObservation>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            order_quantity: default_order_quantity(),
            mode: TickMode::default(),
            tick_interval_secs: None,
            closed_backoff_secs: default_closed_backoff_secs(),
            closing_window_mins: default_closing_window_mins(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
            search_limit: default_search_limit(),
            observations: default_observations(),
        }
    }
}

fn default_symbol() -> String {
    "AAPL".to_string()
}

fn default_order_quantity() -> i64 {
    1
}

fn default_closed_backoff_secs() -> u64 {
    300
}

fn default_closing_window_mins() -> u64 {
    20
}

fn default_gateway_timeout_secs() -> u64 {
    15
}

fn default_search_limit() -> usize {
    crate::content::DEFAULT_SEARCH_LIMIT
}

fn default_observations() -> Vec<PriceObservation> {
    vec![
        PriceObservation::new("AAPL", Decimal::new(15, 1)),
        PriceObservation::new("GOOGL", Decimal::new(-5, 1)),
        PriceObservation::new("TSLA", Decimal::new(20, 1)),
    ]
}

impl Settings {
    /// Load settings from `path` (or `moodbot.toml` if present) plus `MOODBOT_*` env vars
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |reason: &str| Err(BotError::StartupFailure(reason.to_string()));

        if self.symbol.trim().is_empty() {
            return fail("symbol must not be empty");
        }
        if self.order_quantity <= 0 {
            return fail("order_quantity must be positive");
        }
        if self.tick_interval().is_zero() {
            return fail("tick interval must be positive");
        }
        if self.gateway_timeout_secs == 0 {
            return fail("gateway_timeout_secs must be positive");
        }
        if !(1..=50).contains(&self.search_limit) {
            return fail("search_limit must be between 1 and 50");
        }
        if self.observations.is_empty() {
            return fail("at least one price observation is required");
        }

        if self.closed_backoff() < self.tick_interval() {
            tracing::warn!(
                "Closed-market backoff ({:?}) is shorter than the trading tick ({:?})",
                self.closed_backoff(),
                self.tick_interval()
            );
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.mode.interval())
    }

    pub fn closed_backoff(&self) -> Duration {
        Duration::from_secs(self.closed_backoff_secs)
    }

    pub fn closing_window(&self) -> Duration {
        Duration::from_secs(self.closing_window_mins * 60)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Result<String> {
    keys.iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.trim().is_empty())
        .ok_or_else(|| BotError::StartupFailure(format!("{} not found in environment", keys[0])))
}

/// Broker API keys
#[derive(Clone)]
pub struct AlpacaCredentials {
    pub key_id: String,
    pub secret_key: String,
    pub base_url: String,
}

impl AlpacaCredentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            key_id: required(&lookup, &["ALPACA_API_KEY_ID", "APCA_API_KEY_ID"])?,
            secret_key: required(&lookup, &["ALPACA_API_SECRET_KEY", "APCA_API_SECRET_KEY"])?,
            base_url: lookup("ALPACA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ALPACA_BASE_URL.to_string()),
        })
    }
}

impl fmt::Debug for AlpacaCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlpacaCredentials")
            .field("key_id", &self.key_id)
            .field("secret_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Already-issued content API bearer token
#[derive(Clone)]
pub struct SpotifyCredentials {
    pub access_token: String,
    pub api_base: String,
}

impl SpotifyCredentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            access_token: required(&lookup, &["SPOTIFY_ACCESS_TOKEN"])?,
            api_base: lookup("SPOTIFY_API_BASE")
                .unwrap_or_else(|| DEFAULT_SPOTIFY_API_BASE.to_string()),
        })
    }
}

impl fmt::Debug for SpotifyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpotifyCredentials")
            .field("access_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}
