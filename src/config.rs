use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

use crate::error::ClarityError;

/// Currencies kept in the rate cache by default.
pub const DEFAULT_CURRENCIES: [&str; 19] = [
    "USD", "EUR", "GBP", "JPY", "CAD", "AUD", "CHF", "CNY", "HKD", "NZD", "SEK", "KRW", "SGD",
    "NOK", "MXN", "INR", "ZAR", "TRY", "BRL",
];

pub const DEFAULT_FX_URL: &str = "https://open.er-api.com/v6/latest/USD";

/// Runtime configuration.
///
/// Sources, later ones winning:
/// - built-in defaults
/// - bare `DATABASE_URL`, `DEMO_USER_ID`, `FX_REFRESH_API_KEY`
/// - any key prefixed with `CLARITY_` (e.g. `CLARITY_LISTEN_ADDR`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: String,
    pub loglevel: String,
    /// Caller used when a request carries no identity at all.
    pub demo_user_id: Option<String>,
    /// When set, `/api/exchange-rates/refresh` requires a matching `x-api-key`.
    pub fx_refresh_api_key: Option<String>,
    pub fx_url: Url,
    pub fx_currencies: Vec<String>,
    pub fx_timeout_secs: u64,
    /// Outbound calls to the FX provider allowed per minute.
    pub fx_upstream_per_minute: u32,
    /// Inbound refresh requests allowed per caller per window.
    pub refresh_rate_limit: usize,
    pub refresh_rate_window_secs: u64,
    pub import_body_limit: usize,
    pub seed_demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:clarity.db".to_string(),
            listen_addr: "0.0.0.0:8000".to_string(),
            loglevel: "info".to_string(),
            demo_user_id: None,
            fx_refresh_api_key: None,
            fx_url: Url::parse(DEFAULT_FX_URL).expect("default FX url is valid"),
            fx_currencies: DEFAULT_CURRENCIES.iter().map(|c| c.to_string()).collect(),
            fx_timeout_secs: 15,
            fx_upstream_per_minute: 30,
            refresh_rate_limit: 10,
            refresh_rate_window_secs: 60,
            import_body_limit: 2 * 1024 * 1024,
            seed_demo: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ClarityError> {
        let cfg = Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::raw().only(&["database_url", "demo_user_id", "fx_refresh_api_key"]))
            .merge(Env::prefixed("CLARITY_"))
            .extract()?;
        Ok(cfg)
    }

    pub fn refresh_rate_window(&self) -> Duration {
        Duration::from_secs(self.refresh_rate_window_secs)
    }

    pub fn fx_timeout(&self) -> Duration {
        Duration::from_secs(self.fx_timeout_secs)
    }
}

pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::load().expect("FATAL: invalid configuration"));
