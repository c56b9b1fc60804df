use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The pivot currency; every stored rate is expressed as units per 1 USD.
pub const PIVOT_CURRENCY: &str = "USD";

/// ISO-4217 style code: exactly three uppercase ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Trim, upper-case and validate a raw code.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let code = raw.trim().to_ascii_uppercase();
        if code.chars().count() != 3 {
            return Err("Currency must be exactly 3 characters".to_string());
        }
        if !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err("Currency must contain only letters".to_string());
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cached FX rate row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub currency_code: String,
    pub rate_to_usd: Decimal,
    pub last_updated: DateTime<Utc>,
}

/// Currency code -> units per 1 USD, always containing USD = 1.
///
/// Built per request from the stored rates. Non-positive rates are dropped
/// so lookups only ever yield usable divisors.
#[derive(Debug, Clone, PartialEq)]
pub struct RateMap {
    rates: HashMap<String, Decimal>,
}

impl Default for RateMap {
    fn default() -> Self {
        let mut rates = HashMap::new();
        rates.insert(PIVOT_CURRENCY.to_string(), Decimal::ONE);
        Self { rates }
    }
}

impl RateMap {
    pub fn from_rates<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a ExchangeRate>,
    {
        rows.into_iter()
            .map(|r| (r.currency_code.as_str(), r.rate_to_usd))
            .collect()
    }

    pub fn insert(&mut self, code: impl Into<String>, rate: Decimal) {
        if rate > Decimal::ZERO {
            self.rates.insert(code.into(), rate);
        }
    }

    pub fn get(&self, code: &str) -> Option<Decimal> {
        self.rates.get(code).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, Decimal)> for RateMap {
    fn from_iter<T: IntoIterator<Item = (&'a str, Decimal)>>(iter: T) -> Self {
        let mut map = RateMap::default();
        for (code, rate) in iter {
            map.insert(code, rate);
        }
        map
    }
}
