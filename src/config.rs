use std::{env, str::FromStr};

use chrono::NaiveDate;

use crate::schedule;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SEED_TEACHERS: usize = 1000;
pub const DEFAULT_WEEK: &str = "2025-04-07";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeedConfig {
    pub teachers: usize,
    pub week_start: NaiveDate,
    /// Fixed RNG seed for a reproducible fixture; random when unset.
    pub rng_seed: Option<u64>,
    pub booked_ratio: f64,
    pub overbooking_ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    /// SQLite URL; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub seed: SeedConfig,
    /// Week the calendar opens on when the request does not name one.
    pub default_week: NaiveDate,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads settings through `lookup`, which returns `None` for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|value| value.trim().to_string()).filter(|v| !v.is_empty());

        let week_start = match get("SEED_WEEK_START") {
            Some(value) => parse_date("SEED_WEEK_START", value)?,
            None => default_week(),
        };
        let default_week = match get("CALENDAR_DEFAULT_WEEK") {
            Some(value) => parse_date("CALENDAR_DEFAULT_WEEK", value)?,
            None => week_start,
        };

        Ok(Self {
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
            database_url: get("DATABASE_URL"),
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), DEFAULT_MAX_CONNECTIONS)?,
            seed: SeedConfig {
                teachers: parse_or("SEED_TEACHERS", get("SEED_TEACHERS"), DEFAULT_SEED_TEACHERS)?,
                week_start,
                rng_seed: get("SEED_RNG").map(|value| parse("SEED_RNG", value)).transpose()?,
                booked_ratio: parse_ratio("SEED_BOOKED_RATIO", get("SEED_BOOKED_RATIO"), 0.2)?,
                overbooking_ratio: parse_ratio("SEED_OVERBOOKING_RATIO", get("SEED_OVERBOOKING_RATIO"), 0.3)?,
            },
            default_week: schedule::week_start_of(default_week),
        })
    }
}

fn default_week() -> NaiveDate {
    schedule::parse_date(DEFAULT_WEEK).unwrap_or_default()
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key,
        value,
        reason: "not a number",
    })
}

fn parse_or<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    value.map_or(Ok(default), |value| parse(key, value))
}

fn parse_ratio(key: &'static str, value: Option<String>, default: f64) -> Result<f64, ConfigError> {
    let ratio: f64 = parse_or(key, value, default)?;
    if (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: ratio.to_string(),
            reason: "must be between 0 and 1",
        })
    }
}

fn parse_date(key: &'static str, value: String) -> Result<NaiveDate, ConfigError> {
    schedule::parse_date(&value).ok_or(ConfigError::Invalid {
        key,
        value,
        reason: "expected YYYY-MM-DD",
    })
}
