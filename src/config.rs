//! Runtime configuration.
//!
//! Everything is read from environment variables so the binary can be
//! configured without a config file:
//!
//! | variable                    | default          |
//! |-----------------------------|------------------|
//! | `COMMISSION_BIND_ADDR`      | `127.0.0.1:3000` |
//! | `COMMISSION_TIER_STEP`      | `10000`          |
//! | `COMMISSION_TIER_INCREMENT` | `1`              |
//! | `COMMISSION_TIER_MAX`       | unset (no cap)   |
//! | `COMMISSION_LOG`            | `info`           |

use crate::error::ConfigError;
use crate::rate::SteppedTiers;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub bind_addr: String,
    pub tiers: SteppedTiers,
    /// Default tracing filter, used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            tiers: SteppedTiers::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let step = parse_or(&lookup, "COMMISSION_TIER_STEP", defaults.tiers.step)?;
        if !step.is_finite() || step <= 0.0 {
            return Err(invalid("COMMISSION_TIER_STEP", step));
        }
        let increment = parse_or(&lookup, "COMMISSION_TIER_INCREMENT", defaults.tiers.increment)?;
        if !increment.is_finite() || increment < 0.0 {
            return Err(invalid("COMMISSION_TIER_INCREMENT", increment));
        }
        let tiers = SteppedTiers {
            step,
            increment,
            max_tiers: parse_opt(&lookup, "COMMISSION_TIER_MAX")?,
        };
        Ok(Self {
            bind_addr: lookup("COMMISSION_BIND_ADDR").unwrap_or(defaults.bind_addr),
            tiers,
            log_filter: lookup("COMMISSION_LOG").unwrap_or(defaults.log_filter),
        })
    }
}

fn invalid(var: &str, value: f64) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
    }
}

fn parse_opt<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

fn parse_or<T, F>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(lookup, var)?.unwrap_or(default))
}
