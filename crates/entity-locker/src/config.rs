//! Locker configuration.
//!
//! Sources are layered with figment, later ones winning:
//!
//! 1. Field defaults (escalation disabled)
//! 2. A TOML file
//! 3. `ENTITY_LOCKER_*` environment variables
//!
//! ```toml
//! # locker.toml
//! escalation_threshold = 64
//! ```

use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, MIN_ESCALATION_THRESHOLD};

/// Prefix of environment variables read by [`LockerConfig::load`].
pub const ENV_PREFIX: &str = "ENTITY_LOCKER_";

/// Construction parameters for [`crate::EntityLocker`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerConfig {
    /// Outstanding per-key locks a thread may hold before its next new key
    /// is served by the global exclusive lock. `None` disables escalation.
    pub escalation_threshold: Option<usize>,
}

impl LockerConfig {
    /// Configuration escalating past `threshold` outstanding locks.
    #[must_use]
    pub const fn with_escalation_threshold(threshold: usize) -> Self {
        Self {
            escalation_threshold: Some(threshold),
        }
    }

    /// Loads configuration from defaults, `path` (if it exists) and the
    /// environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML string on top of the defaults.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Self = Figment::new()
            .merge(Toml::string(toml))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the escalation threshold lower bound.
    pub fn validate(&self) -> Result<()> {
        match self.escalation_threshold {
            Some(threshold) if threshold < MIN_ESCALATION_THRESHOLD => {
                Err(Error::InvalidThreshold {
                    threshold,
                    minimum: MIN_ESCALATION_THRESHOLD,
                })
            }
            _ => Ok(()),
        }
    }

    /// Effective threshold; disabled escalation maps to `usize::MAX`.
    #[must_use]
    pub fn effective_threshold(&self) -> usize {
        self.escalation_threshold.unwrap_or(usize::MAX)
    }
}
