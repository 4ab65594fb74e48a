//! Caller-owned chain configuration.
//!
//! There is no process-wide default: every chain operation takes the
//! configuration it should run with.
use crate::error::{Error, Result};
use crate::pow::Difficulty;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Environment variable holding the difficulty.
pub const DIFFICULTY_ENV: &str = "HASHCHAIN_DIFFICULTY";
/// Environment variable holding the worker count.
pub const WORKERS_ENV: &str = "HASHCHAIN_WORKERS";

fn default_workers() -> usize {
    1
}

#[derive(Builder, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[builder(pattern = "owned")]
pub struct ChainConfig {
    /// Required leading-zero bits, in `[1, 255]`.
    pub difficulty: u32,
    /// Search threads per solve; `1` searches on the calling thread.
    #[builder(default = "default_workers()")]
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl ChainConfig {
    pub fn new(difficulty: u32, workers: usize) -> Result<Self> {
        let config = Self {
            difficulty,
            workers,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        Difficulty::new(self.difficulty)?;
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be >= 1".into()));
        }
        Ok(())
    }

    /// The validated difficulty.
    pub fn target_difficulty(&self) -> Result<Difficulty> {
        Difficulty::new(self.difficulty)
    }

    /// Read `HASHCHAIN_DIFFICULTY` (required) and `HASHCHAIN_WORKERS`
    /// (optional, default 1).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let difficulty = lookup(DIFFICULTY_ENV)
            .ok_or_else(|| Error::InvalidConfig(format!("{DIFFICULTY_ENV} is not set")))?;
        let difficulty = parse_var::<u32>(DIFFICULTY_ENV, &difficulty)?;
        let workers = match lookup(WORKERS_ENV) {
            Some(raw) => parse_var::<usize>(WORKERS_ENV, &raw)?,
            None => default_workers(),
        };
        Self::new(difficulty, workers)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| Error::InvalidConfig(format!("{key} is not a valid number: {raw:?}")))
}

impl ChainConfigBuilder {
    fn validate(&self) -> Result<()> {
        match self.difficulty {
            Some(d) => {
                Difficulty::new(d)?;
            }
            None => return Err(Error::InvalidConfig("difficulty must be provided".into())),
        }
        if self.workers == Some(0) {
            return Err(Error::InvalidConfig("workers must be >= 1".into()));
        }
        Ok(())
    }

    pub fn build_validated(self) -> Result<ChainConfig> {
        self.validate()?;
        self.build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}
