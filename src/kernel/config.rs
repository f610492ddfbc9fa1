use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::SchedulingAlgorithm;

pub const DEFAULT_MEMORY_SIZE: usize = 60;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_MLFQ_QUANTA: [usize; MLFQ_LEVELS] = [1, 2, 4, 8];
pub const DEFAULT_RR_QUANTUM: usize = 4;
pub const DEFAULT_DEADLOCK_THRESHOLD: u64 = 5;
pub const DEFAULT_DEADLOCK_RETRY_BUDGET: u32 = 3;
pub const DEFAULT_MAX_CYCLES: u64 = 100;

pub const MLFQ_LEVELS: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub memory_size: usize,
    pub queue_capacity: usize,
    pub mlfq_quanta: [usize; MLFQ_LEVELS],
    pub rr_quantum: usize,
    pub policy: SchedulingAlgorithm,
    pub deadlock_threshold: u64,
    /// Unblock attempts a waiter gets before recovery terminates it.
    pub deadlock_retry_budget: u32,
    pub max_cycles: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            memory_size: DEFAULT_MEMORY_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            mlfq_quanta: DEFAULT_MLFQ_QUANTA,
            rr_quantum: DEFAULT_RR_QUANTUM,
            policy: SchedulingAlgorithm::Mlfq,
            deadlock_threshold: DEFAULT_DEADLOCK_THRESHOLD,
            deadlock_retry_budget: DEFAULT_DEADLOCK_RETRY_BUDGET,
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(text: &str) -> Result<SimulationConfig, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<SimulationConfig, ConfigError> {
        let text = fs::read_to_string(path).map_err(ConfigError::Io)?;
        SimulationConfig::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_size == 0 {
            return Err(ConfigError::Invalid("memory_size must be positive"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be positive"));
        }
        if self.mlfq_quanta.iter().any(|&quantum| quantum == 0) {
            return Err(ConfigError::Invalid("mlfq_quanta entries must be positive"));
        }
        if self.rr_quantum == 0 {
            return Err(ConfigError::Invalid("rr_quantum must be positive"));
        }

        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(serde_json::Error),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(reason) => write!(f, "invalid config: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}
