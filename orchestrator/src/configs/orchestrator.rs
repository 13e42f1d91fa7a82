use std::time::Duration;

use serde::Deserialize;

use crate::ConfigError;

const DEFAULT_CLIENT_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_HEALTH_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_ROUND_PAUSE_MS: u64 = 500;
const DEFAULT_MAX_CONSECUTIVE_FAILED_ROUNDS: usize = 3;

/// Operational knobs of the orchestrator, independent of any single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Upper bound for one client's training call.
    pub client_timeout: Duration,
    /// Upper bound for one client's health check.
    pub health_timeout: Duration,
    /// Idle time between two rounds, cut short by a stop request.
    pub round_pause: Duration,
    /// Consecutive rounds without a single successful client before the run fails.
    /// Zero disables the bound.
    pub max_consecutive_failed_rounds: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            client_timeout: Duration::from_millis(DEFAULT_CLIENT_TIMEOUT_MS),
            health_timeout: Duration::from_millis(DEFAULT_HEALTH_TIMEOUT_MS),
            round_pause: Duration::from_millis(DEFAULT_ROUND_PAUSE_MS),
            max_consecutive_failed_rounds: DEFAULT_MAX_CONSECUTIVE_FAILED_ROUNDS,
        }
    }
}

/// The serialized form of `OrchestratorConfig`, durations in milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OrchestratorSettings {
    #[serde(default = "default_client_timeout_ms")]
    pub client_timeout_ms: u64,
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
    #[serde(default = "default_round_pause_ms")]
    pub round_pause_ms: u64,
    #[serde(default = "default_max_consecutive_failed_rounds")]
    pub max_consecutive_failed_rounds: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            client_timeout_ms: DEFAULT_CLIENT_TIMEOUT_MS,
            health_timeout_ms: DEFAULT_HEALTH_TIMEOUT_MS,
            round_pause_ms: DEFAULT_ROUND_PAUSE_MS,
            max_consecutive_failed_rounds: DEFAULT_MAX_CONSECUTIVE_FAILED_ROUNDS,
        }
    }
}

impl TryFrom<OrchestratorSettings> for OrchestratorConfig {
    type Error = ConfigError;

    fn try_from(settings: OrchestratorSettings) -> Result<Self, Self::Error> {
        if settings.client_timeout_ms == 0 {
            return Err(ConfigError::Invalid("client_timeout_ms must be positive".into()));
        }

        if settings.health_timeout_ms == 0 {
            return Err(ConfigError::Invalid("health_timeout_ms must be positive".into()));
        }

        Ok(Self {
            client_timeout: Duration::from_millis(settings.client_timeout_ms),
            health_timeout: Duration::from_millis(settings.health_timeout_ms),
            round_pause: Duration::from_millis(settings.round_pause_ms),
            max_consecutive_failed_rounds: settings.max_consecutive_failed_rounds,
        })
    }
}

fn default_client_timeout_ms() -> u64 {
    DEFAULT_CLIENT_TIMEOUT_MS
}

fn default_health_timeout_ms() -> u64 {
    DEFAULT_HEALTH_TIMEOUT_MS
}

fn default_round_pause_ms() -> u64 {
    DEFAULT_ROUND_PAUSE_MS
}

fn default_max_consecutive_failed_rounds() -> usize {
    DEFAULT_MAX_CONSECUTIVE_FAILED_ROUNDS
}
