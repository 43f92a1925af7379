use std::path::PathBuf;

use tracing::trace;

use crate::actors::messages::ActorId;

/// Where response samples are emitted
#[derive(Debug, Clone, Default, serde::Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Samples are recorded but never emitted anywhere
    None,

    /// Summary through the log
    #[default]
    Log,

    /// One JSON document per emission, appended to a file
    JsonLines {
        #[serde(default = "default_json_lines_path")]
        path: PathBuf,
    },
}

fn default_json_lines_path() -> PathBuf {
    PathBuf::from("./response-times.jsonl")
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub names: ActorNames,

    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub decision: DecisionConfig,

    #[serde(default)]
    pub fallback: FallbackConfig,

    #[serde(default)]
    pub sink: SinkConfig,
}

/// Names under which the actors register
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ActorNames {
    #[serde(default = "default_sensor_name")]
    pub sensor: ActorId,
    #[serde(default = "default_monitor_name")]
    pub monitor: ActorId,
    #[serde(default = "default_decision_name")]
    pub decision: ActorId,
    #[serde(default = "default_fallback_name")]
    pub fallback: ActorId,
}

impl Default for ActorNames {
    fn default() -> Self {
        Self {
            sensor: default_sensor_name(),
            monitor: default_monitor_name(),
            decision: default_decision_name(),
            fallback: default_fallback_name(),
        }
    }
}

fn default_sensor_name() -> ActorId {
    ActorId::new("sensorAgent")
}

fn default_monitor_name() -> ActorId {
    ActorId::new("systemAgent")
}

fn default_decision_name() -> ActorId {
    ActorId::new("learningAgent")
}

fn default_fallback_name() -> ActorId {
    ActorId::new("helpAgent")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SensorConfig {
    /// Delay between an acknowledgment and the next reading
    #[serde(default = "default_delay_ms")]
    pub interval_ms: u64,

    /// Stop after this many readings have been acknowledged
    pub max_readings: Option<u64>,

    pub seed: Option<u64>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_delay_ms(),
            max_readings: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct DecisionConfig {
    /// Seed for the exploration/exploitation draw
    pub policy_seed: Option<u64>,

    /// Seed for the escalation coin-flip
    pub escalation_seed: Option<u64>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct FallbackConfig {
    /// Simulated solution search time
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_delay_ms() -> u64 {
    5000
}

impl Config {
    /// Apply one seed to every random source that has none configured
    ///
    /// Each source gets a distinct offset so they do not mirror each other.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sensor.seed.get_or_insert(seed);
        self.decision
            .policy_seed
            .get_or_insert(seed.wrapping_add(1));
        self.decision
            .escalation_seed
            .get_or_insert(seed.wrapping_add(2));
        self
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    parse_config(&file_content)
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
