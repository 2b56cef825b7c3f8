//! # Node Configuration
//!
//! Per-concern configuration structs aggregated into [`NodeConfig`]. Every
//! default is a production value; `BN_*` environment variables override
//! individual fields, and `validate()` runs before any component is built.
//!
//! There is no global config state and no config file: the coordinator
//! receives one explicit `NodeConfig` value and threads the pieces to the
//! components that need them.

use std::path::PathBuf;
use std::time::Duration;

use bn_02_intake::{GateKind, IntakeConfig};
use bn_03_event_store::{GapPolicy, StoreConfig};
use shared_pipeline::{HealthConfig, DEFAULT_STAGE_CAPACITY};
use shared_types::NodeId;
use tracing::warn;

use crate::errors::{ConfigError, ConfigResult};

/// Identity and filesystem layout of this node.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// This node's id; must appear in the bootstrap roster.
    pub node_id: NodeId,
    /// Root of all persisted state (segments, scratchpad, marker, lock).
    pub data_dir: PathBuf,
    /// JSON roster describing the bootstrap membership.
    pub roster_path: PathBuf,
    /// Start even when the scratchpad holds a blocking incident.
    pub unsafe_restart_override: bool,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            node_id: NodeId::new(0),
            data_dir: PathBuf::from("data"),
            roster_path: PathBuf::from("roster.json"),
            unsafe_restart_override: false,
        }
    }
}

/// Ancient-round pruning.
#[derive(Debug, Clone)]
pub struct PruneSettings {
    /// Rounds behind the latest known round that stay non-ancient. Events
    /// older than `latest - offset` are guaranteed consensus-final and may
    /// be pruned from durable storage.
    pub ancient_round_offset: u64,
}

impl Default for PruneSettings {
    fn default() -> Self {
        Self {
            ancient_round_offset: 26,
        }
    }
}

/// Stage queue and health monitor tuning.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Bounded queue capacity for each stage.
    pub stage_capacity: usize,
    /// How long a stage may sit on a non-empty queue before it is stalled.
    pub stall_threshold: Duration,
    /// How often stage stats are sampled.
    pub sampling_period: Duration,
}

impl PipelineSettings {
    /// The health monitor's view of these settings.
    #[must_use]
    pub fn health(&self) -> HealthConfig {
        HealthConfig {
            stall_threshold: self.stall_threshold,
            sampling_period: self.sampling_period,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let health = HealthConfig::default();
        Self {
            stage_capacity: DEFAULT_STAGE_CAPACITY,
            stall_threshold: health.stall_threshold,
            sampling_period: health.sampling_period,
        }
    }
}

/// Worker pool sizing for the async runtime.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Multiplied with the core count.
    pub multiplier: f64,
    /// Added after the multiplication; may be negative.
    pub constant: i64,
}

impl PoolSettings {
    /// Worker thread count: `max(1, cores * multiplier + constant)`,
    /// truncated. Computed once before the runtime is built.
    #[must_use]
    pub fn worker_threads(&self, cores: usize) -> usize {
        let sized = (cores as f64 * self.multiplier) as i64 + self.constant;
        sized.max(1) as usize
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            constant: 0,
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Identity and paths.
    pub node: NodeSettings,
    /// Intake front door tuning.
    pub intake: IntakeConfig,
    /// Durable event store tuning.
    pub store: StoreConfig,
    /// Ancient-round pruning.
    pub pruning: PruneSettings,
    /// Stage queues and health monitor.
    pub pipeline: PipelineSettings,
    /// Worker pool sizing.
    pub pool: PoolSettings,
}

impl NodeConfig {
    /// Defaults overridden by `BN_*` environment variables.
    ///
    /// Unparseable values are logged and ignored rather than failing the
    /// start; a value that parses but violates a bound is still caught by
    /// [`NodeConfig::validate`].
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(id) = env_parse::<u64>("BN_NODE_ID") {
            config.node.node_id = NodeId::new(id);
        }
        if let Some(dir) = env_parse::<PathBuf>("BN_DATA_DIR") {
            config.node.data_dir = dir;
        }
        if let Some(path) = env_parse::<PathBuf>("BN_ROSTER_PATH") {
            config.node.roster_path = path;
        }
        if let Some(flag) = env_parse::<bool>("BN_UNSAFE_RESTART_OVERRIDE") {
            config.node.unsafe_restart_override = flag;
        }

        if let Some(limit) = env_parse::<u32>("BN_INTAKE_LIMIT") {
            config.intake.per_peer_limit = limit;
        }
        if let Ok(raw) = std::env::var("BN_GATE_KIND") {
            match raw.as_str() {
                "per-peer" => config.intake.gate = GateKind::PerPeer,
                "always-admit" => config.intake.gate = GateKind::AlwaysAdmit,
                _ => warn!(value = %raw, "[bn-06] unknown BN_GATE_KIND, keeping default"),
            }
        }
        if let Some(bytes) = env_parse::<usize>("BN_MAX_PAYLOAD_BYTES") {
            config.intake.max_payload_bytes = bytes;
        }
        if let Some(ms) = env_parse::<u64>("BN_DEDUP_ROLL_MS") {
            config.intake.dedup_roll_interval = Duration::from_millis(ms);
        }
        if let Some(entries) = env_parse::<usize>("BN_DEDUP_MAX_ENTRIES") {
            config.intake.dedup_max_entries = entries;
        }

        if let Some(bytes) = env_parse::<u64>("BN_SEGMENT_MAX_BYTES") {
            config.store.segment_max_bytes = bytes;
        }
        if let Some(span) = env_parse::<u64>("BN_SEGMENT_MAX_ROUND_SPAN") {
            config.store.segment_max_round_span = span;
        }
        if let Ok(raw) = std::env::var("BN_GAP_POLICY") {
            match raw.as_str() {
                "forbid" => config.store.gap_policy = GapPolicy::Forbid,
                "allow" => config.store.gap_policy = GapPolicy::Allow,
                _ => warn!(value = %raw, "[bn-06] unknown BN_GAP_POLICY, keeping default"),
            }
        }
        if let Some(offset) = env_parse::<u64>("BN_ANCIENT_ROUND_OFFSET") {
            config.pruning.ancient_round_offset = offset;
        }

        if let Some(capacity) = env_parse::<usize>("BN_STAGE_CAPACITY") {
            config.pipeline.stage_capacity = capacity;
        }
        if let Some(ms) = env_parse::<u64>("BN_STALL_THRESHOLD_MS") {
            config.pipeline.stall_threshold = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("BN_HEALTH_SAMPLE_MS") {
            config.pipeline.sampling_period = Duration::from_millis(ms);
        }

        if let Some(multiplier) = env_parse::<f64>("BN_POOL_MULTIPLIER") {
            config.pool.multiplier = multiplier;
        }
        if let Some(constant) = env_parse::<i64>("BN_POOL_CONSTANT") {
            config.pool.constant = constant;
        }

        config
    }

    /// Rejects contradictory or degenerate values before anything is built.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.node.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("data_dir", "must not be empty"));
        }
        if self.node.roster_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("roster_path", "must not be empty"));
        }
        if self.intake.per_peer_limit == 0 {
            return Err(ConfigError::invalid(
                "per_peer_limit",
                "a zero limit admits nothing",
            ));
        }
        if self.intake.max_payload_bytes == 0 {
            return Err(ConfigError::invalid(
                "max_payload_bytes",
                "a zero bound rejects every payload",
            ));
        }
        if self.intake.dedup_max_entries == 0 {
            return Err(ConfigError::invalid(
                "dedup_max_entries",
                "the duplicate index needs room for at least one id",
            ));
        }
        if self.store.segment_max_bytes == 0 {
            return Err(ConfigError::invalid(
                "segment_max_bytes",
                "a segment must hold at least one record",
            ));
        }
        if self.store.segment_max_round_span == 0 {
            return Err(ConfigError::invalid(
                "segment_max_round_span",
                "a segment must cover at least one round",
            ));
        }
        if self.pipeline.stage_capacity == 0 {
            return Err(ConfigError::invalid(
                "stage_capacity",
                "stage queues must hold at least one item",
            ));
        }
        if self.pipeline.stall_threshold.is_zero() || self.pipeline.sampling_period.is_zero() {
            return Err(ConfigError::invalid(
                "health",
                "stall threshold and sampling period must be non-zero",
            ));
        }
        if !self.pool.multiplier.is_finite() || self.pool.multiplier <= 0.0 {
            return Err(ConfigError::invalid(
                "pool_multiplier",
                format!("{} is not a usable core multiplier", self.pool.multiplier),
            ));
        }
        Ok(())
    }
}

/// Reads and parses one environment variable, warning on garbage.
fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var, value = %raw, "[bn-06] ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        NodeConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let mut config = NodeConfig::default();
        config.intake.per_peer_limit = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "per_peer_limit", .. })
        ));

        let mut config = NodeConfig::default();
        config.store.segment_max_round_span = 0;
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.pool.multiplier = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worker_formula_floors_at_one() {
        let pool = PoolSettings {
            multiplier: 0.5,
            constant: -8,
        };
        assert_eq!(pool.worker_threads(4), 1);

        let pool = PoolSettings {
            multiplier: 1.5,
            constant: 1,
        };
        assert_eq!(pool.worker_threads(8), 13);
    }

    #[test]
    fn test_env_overrides_apply() {
        // One test owns every variable so nothing races on process env.
        std::env::set_var("BN_NODE_ID", "7");
        std::env::set_var("BN_INTAKE_LIMIT", "9");
        std::env::set_var("BN_GATE_KIND", "always-admit");
        std::env::set_var("BN_GAP_POLICY", "allow");
        std::env::set_var("BN_POOL_CONSTANT", "-2");
        std::env::set_var("BN_STALL_THRESHOLD_MS", "250");
        std::env::set_var("BN_SEGMENT_MAX_BYTES", "not-a-number");

        let config = NodeConfig::from_env();
        assert_eq!(config.node.node_id, NodeId::new(7));
        assert_eq!(config.intake.per_peer_limit, 9);
        assert_eq!(config.intake.gate, GateKind::AlwaysAdmit);
        assert_eq!(config.store.gap_policy, GapPolicy::Allow);
        assert_eq!(config.pool.constant, -2);
        assert_eq!(config.pipeline.stall_threshold, Duration::from_millis(250));
        // Garbage is ignored, the default survives.
        assert_eq!(
            config.store.segment_max_bytes,
            bn_03_event_store::config::DEFAULT_SEGMENT_MAX_BYTES
        );

        for var in [
            "BN_NODE_ID",
            "BN_INTAKE_LIMIT",
            "BN_GATE_KIND",
            "BN_GAP_POLICY",
            "BN_POOL_CONSTANT",
            "BN_STALL_THRESHOLD_MS",
            "BN_SEGMENT_MAX_BYTES",
        ] {
            std::env::remove_var(var);
        }
    }
}
