//! Configuration for a planning cycle

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::topology::bandwidth::BandwidthTable;
use crate::topology::graph::ChannelId;
use crate::{MeshPlanError, Result};

/// How two directional SNR readings of one link are folded into one value
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Mean of both directions
    Average,
    /// Pessimistic - keep the worse direction
    #[default]
    Lower,
    /// Optimistic - keep the better direction
    Upper,
}

impl MergePolicy {
    pub fn combine(self, forward: f64, reverse: f64) -> f64 {
        match self {
            Self::Average => (forward + reverse) / 2.0,
            Self::Lower => forward.min(reverse),
            Self::Upper => forward.max(reverse),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::Lower => "lower",
            Self::Upper => "upper",
        }
    }
}

impl std::str::FromStr for MergePolicy {
    type Err = MeshPlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "average" => Ok(Self::Average),
            "lower" => Ok(Self::Lower),
            "upper" => Ok(Self::Upper),
            other => Err(MeshPlanError::Config(format!(
                "'{}' is not a merge policy, expected one of: average, lower, upper",
                other
            ))),
        }
    }
}

/// Explicit parameters of one planning cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlannerConfig {
    /// Ordered palette of channels the planner may assign
    #[serde(default = "default_channels")]
    pub assignable_channels: Vec<ChannelId>,
    /// Directional observation merge behaviour
    #[serde(default)]
    pub merge_policy: MergePolicy,
    /// Whether to search backup links
    #[serde(default = "default_true")]
    pub survivability: bool,
    /// Seed for the channel election tie-break
    #[serde(default)]
    pub seed: u64,
    /// SNR to throughput policy table
    #[serde(default)]
    pub bandwidth: BandwidthTable,
    /// Observations older than this are ignored
    #[serde(default)]
    pub max_observation_age_secs: Option<u64>,
}

fn default_channels() -> Vec<ChannelId> {
    vec![ChannelId(1), ChannelId(6), ChannelId(11)]
}

fn default_true() -> bool {
    true
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            assignable_channels: default_channels(),
            merge_policy: MergePolicy::default(),
            survivability: true,
            seed: 0,
            bandwidth: BandwidthTable::default(),
            max_observation_age_secs: None,
        }
    }
}

impl PlannerConfig {
    pub fn with_channels(mut self, channels: impl IntoIterator<Item = u16>) -> Self {
        self.assignable_channels = channels.into_iter().map(ChannelId).collect();
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    pub fn with_survivability(mut self, enabled: bool) -> Self {
        self.survivability = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_bandwidth(mut self, table: BandwidthTable) -> Self {
        self.bandwidth = table;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.assignable_channels.is_empty() {
            return Err(MeshPlanError::Config(
                "the assignable channel palette is empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for channel in &self.assignable_channels {
            if !seen.insert(*channel) {
                return Err(MeshPlanError::Config(format!(
                    "channel {} appears twice in the palette",
                    channel
                )));
            }
        }

        self.bandwidth.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_policies_stay_within_bounds() {
        for policy in [MergePolicy::Average, MergePolicy::Lower, MergePolicy::Upper] {
            let merged = policy.combine(30.0, 70.0);
            assert!((30.0..=70.0).contains(&merged));
            assert_eq!(merged, policy.combine(70.0, 30.0));
        }
        assert_eq!(MergePolicy::Average.combine(30.0, 70.0), 50.0);
        assert_eq!(MergePolicy::Lower.combine(30.0, 70.0), 30.0);
        assert_eq!(MergePolicy::Upper.combine(30.0, 70.0), 70.0);
    }

    #[test]
    fn test_parse_merge_policy() {
        assert_eq!("Upper".parse::<MergePolicy>().unwrap(), MergePolicy::Upper);
        assert!("median".parse::<MergePolicy>().is_err());
    }

    #[test]
    fn test_defaults_from_empty_json() {
        let config: PlannerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PlannerConfig::default());
        assert_eq!(config.merge_policy, MergePolicy::Lower);
        assert!(config.survivability);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders_override_defaults() {
        assert_eq!(MergePolicy::default(), MergePolicy::Lower);

        let config = PlannerConfig::default()
            .with_merge_policy(MergePolicy::Average)
            .with_survivability(false)
            .with_seed(42)
            .with_channels([36, 40]);
        assert_eq!(config.merge_policy, MergePolicy::Average);
        assert!(!config.survivability);
        assert_eq!(config.seed, 42);
        assert_eq!(config.assignable_channels, vec![ChannelId(36), ChannelId(40)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_palettes() {
        let empty = PlannerConfig::default().with_channels([]);
        assert!(matches!(empty.validate(), Err(MeshPlanError::Config(_))));

        let duplicated = PlannerConfig::default().with_channels([1, 6, 1]);
        assert!(matches!(duplicated.validate(), Err(MeshPlanError::Config(_))));
    }
}
