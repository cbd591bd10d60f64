//! Configuration management for the meshplan CLI
//!
//! Handles loading and saving configuration from ~/.meshplan/config.toml

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use meshplan::{MergePolicy, PlannerConfig};
use serde::{Deserialize, Serialize};

/// Configuration for the meshplan CLI
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Pretty-print written JSON files
    #[serde(default = "default_true")]
    pub pretty: bool,

    /// Print every link of the plan, not only the summary
    #[serde(default)]
    pub show_links: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            show_links: false,
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".meshplan")
            .join("config.toml")
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config
            .planner
            .validate()
            .with_context(|| format!("invalid planner settings in {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Get a configuration value by key path (e.g., "planner.seed")
    pub fn get(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["planner", "channels"] => Some(
                self.planner
                    .assignable_channels
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            ["planner", "merge_policy"] => Some(self.planner.merge_policy.as_str().to_string()),
            ["planner", "survivability"] => Some(self.planner.survivability.to_string()),
            ["planner", "seed"] => Some(self.planner.seed.to_string()),
            ["planner", "max_observation_age_secs"] => self
                .planner
                .max_observation_age_secs
                .map(|age| age.to_string()),
            ["output", "pretty"] => Some(self.output.pretty.to_string()),
            ["output", "show_links"] => Some(self.output.show_links.to_string()),
            _ => None,
        }
    }

    /// Set a configuration value by key path
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["planner", "channels"] => {
                let channels = parse_channels(value)?;
                self.planner.assignable_channels = channels.into_iter().map(Into::into).collect();
            }
            ["planner", "merge_policy"] => self.planner.merge_policy = value.parse::<MergePolicy>()?,
            ["planner", "survivability"] => {
                self.planner.survivability = value
                    .parse()
                    .with_context(|| format!("'{}' is not true or false", value))?
            }
            ["planner", "seed"] => {
                let seed: u64 = value
                    .parse()
                    .with_context(|| format!("'{}' is not a seed", value))?;
                // TOML integers are signed 64-bit
                if seed > i64::MAX as u64 {
                    anyhow::bail!(
                        "seed {} cannot be stored in the config file (max {})",
                        seed,
                        i64::MAX
                    );
                }
                self.planner.seed = seed;
            }
            ["planner", "max_observation_age_secs"] => {
                self.planner.max_observation_age_secs = match value {
                    "" | "none" => None,
                    age => Some(
                        age.parse()
                            .with_context(|| format!("'{}' is not a number of seconds", age))?,
                    ),
                }
            }
            ["output", "pretty"] => self.output.pretty = value.parse().unwrap_or(true),
            ["output", "show_links"] => self.output.show_links = value.parse().unwrap_or(false),
            _ => anyhow::bail!("Unknown configuration key: {}", key),
        }

        self.planner.validate()?;
        Ok(())
    }
}

/// Parse a comma separated channel list such as `1,6,11`
pub fn parse_channels(value: &str) -> Result<Vec<u16>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u16>()
                .with_context(|| format!("'{}' is not a channel number", part))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshplan::ChannelId;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set("planner.channels", "36, 40,44").unwrap();
        config.set("planner.merge_policy", "average").unwrap();
        config.set("planner.seed", "99").unwrap();
        config.set("planner.max_observation_age_secs", "600").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(
            loaded.planner.assignable_channels,
            vec![ChannelId(36), ChannelId(40), ChannelId(44)]
        );
        assert_eq!(loaded.planner.merge_policy, MergePolicy::Average);
        assert_eq!(loaded.get("planner.seed").as_deref(), Some("99"));
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[planner]\nseed = 7\nsurvivability = false\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.planner.seed, 7);
        assert!(!config.planner.survivability);
        assert_eq!(config.get("planner.channels").as_deref(), Some("1,6,11"));
        assert!(config.output.pretty);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set("planner.merge_policy", "median").is_err());
        assert!(config.set("planner.channels", "1,x").is_err());
        assert!(config.set("server.url", "http://localhost").is_err());
        assert!(config.set("planner.channels", "").is_err());
    }

    #[test]
    fn test_seed_must_fit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();

        let error = config.set("planner.seed", &u64::MAX.to_string()).unwrap_err();
        assert!(error.to_string().contains("cannot be stored"));
        assert_eq!(config.planner.seed, 0);

        config.set("planner.seed", &i64::MAX.to_string()).unwrap();
        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.planner.seed, i64::MAX as u64);
    }
}
