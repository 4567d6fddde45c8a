//! redblack.toml configuration parser.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint listing every cluster and its member groups. Defaults to
    /// `cluster/list.json` under the default profile.
    pub cluster_list_url: Option<String>,
    /// Profile used when a deployment names no configured profile.
    pub default_profile: String,
    pub profiles: BTreeMap<String, ProfileConfig>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// One account/region of the fleet control service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileConfig {
    /// Base URL, e.g. `http://asgard.internal/us-east-1`.
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutConfig {
    #[serde(default = "default_instance_health_secs")]
    pub instance_health_secs: u64,
    #[serde(default = "default_elb_health_secs")]
    pub elb_health_secs: u64,
    #[serde(default = "default_task_secs")]
    pub task_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_secs")]
    pub request_secs: u64,
}

fn default_instance_health_secs() -> u64 {
    300
}

fn default_elb_health_secs() -> u64 {
    600
}

fn default_task_secs() -> u64 {
    300
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_request_secs() -> u64 {
    30
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            instance_health_secs: default_instance_health_secs(),
            elb_health_secs: default_elb_health_secs(),
            task_secs: default_task_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            request_secs: default_request_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn instance_health(&self) -> Duration {
        Duration::from_secs(self.instance_health_secs)
    }

    pub fn elb_health(&self) -> Duration {
        Duration::from_secs(self.elb_health_secs)
    }

    pub fn task(&self) -> Duration {
        Duration::from_secs(self.task_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.profiles.is_empty() {
            return Err(ConfigError::Invalid("no profiles configured".to_string()));
        }
        if !self.profiles.contains_key(&self.default_profile) {
            return Err(ConfigError::Invalid(format!(
                "default_profile `{}` is not defined",
                self.default_profile
            )));
        }
        if self.timeouts.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeouts.poll_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve a profile by name, falling back to the default profile.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &ProfileConfig), ConfigError> {
        name.and_then(|n| self.profiles.get_key_value(n))
            .or_else(|| self.profiles.get_key_value(&self.default_profile))
            .map(|(key, profile)| (key.as_str(), profile))
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "default_profile `{}` is not defined",
                    self.default_profile
                ))
            })
    }

    pub fn cluster_list_url(&self) -> Result<String, ConfigError> {
        match &self.cluster_list_url {
            Some(url) => Ok(url.clone()),
            None => {
                let (_, profile) = self.profile(None)?;
                Ok(format!(
                    "{}/cluster/list.json",
                    profile.base_url.trim_end_matches('/')
                ))
            }
        }
    }
}
