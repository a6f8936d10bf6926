use std::time::Duration;

use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct HeraldConfig {
    #[serde(default = "default_cluster")]
    pub cluster: String,
    /// Seconds between report cycles.
    #[serde(default = "default_report_interval")]
    pub report_interval: u64,
    /// Seconds between full passes over the runtime's containers.
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval: u64,
    /// Without a control plane every change is only logged.
    #[serde(default)]
    pub control_plane: Option<ControlPlaneConfig>,
    #[serde(default)]
    pub labels: LabelConfig,
}

fn default_cluster() -> String {
    "default".to_string()
}

fn default_report_interval() -> u64 {
    1
}

fn default_reconcile_interval() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlPlaneConfig {
    pub endpoint: Url,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

/// Container labels that tie a runtime container to a task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_task_arn_label")]
    pub task_arn: String,
    #[serde(default = "default_container_name_label")]
    pub container_name: String,
    #[serde(default = "default_essential_label")]
    pub essential: String,
}

fn default_task_arn_label() -> String {
    "herald.task-arn".to_string()
}

fn default_container_name_label() -> String {
    "herald.container-name".to_string()
}

fn default_essential_label() -> String {
    "herald.essential".to_string()
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            task_arn: default_task_arn_label(),
            container_name: default_container_name_label(),
            essential: default_essential_label(),
        }
    }
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            cluster: default_cluster(),
            report_interval: default_report_interval(),
            reconcile_interval: default_reconcile_interval(),
            control_plane: None,
            labels: LabelConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid setting: {0}")]
    Invalid(&'static str),
}

impl HeraldConfig {
    fn try_init_from_string(config: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(config)?;
        if config.report_interval == 0 {
            return Err(ConfigError::Invalid("report_interval must be positive"));
        }
        if config.reconcile_interval == 0 {
            return Err(ConfigError::Invalid("reconcile_interval must be positive"));
        }
        Ok(config)
    }

    /// Reads the file passed on the command line. A missing file means
    /// every setting keeps its default.
    pub fn try_init() -> Result<Self, ConfigError> {
        let args = crate::cli::get_cli_args();
        let config = match std::fs::read_to_string(&args.config) {
            Ok(config) => Self::try_init_from_string(&config)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("{} not found, using defaults", args.config.display());
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(config.with_overrides(args))
    }

    /// Command line flags win over the file.
    fn with_overrides(mut self, args: &crate::cli::Args) -> Self {
        if let Some(cluster) = &args.cluster {
            self.cluster = cluster.clone();
        }
        self
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval)
    }
}
