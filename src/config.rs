//! Layered configuration loading.
//!
//! Configuration is project-local. Sources merge lowest to highest:
//!
//! 1. Serialized defaults
//! 2. `.gropius/config.yaml`
//! 3. `.gropius/local.yaml`
//! 4. `GROPIUS_*` environment variables, with `__` separating nested keys
//!    (`GROPIUS_BRIDGE__ENDPOINT`)
//!
//! The merged value is validated before it is returned.

use crate::bridge::domain::{BridgeError, CommandTemplate, EndpointResolver};
use crate::bridge::services::{DispatcherSettings, PollSettings};
use crate::task::services::LifecycleSettings;
use crate::worktree::domain::MAX_SLOTS;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Project configuration file.
pub const CONFIG_FILE: &str = ".gropius/config.yaml";
/// Untracked local overrides.
pub const LOCAL_CONFIG_FILE: &str = ".gropius/local.yaml";
/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "GROPIUS_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or did not match the schema.
    #[error("failed to load configuration: {0}")]
    Extract(Box<figment::Error>),

    /// The bridge endpoint is blank.
    #[error("bridge endpoint must not be empty")]
    EmptyEndpoint,

    /// The repository root path is blank.
    #[error("repository root path must not be empty")]
    EmptyRootPath,

    /// The default branch is blank.
    #[error("default branch must not be empty")]
    EmptyDefaultBranch,

    /// The slot count is outside `1..=MAX_SLOTS`.
    #[error("invalid max_slots {0}, expected 1..=10")]
    InvalidSlotCount(usize),

    /// A timeout or interval is zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// The poll attempt budget is zero.
    #[error("max_poll_attempts must be greater than zero")]
    ZeroPollAttempts,

    /// Jobs would be declared stale before the first poll could see them.
    #[error("stale threshold {stale_after:?} is shorter than the poll interval {interval:?}")]
    StaleThresholdTooShort {
        /// Configured stale threshold.
        stale_after: Duration,
        /// Configured poll interval.
        interval: Duration,
    },

    /// The log level is not one of `trace`, `debug`, `info`, `warn`, `error`.
    #[error("invalid log level {0:?}, expected one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// The agent command template does not compile.
    #[error("invalid agent command template: {0}")]
    InvalidTemplate(#[source] BridgeError),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}

/// Repository the orchestrator delivers into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Tracker owner or organisation.
    pub owner: String,
    /// Tracker repository name.
    pub name: String,
    /// Branch workspaces start from and pull requests target.
    pub default_branch: String,
    /// Local checkout the worktree slots sit next to.
    pub root_path: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            name: String::new(),
            default_branch: "main".to_owned(),
            root_path: ".".to_owned(),
        }
    }
}

/// Slot pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorktreeConfig {
    /// Number of worktree slots.
    pub max_slots: usize,
}

impl Default for WorktreeConfig {
    fn default() -> Self {
        Self { max_slots: 3 }
    }
}

/// Automation bridge address and timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Command endpoint as configured by the user.
    pub endpoint: String,
    /// Extra hostname that also reaches the loopback bridge.
    pub browser_host: Option<String>,
    /// Route the command endpoint lives under.
    pub route_suffix: String,
    /// Timeout for single commands, in seconds.
    pub command_timeout_secs: u64,
    /// Timeout for workspace setup commands, in seconds.
    pub setup_timeout_secs: u64,
    /// Delay between job polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Poll budget per job.
    pub max_poll_attempts: u32,
    /// Silence after which a running job is abandoned, in seconds.
    pub stale_after_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:4312/run".to_owned(),
            browser_host: None,
            route_suffix: "/run".to_owned(),
            command_timeout_secs: 20,
            setup_timeout_secs: 60,
            poll_interval_ms: 1_000,
            max_poll_attempts: 2_400,
            stale_after_secs: 300,
        }
    }
}

impl BridgeConfig {
    /// Returns the endpoint resolver for this bridge.
    #[must_use]
    pub fn resolver(&self) -> EndpointResolver {
        EndpointResolver::new(
            self.endpoint.clone(),
            self.route_suffix.clone(),
            self.browser_host.clone(),
        )
    }

    /// Returns the dispatcher timeouts.
    #[must_use]
    pub const fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            setup_timeout: Duration::from_secs(self.setup_timeout_secs),
        }
    }

    /// Returns the job poll cadence.
    #[must_use]
    pub const fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_poll_attempts,
            stale_after: Duration::from_secs(self.stale_after_secs),
        }
    }
}

/// Code-generation agent invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Command template; see [`CommandTemplate`] for placeholders.
    pub command_template: String,
    /// Open a terminal window once a workspace is ready.
    pub launch_window: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command_template:
                "codex exec --cd {{ worktree_path | shell_quote }} {{ prompt | shell_quote }}"
                    .to_owned(),
            launch_window: false,
        }
    }
}

/// Output style of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human output.
    Pretty,
    /// Single-line human output.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output style.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::default(),
        }
    }
}

/// Complete orchestrator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GropiusConfig {
    /// Target repository.
    pub repository: RepositoryConfig,
    /// Slot pool sizing.
    pub worktrees: WorktreeConfig,
    /// Automation bridge.
    pub bridge: BridgeConfig,
    /// Agent invocation.
    pub agent: AgentConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

impl GropiusConfig {
    /// Checks every constraint the loaders enforce.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        if self.repository.root_path.trim().is_empty() {
            return Err(ConfigError::EmptyRootPath);
        }
        if self.repository.default_branch.trim().is_empty() {
            return Err(ConfigError::EmptyDefaultBranch);
        }
        if self.worktrees.max_slots == 0 || self.worktrees.max_slots > MAX_SLOTS {
            return Err(ConfigError::InvalidSlotCount(self.worktrees.max_slots));
        }
        validate_timing(&self.bridge)?;
        if !LOG_LEVELS.contains(&self.logging.level.trim().to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.logging.level.clone()));
        }
        self.agent_template().map(|_| ())
    }

    /// Compiles the agent command template.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTemplate`] when it does not compile.
    pub fn agent_template(&self) -> Result<CommandTemplate, ConfigError> {
        CommandTemplate::new(self.agent.command_template.clone()).map_err(ConfigError::InvalidTemplate)
    }

    /// Builds the lifecycle service settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTemplate`] when the agent template does
    /// not compile.
    pub fn lifecycle_settings(&self) -> Result<LifecycleSettings, ConfigError> {
        let mut settings =
            LifecycleSettings::new(self.repository.default_branch.trim(), self.agent_template()?);
        settings.launch_window = self.agent.launch_window;
        settings.poll = self.bridge.poll_settings();
        Ok(settings)
    }
}

fn validate_timing(bridge: &BridgeConfig) -> Result<(), ConfigError> {
    let durations = [
        ("command_timeout_secs", bridge.command_timeout_secs),
        ("setup_timeout_secs", bridge.setup_timeout_secs),
        ("poll_interval_ms", bridge.poll_interval_ms),
        ("stale_after_secs", bridge.stale_after_secs),
    ];
    if let Some(&(name, _)) = durations.iter().find(|(_, value)| *value == 0) {
        return Err(ConfigError::ZeroDuration(name));
    }
    if bridge.max_poll_attempts == 0 {
        return Err(ConfigError::ZeroPollAttempts);
    }
    let poll = bridge.poll_settings();
    if poll.stale_after < poll.interval {
        return Err(ConfigError::StaleThresholdTooShort {
            stale_after: poll.stale_after,
            interval: poll.interval,
        });
    }
    Ok(())
}

/// Loads configuration from its layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads defaults, both project files and the environment.
    ///
    /// Missing files are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Extract`] for unreadable or mistyped sources and
    /// a validation error for out-of-range values.
    pub fn load() -> Result<GropiusConfig, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(GropiusConfig::default()))
            .merge(Yaml::file(CONFIG_FILE))
            .merge(Yaml::file(LOCAL_CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::finish(&figment)
    }

    /// Loads defaults overlaid with a single YAML file.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<GropiusConfig, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(GropiusConfig::default()))
            .merge(Yaml::file(path.as_ref()));
        Self::finish(&figment)
    }

    /// Loads defaults overlaid with YAML text.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_from_str(yaml: &str) -> Result<GropiusConfig, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(GropiusConfig::default()))
            .merge(Yaml::string(yaml));
        Self::finish(&figment)
    }

    fn finish(figment: &Figment) -> Result<GropiusConfig, ConfigError> {
        let config: GropiusConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }
}
