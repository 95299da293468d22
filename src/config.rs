//! Run settings for the reconnect tool
//!
//! Settings are built once at startup (TOML file and/or command line
//! overrides applied by the binary) and passed by reference into each
//! component. There is no global mutable state.

use crate::error::{Result, SwitchError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Connection action requested for the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnAction {
    /// Tear down, reselect the server and bring the tunnel back up
    #[default]
    Up,
    /// Tear the tunnel down and stop
    Down,
    /// Reselect and rewrite only, leave the tunnel alone
    Nothing,
}

impl ConnAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnAction::Up => "up",
            ConnAction::Down => "down",
            ConnAction::Nothing => "nothing",
        }
    }
}

impl FromStr for ConnAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "up" => Ok(ConnAction::Up),
            "down" => Ok(ConnAction::Down),
            "nothing" => Ok(ConnAction::Nothing),
            other => Err(format!("expected \"up\", \"down\" or \"nothing\", got \"{other}\"")),
        }
    }
}

/// Immutable settings for one reconnect run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// URL of the server load statistics feed
    #[serde(default = "default_stats_url")]
    pub stats_url: String,
    /// Delay between bring-up retry attempts, in seconds. Also used as the
    /// cooldown after a daemon restart.
    #[serde(default = "default_retry_timeout")]
    pub retry_timeout: u64,
    /// Write the selected server back to the IPsec configuration file
    #[serde(default = "default_true")]
    pub save_to_conf: bool,
    /// Ask the daemon to reload its settings after the rewrite
    #[serde(default = "default_true")]
    pub reload: bool,
    /// Restart the daemon after the rewrite
    #[serde(default)]
    pub restart: bool,
    /// Connection action for this run
    #[serde(default)]
    pub conn: ConnAction,
    /// Echo daemon output
    #[serde(default)]
    pub verbose: bool,
    /// Path of the IPsec configuration file
    #[serde(default = "default_ipsec_conf")]
    pub ipsec_conf: PathBuf,
    /// Daemon command to invoke
    #[serde(default = "default_daemon_command")]
    pub daemon_command: String,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SwitchError::Config(format!("Failed to read settings file: {e}")))?;

        <Self as FromStr>::from_str(&contents)
    }

    /// Convert settings to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SwitchError::Config(format!("Failed to serialize settings: {e}")))
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.stats_url.is_empty() {
            return Err(SwitchError::Config(
                "Stats URL cannot be empty".to_string(),
            ));
        }

        Url::parse(&self.stats_url)
            .map_err(|e| SwitchError::Config(format!("Invalid stats URL: {e}")))?;

        if self.retry_timeout == 0 {
            return Err(SwitchError::Config(
                "Retry timeout cannot be zero".to_string(),
            ));
        }

        if self.ipsec_conf.as_os_str().is_empty() {
            return Err(SwitchError::Config(
                "IPsec configuration path cannot be empty".to_string(),
            ));
        }

        if self.daemon_command.is_empty() {
            return Err(SwitchError::Config(
                "Daemon command cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Delay between bring-up attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_timeout)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stats_url: default_stats_url(),
            retry_timeout: default_retry_timeout(),
            save_to_conf: true,
            reload: true,
            restart: false,
            conn: ConnAction::default(),
            verbose: false,
            ipsec_conf: default_ipsec_conf(),
            daemon_command: default_daemon_command(),
        }
    }
}

impl FromStr for Settings {
    type Err = SwitchError;

    fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SwitchError::Config(format!("Failed to parse TOML: {e}")))
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_stats_url() -> String {
    "https://nordvpn.com/api/server/stats".to_string()
}

fn default_retry_timeout() -> u64 {
    5
}

fn default_ipsec_conf() -> PathBuf {
    PathBuf::from("/etc/ipsec.conf")
}

fn default_daemon_command() -> String {
    "ipsec".to_string()
}
