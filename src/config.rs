//! Deployment configuration. Read from `config.toml` in the application directory, then
//! overridden by `DALOS_*` environment variables and finally by command line flags.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::submission::retry::RetryPolicy;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const ENDPOINT_ENV: &str = "DALOS_ENDPOINT";
pub const AGENT_PORT_ENV: &str = "DALOS_AGENT_PORT";

const DEFAULT_AGENT_PORT: u16 = 47615;
/// Matches the "remind me in 6 hours" button.
const DEFAULT_REMINDER_DELAY_SECS: u64 = 6 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config file {} is invalid: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("ledger endpoint is not configured, set `endpoint` in config.toml or DALOS_ENDPOINT")]
    MissingEndpoint,
    #[error("ledger endpoint `{0}` must be an absolute http(s) URL")]
    InvalidEndpoint(String),
    #[error("DALOS_AGENT_PORT must be a port number, got `{0}`")]
    InvalidPort(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address of the ledger service. Opaque to everything except the submission client.
    pub endpoint: Option<String>,
    pub submission: SubmissionSettings,
    pub agent: AgentSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubmissionSettings {
    /// No timeout when absent, a hung request then stays pending until the process exits.
    pub timeout_secs: Option<u64>,
    pub retry: RetryPolicy,
}

impl SubmissionSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Settings for the background agent. Commands are argument vectors with `{title}`, `{body}`,
/// `{exe}` and `{pid}` placeholders.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub port: u16,
    pub open_command: Vec<String>,
    pub focus_command: Vec<String>,
    pub notify_command: Vec<String>,
    pub reminder_delay_secs: u64,
}

fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|v| v.to_string()).collect()
}

struct PlatformCommands {
    open: Vec<String>,
    focus: Vec<String>,
    notify: Vec<String>,
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "macos")] {
        fn platform_commands() -> PlatformCommands {
            PlatformCommands {
                open: to_args(&["open", "-a", "Terminal", "{exe}"]),
                focus: to_args(&["osascript", "-e", "tell application \"Terminal\" to activate"]),
                notify: to_args(&[
                    "osascript",
                    "-e",
                    "display notification \"{body}\" with title \"{title}\"",
                ]),
            }
        }
    } else if #[cfg(windows)] {
        fn platform_commands() -> PlatformCommands {
            PlatformCommands {
                open: to_args(&["cmd", "/C", "start", "{title}", "{exe}"]),
                focus: to_args(&[
                    "powershell",
                    "-NoProfile",
                    "-Command",
                    "(New-Object -ComObject WScript.Shell).AppActivate({pid})",
                ]),
                notify: to_args(&["msg", "*", "{title}: {body}"]),
            }
        }
    } else {
        fn platform_commands() -> PlatformCommands {
            PlatformCommands {
                open: to_args(&["x-terminal-emulator", "-T", "{title}", "-e", "{exe}"]),
                // `{title}` carries the pid, so the window of that exact process is raised.
                focus: to_args(&["wmctrl", "-a", "{title}"]),
                // `--wait` keeps notify-send alive until the notification is acted on, it then
                // prints the action name.
                notify: to_args(&[
                    "notify-send",
                    "--wait",
                    "--app-name=dalos",
                    "--action=default=Open",
                    "{title}",
                    "{body}",
                ]),
            }
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        let commands = platform_commands();
        Self {
            port: DEFAULT_AGENT_PORT,
            open_command: commands.open,
            focus_command: commands.focus,
            notify_command: commands.notify,
            reminder_delay_secs: DEFAULT_REMINDER_DELAY_SECS,
        }
    }
}

impl AgentSettings {
    pub fn reminder_delay(&self) -> Duration {
        Duration::from_secs(self.reminder_delay_secs)
    }
}

impl AppConfig {
    /// Reads the config file. A missing file is not an error, defaults are used instead.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config file at {path:?}, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Full load: file, then environment, then the `--endpoint` flag. A configured endpoint must
    /// be valid even for commands that never submit.
    pub fn load(path: &Path, endpoint: Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        if let Some(endpoint) = endpoint {
            config.endpoint = Some(endpoint);
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks the endpoint if one is set. A missing endpoint is reported only when submitting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.endpoint_url() {
            Err(ConfigError::MissingEndpoint) => Ok(()),
            result => result.map(|_| ()),
        }
    }

    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|v| !v.trim().is_empty()) {
            self.endpoint = Some(endpoint);
        }
        if let Some(port) = lookup(AGENT_PORT_ENV) {
            self.agent.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }
        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingEndpoint)?;
        let url = Url::parse(raw).map_err(|_| ConfigError::InvalidEndpoint(raw.to_owned()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint(raw.to_owned()));
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, fs};

    use anyhow::Result;
    use tempfile::tempdir;

    use super::{AppConfig, ConfigError, AGENT_PORT_ENV, CONFIG_FILE_NAME, ENDPOINT_ENV};

    #[test]
    fn missing_file_gives_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::from_file(&dir.path().join(CONFIG_FILE_NAME))?;

        assert!(config.endpoint.is_none());
        assert_eq!(config.submission.retry.attempts(), 1);
        assert!(config.submission.timeout().is_none());
        assert_eq!(config.agent.reminder_delay_secs, 6 * 60 * 60);
        assert!(matches!(
            config.endpoint_url(),
            Err(ConfigError::MissingEndpoint)
        ));
        Ok(())
    }

    #[test]
    fn reads_nested_sections() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"
endpoint = "https://ledger.example.com/exec"

[submission]
timeout_secs = 15

[submission.retry]
max_attempts = 4

[agent]
port = 50000
reminder_delay_secs = 60
"#,
        )?;

        let config = AppConfig::from_file(&path)?;

        assert_eq!(
            config.endpoint_url()?.as_str(),
            "https://ledger.example.com/exec"
        );
        assert_eq!(config.submission.timeout_secs, Some(15));
        assert_eq!(config.submission.retry.max_attempts, 4);
        assert_eq!(config.submission.retry.initial_backoff_ms, 500);
        assert_eq!(config.agent.port, 50000);
        assert!(!config.agent.notify_command.is_empty());
        Ok(())
    }

    #[test]
    fn invalid_toml_is_reported() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "endpoint = ")?;

        assert!(matches!(
            AppConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        Ok(())
    }

    #[test]
    fn environment_wins_over_file() -> Result<()> {
        let mut config = AppConfig {
            endpoint: Some("https://old.example.com".into()),
            ..Default::default()
        };
        let env = HashMap::from([
            (ENDPOINT_ENV, "http://localhost:8080/exec"),
            (AGENT_PORT_ENV, "41000"),
        ]);

        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))?;

        assert_eq!(config.endpoint_url()?.as_str(), "http://localhost:8080/exec");
        assert_eq!(config.agent.port, 41000);
        Ok(())
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(|key| {
            (key == AGENT_PORT_ENV).then(|| "not-a-port".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidPort(_))));

        for endpoint in ["relative/path", "ftp://ledger.example.com", "   "] {
            let config = AppConfig {
                endpoint: Some(endpoint.into()),
                ..Default::default()
            };
            assert!(config.endpoint_url().is_err(), "{endpoint} should be rejected");
        }
    }

    #[test]
    fn malformed_endpoint_fails_load() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "endpoint = \"ledger.example.com/exec\"\n")?;

        assert!(matches!(
            AppConfig::load(&path, None),
            Err(ConfigError::InvalidEndpoint(_))
        ));
        // The flag replaces the broken value before it is checked.
        let config = AppConfig::load(&path, Some("https://ledger.example.com/exec".into()))?;
        assert_eq!(
            config.endpoint_url()?.as_str(),
            "https://ledger.example.com/exec"
        );
        Ok(())
    }

    #[test]
    fn missing_endpoint_passes_validation() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load(&dir.path().join(CONFIG_FILE_NAME), None)?;

        assert!(config.validate().is_ok());
        assert!(matches!(
            config.endpoint_url(),
            Err(ConfigError::MissingEndpoint)
        ));
        Ok(())
    }
}
