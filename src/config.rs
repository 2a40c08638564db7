use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Environment variable holding the Discord bot token.
pub const DISCORD_TOKEN_VAR: &str = "DISCORD_TOKEN";
/// Environment variable holding the Giphy API key.
pub const GIPHY_TOKEN_VAR: &str = "GIPHY_TOKEN";
/// Overrides the location of the `.env` credentials file.
pub const ENV_FILE_VAR: &str = "GIFBOT_ENV_FILE";

/// What the bot replies when Giphy has no GIF for the requested tag.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptyResultPolicy {
    /// Relay the empty URL as-is.
    #[default]
    Send,
    /// Stay quiet.
    Skip,
    /// Reply with `no_results_message`.
    Notice,
}

impl fmt::Display for EmptyResultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyResultPolicy::Send => write!(f, "send"),
            EmptyResultPolicy::Skip => write!(f, "skip"),
            EmptyResultPolicy::Notice => write!(f, "notice"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    #[serde(default = "default_command")]
    pub command: String,
    /// Shown as the bot's "Playing ..." activity.
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub on_empty: EmptyResultPolicy,
    #[serde(default = "default_no_results_message")]
    pub no_results_message: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            status: default_status(),
            on_empty: EmptyResultPolicy::default(),
            no_results_message: default_no_results_message(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GiphyConfig {
    #[serde(default = "default_giphy_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GiphyConfig {
    fn default() -> Self {
        Self {
            base_url: default_giphy_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GiphyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Non-secret settings, read from the optional TOML file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub giphy: GiphyConfig,
}

fn default_command() -> String {
    "!search".to_string()
}

fn default_status() -> String {
    "!search < keyword >".to_string()
}

fn default_no_results_message() -> String {
    "No GIF found for that tag.".to_string()
}

fn default_giphy_base_url() -> String {
    "https://api.giphy.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Settings {
    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content).context("Failed to parse settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid settings file: {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        let command = &self.bot.command;
        if command.is_empty() || command.chars().any(char::is_whitespace) {
            anyhow::bail!(
                "bot.command must be a single non-empty word, got {:?}",
                command
            );
        }
        if self.giphy.timeout_secs == 0 {
            anyhow::bail!("giphy.timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

/// API credentials. Never printed: `Debug` redacts both tokens.
#[derive(Clone, Default)]
pub struct Credentials {
    pub discord_token: String,
    pub giphy_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("discord_token", &"[REDACTED]")
            .field("giphy_token", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Reads both tokens through `lookup`. A missing token is only warned
    /// about; Discord or Giphy will reject the empty value later.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => value,
            _ => {
                warn!("{} is not set", name);
                String::new()
            }
        };

        Self {
            discord_token: read(DISCORD_TOKEN_VAR),
            giphy_token: read(GIPHY_TOKEN_VAR),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub bot: BotConfig,
    pub giphy: GiphyConfig,
}

impl Config {
    pub fn new(settings: Settings, credentials: Credentials) -> Self {
        Self {
            credentials,
            bot: settings.bot,
            giphy: settings.giphy,
        }
    }

    /// Loads credentials from `env_file` into the process environment and
    /// combines them with the settings file, if any. Called once at startup.
    pub fn load(env_file: &Path, settings_path: Option<&Path>) -> Result<Self> {
        dotenvy::from_path(env_file)
            .with_context(|| format!("Failed to load environment file: {}", env_file.display()))?;

        let settings = match settings_path {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        let credentials = Credentials::from_lookup(|name| std::env::var(name).ok());
        Ok(Self::new(settings, credentials))
    }
}

/// Picks the settings file: an explicit path wins, otherwise `config.toml`
/// is used when it exists.
pub fn resolve_settings_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let fallback = PathBuf::from("config.toml");
        fallback.exists().then_some(fallback)
    })
}

/// `.env` unless overridden through `GIFBOT_ENV_FILE`.
pub fn resolve_env_file() -> PathBuf {
    std::env::var_os(ENV_FILE_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".env"))
}
