use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub quotes: QuotesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    #[serde(default)]
    pub signing_secret: String,
    #[serde(default)]
    pub bot_token: String,
    /// Display name used for posted messages
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_slack_api_base_url")]
    pub api_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuotesConfig {
    #[serde(default = "default_quotes_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_username() -> String {
    "Market Bot".to_string()
}

fn default_slack_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_quotes_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            signing_secret: String::new(),
            bot_token: String::new(),
            username: default_username(),
            api_base_url: default_slack_api_base_url(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for QuotesConfig {
    fn default() -> Self {
        Self {
            base_url: default_quotes_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load from an optional TOML file, apply environment overrides, validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// SLACK_SIGNING_SECRET, SLACK_BOT_TOKEN and PORT take precedence over the file.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = var("SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = secret;
        }
        if let Some(token) = var("SLACK_BOT_TOKEN") {
            self.slack.bot_token = token;
        }
        if let Some(port) = var("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value: {:?}", port))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.slack.signing_secret.trim().is_empty() {
            bail!("Missing Slack signing secret (set SLACK_SIGNING_SECRET or [slack] signing_secret)");
        }
        if self.slack.bot_token.trim().is_empty() {
            bail!("Missing Slack bot token (set SLACK_BOT_TOKEN or [slack] bot_token)");
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.slack.username, "Market Bot");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.quotes.timeout_secs, 10);
        assert_eq!(config.listen_addr(), "0.0.0.0:5000");
    }

    #[test]
    fn test_parse_full_file() {
        let config = Config::parse(
            r#"
[slack]
signing_secret = "s3cret"
bot_token = "xoxb-1"
username = "Ticker"

[server]
host = "127.0.0.1"
port = 8080

[quotes]
base_url = "http://localhost:9000"
timeout_secs = 3
"#,
        )
        .unwrap();
        assert_eq!(config.slack.signing_secret, "s3cret");
        assert_eq!(config.slack.username, "Ticker");
        assert_eq!(config.slack.api_base_url, "https://slack.com/api");
        assert_eq!(config.listen_addr(), "127.0.0.1:8080");
        assert_eq!(config.quotes.base_url, "http://localhost:9000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::parse("[slack]\nbot_token = \"from-file\"\n").unwrap();
        config
            .apply_env(env(&[
                ("SLACK_SIGNING_SECRET", "env-secret"),
                ("SLACK_BOT_TOKEN", "env-token"),
                ("PORT", "7000"),
            ]))
            .unwrap();
        assert_eq!(config.slack.signing_secret, "env-secret");
        assert_eq!(config.slack.bot_token, "env-token");
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[("PORT", "http")])).is_err());
    }

    #[test]
    fn test_missing_credentials_fail_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.slack.signing_secret = "secret".to_string();
        assert!(config.validate().is_err());

        config.slack.bot_token = "xoxb".to_string();
        assert!(config.validate().is_ok());
    }
}
