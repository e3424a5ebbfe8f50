//! Configuration types and loading.
//!
//! Config is loaded from an optional JSON file (e.g. `~/.synorelay/config.json`) and the
//! environment. Environment variables override file values; the merged result is resolved
//! once at startup into [`Settings`], which is what the relay and its clients consume.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const ENV_CHAT_BASE_URL: &str = "SYNOLOGY_CHAT_BASE_URL";
pub const ENV_CHAT_OUTGOING_TOKEN: &str = "SYNOLOGY_CHAT_OUTGOING_TOKEN";
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_ANTHROPIC_MODEL: &str = "ANTHROPIC_MODEL";
pub const ENV_ANTHROPIC_BASE_URL: &str = "ANTHROPIC_BASE_URL";
pub const ENV_ANTHROPIC_MAX_TOKENS: &str = "ANTHROPIC_MAX_TOKENS";
pub const ENV_PORT: &str = "PORT";
pub const ENV_BIND: &str = "RELAY_BIND";

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20240620";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Top-level application config (file shape; every field optional).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Synology Chat settings.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Anthropic settings.
    #[serde(default)]
    pub ai: AiConfig,
}

/// Listener bind address and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Port for the webhook endpoint (default 8080). Overridden by PORT env.
    #[serde(default = "default_relay_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"). Overridden by RELAY_BIND env.
    #[serde(default = "default_relay_bind")]
    pub bind: String,
}

fn default_relay_port() -> u16 {
    8080
}

fn default_relay_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: default_relay_port(),
            bind: default_relay_bind(),
        }
    }
}

/// Synology Chat config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// NAS base URL, e.g. `https://nas.example.com:5001`. Overridden by SYNOLOGY_CHAT_BASE_URL.
    pub base_url: Option<String>,
    /// Token issued by the chat integration. Checked against inbound webhooks and sent with
    /// outbound posts. Overridden by SYNOLOGY_CHAT_OUTGOING_TOKEN.
    pub outgoing_token: Option<String>,
}

/// Anthropic config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// API root without the `/v1/messages` suffix.
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
}

/// Fully resolved, immutable runtime settings. Built once at startup and passed explicitly.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind: String,
    pub port: u16,
    pub chat_base_url: String,
    pub outgoing_token: String,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub anthropic_base_url: String,
    pub max_tokens: u32,
}

impl Settings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("chat_base_url", &self.chat_base_url)
            .field("outgoing_token", &"<redacted>")
            .field("anthropic_api_key", &"<redacted>")
            .field("anthropic_model", &self.anthropic_model)
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Pick the env value when set and non-blank, otherwise the file value when non-blank.
fn env_or_config<F>(env: &F, key: &str, from_config: Option<&String>) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            from_config
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

fn required<F>(env: &F, key: &str, from_config: Option<&String>) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    env_or_config(env, key, from_config)
        .with_context(|| format!("{} environment variable is not set", key))
}

/// Resolve settings from config and the process environment.
pub fn resolve_settings(config: &Config) -> Result<Settings> {
    resolve_settings_with(config, |key| std::env::var(key).ok())
}

/// Resolve settings from config and an arbitrary env lookup. Fails on the first missing
/// required value (chat base URL, outgoing token, API key) or an unparsable number.
pub fn resolve_settings_with<F>(config: &Config, env: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let chat_base_url = required(&env, ENV_CHAT_BASE_URL, config.chat.base_url.as_ref())?;
    let outgoing_token = required(
        &env,
        ENV_CHAT_OUTGOING_TOKEN,
        config.chat.outgoing_token.as_ref(),
    )?;
    let anthropic_api_key = required(&env, ENV_ANTHROPIC_API_KEY, config.ai.api_key.as_ref())?;

    let anthropic_model = env_or_config(&env, ENV_ANTHROPIC_MODEL, config.ai.model.as_ref())
        .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());
    let anthropic_base_url =
        env_or_config(&env, ENV_ANTHROPIC_BASE_URL, config.ai.base_url.as_ref())
            .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.to_string());

    let max_tokens = match env_or_config(&env, ENV_ANTHROPIC_MAX_TOKENS, None) {
        Some(s) => s
            .parse::<u32>()
            .with_context(|| format!("{} must be a positive integer, got {:?}", ENV_ANTHROPIC_MAX_TOKENS, s))?,
        None => config.ai.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    };
    if max_tokens == 0 {
        anyhow::bail!("{} must be greater than zero", ENV_ANTHROPIC_MAX_TOKENS);
    }

    let port = match env_or_config(&env, ENV_PORT, None) {
        Some(s) => s
            .parse::<u16>()
            .with_context(|| format!("{} must be a port number, got {:?}", ENV_PORT, s))?,
        None => config.relay.port,
    };
    let bind = env_or_config(&env, ENV_BIND, Some(&config.relay.bind))
        .unwrap_or_else(default_relay_bind);

    Ok(Settings {
        bind,
        port,
        chat_base_url,
        outgoing_token,
        anthropic_api_key,
        anthropic_model,
        anthropic_base_url,
        max_tokens,
    })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("SYNORELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".synorelay").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default). Missing file => default config, so a
/// purely env-configured deployment needs no file at all.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_CHAT_BASE_URL, "https://nas.local:5001"),
            (ENV_CHAT_OUTGOING_TOKEN, "T"),
            (ENV_ANTHROPIC_API_KEY, "sk-test"),
        ]
    }

    #[test]
    fn default_relay_port_and_bind() {
        let r = RelayConfig::default();
        assert_eq!(r.port, 8080);
        assert_eq!(r.bind, "0.0.0.0");
    }

    #[test]
    fn resolves_defaults_from_required_env_only() {
        let settings = resolve_settings_with(&Config::default(), env_from(&required_env())).unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.bind_addr(), "0.0.0.0:8080");
        assert_eq!(settings.outgoing_token, "T");
        assert_eq!(settings.anthropic_model, DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(settings.anthropic_base_url, DEFAULT_ANTHROPIC_BASE_URL);
        assert_eq!(settings.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn missing_required_value_names_the_variable() {
        for missing in [ENV_CHAT_BASE_URL, ENV_CHAT_OUTGOING_TOKEN, ENV_ANTHROPIC_API_KEY] {
            let env: Vec<_> = required_env()
                .into_iter()
                .filter(|(k, _)| *k != missing)
                .collect();
            let err = resolve_settings_with(&Config::default(), env_from(&env)).unwrap_err();
            assert!(err.to_string().contains(missing), "{}", err);
        }
    }

    #[test]
    fn blank_env_value_counts_as_missing() {
        let mut env = required_env();
        // Later pairs win in the lookup map.
        env.push((ENV_ANTHROPIC_API_KEY, "   "));
        assert!(resolve_settings_with(&Config::default(), env_from(&env)).is_err());
    }

    #[test]
    fn env_overrides_config_file() {
        let mut config = Config::default();
        config.chat.base_url = Some("https://from-file".to_string());
        config.chat.outgoing_token = Some("file-token".to_string());
        config.ai.api_key = Some("file-key".to_string());
        config.ai.model = Some("file-model".to_string());
        config.relay.port = 9000;

        let from_file = resolve_settings_with(&config, env_from(&[])).unwrap();
        assert_eq!(from_file.chat_base_url, "https://from-file");
        assert_eq!(from_file.anthropic_model, "file-model");
        assert_eq!(from_file.port, 9000);

        let mut env = required_env();
        env.push((ENV_ANTHROPIC_MODEL, "claude-test"));
        env.push((ENV_PORT, "9191"));
        let from_env = resolve_settings_with(&config, env_from(&env)).unwrap();
        assert_eq!(from_env.chat_base_url, "https://nas.local:5001");
        assert_eq!(from_env.outgoing_token, "T");
        assert_eq!(from_env.anthropic_model, "claude-test");
        assert_eq!(from_env.port, 9191);
    }

    #[test]
    fn outgoing_token_is_trimmed() {
        let mut env = required_env();
        env.push((ENV_CHAT_OUTGOING_TOKEN, "  T\n"));
        let settings = resolve_settings_with(&Config::default(), env_from(&env)).unwrap();
        assert_eq!(settings.outgoing_token, "T");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut env = required_env();
        env.push((ENV_PORT, "eighty"));
        let err = resolve_settings_with(&Config::default(), env_from(&env)).unwrap_err();
        assert!(err.to_string().contains(ENV_PORT));
    }

    #[test]
    fn debug_redacts_secrets() {
        let settings = resolve_settings_with(&Config::default(), env_from(&required_env())).unwrap();
        let dbg = format!("{:?}", settings);
        assert!(!dbg.contains("sk-test"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn parses_camel_case_config_file() {
        let config: Config = serde_json::from_str(
            r#"{"relay":{"port":9001},"chat":{"baseUrl":"https://nas","outgoingToken":"x"},"ai":{"apiKey":"k","maxTokens":256}}"#,
        )
        .unwrap();
        assert_eq!(config.relay.port, 9001);
        assert_eq!(config.relay.bind, "0.0.0.0");
        assert_eq!(config.chat.outgoing_token.as_deref(), Some("x"));
        assert_eq!(config.ai.max_tokens, Some(256));
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("synorelay-missing-{}.json", uuid::Uuid::new_v4()));
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.relay.port, 8080);
        assert!(config.chat.base_url.is_none());
    }
}
