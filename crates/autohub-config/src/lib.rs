//! Shared configuration for automation hub tools.
//!
//! TOML profiles, token resolution (env var + plaintext), logging setup,
//! and translation to `autohub_core::HubConfig`.

mod logging;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use autohub_core::{HubConfig, ReconnectConfig, TlsVerification};

pub use logging::{LogConfig, init_tracing, verbosity_level};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}'")]
    UnknownProfile { profile: String },

    #[error("profile '{profile}' reads its token from ${var}, which is not set")]
    MissingToken { profile: String, var: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Log output settings.
    #[serde(default)]
    pub logging: LogConfig,

    /// Named hub profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            logging: LogConfig::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_true")]
    pub live_updates: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout: default_timeout(),
            live_updates: true,
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

/// A named hub profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// API root (e.g., "http://hub.local:8002/api/").
    pub hub_url: String,

    /// Project identifier.
    pub project: String,

    /// Editor plugin address (e.g., "http://localhost:8090").
    pub editor_url: Option<String>,

    /// Access token (plaintext, prefer `api_token_env`).
    pub api_token: Option<String>,

    /// Environment variable name containing the access token.
    pub api_token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Override live status updates.
    pub live_updates: Option<bool>,

    /// Reconnect policy for live updates.
    #[serde(default)]
    pub reconnect: ReconnectSettings,
}

/// `[profiles.<name>.reconnect]`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Consecutive failures before giving up; absent means forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_retries: None,
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    30_000
}

impl ReconnectSettings {
    fn to_reconnect_config(&self) -> Option<ReconnectConfig> {
        self.enabled.then(|| ReconnectConfig {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_retries: self.max_retries,
        })
    }
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }

    /// Check every profile for malformed values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, profile) in &self.profiles {
            profile.validate(name)?;
        }
        Ok(())
    }
}

impl Profile {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        parse_url(&self.hub_url, &format!("profiles.{name}.hub_url"))?;
        if let Some(ref editor) = self.editor_url {
            parse_url(editor, &format!("profiles.{name}.editor_url"))?;
        }
        if self.project.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: format!("profiles.{name}.project"),
                reason: "must not be empty".into(),
            });
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConfigError::Validation {
                field: format!("profiles.{name}.reconnect"),
                reason: "initial_delay_ms exceeds max_delay_ms".into(),
            });
        }
        Ok(())
    }
}

fn parse_url(raw: &str, field: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "autohub", "autohub").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("autohub");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path`, layered as defaults → file → `AUTOHUB_*`
/// environment (nested keys separated by `__`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("AUTOHUB_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution ────────────────────────────────────────────────

/// Resolve the access token: the env var named by `api_token_env`, then
/// plaintext. Hubs without auth need neither, so absence is `Ok(None)`.
pub fn resolve_token(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<SecretString>, ConfigError> {
    resolve_token_with(profile, profile_name, |var| std::env::var(var).ok())
}

fn resolve_token_with(
    profile: &Profile,
    profile_name: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<SecretString>, ConfigError> {
    // 1. Profile's api_token_env → env var lookup
    if let Some(ref var) = profile.api_token_env {
        if let Some(val) = lookup(var) {
            return Ok(Some(SecretString::from(val)));
        }
        if profile.api_token.is_none() {
            return Err(ConfigError::MissingToken {
                profile: profile_name.into(),
                var: var.clone(),
            });
        }
    }

    // 2. Plaintext in config
    Ok(profile.api_token.clone().map(SecretString::from))
}

// ── HubConfig translation ───────────────────────────────────────────

/// Build a `HubConfig` from a profile plus global defaults.
pub fn profile_to_hub_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<HubConfig, ConfigError> {
    let token = resolve_token(profile, profile_name)?;
    build_hub_config(profile, profile_name, defaults, token)
}

fn build_hub_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    api_token: Option<SecretString>,
) -> Result<HubConfig, ConfigError> {
    profile.validate(profile_name)?;
    let url = parse_url(&profile.hub_url, "hub_url")?;
    let editor_url = profile
        .editor_url
        .as_deref()
        .map(|raw| parse_url(raw, "editor_url"))
        .transpose()?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut config = HubConfig::new(url, profile.project.clone());
    config.editor_url = editor_url;
    config.api_token = api_token;
    config.tls = tls;
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.live_updates = profile.live_updates.unwrap_or(defaults.live_updates);
    config.reconnect = profile.reconnect.to_reconnect_config();
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    const SAMPLE: &str = r#"
default_profile = "lab"

[defaults]
timeout = 10

[profiles.lab]
hub_url = "http://hub.lab:8002/api/"
project = "game"
editor_url = "http://localhost:8090"
api_token = "plain"
insecure = true

[profiles.lab.reconnect]
initial_delay_ms = 500
max_retries = 5

[profiles.ci]
hub_url = "https://hub.ci/api/"
project = "game"
live_updates = false

[profiles.ci.reconnect]
enabled = false
"#;

    fn write_sample(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_profiles_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&write_sample(&dir, SAMPLE)).unwrap();

        assert_eq!(config.defaults.timeout, 10);
        assert!(config.defaults.live_updates);
        assert_eq!(config.logging.level, "info");

        let (name, lab) = config.profile(None).unwrap();
        assert_eq!(name, "lab");
        assert_eq!(lab.project, "game");
        assert_eq!(lab.reconnect.initial_delay_ms, 500);
        assert_eq!(lab.reconnect.max_delay_ms, 30_000);
        assert_eq!(lab.reconnect.max_retries, Some(5));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert!(config.profiles.is_empty());
        assert!(matches!(
            config.profile(None),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn rejects_invalid_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(
            &dir,
            "[profiles.bad]\nhub_url = \"not a url\"\nproject = \"p\"\n",
        );
        let err = load_config_from(&path).unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "profiles.bad.hub_url"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn rejects_inverted_backoff() {
        let profile = Profile {
            hub_url: "http://hub/api/".into(),
            project: "p".into(),
            reconnect: ReconnectSettings {
                initial_delay_ms: 10_000,
                max_delay_ms: 1_000,
                ..ReconnectSettings::default()
            },
            ..Profile::default()
        };
        assert!(profile.validate("x").is_err());
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let original = load_config_from(&write_sample(&dir, SAMPLE)).unwrap();

        let saved = dir.path().join("nested").join("saved.toml");
        save_config_to(&original, &saved).unwrap();
        let reloaded = load_config_from(&saved).unwrap();

        assert_eq!(reloaded.default_profile, original.default_profile);
        let mut names: Vec<_> = reloaded.profiles.keys().cloned().collect();
        names.sort();
        assert_eq!(names, vec!["ci", "lab"]);
    }

    #[test]
    fn token_prefers_env_then_plaintext() {
        let mut profile = Profile {
            api_token: Some("plain".into()),
            api_token_env: Some("HUB_TOKEN".into()),
            ..Profile::default()
        };

        let from_env = resolve_token_with(&profile, "lab", |_| Some("from-env".into()))
            .unwrap()
            .unwrap();
        assert_eq!(from_env.expose_secret(), "from-env");

        let fallback = resolve_token_with(&profile, "lab", |_| None).unwrap().unwrap();
        assert_eq!(fallback.expose_secret(), "plain");

        profile.api_token = None;
        let err = resolve_token_with(&profile, "lab", |_| None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "profile 'lab' reads its token from $HUB_TOKEN, which is not set"
        );

        profile.api_token_env = None;
        assert!(resolve_token_with(&profile, "lab", |_| None).unwrap().is_none());
    }

    #[test]
    fn profile_translates_to_hub_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&write_sample(&dir, SAMPLE)).unwrap();

        let (name, lab) = config.profile(Some("lab")).unwrap();
        let hub = build_hub_config(lab, name, &config.defaults, None).unwrap();
        assert_eq!(hub.url.as_str(), "http://hub.lab:8002/api/");
        assert_eq!(hub.editor_url.unwrap().as_str(), "http://localhost:8090/");
        assert_eq!(hub.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(hub.timeout, Duration::from_secs(10));
        assert!(hub.live_updates);
        let reconnect = hub.reconnect.unwrap();
        assert_eq!(reconnect.initial_delay, Duration::from_millis(500));
        assert_eq!(reconnect.max_retries, Some(5));

        let (name, ci) = config.profile(Some("ci")).unwrap();
        let hub = build_hub_config(ci, name, &config.defaults, None).unwrap();
        assert_eq!(hub.tls, TlsVerification::SystemDefaults);
        assert!(!hub.live_updates);
        assert!(hub.reconnect.is_none());
        assert!(hub.editor_url.is_none());
    }
}
