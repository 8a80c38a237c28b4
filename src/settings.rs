//! Service settings for truthgate.
//!
//! Settings are read from a YAML file. Every field has a default, so an
//! empty file (or no file at all) yields a working configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level settings document.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Settings {
    /// Path of the persisted state document (default: platform data dir)
    #[serde(default)]
    pub state_path: Option<PathBuf>,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub audit: AuditSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub admin: AdminSettings,
}

impl Settings {
    /// Parse settings from a YAML file. A relative `state_path` is taken
    /// relative to the directory holding the file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut settings = Self::parse_str(&content)?;
        if let (Some(state), Some(dir)) = (&settings.state_path, path.parent()) {
            if state.is_relative() && !dir.as_os_str().is_empty() {
                settings.state_path = Some(dir.join(state));
            }
        }
        Ok(settings)
    }

    /// Parse settings from a YAML string. An empty document yields defaults.
    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Returns the state document path, falling back to the platform data dir
    /// and finally the working directory.
    pub fn resolved_state_path(&self) -> PathBuf {
        if let Some(path) = &self.state_path {
            return path.clone();
        }
        ProjectDirs::from("", "", "truthgate")
            .map(|dirs| dirs.data_dir().join(DEFAULT_STATE_FILE))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
    }
}

/// File name of the state document when no path is configured.
pub const DEFAULT_STATE_FILE: &str = "truthgate_state.json";

/// A bundled settings file written by `truthgate init`.
#[derive(Debug)]
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    pub content: &'static str,
}

pub const DEFAULT_TEMPLATE: &str = "default";

pub static TEMPLATES: &[Template] = &[
    Template {
        name: DEFAULT_TEMPLATE,
        description: "Hosted OpenAI engine, state in the platform data directory",
        content: include_str!("templates/default.yaml"),
    },
    Template {
        name: "local",
        description: "Local Ollama engine, state next to the settings file",
        content: include_str!("templates/local.yaml"),
    },
];

pub fn template(name: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.name == name)
}

/// Settings for the external analysis engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    /// Base URL of an OpenAI-compatible API (default: https://api.openai.com/v1)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model identifier (default: gpt-4o-mini)
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key (default: OPENAI_API_KEY)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Hard bound on a single engine call in milliseconds (default: 30000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Completion token limit (default: 4096)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_ms: default_timeout_ms(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl EngineSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Settings for the audit trail.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditSettings {
    /// Maximum retained entries (default: 200)
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Maximum stored characters of submitted content (default: 200)
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

fn default_capacity() -> usize {
    200
}

fn default_excerpt_chars() -> usize {
    200
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

/// Settings for the HTTP service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    /// Listen address (default: 127.0.0.1:5000)
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Settings for the admin check.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminSettings {
    /// Environment variable holding the shared admin secret
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
}

fn default_secret_env() -> String {
    "TRUTHGATE_ADMIN_KEY".to_string()
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            secret_env: default_secret_env(),
        }
    }
}

impl AdminSettings {
    /// Read the shared secret. An unset or blank variable disables admin access.
    pub fn secret(&self) -> Option<String> {
        std::env::var(&self.secret_env)
            .ok()
            .filter(|s| !s.trim().is_empty())
    }
}

/// Validate settings for correctness.
pub fn validate(settings: &Settings) -> anyhow::Result<()> {
    let engine = &settings.engine;
    if engine.model.trim().is_empty() {
        anyhow::bail!("engine.model must not be empty");
    }
    if engine.timeout_ms == 0 {
        anyhow::bail!("engine.timeout_ms must be greater than zero");
    }
    if !(engine.base_url.starts_with("http://") || engine.base_url.starts_with("https://")) {
        anyhow::bail!(
            "invalid engine.base_url {:?}, must start with http:// or https://",
            engine.base_url
        );
    }

    if settings.audit.capacity == 0 {
        anyhow::bail!("audit.capacity must be greater than zero");
    }
    if settings.audit.excerpt_chars == 0 {
        anyhow::bail!("audit.excerpt_chars must be greater than zero");
    }

    settings
        .server
        .bind
        .parse::<std::net::SocketAddr>()
        .map_err(|e| anyhow::anyhow!("invalid server.bind {:?}: {}", settings.server.bind, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings() {
        let yaml = r#"
state_path: /tmp/state.json
engine:
  model: "gpt-4o"
  timeout_ms: 5000
audit:
  capacity: 50
"#;
        let settings = Settings::parse_str(yaml).unwrap();
        assert_eq!(settings.engine.model, "gpt-4o");
        assert_eq!(settings.engine.timeout(), Duration::from_millis(5000));
        assert_eq!(settings.engine.base_url, "https://api.openai.com/v1");
        assert_eq!(settings.audit.capacity, 50);
        assert_eq!(settings.audit.excerpt_chars, 200);
        assert_eq!(settings.resolved_state_path(), PathBuf::from("/tmp/state.json"));
        assert!(validate(&settings).is_ok());
    }

    #[test]
    fn test_relative_state_path_follows_settings_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("truthgate.yaml");
        fs::write(&path, template("local").unwrap().content).unwrap();

        let settings = Settings::parse_file(&path).unwrap();
        assert_eq!(settings.resolved_state_path(), dir.path().join(DEFAULT_STATE_FILE));
        assert_eq!(settings.engine.model, "llama3.2");

        fs::write(&path, "state_path: /srv/truthgate/state.json\n").unwrap();
        let settings = Settings::parse_file(&path).unwrap();
        assert_eq!(settings.resolved_state_path(), PathBuf::from("/srv/truthgate/state.json"));
    }

    #[test]
    fn test_templates_parse_and_validate() {
        assert!(template(DEFAULT_TEMPLATE).is_some());
        assert!(template("cloud").is_none());
        for t in TEMPLATES {
            let settings = Settings::parse_str(t.content)
                .unwrap_or_else(|e| panic!("template {} invalid: {}", t.name, e));
            assert!(validate(&settings).is_ok(), "template {}", t.name);
        }
    }

    #[test]
    fn test_empty_settings_are_defaults() {
        let settings = Settings::parse_str("").unwrap();
        assert_eq!(settings.server.bind, "127.0.0.1:5000");
        assert_eq!(settings.admin.secret_env, "TRUTHGATE_ADMIN_KEY");
        assert!(validate(&settings).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.audit.capacity = 0;
        assert!(validate(&settings).is_err());

        let mut settings = Settings::default();
        settings.engine.base_url = "ftp://example".to_string();
        assert!(validate(&settings).is_err());

        let mut settings = Settings::default();
        settings.server.bind = "not an address".to_string();
        assert!(validate(&settings).is_err());
    }
}
