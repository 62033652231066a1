//! Multi-tier TOML configuration for Switchboard.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > config file > defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use switchboard_types::ConfigError;

/// The default Gemini API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// The default model to use.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Resolved configuration for a Switchboard process.
#[derive(Debug, Clone)]
pub struct SwitchboardConfig {
    pub api_key: String,
    pub model: String,
    pub api_base_url: String,
    pub config_dir: PathBuf,
    pub agent: AgentSettings,
    pub coordinator: CoordinatorSettings,
    pub specialists: Vec<SpecialistSettings>,
    pub memory: MemorySettings,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub coordinator: CoordinatorSettings,
    #[serde(default)]
    pub specialists: Vec<SpecialistSettings>,
    #[serde(default)]
    pub memory: MemoryFileSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Function-call loop settings shared by every agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_iterations: usize,
    pub model_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub enable_google_search: bool,
    pub thinking_model: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            model_timeout_secs: 120,
            tool_timeout_secs: 60,
            enable_google_search: false,
            thinking_model: false,
        }
    }
}

/// Identity of the user-facing agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    pub role: String,
    pub objective: String,
    pub context: String,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            role: "coordinator".into(),
            objective: "Help the user, handing the conversation to a specialist when one \
                        is better suited"
                .into(),
            context: String::new(),
        }
    }
}

/// One `[[specialists]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistSettings {
    pub role: String,
    pub objective: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub enable_google_search: bool,
}

/// Where chat memory is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryBackend {
    /// Process memory only, nothing persisted.
    #[default]
    None,
    /// In-process store with chat ids, lost on exit.
    Memory,
    /// One JSON file per chat under `dir`.
    File,
}

/// `[memory]` section as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryFileSettings {
    pub backend: MemoryBackend,
    pub shared: bool,
    pub dir: Option<PathBuf>,
}

impl Default for MemoryFileSettings {
    fn default() -> Self {
        Self {
            backend: MemoryBackend::None,
            shared: true,
            dir: None,
        }
    }
}

/// Resolved memory settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySettings {
    pub backend: MemoryBackend,
    /// All sessions use one store instead of one store each.
    pub shared: bool,
    pub dir: PathBuf,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub memory_backend: Option<MemoryBackend>,
}

impl SwitchboardConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables
    /// 3. Config file (~/.switchboard/config.toml)
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let config_dir = config_dir();
        let settings = load_settings_file(&config_dir.join("config.toml"));
        Self::resolve(overrides, settings, config_dir, |key| std::env::var(key).ok())
    }

    fn resolve(
        overrides: CliOverrides,
        settings: SettingsFile,
        config_dir: PathBuf,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let api_key = overrides
            .api_key
            .or_else(|| env("GEMINI_API_KEY"))
            .or(settings.api.api_key)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingKey {
                key: "api_key (set GEMINI_API_KEY or add to ~/.switchboard/config.toml)".into(),
            })?;

        let model = overrides
            .model
            .or_else(|| env("SWITCHBOARD_MODEL"))
            .or(settings.api.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let api_base_url = env("GEMINI_API_BASE_URL")
            .or(settings.api.base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        if settings.agent.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                key: "agent.max_iterations".into(),
                message: "must be at least 1".into(),
            });
        }

        let mut specialists: Vec<SpecialistSettings> = Vec::new();
        for specialist in settings.specialists {
            if specialist.role.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "specialists.role".into(),
                    message: "must not be empty".into(),
                });
            }
            if specialist.role == settings.coordinator.role {
                return Err(ConfigError::InvalidValue {
                    key: "specialists.role".into(),
                    message: format!("'{}' is the coordinator's role", specialist.role),
                });
            }
            if let Some(pos) = specialists.iter().position(|s| s.role == specialist.role) {
                tracing::warn!(role = %specialist.role, "duplicate specialist, keeping the last definition");
                specialists.remove(pos);
            }
            specialists.push(specialist);
        }

        let memory = MemorySettings {
            backend: overrides.memory_backend.unwrap_or(settings.memory.backend),
            shared: settings.memory.shared,
            dir: settings
                .memory
                .dir
                .unwrap_or_else(|| config_dir.join("memory")),
        };

        Ok(SwitchboardConfig {
            api_key,
            model,
            api_base_url,
            config_dir,
            agent: settings.agent,
            coordinator: settings.coordinator,
            specialists,
            memory,
        })
    }
}

/// Get the Switchboard config directory path (~/.switchboard/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SWITCHBOARD_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".switchboard")
}

/// Load and parse a TOML settings file, returning defaults on any error.
fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve_with(
        overrides: CliOverrides,
        settings: SettingsFile,
        env: &[(&str, &str)],
    ) -> Result<SwitchboardConfig, ConfigError> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SwitchboardConfig::resolve(overrides, settings, PathBuf::from("/cfg"), |key| {
            env.get(key).cloned()
        })
    }

    #[test]
    fn test_default_settings() {
        let settings = SettingsFile::default();
        assert!(settings.api.api_key.is_none());
        assert_eq!(settings.agent.max_iterations, 10);
        assert_eq!(settings.memory.backend, MemoryBackend::None);
        assert!(settings.memory.shared);
        assert!(settings.specialists.is_empty());
    }

    #[test]
    fn test_settings_toml_parse() {
        let toml_str = r#"
[api]
model = "gemini-2.5-pro"

[agent]
max_iterations = 5
enable_google_search = true

[coordinator]
role = "front-desk"
objective = "Greet and route"

[[specialists]]
role = "billing"
objective = "Resolve billing questions"
context = "You handle invoices."

[[specialists]]
role = "travel"
objective = "Plan trips"
model = "gemini-2.5-pro"
enable_google_search = true

[memory]
backend = "file"
shared = false
"#;
        let settings: SettingsFile = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.api.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(settings.agent.max_iterations, 5);
        assert_eq!(settings.agent.tool_timeout_secs, 60);
        assert!(settings.agent.enable_google_search);
        assert_eq!(settings.coordinator.role, "front-desk");
        assert_eq!(settings.coordinator.context, "");
        assert_eq!(settings.specialists.len(), 2);
        assert_eq!(settings.specialists[0].model, None);
        assert_eq!(settings.specialists[1].model.as_deref(), Some("gemini-2.5-pro"));
        assert!(!settings.specialists[0].enable_google_search);
        assert!(settings.specialists[1].enable_google_search);
        assert_eq!(settings.memory.backend, MemoryBackend::File);
        assert!(!settings.memory.shared);
    }

    #[test]
    fn test_missing_api_key() {
        let err = resolve_with(CliOverrides::default(), SettingsFile::default(), &[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { .. }));
    }

    #[test]
    fn test_precedence() {
        let mut settings = SettingsFile::default();
        settings.api.api_key = Some("file-key".into());
        settings.api.model = Some("file-model".into());

        let config = resolve_with(CliOverrides::default(), settings.clone(), &[]).unwrap();
        assert_eq!(config.api_key, "file-key");
        assert_eq!(config.model, "file-model");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);

        let env = [
            ("GEMINI_API_KEY", "env-key"),
            ("SWITCHBOARD_MODEL", "env-model"),
            ("GEMINI_API_BASE_URL", "http://localhost:9999"),
        ];
        let config = resolve_with(CliOverrides::default(), settings.clone(), &env).unwrap();
        assert_eq!(config.api_key, "env-key");
        assert_eq!(config.model, "env-model");
        assert_eq!(config.api_base_url, "http://localhost:9999");

        let overrides = CliOverrides {
            model: Some("cli-model".into()),
            ..CliOverrides::default()
        };
        let config = resolve_with(overrides, settings, &env).unwrap();
        assert_eq!(config.model, "cli-model");
    }

    #[test]
    fn test_memory_dir_defaults_under_config_dir() {
        let mut settings = SettingsFile::default();
        settings.api.api_key = Some("k".into());
        let config = resolve_with(CliOverrides::default(), settings, &[]).unwrap();
        assert_eq!(config.memory.dir, PathBuf::from("/cfg/memory"));
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_cli_memory_backend_override() {
        let mut settings = SettingsFile::default();
        settings.api.api_key = Some("k".into());
        let overrides = CliOverrides {
            memory_backend: Some(MemoryBackend::Memory),
            ..CliOverrides::default()
        };
        let config = resolve_with(overrides, settings, &[]).unwrap();
        assert_eq!(config.memory.backend, MemoryBackend::Memory);
    }

    #[test]
    fn test_duplicate_specialists_keep_last() {
        let toml_str = r#"
[api]
api_key = "k"

[[specialists]]
role = "billing"
objective = "old"

[[specialists]]
role = "billing"
objective = "new"
"#;
        let settings: SettingsFile = toml::from_str(toml_str).unwrap();
        let config = resolve_with(CliOverrides::default(), settings, &[]).unwrap();
        assert_eq!(config.specialists.len(), 1);
        assert_eq!(config.specialists[0].objective, "new");
    }

    #[test]
    fn test_specialist_cannot_take_coordinator_role() {
        let mut settings = SettingsFile::default();
        settings.api.api_key = Some("k".into());
        settings.specialists.push(SpecialistSettings {
            role: "coordinator".into(),
            objective: "x".into(),
            context: String::new(),
            model: None,
            enable_google_search: false,
        });
        let err = resolve_with(CliOverrides::default(), settings, &[]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut settings = SettingsFile::default();
        settings.api.api_key = Some("k".into());
        settings.agent.max_iterations = 0;
        assert!(resolve_with(CliOverrides::default(), settings, &[]).is_err());
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("switchboard-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[agent\nmax_iterations = ").unwrap();
        let settings = load_settings_file(&path);
        assert_eq!(settings.agent, AgentSettings::default());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
