use crate::memory::SummarizeOptions;
use crate::providers::GenerationParams;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub default_model: String,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub reasoning: ReasoningSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// "groq" or "custom:<base-url>" for any OpenAI-compatible endpoint.
    pub name: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "groq".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 800,
            top_p: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Where the search client POSTs its queries (the relay endpoint).
    pub relay_url: String,
    /// Results requested per search.
    pub count: usize,
    /// Fixed upstream region parameter (not caller-supplied).
    pub region: String,
    /// Fixed upstream language parameter.
    pub lang: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            relay_url: "http://127.0.0.1:3001/api/search".into(),
            count: 5,
            region: "ID".into(),
            lang: "en".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Server-held search provider credential; never reaches clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brave_api_key: Option<String>,
    /// Upstream base URL, overridable for tests.
    pub brave_base_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3001,
            brave_api_key: None,
            brave_base_url: "https://api.search.brave.com".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub max_user_turns: usize,
    pub keep_last: usize,
    pub max_approx_tokens: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        let defaults = SummarizeOptions::default();
        Self {
            max_user_turns: defaults.max_user_turns,
            keep_last: defaults.keep_last,
            max_approx_tokens: defaults.max_approx_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    pub max_tokens: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: crate::context::DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningSettings {
    /// Off by default; the single-turn orchestrator is the primary path.
    pub multi_turn: bool,
    pub max_iterations: u32,
}

impl Default for ReasoningSettings {
    fn default() -> Self {
        Self {
            multi_turn: false,
            max_iterations: crate::agent::reasoning::DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            api_key: None,
            default_model: "llama-3.3-70b-versatile".into(),
            provider: ProviderConfig::default(),
            generation: GenerationConfig::default(),
            search: SearchConfig::default(),
            gateway: GatewayConfig::default(),
            memory: MemoryConfig::default(),
            context: ContextConfig::default(),
            reasoning: ReasoningSettings::default(),
        }
    }
}

impl Config {
    /// Load `~/.luna/config.toml`, writing defaults on first run.
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let luna_dir = home.join(".luna");
        if !luna_dir.exists() {
            fs::create_dir_all(&luna_dir).context("Failed to create .luna directory")?;
        }
        Self::load_from(&luna_dir.join("config.toml"))
    }

    /// Load from an explicit path, creating it with defaults if absent.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(config_path).context("Failed to read config file")?;
            toml::from_str(&contents).context("Failed to parse config file")?
        } else {
            let config = Config::default();
            let serialized =
                toml::to_string_pretty(&config).context("Failed to serialize config")?;
            fs::write(config_path, serialized).context("Failed to write config file")?;
            config
        };
        config.config_path = config_path.to_path_buf();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment wins over the file for secrets.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var("BRAVE_SEARCH_API_KEY") {
            if !key.is_empty() {
                self.gateway.brave_api_key = Some(key);
            }
        }
    }

    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.generation.temperature,
            max_tokens: self.generation.max_tokens,
            top_p: self.generation.top_p,
        }
    }

    pub fn memory_options(&self) -> SummarizeOptions {
        SummarizeOptions {
            max_user_turns: self.memory.max_user_turns,
            keep_last: self.memory.keep_last,
            max_approx_tokens: self.memory.max_approx_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.default_model, "llama-3.3-70b-versatile");
        assert_eq!(parsed.provider.name, "groq");
        assert_eq!(parsed.memory.max_user_turns, 4);
        assert_eq!(parsed.context.max_tokens, 1500);
        assert!(!parsed.reasoning.multi_turn);
    }

    #[test]
    fn minimal_file_gets_section_defaults() {
        let minimal = r#"
            default_model = "llama-3.3-70b-versatile"
        "#;
        let parsed: Config = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.search.count, 5);
        assert_eq!(parsed.search.region, "ID");
        assert_eq!(parsed.gateway.port, 3001);
        assert_eq!(parsed.memory.keep_last, 6);
    }

    #[test]
    fn load_from_writes_defaults_on_first_run() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_path, path);

        // Second load reads the file it just wrote.
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.default_model, config.default_model);
    }

    #[test]
    fn generation_params_mirror_config() {
        let config = Config::default();
        let params = config.generation_params();
        assert!((params.temperature - 0.8).abs() < f64::EPSILON);
        assert_eq!(params.max_tokens, 800);
    }

    #[test]
    fn memory_options_mirror_config() {
        let config = Config::default();
        let options = config.memory_options();
        assert_eq!(options.max_user_turns, 4);
        assert_eq!(options.keep_last, 6);
        assert_eq!(options.max_approx_tokens, 1800);
    }
}
