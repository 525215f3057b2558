//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nesting, e.g. `APP_STORE__BACKEND=memory`). Provides typed
//! [`Settings`] plus helpers to expand `~` and `${VAR}` and to resolve relative
//! paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::similarity::BlendWeights;
use crate::types::SearchMode;

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_for_env(None)
    }

    pub fn load_for_env(env_name: Option<&str>) -> anyhow::Result<Self> {
        let env_name = match env_name {
            Some(name) => name.to_string(),
            None => env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string()),
        };

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Self::from_figment(figment, &env_name)
    }

    /// Builds a config from an inline TOML document layered over the defaults.
    pub fn from_toml_str(toml: &str, env_name: &str) -> anyhow::Result<Self> {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml));
        Self::from_figment(figment, env_name)
    }

    pub fn from_figment(figment: Figment, env_name: &str) -> anyhow::Result<Self> {
        let config = Self { figment, env_name: env_name.to_string() };
        config.validate_for_env(env_name)?;
        Ok(config)
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        settings.validate()?;
        match env {
            "prod" | "production" => {
                if settings.embedding.provider == EmbeddingProviderKind::Hash {
                    return Err(anyhow::anyhow!(
                        "Prod config uses the hashing embedding provider, which is for tests and development only"
                    ));
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
    pub tokenizer: TokenizerSettings,
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.search.blend.validate()?;
        if self.search.top_n == 0 {
            return Err(anyhow::anyhow!("search.top_n must be at least 1"));
        }
        if let Some(similarity) = self.search.similarity {
            if !(0.0..=1.0).contains(&similarity) {
                return Err(anyhow::anyhow!("search.similarity must be within [0, 1], got {}", similarity));
            }
        }
        if self.embedding.provider == EmbeddingProviderKind::Hash && self.embedding.dimension == 0 {
            return Err(anyhow::anyhow!("embedding.dimension must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    Memory,
    #[default]
    File,
    Lance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackendKind,
    pub path: String,
    pub table: String,
    pub timeout_ms: u64,
}

impl StoreSettings {
    pub fn resolved_path(&self) -> PathBuf {
        expand_path(&self.path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::File,
            path: "./rag_storage".to_string(),
            table: "passages".to_string(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    None,
    #[default]
    Hash,
    Candle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    /// Output size of the hashing provider.
    pub dimension: usize,
    pub model_dir: Option<String>,
    pub max_len: usize,
    pub timeout_ms: Option<u64>,
}

impl EmbeddingSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { provider: EmbeddingProviderKind::Hash, dimension: 256, model_dir: None, max_len: 512, timeout_ms: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub mode: SearchMode,
    pub top_n: usize,
    pub similarity: Option<f32>,
    pub blend: BlendWeights,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { mode: SearchMode::Blend, top_n: 5, similarity: None, blend: BlendWeights::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerSettings {
    /// Extra words the segmenter keeps whole.
    pub vocabulary: Vec<String>,
    /// One word per line; anything after the first whitespace is ignored.
    pub vocabulary_file: Option<String>,
    /// Replaces the built-in stop-word list when set.
    pub stop_words: Option<Vec<String>>,
    pub max_token_chars: usize,
}

impl Default for TokenizerSettings {
    fn default() -> Self {
        Self { vocabulary: Vec::new(), vocabulary_file: None, stop_words: None, max_token_chars: 40 }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
