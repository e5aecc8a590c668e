//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_EMBEDDING__PROVIDER=fake`). Provides helpers to expand `~` and
//! `${VAR}` and to resolve relative paths against a known base directory.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    settings: Settings,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment =
            Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let settings: Settings = figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let config = Self { settings };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn validate_for_env(&self, env: &str) -> Result<()> {
        self.settings.validate()?;
        match env {
            "prod" | "production" if self.settings.embedding.provider == ProviderKind::Fake => Err(
                Error::InvalidConfig("embedding.provider = \"fake\" is not allowed in production".into()),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub cache: CacheSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be positive".into()));
        }
        if self.embedding.max_len == 0 {
            return Err(Error::InvalidConfig("embedding.max_len must be positive".into()));
        }
        if self.search.top_k == 0 {
            return Err(Error::InvalidConfig("search.top_k must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub path: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self { path: "data/courses.json".into() }
    }
}

impl CatalogSettings {
    pub fn resolved_path(&self) -> PathBuf {
        resolve_with_base(&working_dir(), &self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub path: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { path: "data/course_embeddings.json".into() }
    }
}

impl CacheSettings {
    pub fn resolved_path(&self) -> PathBuf {
        resolve_with_base(&working_dir(), &self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// all-MiniLM-L6-v2 sentence encoder run locally.
    Minilm,
    /// Deterministic hashed bag-of-words vectors; no model files needed.
    Fake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: ProviderKind,
    pub model_dir: Option<String>,
    pub batch_size: usize,
    pub max_len: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { provider: ProviderKind::Minilm, model_dir: None, batch_size: 32, max_len: 256 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub top_k: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { top_k: 10 }
    }
}

fn working_dir() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
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
