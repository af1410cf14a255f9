//! Layered configuration.
//!
//! Uses Figment to merge `discovery.toml` + `discovery.<env>.toml` +
//! `DISCOVERY_*` env vars (`__` separates nested keys, e.g.
//! `DISCOVERY_ENGINE__PAGE_SIZE`).

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::types::{EntitySet, SortMode};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Loads from the current directory.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(dir.join("discovery.toml")));
        let env_file = match env_name.as_str() {
            "dev" | "development" => Some("discovery.dev.toml"),
            "prod" | "production" => Some("discovery.prod.toml"),
            "test" | "testing" => Some("discovery.test.toml"),
            _ => None,
        };
        if let Some(file) = env_file {
            figment = figment.merge(Toml::file(dir.join(file)));
        }
        figment = figment.merge(Env::prefixed("DISCOVERY_").split("__"));

        let config = Self::from_figment(figment, dir);
        config.engine()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment, base_dir: &Path) -> Self {
        Self { figment, base_dir: base_dir.to_path_buf() }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The `[engine]` section, defaulted and validated.
    pub fn engine(&self) -> anyhow::Result<EngineConfig> {
        let engine = if self.figment.contains("engine") {
            self.get::<EngineConfig>("engine")?
        } else {
            EngineConfig::default()
        };
        engine.validate()?;
        Ok(engine)
    }

    /// `catalog.dir`, expanded and resolved against the config directory.
    pub fn catalog_dir(&self) -> anyhow::Result<Option<PathBuf>> {
        if !self.figment.contains("catalog.dir") {
            return Ok(None);
        }
        let raw: String = self.get("catalog.dir")?;
        Ok(Some(resolve_with_base(&self.base_dir, raw)))
    }
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_page_size() -> u32 {
    10
}

fn default_fetch_timeout_ms() -> u64 {
    5_000
}

/// Tunables for the discovery engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Quiet period before a typed query is searched.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Items requested per collection per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Upper bound for every fetch and engagement call.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    #[serde(default)]
    pub default_entity_types: EntitySet,

    #[serde(default)]
    pub default_sort: SortMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            page_size: default_page_size(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            default_entity_types: EntitySet::all(),
            default_sort: SortMode::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_entity_types(mut self, types: EntitySet) -> Self {
        self.default_entity_types = types;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.page_size == 0 {
            return Err(Error::InvalidConfig("engine.page_size must be greater than 0".to_string()));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "engine.fetch_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
