//! Layered settings: built-in defaults, TOML file, `CODERAG_*` environment,
//! then command-line flags (applied by the caller).

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "CODERAG_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "coderag.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite file holding the code graph
    pub db_path: PathBuf,
    /// Collection indexed and queried when no flag names one
    pub collection: String,
    /// Extra glob patterns excluded from indexing
    pub exclude: Vec<String>,
    pub search: SearchSettings,
    pub retriever: RetrieverSettings,
    pub ollama: OllamaSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub top_k: usize,
    pub min_score: f32,
    pub max_chars: Option<usize>,
    pub chain_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverSettings {
    /// Base URL of the vector retriever; semantic search is unavailable without it
    pub url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/code_graph.db"),
            collection: "code_repository".to_string(),
            exclude: Vec::new(),
            search: SearchSettings::default(),
            retriever: RetrieverSettings::default(),
            ollama: OllamaSettings::default(),
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            top_k: coderag_search::DEFAULT_TOP_K,
            min_score: 0.0,
            max_chars: None,
            chain_depth: coderag_search::DEFAULT_CHAIN_DEPTH,
        }
    }
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: coderag_search::DEFAULT_RETRIEVER_TIMEOUT.as_secs(),
        }
    }
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama2".to_string(),
            timeout_secs: coderag_providers::DEFAULT_LLM_TIMEOUT.as_secs(),
        }
    }
}

impl Settings {
    /// Load from the process environment. Returns the settings and the
    /// config file they were read from, if any.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// `load` with an injectable variable lookup.
    pub fn load_with<F>(explicit: Option<&Path>, lookup: F) -> Result<(Self, Option<PathBuf>)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => match lookup(CONFIG_ENV).filter(|v| !v.trim().is_empty()) {
                Some(path) => Some(PathBuf::from(path)),
                None => {
                    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                    local.is_file().then_some(local)
                }
            },
        };

        let mut settings = match &source {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env_overrides(lookup);
        Ok((settings, source))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CODERAG_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("CODERAG_COLLECTION") {
            self.collection = v;
        }
        if let Some(v) = lookup("CODERAG_RETRIEVER_URL") {
            self.retriever.url = Some(v).filter(|url| !url.trim().is_empty());
        }
        if let Some(v) = lookup("CODERAG_OLLAMA_URL") {
            self.ollama.base_url = v;
        }
        if let Some(v) = lookup("CODERAG_OLLAMA_MODEL") {
            self.ollama.model = v;
        }
        if let Some(v) = parsed(&lookup, "CODERAG_TOP_K") {
            self.search.top_k = v;
        }
        if let Some(v) = parsed(&lookup, "CODERAG_MIN_SCORE") {
            self.search.min_score = v;
        }
        if let Some(v) = parsed(&lookup, "CODERAG_LLM_TIMEOUT_SECS") {
            self.ollama.timeout_secs = v;
        }
        if let Some(v) = parsed(&lookup, "CODERAG_RETRIEVER_TIMEOUT_SECS") {
            self.retriever.timeout_secs = v;
        }
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring invalid {key} value: {raw}");
            None
        }
    }
}
