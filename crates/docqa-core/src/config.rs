use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::StrategyKind;

pub struct Config {
    figment: Figment,
}

impl Config {
    /// `docqa.toml` + `docqa.<env>.toml` + `DOCQA_*` env vars over built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Self::defaults().merge(Toml::file("docqa.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("docqa.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("docqa.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("docqa.test.toml")),
            _ => {}
        }
        figment = figment.merge(Self::env_provider());

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Defaults overlaid with one explicit TOML file, then env vars.
    pub fn from_file(path: &Path) -> Self {
        let figment = Self::defaults().merge(Toml::file(path)).merge(Self::env_provider());
        Self { figment }
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed, validated settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn defaults() -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
    }

    fn env_provider() -> Env {
        Env::prefixed("DOCQA_").split("__")
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        if matches!(env, "prod" | "production") && settings.embedding.provider == EmbeddingProvider::Hashed {
            tracing::warn!("hashed embeddings configured in production; retrieval quality will be lexical only");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub fusion: FusionWeights,
    pub context: ContextSettings,
    pub rerank: RerankSettings,
    pub search_cache: SearchCacheSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub indexing: IndexingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        self.fusion.validate()?;
        if self.context.max_chars == 0 {
            return Err(Error::Configuration("context.max_chars must be > 0".into()));
        }
        self.rerank.validate()?;
        if self.embedding.dim == 0 {
            return Err(Error::Configuration("embedding.dim must be > 0".into()));
        }
        if self.indexing.batch_size == 0 {
            return Err(Error::Configuration("indexing.batch_size must be > 0".into()));
        }
        Ok(())
    }
}

/// Chunk sizes in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub target_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { target_size: 2000, overlap: 400 }
    }
}

impl ChunkingSettings {
    pub fn validate(&self) -> Result<()> {
        if self.target_size == 0 {
            return Err(Error::Configuration("chunking.target_size must be > 0".into()));
        }
        if self.overlap >= self.target_size {
            return Err(Error::Configuration(format!(
                "chunking.overlap ({}) must be smaller than chunking.target_size ({})",
                self.overlap, self.target_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Candidates requested from each strategy.
    pub top_k: usize,
    /// Fused results kept for the context.
    pub max_results: usize,
    /// Semantic hits below this cosine similarity are dropped. Fallback ignores it.
    pub min_similarity: f32,
    /// Fallback runs when strategies 1–3 found fewer unique chunks than this.
    pub min_candidates: usize,
    /// Fallback asks the vector store for `top_k * fallback_multiplier`.
    pub fallback_multiplier: usize,
    pub strategy_timeout_ms: u64,
    pub embed_timeout_ms: u64,
    pub store_timeout_ms: u64,
    /// Results averaged into the overall confidence.
    pub confidence_top_n: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 20,
            max_results: 10,
            min_similarity: 0.3,
            min_candidates: 3,
            fallback_multiplier: 2,
            strategy_timeout_ms: 10_000,
            embed_timeout_ms: 5_000,
            store_timeout_ms: 5_000,
            confidence_top_n: 3,
        }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 || self.max_results == 0 {
            return Err(Error::Configuration("retrieval.top_k and retrieval.max_results must be > 0".into()));
        }
        if !(-1.0..=1.0).contains(&self.min_similarity) {
            return Err(Error::Configuration(format!(
                "retrieval.min_similarity must be within [-1, 1], got {}",
                self.min_similarity
            )));
        }
        if self.fallback_multiplier == 0 || self.confidence_top_n == 0 {
            return Err(Error::Configuration(
                "retrieval.fallback_multiplier and retrieval.confidence_top_n must be > 0".into(),
            ));
        }
        if self.strategy_timeout_ms == 0 || self.embed_timeout_ms == 0 || self.store_timeout_ms == 0 {
            return Err(Error::Configuration("retrieval timeouts must be > 0".into()));
        }
        Ok(())
    }

    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_millis(self.strategy_timeout_ms)
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Per-strategy reliability weights used by fusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub semantic: f32,
    pub keyword: f32,
    pub reference: f32,
    pub fallback: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { semantic: 0.4, keyword: 0.3, reference: 0.2, fallback: 0.1 }
    }
}

impl FusionWeights {
    pub fn weight(&self, kind: StrategyKind) -> f32 {
        match kind {
            StrategyKind::Semantic => self.semantic,
            StrategyKind::Keyword => self.keyword,
            StrategyKind::Reference => self.reference,
            StrategyKind::Fallback => self.fallback,
        }
    }

    pub fn total(&self) -> f32 {
        StrategyKind::ALL.iter().map(|k| self.weight(*k)).sum()
    }

    pub fn validate(&self) -> Result<()> {
        for kind in StrategyKind::ALL {
            let w = self.weight(kind);
            if !w.is_finite() || w < 0.0 {
                return Err(Error::Configuration(format!("fusion.{kind} weight must be finite and >= 0, got {w}")));
            }
        }
        if self.total() <= 0.0 {
            return Err(Error::Configuration("at least one fusion weight must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub max_chars: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self { max_chars: 16_000 }
    }
}

/// Optional second-pass scoring of the fused results. Only used when the
/// engine is given a reranker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    /// Share of the final confidence taken from the reranker; the rest stays
    /// with the fused confidence.
    pub weight: f32,
    /// Passage text handed to the reranker is cut to this many characters.
    pub snippet_chars: usize,
    pub timeout_ms: u64,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self { weight: 0.6, snippet_chars: 512, timeout_ms: 5_000 }
    }
}

impl RerankSettings {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(Error::Configuration(format!("rerank.weight must be within [0, 1], got {}", self.weight)));
        }
        if self.snippet_chars == 0 || self.timeout_ms == 0 {
            return Err(Error::Configuration("rerank.snippet_chars and rerank.timeout_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Retrieval results cached per session state and question. 0 disables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchCacheSettings {
    pub capacity: usize,
}

impl Default for SearchCacheSettings {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProvider {
    Hashed,
    BgeM3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub dim: usize,
    pub max_len: usize,
    pub model_dir: Option<String>,
    /// LRU entries kept by the embedding cache; 0 disables it.
    pub cache_capacity: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { provider: EmbeddingProvider::Hashed, dim: 1024, max_len: 256, model_dir: None, cache_capacity: 4096 }
    }
}

impl EmbeddingSettings {
    pub fn model_dir(&self) -> Option<PathBuf> {
        self.model_dir.as_deref().map(expand_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Memory,
    Lancedb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    pub backend: VectorBackend,
    pub uri: String,
    pub table: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self { backend: VectorBackend::Memory, uri: "~/.local/share/docqa/lancedb".into(), table: "chunks".into() }
    }
}

impl VectorStoreSettings {
    pub fn uri_path(&self) -> PathBuf {
        expand_path(&self.uri)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSettings {
    pub batch_size: usize,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self { batch_size: 64 }
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
