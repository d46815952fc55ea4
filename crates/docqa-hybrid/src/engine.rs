use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use docqa_core::chunker::Chunker;
use docqa_core::config::Settings;
use docqa_core::traits::{Embedder, LexicalStore, VectorStore};
use docqa_core::types::{Chunk, ChunkId, Document, DocumentId, RankedResult, SearchMethod, SessionId};
use docqa_core::{Error, Result};

use crate::backend;
use crate::context::{AssembledContext, Citation, ContextAssembler};
use crate::fusion::{overall_confidence, FusionEngine};
use crate::indexer::{IndexReport, Indexer};
use crate::prompt::AnswerGenerator;
use crate::rerank::{RerankStage, RerankStatus, Reranker};
use crate::search_cache::SearchCache;
use crate::session::SessionIndex;
use crate::strategy::{
    FallbackStrategy, KeywordStrategy, QueryContext, ReferenceStrategy, SemanticStrategy, StrategyOutcome, StrategyPlan,
    StrategyStatus,
};

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document_id: DocumentId,
    pub filename: String,
    pub chunks: usize,
    pub index: IndexReport,
    /// Earlier upload of the same filename that this one replaced.
    pub replaced: Option<DocumentId>,
}

/// Everything retrieval produced for one question.
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub session_id: SessionId,
    pub question: String,
    /// Fused results, best first.
    pub results: Vec<RankedResult>,
    pub context: AssembledContext,
    /// Rank-weighted mean confidence of the top results in the context.
    pub confidence: f32,
    pub search_method: SearchMethod,
    pub outcomes: Vec<StrategyOutcome>,
    pub rerank: RerankStatus,
    /// Served from the search cache.
    pub cached: bool,
}

impl Retrieval {
    /// Every strategy and the rerank stage ran as intended.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| matches!(o.status, StrategyStatus::Ok(_) | StrategyStatus::Skipped))
            && !matches!(self.rerank, RerankStatus::Failed(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub confidence: f32,
    pub search_method: SearchMethod,
    pub retrieved_count: usize,
    pub context_chunks_used: usize,
}

pub struct HybridEngine {
    settings: Settings,
    chunker: Chunker,
    vectors: Arc<dyn VectorStore>,
    lexical: Arc<dyn LexicalStore>,
    embedder: Arc<dyn Embedder>,
    indexer: Indexer,
    plan: StrategyPlan,
    fusion: FusionEngine,
    reranker: Option<RerankStage>,
    assembler: ContextAssembler,
    cache: Option<SearchCache>,
}

impl HybridEngine {
    /// Validates `settings` and checks that the embedder, the vector store
    /// and `embedding.dim` agree on the vector width.
    pub fn new(
        settings: Settings,
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorStore>,
        lexical: Arc<dyn LexicalStore>,
    ) -> Result<Self> {
        settings.validate()?;
        if embedder.dim() != settings.embedding.dim {
            return Err(Error::DimensionMismatch { expected: settings.embedding.dim, actual: embedder.dim() });
        }
        if vectors.dim() != embedder.dim() {
            return Err(Error::DimensionMismatch { expected: vectors.dim(), actual: embedder.dim() });
        }

        let retrieval = &settings.retrieval;
        let plan = StrategyPlan::standard(
            Arc::new(SemanticStrategy::new(vectors.clone(), retrieval.min_similarity, retrieval.store_timeout())),
            Arc::new(KeywordStrategy::new(lexical.clone(), retrieval.store_timeout())),
            Arc::new(ReferenceStrategy::new()),
            Arc::new(FallbackStrategy::new(vectors.clone(), retrieval.fallback_multiplier, retrieval.store_timeout())),
            retrieval.min_candidates,
        );
        let indexer = Indexer::new(embedder.clone(), vectors.clone(), lexical.clone(), &settings);

        Ok(Self {
            chunker: Chunker::new(settings.chunking)?,
            fusion: FusionEngine::new(settings.fusion),
            reranker: None,
            assembler: ContextAssembler::new(settings.context.max_chars),
            cache: search_cache(&settings, None)?,
            settings,
            vectors,
            lexical,
            embedder,
            indexer,
            plan,
        })
    }

    /// Engine with the configured embedder, vector store and a tantivy lexical store.
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let embedder = docqa_embed::embedder_from_settings(&settings.embedding)
            .map_err(|e| Error::Configuration(format!("embedder: {e:#}")))?;
        let vectors = docqa_vector::vector_store_from_settings(&settings.vector_store, embedder.dim()).await?;
        let lexical: Arc<dyn LexicalStore> = Arc::new(docqa_text::TantivyLexicalStore::new());
        Self::new(settings, embedder, vectors, lexical)
    }

    /// Rerank fused results with `reranker` before the context is assembled.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Result<Self> {
        self.cache = search_cache(&self.settings, Some(reranker.id()))?;
        self.reranker = Some(RerankStage::new(reranker, self.settings.rerank));
        Ok(self)
    }

    pub fn search_cache(&self) -> Option<&SearchCache> {
        self.cache.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub fn open_session(&self) -> SessionIndex {
        let session = SessionIndex::new();
        tracing::info!(session = %session.id(), "opened session");
        session
    }

    /// Chunk and index a document. A document with the same filename
    /// already in the session is replaced once the new one is indexed; if
    /// indexing fails the earlier version stays and the new one is dropped.
    pub async fn ingest(&self, session: &SessionIndex, filename: &str, raw_text: &str) -> Result<IngestReport> {
        let _writes = session.lock_writes().await;
        let previous = session.find_by_filename(filename);

        let document = Document::new(session.id(), filename, raw_text);
        session.register_document(&document);
        let chunks = self.chunker.chunk_document(&document);
        let index = match self.indexer.index(session, &chunks).await {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(session = %session.id(), filename, error = %e, "indexing failed; discarding upload");
                self.discard_upload(session, &document.document_id, &chunks).await;
                return Err(e);
            }
        };
        if let Some(previous) = &previous {
            self.remove_document_locked(session, previous).await?;
        }
        tracing::info!(
            session = %session.id(),
            filename,
            chunks = chunks.len(),
            failed = index.failed_count(),
            "ingested document"
        );
        Ok(IngestReport {
            document_id: document.document_id,
            filename: filename.to_string(),
            chunks: chunks.len(),
            index,
            replaced: previous,
        })
    }

    /// Best-effort removal of whatever part of a failed upload reached the stores.
    async fn discard_upload(&self, session: &SessionIndex, document_id: &str, chunks: &[Chunk]) {
        let ids: Vec<ChunkId> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
        let timeout = self.settings.retrieval.store_timeout();
        if let Err(e) = backend::store_call(timeout, self.vectors.delete(session.id(), &ids)).await {
            tracing::warn!(document = document_id, error = %e, "could not discard vectors of failed upload");
        }
        if let Err(e) = backend::lexical_delete(&self.lexical, session.id(), ids, timeout).await {
            tracing::warn!(document = document_id, error = %e, "could not discard lexical entries of failed upload");
        }
        session.remove_document(document_id);
    }

    /// Index pre-built chunks of a document registered with
    /// [`SessionIndex::register_document`].
    pub async fn index(&self, session: &SessionIndex, chunks: &[Chunk]) -> Result<IndexReport> {
        let _writes = session.lock_writes().await;
        self.indexer.index(session, chunks).await
    }

    pub async fn retrieve(&self, session: &SessionIndex, question: &str) -> Result<Retrieval> {
        if session.chunk_count() == 0 {
            return Err(Error::NoIndexedContent(session.id().clone()));
        }
        let cache_key = self.cache.as_ref().map(|c| c.key(session, question));
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(mut hit) = cache.get(key) {
                tracing::debug!(session = %session.id(), "search cache hit");
                hit.cached = true;
                return Ok(hit);
            }
        }

        let start = Instant::now();
        let retrieval = &self.settings.retrieval;
        let ctx = QueryContext::new(question, session, self.embedder.clone(), retrieval.embed_timeout());
        let plan = self.plan.run(&ctx, retrieval.top_k, retrieval.strategy_timeout()).await;

        let results = self.fusion.fuse(session.id(), &plan.candidates, retrieval.max_results)?;
        let (results, rerank) = match &self.reranker {
            Some(stage) => stage.apply(question, results).await,
            None => (results, RerankStatus::Disabled),
        };
        let context = self.assembler.assemble(&results);
        let in_context = &results[..context.citations.len()];
        let confidence = overall_confidence(in_context, retrieval.confidence_top_n);
        let search_method = SearchMethod::from_results(in_context);

        tracing::info!(
            session = %session.id(),
            results = results.len(),
            in_context = in_context.len(),
            confidence,
            method = %search_method,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "retrieved context"
        );
        let retrieval = Retrieval {
            session_id: session.id().clone(),
            question: question.to_string(),
            results,
            context,
            confidence,
            search_method,
            outcomes: plan.outcomes,
            rerank,
            cached: false,
        };
        // degraded answers are not cached so a recovered backend is used next time
        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            if retrieval.is_complete() {
                cache.put(key, retrieval.clone());
            }
        }
        Ok(retrieval)
    }

    /// Retrieve, then hand question and context to `generator`.
    pub async fn ask(&self, session: &SessionIndex, question: &str, generator: &dyn AnswerGenerator) -> Result<Answer> {
        let retrieval = self.retrieve(session, question).await?;
        let answer = generator
            .generate(question, &retrieval.context)
            .await
            .map_err(|e| Error::Generation(format!("{e:#}")))?;
        Ok(Answer {
            answer,
            context_chunks_used: retrieval.context.citations.len(),
            retrieved_count: retrieval.results.len(),
            citations: retrieval.context.citations,
            confidence: retrieval.confidence,
            search_method: retrieval.search_method,
        })
    }

    pub async fn remove_document(&self, session: &SessionIndex, document_id: &str) -> Result<()> {
        let _writes = session.lock_writes().await;
        self.remove_document_locked(session, document_id).await
    }

    async fn remove_document_locked(&self, session: &SessionIndex, document_id: &str) -> Result<()> {
        let Some(record) = session.document(document_id) else {
            return Err(Error::UnknownDocument { session_id: session.id().clone(), document_id: document_id.to_string() });
        };
        let timeout = self.settings.retrieval.store_timeout();
        backend::store_call(timeout, self.vectors.delete(session.id(), &record.chunk_ids)).await?;
        backend::lexical_delete(&self.lexical, session.id(), record.chunk_ids.clone(), timeout).await?;
        session.remove_document(document_id);
        tracing::info!(session = %session.id(), document = document_id, chunks = record.chunk_ids.len(), "removed document");
        Ok(())
    }

    /// Drop every document and chunk of the session from all stores.
    pub async fn clear_session(&self, session: &SessionIndex) -> Result<()> {
        let _writes = session.lock_writes().await;
        let timeout = self.settings.retrieval.store_timeout();
        backend::store_call(timeout, self.vectors.delete_session(session.id())).await?;
        backend::lexical_delete_session(&self.lexical, session.id(), timeout).await?;
        session.clear();
        tracing::info!(session = %session.id(), "cleared session");
        Ok(())
    }
}

fn search_cache(settings: &Settings, reranker: Option<&str>) -> Result<Option<SearchCache>> {
    let Some(capacity) = NonZeroUsize::new(settings.search_cache.capacity) else { return Ok(None) };
    let shaping = (&settings.retrieval, &settings.fusion, &settings.context, &settings.rerank, reranker);
    let fingerprint = serde_json::to_string(&shaping).map_err(|e| Error::Configuration(format!("settings fingerprint: {e}")))?;
    Ok(Some(SearchCache::new(capacity, fingerprint)))
}
