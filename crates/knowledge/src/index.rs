//! The knowledge index: similarity search over one active generation.
//!
//! A generation is an immutable, fully embedded snapshot of the corpus.
//! Readers clone the active `Arc<Generation>` and score against it without
//! holding the lock, so a rebuild that swaps the pointer mid-query never
//! produces a mix of old and new results. Rebuilds are serialized; a failed
//! rebuild leaves the previous generation active both in memory and on disk.

use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::store::{GenerationMeta, KnowledgeStore, StoredUnit};
use crate::types::{IndexStats, QaUnit, RebuildStats, RetrievedUnit};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use techassist_core::{AppError, AppResult};
use tokio::sync::{Mutex, RwLock};

const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug)]
struct Generation {
    number: u64,
    built_at: DateTime<Utc>,
    entries: Vec<StoredUnit>,
}

/// Similarity-searchable store over ingested units.
#[derive(Debug)]
pub struct KnowledgeIndex {
    name: String,
    provider: Arc<dyn EmbeddingProvider>,
    store: Option<KnowledgeStore>,
    batch_size: usize,
    active: RwLock<Option<Arc<Generation>>>,
    rebuild_lock: Mutex<()>,
}

impl KnowledgeIndex {
    /// An index that lives only in memory.
    pub fn in_memory(name: impl Into<String>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
            store: None,
            batch_size: DEFAULT_BATCH_SIZE,
            active: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// An index persisted in the SQLite database at `db_path`.
    ///
    /// A previously persisted generation is loaded when it was embedded with
    /// the same model and dimensions as `provider`; otherwise the index
    /// starts unbuilt.
    pub fn open(
        name: impl Into<String>,
        provider: Arc<dyn EmbeddingProvider>,
        db_path: &Path,
    ) -> AppResult<Self> {
        let mut index = Self::in_memory(name, provider);
        let store = KnowledgeStore::open(db_path)?;

        match store.load_generation(&index.name)? {
            Some((meta, entries)) if index.matches_provider(&meta) => {
                tracing::info!(
                    "Loaded generation {} of '{}' ({} units)",
                    meta.generation,
                    index.name,
                    entries.len()
                );
                index.active = RwLock::new(Some(Arc::new(Generation {
                    number: meta.generation,
                    built_at: meta.built_at,
                    entries,
                })));
            }
            Some((meta, _)) => {
                tracing::warn!(
                    "Ignoring persisted generation of '{}': built with {}/{} ({} dims), current provider is {}/{} ({} dims)",
                    index.name,
                    meta.provider,
                    meta.model,
                    meta.dimensions,
                    index.provider.provider_name(),
                    index.provider.model_name(),
                    index.provider.dimensions()
                );
            }
            None => {
                tracing::debug!("No persisted generation for '{}'", index.name);
            }
        }

        index.store = Some(store);
        Ok(index)
    }

    /// Set how many texts are sent per embedding call during a rebuild.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn matches_provider(&self, meta: &GenerationMeta) -> bool {
        meta.provider == self.provider.provider_name()
            && meta.model == self.provider.model_name()
            && meta.dimensions == self.provider.dimensions()
    }

    /// Whether a generation is active.
    pub async fn is_ready(&self) -> bool {
        self.active.read().await.is_some()
    }

    /// Replace the active generation with one built from `units`.
    ///
    /// Units sharing a document id collapse to the first occurrence. Any
    /// failure returns `AppError::IndexRebuild` and the previous generation
    /// stays active.
    pub async fn rebuild(&self, units: Vec<QaUnit>) -> AppResult<RebuildStats> {
        let _guard = self.rebuild_lock.lock().await;
        let start = Instant::now();

        if units.is_empty() {
            return Err(AppError::IndexRebuild(format!(
                "No units to index for '{}'",
                self.name
            )));
        }

        let submitted = units.len();
        let mut unique: BTreeMap<String, QaUnit> = BTreeMap::new();
        for unit in units {
            unique.entry(unit.doc_id()).or_insert(unit);
        }
        let duplicates_dropped = submitted - unique.len();

        tracing::info!(
            "Rebuilding '{}' with {} units using {} ({})",
            self.name,
            unique.len(),
            self.provider.provider_name(),
            self.provider.model_name()
        );

        let entries = self.embed_units(unique).await?;

        let number = self
            .active
            .read()
            .await
            .as_ref()
            .map(|g| g.number + 1)
            .unwrap_or(1);
        let generation = Generation {
            number,
            built_at: Utc::now(),
            entries,
        };

        if let Some(ref store) = self.store {
            let meta = GenerationMeta {
                generation: generation.number,
                built_at: generation.built_at,
                provider: self.provider.provider_name().to_string(),
                model: self.provider.model_name().to_string(),
                dimensions: self.provider.dimensions(),
            };
            store
                .save_generation(&self.name, &meta, &generation.entries)
                .map_err(|e| {
                    AppError::IndexRebuild(format!("Failed to persist generation: {}", e))
                })?;
        }

        let units_indexed = generation.entries.len();
        *self.active.write().await = Some(Arc::new(generation));

        let stats = RebuildStats {
            generation: number,
            units_indexed,
            duplicates_dropped,
            duration_secs: start.elapsed().as_secs_f64(),
        };

        tracing::info!(
            "Generation {} of '{}' active: {} units ({} duplicates dropped) in {:.2}s",
            stats.generation,
            self.name,
            stats.units_indexed,
            stats.duplicates_dropped,
            stats.duration_secs
        );

        Ok(stats)
    }

    async fn embed_units(&self, unique: BTreeMap<String, QaUnit>) -> AppResult<Vec<StoredUnit>> {
        let pairs: Vec<(String, QaUnit)> = unique.into_iter().collect();
        let mut entries = Vec::with_capacity(pairs.len());

        for batch in pairs.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|(_, u)| u.embedding_text()).collect();
            let embeddings = self
                .provider
                .embed_batch(&texts)
                .await
                .map_err(|e| AppError::IndexRebuild(format!("Embedding failed: {}", e)))?;

            if embeddings.len() != batch.len() {
                return Err(AppError::IndexRebuild(format!(
                    "Embedding backend returned {} vectors for {} texts",
                    embeddings.len(),
                    batch.len()
                )));
            }

            for ((doc_id, unit), embedding) in batch.iter().zip(embeddings) {
                if embedding.len() != self.provider.dimensions() {
                    return Err(AppError::IndexRebuild(format!(
                        "Embedding for {} has {} dimensions, expected {}",
                        doc_id,
                        embedding.len(),
                        self.provider.dimensions()
                    )));
                }
                entries.push(StoredUnit {
                    doc_id: doc_id.clone(),
                    unit: unit.clone(),
                    embedding,
                });
            }

            tracing::debug!("Embedded {}/{} units", entries.len(), pairs.len());
        }

        Ok(entries)
    }

    /// Rank units against `text`, surfacing why a query could not run.
    ///
    /// Errors with `IndexUnavailable` before the first build and with the
    /// backend's error when the query cannot be embedded.
    pub async fn search(&self, text: &str, k: usize) -> AppResult<Vec<RetrievedUnit>> {
        let generation = self
            .active
            .read()
            .await
            .clone()
            .ok_or_else(|| {
                AppError::IndexUnavailable(format!("'{}' has not been built", self.name))
            })?;

        if k == 0 {
            return Ok(Vec::new());
        }

        let query = self.provider.embed(text).await?;

        let mut scored: Vec<(f32, &StoredUnit)> = generation
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&query, &entry.embedding), entry))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.doc_id.cmp(&b.1.doc_id))
        });
        scored.truncate(k);

        tracing::debug!(
            "Query against generation {} of '{}' returned {} units (top score {:.3})",
            generation.number,
            self.name,
            scored.len(),
            scored.first().map(|(s, _)| *s).unwrap_or(0.0)
        );

        Ok(scored
            .into_iter()
            .map(|(score, entry)| RetrievedUnit {
                unit: entry.unit.clone(),
                relevance_score: Some(score.clamp(0.0, 1.0)),
            })
            .collect())
    }

    /// Up to `k` units ordered by descending relevance.
    ///
    /// Never fails: an unbuilt index or a backend failure yields an empty list.
    pub async fn query(&self, text: &str, k: usize) -> Vec<RetrievedUnit> {
        match self.search(text, k).await {
            Ok(results) => results,
            Err(AppError::IndexUnavailable(reason)) => {
                tracing::warn!("Query skipped: {}", reason);
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Retrieval failed for '{}': {}", self.name, e);
                Vec::new()
            }
        }
    }

    /// Current state of the index.
    pub async fn stats(&self) -> IndexStats {
        let generation = self.active.read().await.clone();
        IndexStats {
            name: self.name.clone(),
            generation: generation.as_ref().map(|g| g.number),
            units: generation.as_ref().map(|g| g.entries.len()).unwrap_or(0),
            built_at: generation.as_ref().map(|g| g.built_at),
            provider: self.provider.provider_name().to_string(),
            model: self.provider.model_name().to_string(),
            dimensions: self.provider.dimensions(),
            persistent: self.store.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::types::Language;
    use tempfile::TempDir;

    fn unit(category: &str, idx: usize, question: &str, answer: &str) -> QaUnit {
        QaUnit {
            question: question.to_string(),
            answer: answer.to_string(),
            language: Language::En,
            category: category.to_string(),
            source_id: format!("{}/questions_1.json#EN:{}", category, idx),
        }
    }

    fn corpus() -> Vec<QaUnit> {
        vec![
            unit(
                "installation",
                0,
                "How do I install MyApp on Windows?",
                "Run the installer and follow the wizard.",
            ),
            unit(
                "performance_issues",
                0,
                "Why is MyApp slow on my laptop?",
                "Disable live previews in settings.",
            ),
            unit(
                "configuration",
                0,
                "How can I configure proxy settings?",
                "Open Settings, Network, Proxy.",
            ),
        ]
    }

    fn trigram() -> Arc<dyn EmbeddingProvider> {
        Arc::new(TrigramProvider::new(256))
    }

    #[tokio::test]
    async fn test_query_before_build_is_empty() {
        let index = KnowledgeIndex::in_memory("kb", trigram());
        assert!(!index.is_ready().await);
        assert!(index.query("install", 5).await.is_empty());
        assert!(matches!(
            index.search("install", 5).await,
            Err(AppError::IndexUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_rebuild_then_query_ranks_relevant_first() {
        let index = KnowledgeIndex::in_memory("kb", trigram());
        let stats = index.rebuild(corpus()).await.unwrap();
        assert_eq!(stats.generation, 1);
        assert_eq!(stats.units_indexed, 3);

        let results = index.query("install MyApp on Windows", 5).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].unit.category, "installation");
        for pair in results.windows(2) {
            assert!(pair[0].relevance_score >= pair[1].relevance_score);
        }
        for r in &results {
            let score = r.relevance_score.unwrap();
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[tokio::test]
    async fn test_k_is_a_soft_cap() {
        let index = KnowledgeIndex::in_memory("kb", trigram());
        index.rebuild(corpus()).await.unwrap();
        assert_eq!(index.query("proxy", 1).await.len(), 1);
        assert_eq!(index.query("proxy", 10).await.len(), 3);
        assert!(index.query("proxy", 0).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_rebuild_fails_and_keeps_generation() {
        let index = KnowledgeIndex::in_memory("kb", trigram());
        index.rebuild(corpus()).await.unwrap();

        let result = index.rebuild(Vec::new()).await;
        assert!(matches!(result, Err(AppError::IndexRebuild(_))));
        assert_eq!(index.stats().await.generation, Some(1));
        assert_eq!(index.query("proxy", 5).await.len(), 3);
    }

    #[tokio::test]
    async fn test_duplicates_collapse() {
        let index = KnowledgeIndex::in_memory("kb", trigram());
        let mut units = corpus();
        units.push(units[0].clone());
        let stats = index.rebuild(units).await.unwrap();
        assert_eq!(stats.units_indexed, 3);
        assert_eq!(stats.duplicates_dropped, 1);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_previous_generation() {
        let index = KnowledgeIndex::in_memory("kb", trigram());
        index.rebuild(corpus()).await.unwrap();
        let stats = index
            .rebuild(vec![unit("bug_reports", 0, "Export crashes", "Update to 2.1.")])
            .await
            .unwrap();

        assert_eq!(stats.generation, 2);
        let results = index.query("install", 5).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].unit.category, "bug_reports");
    }

    #[tokio::test]
    async fn test_persistent_index_reopens() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("index.sqlite");

        let first = KnowledgeIndex::open("kb", trigram(), &db).unwrap();
        first.rebuild(corpus()).await.unwrap();
        let before = first.query("slow laptop", 3).await;

        let reopened = KnowledgeIndex::open("kb", trigram(), &db).unwrap();
        assert!(reopened.is_ready().await);
        assert_eq!(reopened.stats().await.generation, Some(1));
        assert_eq!(reopened.query("slow laptop", 3).await, before);
    }

    #[tokio::test]
    async fn test_persisted_generation_ignored_for_other_model() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("index.sqlite");

        let first = KnowledgeIndex::open("kb", trigram(), &db).unwrap();
        first.rebuild(corpus()).await.unwrap();

        let other_dims: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(128));
        let reopened = KnowledgeIndex::open("kb", other_dims, &db).unwrap();
        assert!(!reopened.is_ready().await);
    }
}
