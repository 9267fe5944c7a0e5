//! Knowledge base for the technical-support agents.
//!
//! Corpus folders of bilingual Q&A files are ingested into [`QaUnit`]s,
//! embedded, and served by a [`KnowledgeIndex`] persisted in SQLite.

pub mod config;
pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod store;
pub mod synthetic;
pub mod types;


pub use config::KnowledgeBaseConfig;
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use index::KnowledgeIndex;
pub use ingest::ingest;
pub use synthetic::{DatasetGenerator, GenerationStats};
pub use types::{
    IndexStats, IngestFailure, IngestReport, Language, QaUnit, RebuildStats, RetrievedUnit,
};

use std::path::Path;
use techassist_core::AppResult;

/// Open the persisted index of `base_name` inside `workspace`.
///
/// The embedding backend comes from the base's config; a default config is
/// written on first use so later opens embed with the same model.
pub fn open_index(workspace: &Path, base_name: &str) -> AppResult<KnowledgeIndex> {
    let config = config::load_config(workspace, base_name)?;
    if !config::get_config_path(workspace, base_name).exists() {
        config::save_config(workspace, &config)?;
    }

    let provider = create_provider(&config.embedding)?;
    let index_path = config::get_index_path(workspace, base_name);

    Ok(KnowledgeIndex::open(base_name, provider, &index_path)?
        .with_batch_size(config.embedding.batch_size))
}

/// Ingest `corpus_root` and rebuild `index` from it.
///
/// Returns the ingestion report alongside the rebuild stats so callers can
/// surface skipped files.
pub async fn rebuild_from_corpus(
    index: &KnowledgeIndex,
    corpus_root: &Path,
) -> AppResult<(IngestReport, RebuildStats)> {
    let mut report = ingest(corpus_root)?;
    let units = std::mem::take(&mut report.units);
    let stats = index.rebuild(units).await?;
    Ok((report, stats))
}
