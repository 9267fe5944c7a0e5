//! SQLite persistence for index generations.
//!
//! One database can hold several logical indexes. Each has at most one
//! persisted generation; saving a new one replaces the old rows inside a
//! single transaction, so a failed save leaves the previous generation intact.

use crate::types::{Language, QaUnit};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use techassist_core::{AppError, AppResult};

/// Metadata of a persisted generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationMeta {
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

/// A unit together with its id and embedding.
#[derive(Debug, Clone)]
pub struct StoredUnit {
    pub doc_id: String,
    pub unit: QaUnit,
    pub embedding: Vec<f32>,
}

/// Handle to an index database file.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    path: PathBuf,
}

impl KnowledgeStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create index directory: {}", e))
            })?;
        }

        let store = Self {
            path: path.to_path_buf(),
        };
        let conn = store.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS generations (
                name TEXT PRIMARY KEY,
                generation INTEGER NOT NULL,
                built_at TEXT NOT NULL,
                provider TEXT NOT NULL,
                model TEXT NOT NULL,
                dimensions INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS units (
                name TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                language TEXT NOT NULL,
                category TEXT NOT NULL,
                source_id TEXT NOT NULL,
                embedding BLOB NOT NULL,
                PRIMARY KEY (name, doc_id)
            );
            "#,
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Opened knowledge store at {:?}", path);
        Ok(store)
    }

    fn connect(&self) -> AppResult<Connection> {
        Connection::open(&self.path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))
    }

    /// Replace the persisted generation of `name` with `units`.
    pub fn save_generation(
        &self,
        name: &str,
        meta: &GenerationMeta,
        units: &[StoredUnit],
    ) -> AppResult<()> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Knowledge(format!("Failed to begin transaction: {}", e)))?;

        tx.execute("DELETE FROM units WHERE name = ?1", params![name])
            .map_err(|e| AppError::Knowledge(format!("Failed to delete old units: {}", e)))?;
        tx.execute("DELETE FROM generations WHERE name = ?1", params![name])
            .map_err(|e| AppError::Knowledge(format!("Failed to delete old generation: {}", e)))?;

        tx.execute(
            "INSERT INTO generations (name, generation, built_at, provider, model, dimensions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                name,
                meta.generation as i64,
                meta.built_at.to_rfc3339(),
                meta.provider,
                meta.model,
                meta.dimensions as i64,
            ],
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to insert generation: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO units (name, doc_id, question, answer, language, category, source_id, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(|e| AppError::Knowledge(format!("Failed to prepare insert: {}", e)))?;

            for stored in units {
                stmt.execute(params![
                    name,
                    stored.doc_id,
                    stored.unit.question,
                    stored.unit.answer,
                    stored.unit.language.code(),
                    stored.unit.category,
                    stored.unit.source_id,
                    embedding_to_bytes(&stored.embedding),
                ])
                .map_err(|e| AppError::Knowledge(format!("Failed to insert unit: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| AppError::Knowledge(format!("Failed to commit generation: {}", e)))?;

        tracing::debug!(
            "Persisted generation {} of '{}' ({} units)",
            meta.generation,
            name,
            units.len()
        );
        Ok(())
    }

    /// Load the persisted generation of `name`, if any.
    pub fn load_generation(
        &self,
        name: &str,
    ) -> AppResult<Option<(GenerationMeta, Vec<StoredUnit>)>> {
        let conn = self.connect()?;

        let meta = conn
            .query_row(
                "SELECT generation, built_at, provider, model, dimensions FROM generations WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| AppError::Knowledge(format!("Failed to read generation: {}", e)))?;

        let Some((generation, built_at, provider, model, dimensions)) = meta else {
            return Ok(None);
        };

        let built_at = DateTime::parse_from_rfc3339(&built_at)
            .map_err(|e| AppError::Knowledge(format!("Invalid built_at timestamp: {}", e)))?
            .with_timezone(&Utc);

        let meta = GenerationMeta {
            generation: generation as u64,
            built_at,
            provider,
            model,
            dimensions: dimensions as usize,
        };

        let mut stmt = conn
            .prepare(
                "SELECT doc_id, question, answer, language, category, source_id, embedding
                 FROM units WHERE name = ?1 ORDER BY doc_id",
            )
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Vec<u8>>(6)?,
                ))
            })
            .map_err(|e| AppError::Knowledge(format!("Failed to query units: {}", e)))?;

        let mut units = Vec::new();
        for row in rows {
            let (doc_id, question, answer, language, category, source_id, blob) =
                row.map_err(|e| AppError::Knowledge(format!("Failed to read unit: {}", e)))?;

            let language = Language::from_code(&language).ok_or_else(|| {
                AppError::Knowledge(format!("Unknown language '{}' for {}", language, doc_id))
            })?;

            units.push(StoredUnit {
                doc_id,
                unit: QaUnit {
                    question,
                    answer,
                    language,
                    category,
                    source_id,
                },
                embedding: bytes_to_embedding(&blob)?,
            });
        }

        Ok(Some((meta, units)))
    }
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stored(doc_id: &str, question: &str) -> StoredUnit {
        StoredUnit {
            doc_id: doc_id.to_string(),
            unit: QaUnit {
                question: question.to_string(),
                answer: "answer".to_string(),
                language: Language::Fr,
                category: "configuration".to_string(),
                source_id: format!("configuration/q.json#FR:{}", doc_id),
            },
            embedding: vec![0.25, -1.5, 3.0],
        }
    }

    fn meta(generation: u64) -> GenerationMeta {
        GenerationMeta {
            generation,
            built_at: Utc::now(),
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 3,
        }
    }

    #[test]
    fn test_empty_store_has_no_generation() {
        let temp = TempDir::new().unwrap();
        let store = KnowledgeStore::open(&temp.path().join("kb/index.sqlite")).unwrap();
        assert!(store.load_generation("TechAssistDB").unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_previous_generation() {
        let temp = TempDir::new().unwrap();
        let store = KnowledgeStore::open(&temp.path().join("index.sqlite")).unwrap();

        store
            .save_generation("kb", &meta(1), &[stored("a", "old one"), stored("b", "old two")])
            .unwrap();
        store
            .save_generation("kb", &meta(2), &[stored("c", "new")])
            .unwrap();

        let (loaded_meta, units) = store.load_generation("kb").unwrap().unwrap();
        assert_eq!(loaded_meta.generation, 2);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].unit.question, "new");
        assert_eq!(units[0].unit.language, Language::Fr);
        assert_eq!(units[0].embedding, vec![0.25, -1.5, 3.0]);
    }

    #[test]
    fn test_names_are_isolated() {
        let temp = TempDir::new().unwrap();
        let store = KnowledgeStore::open(&temp.path().join("index.sqlite")).unwrap();

        store.save_generation("one", &meta(1), &[stored("a", "q")]).unwrap();
        store.save_generation("two", &meta(4), &[stored("a", "q"), stored("b", "r")]).unwrap();

        assert_eq!(store.load_generation("one").unwrap().unwrap().1.len(), 1);
        assert_eq!(store.load_generation("two").unwrap().unwrap().0.generation, 4);
    }

    #[test]
    fn test_failed_save_keeps_previous_generation() {
        let temp = TempDir::new().unwrap();
        let store = KnowledgeStore::open(&temp.path().join("index.sqlite")).unwrap();
        store.save_generation("kb", &meta(1), &[stored("a", "kept")]).unwrap();

        // Duplicate primary key aborts the transaction midway.
        let result = store.save_generation("kb", &meta(2), &[stored("x", "1"), stored("x", "2")]);
        assert!(result.is_err());

        let (loaded_meta, units) = store.load_generation("kb").unwrap().unwrap();
        assert_eq!(loaded_meta.generation, 1);
        assert_eq!(units[0].unit.question, "kept");
    }

    #[test]
    fn test_embedding_bytes_round_trip() {
        let v = vec![1.0f32, -0.5, 0.0];
        assert_eq!(bytes_to_embedding(&embedding_to_bytes(&v)).unwrap(), v);
        assert!(bytes_to_embedding(&[0u8; 3]).is_err());
    }
}
