//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

/// Corpus language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "EN")]
    En,
    #[serde(rename = "FR")]
    Fr,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Fr];

    /// Key used in corpus files and persisted rows.
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "EN",
            Language::Fr => "FR",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "EN" => Some(Language::En),
            "FR" => Some(Language::Fr),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One normalized question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaUnit {
    pub question: String,
    pub answer: String,
    pub language: Language,
    /// Name of the corpus folder the unit came from
    pub category: String,
    /// `<category>/<file>#<LANG>:<entry index>`
    pub source_id: String,
}

impl QaUnit {
    /// Stable document id: first 16 hex chars of SHA-256 over source id and content.
    pub fn doc_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.question.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.answer.as_bytes());
        let digest = hasher.finalize();
        digest
            .iter()
            .take(8)
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Text handed to the embedding backend.
    pub fn embedding_text(&self) -> String {
        format!("Q: {}\nA: {}", self.question, self.answer)
    }
}

/// A unit returned by a query, with its relevance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedUnit {
    pub unit: QaUnit,
    /// In `[0, 1]`; `None` when the backend returned the match unscored
    pub relevance_score: Option<f32>,
}

/// A corpus file that could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub units: Vec<QaUnit>,
    pub failures: Vec<IngestFailure>,
    /// Entries dropped because the question or answer was empty
    pub skipped_entries: usize,
    pub files_read: usize,
}

/// Statistics from a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildStats {
    pub generation: u64,
    pub units_indexed: usize,
    /// Units sharing a document id with an earlier unit
    pub duplicates_dropped: usize,
    pub duration_secs: f64,
}

/// Snapshot of an index's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub name: String,
    /// `None` until the first successful rebuild
    pub generation: Option<u64>,
    pub units: usize,
    pub built_at: Option<DateTime<Utc>>,
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub persistent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(source_id: &str, answer: &str) -> QaUnit {
        QaUnit {
            question: "How do I install X?".to_string(),
            answer: answer.to_string(),
            language: Language::En,
            category: "installation".to_string(),
            source_id: source_id.to_string(),
        }
    }

    #[test]
    fn test_doc_id_is_stable_and_content_sensitive() {
        let a = unit("installation/q.json#EN:0", "Run the installer.");
        assert_eq!(a.doc_id(), a.clone().doc_id());
        assert_eq!(a.doc_id().len(), 16);
        assert_ne!(
            a.doc_id(),
            unit("installation/q.json#EN:0", "Use the package.").doc_id()
        );
        assert_ne!(
            a.doc_id(),
            unit("installation/q.json#EN:1", "Run the installer.").doc_id()
        );
    }

    #[test]
    fn test_language_serializes_as_code() {
        assert_eq!(serde_json::to_string(&Language::Fr).unwrap(), "\"FR\"");
        assert_eq!(Language::from_code("EN"), Some(Language::En));
        assert_eq!(Language::from_code("DE"), None);
    }

    #[test]
    fn test_embedding_text() {
        let u = unit("s", "Run the installer.");
        assert_eq!(u.embedding_text(), "Q: How do I install X?\nA: Run the installer.");
    }
}
