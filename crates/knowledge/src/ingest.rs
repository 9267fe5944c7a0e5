//! Corpus ingestion.
//!
//! A corpus root holds one folder per category; each folder holds JSON files
//! shaped `{"EN": [{"question", "answer"}, ...], "FR": [...]}`. Every file is
//! parsed independently into `Result<FileUnits, IngestFailure>` and the
//! results are partitioned afterwards, so one bad file never stops the run.

use crate::types::{IngestFailure, IngestReport, Language, QaUnit};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use techassist_core::{AppError, AppResult};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    answer: Option<String>,
}

/// Units parsed from a single file.
#[derive(Debug, Default)]
struct FileUnits {
    units: Vec<QaUnit>,
    skipped: usize,
}

/// Ingest every category folder under `root`.
///
/// Returns `Err` only when `root` itself cannot be read. Malformed files are
/// reported in [`IngestReport::failures`] and logged; entries with an empty
/// question or answer are counted in [`IngestReport::skipped_entries`].
pub fn ingest(root: &Path) -> AppResult<IngestReport> {
    let metadata = fs::metadata(root).map_err(|e| {
        AppError::Knowledge(format!("Cannot open corpus root {:?}: {}", root, e))
    })?;
    if !metadata.is_dir() {
        return Err(AppError::Knowledge(format!(
            "Corpus root is not a directory: {:?}",
            root
        )));
    }

    tracing::info!("Ingesting corpus from {:?}", root);

    let files = corpus_files(root)?;
    let files_read = files.len();

    let (parsed, failed): (Vec<_>, Vec<_>) = files
        .into_iter()
        .map(|(category, path)| parse_file(&path, &category))
        .partition(Result::is_ok);

    let mut report = IngestReport {
        files_read,
        ..Default::default()
    };

    for file in parsed.into_iter().flatten() {
        report.skipped_entries += file.skipped;
        report.units.extend(file.units);
    }
    report.failures = failed.into_iter().filter_map(Result::err).collect();

    for failure in &report.failures {
        tracing::warn!("Skipping corpus file {:?}: {}", failure.path, failure.reason);
    }

    report.units.sort_by(|a, b| a.source_id.cmp(&b.source_id));

    tracing::info!(
        "Ingested {} units from {} files ({} failed, {} empty entries skipped)",
        report.units.len(),
        report.files_read,
        report.failures.len(),
        report.skipped_entries
    );

    Ok(report)
}

/// `(category, path)` for every `*.json` file one level below each category folder.
fn corpus_files(root: &Path) -> AppResult<Vec<(String, PathBuf)>> {
    let mut categories: Vec<(String, PathBuf)> = fs::read_dir(root)
        .map_err(|e| AppError::Knowledge(format!("Cannot list corpus root {:?}: {}", root, e)))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            Some((name, entry.path()))
        })
        .collect();
    categories.sort();

    let mut files = Vec::new();
    for (category, dir) in categories {
        let mut category_files: Vec<PathBuf> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect();
        category_files.sort();

        tracing::debug!("Category '{}': {} file(s)", category, category_files.len());
        files.extend(category_files.into_iter().map(|p| (category.clone(), p)));
    }

    Ok(files)
}

fn parse_file(path: &Path, category: &str) -> Result<FileUnits, IngestFailure> {
    let failure = |reason: String| IngestFailure {
        path: path.to_path_buf(),
        reason,
    };

    let contents = fs::read_to_string(path).map_err(|e| failure(format!("read failed: {}", e)))?;
    let value: Value =
        serde_json::from_str(&contents).map_err(|e| failure(format!("invalid JSON: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| failure("top level is not an object".to_string()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut parsed = FileUnits::default();

    for language in Language::ALL {
        let Some(entries) = object.get(language.code()) else {
            continue;
        };
        if !entries.is_array() {
            tracing::warn!("{:?}: {} is not a list, skipping that language", path, language);
            continue;
        }
        let entries: Vec<RawEntry> = serde_json::from_value(entries.clone())
            .map_err(|e| failure(format!("bad {} entries: {}", language, e)))?;

        for (idx, entry) in entries.into_iter().enumerate() {
            let question = entry.question.as_deref().unwrap_or("").trim();
            let answer = entry.answer.as_deref().unwrap_or("").trim();

            if question.is_empty() || answer.is_empty() {
                parsed.skipped += 1;
                continue;
            }

            parsed.units.push(QaUnit {
                question: question.to_string(),
                answer: answer.to_string(),
                language,
                category: category.to_string(),
                source_id: format!("{}/{}#{}:{}", category, file_name, language, idx),
            });
        }
    }

    Ok(parsed)
}
