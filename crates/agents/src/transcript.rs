//! Line-oriented chat transcripts.
//!
//! A transcript file holds one `role: content` line per message. Lines that
//! do not start with a known role prefix continue the previous message, so
//! multi-line answers survive a save/load cycle. Continuation lines that start
//! with a role prefix or a backslash are written with one extra leading `\`.

use crate::memory::{MemoryMessage, MemoryRole};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use techassist_core::{AppError, AppResult};

const FILE_PREFIX: &str = "chat_";
const FILE_EXTENSION: &str = "txt";
const ESCAPE: char = '\\';

fn needs_escape(line: &str) -> bool {
    line.starts_with("user: ") || line.starts_with("assistant: ") || line.starts_with(ESCAPE)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: Vec<MemoryMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: MemoryMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[MemoryMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Number of user messages.
    pub fn user_turns(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == MemoryRole::User)
            .count()
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for message in &self.messages {
            out.push_str(message.role.as_str());
            out.push_str(": ");
            for (i, line) in message.content.split('\n').enumerate() {
                if i > 0 {
                    out.push('\n');
                    if needs_escape(line) {
                        out.push(ESCAPE);
                    }
                }
                out.push_str(line);
            }
            out.push('\n');
        }
        out
    }

    fn parse(contents: &str) -> Self {
        let mut messages: Vec<MemoryMessage> = Vec::new();

        for line in contents.lines() {
            if let Some(rest) = line.strip_prefix("user: ") {
                messages.push(MemoryMessage::user(rest));
            } else if let Some(rest) = line.strip_prefix("assistant: ") {
                messages.push(MemoryMessage::assistant(rest));
            } else if let Some(last) = messages.last_mut() {
                last.content.push('\n');
                last.content.push_str(line.strip_prefix(ESCAPE).unwrap_or(line));
            }
        }

        for message in &mut messages {
            let trimmed = message.content.trim_end_matches('\n').len();
            message.content.truncate(trimmed);
        }

        Self { messages }
    }

    /// Write to `dir/chat_<YYYYmmdd_HHMMSS>.txt` and return the path.
    ///
    /// Saving an empty transcript is an error.
    pub fn save_to_dir(&self, dir: &Path) -> AppResult<PathBuf> {
        if self.messages.is_empty() {
            return Err(AppError::Other("Nothing to save: the transcript is empty".to_string()));
        }

        fs::create_dir_all(dir)?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut path = dir.join(format!("{}{}.{}", FILE_PREFIX, stamp, FILE_EXTENSION));
        let mut suffix = 1;
        while path.exists() {
            path = dir.join(format!("{}{}_{}.{}", FILE_PREFIX, stamp, suffix, FILE_EXTENSION));
            suffix += 1;
        }

        fs::write(&path, self.render())?;
        tracing::info!("Saved transcript with {} messages to {:?}", self.messages.len(), path);
        Ok(path)
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path)?;
        let transcript = Self::parse(&contents);
        tracing::debug!("Loaded {} messages from {:?}", transcript.messages.len(), path);
        Ok(transcript)
    }

    /// Saved transcripts in `dir`, newest first. A missing directory has none.
    pub fn list_saved(dir: &Path) -> AppResult<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(FILE_EXTENSION)
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with(FILE_PREFIX))
                        .unwrap_or(false)
            })
            .collect();

        files.sort();
        files.reverse();
        Ok(files)
    }
}

impl From<Vec<MemoryMessage>> for Transcript {
    fn from(messages: Vec<MemoryMessage>) -> Self {
        Self { messages }
    }
}
