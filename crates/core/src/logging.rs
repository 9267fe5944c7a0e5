//! Logging infrastructure for TechAssist.
//!
//! `init_logging` installs the process subscriber: stderr output (stdout is
//! reserved for answers) plus an optional plain-text file. Agents never log
//! through a global handle of their own; they receive a [`SessionLogger`]
//! whose span scopes every event emitted for one support session.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Initialize the tracing subscriber.
///
/// # Arguments
/// * `log_level` - Optional filter override (e.g., "debug", "techassist_agents=trace")
/// * `no_color` - Disable colored output
/// * `log_file` - Also append plain-text logs to this file
pub fn init_logging(
    log_level: Option<&str>,
    no_color: bool,
    log_file: Option<&Path>,
) -> AppResult<()> {
    let default_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_str = log_level.unwrap_or(&default_level);

    let env_filter = EnvFilter::try_new(filter_str)
        .map_err(|e| AppError::Config(format!("Invalid log filter: {}", e)))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(!no_color && supports_color());

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_target(true)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))?;

    Ok(())
}

fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Session-scoped logging capability.
///
/// Opened when a support session starts and closed when it ends. Components
/// that take a `SessionLogger` instrument their work with [`SessionLogger::span`]
/// so every event carries the session id.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session_id: String,
    span: Span,
    opened_at: Instant,
}

impl SessionLogger {
    /// Open a logger for a new session.
    pub fn open(session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let span = tracing::info_span!("session", id = %session_id);
        span.in_scope(|| tracing::info!("Session opened"));
        Self {
            session_id,
            span,
            opened_at: Instant::now(),
        }
    }

    /// A logger not bound to any session; events land in the caller's span.
    pub fn detached() -> Self {
        Self {
            session_id: String::new(),
            span: Span::none(),
            opened_at: Instant::now(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Span to instrument session work with.
    pub fn span(&self) -> Span {
        self.span.clone()
    }

    /// Close the session, recording how many turns it served.
    pub fn close(self, turns: usize) {
        let elapsed = self.opened_at.elapsed().as_secs_f64();
        self.span.in_scope(|| {
            tracing::info!("Session closed after {} turn(s) in {:.1}s", turns, elapsed)
        });
    }
}

impl Default for SessionLogger {
    fn default() -> Self {
        Self::detached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("logs").join("techassist.log");
        // A global subscriber may already be installed by another test.
        let _ = init_logging(Some("info"), true, Some(&log_path));
        assert!(log_path.exists());
    }

    #[test]
    fn test_session_logger_lifecycle() {
        let logger = SessionLogger::open("abc-123");
        assert_eq!(logger.session_id(), "abc-123");
        let span = logger.span();
        span.in_scope(|| tracing::debug!("inside session"));
        logger.close(2);
    }

    #[test]
    fn test_detached_logger_has_no_id() {
        let logger = SessionLogger::default();
        assert!(logger.session_id().is_empty());
        assert!(logger.span().is_none());
    }
}
