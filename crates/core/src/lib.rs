//! TechAssist Core Library
//!
//! Foundational utilities shared by every TechAssist crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure and the session-scoped `SessionLogger`
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AgentsConfig, AppConfig, ProviderConfig};
pub use error::{AppError, AppResult};
pub use logging::SessionLogger;
