//! LLM integration crate for TechAssist.
//!
//! A provider-agnostic chat-completion abstraction. The agents only see the
//! [`LlmClient`] trait; concrete providers are chosen at startup by
//! [`create_client`].
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI**: Any OpenAI-compatible `/chat/completions` endpoint
//!
//! # Example
//! ```no_run
//! use techassist_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("How do I reset my password?", "llama3.2")
//!     .with_temperature(0.7);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{
    ChatMessage, ChatRole, LlmClient, LlmRequest, LlmResponse, LlmUsage, ResponseFormat,
};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use types::ProviderType;
