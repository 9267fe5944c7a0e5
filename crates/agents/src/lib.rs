//! Two-tier technical support agents.
//!
//! A [`TriageAgent`] classifies each query and either answers it directly or
//! escalates it to a [`SpecialistAgent`], which answers from the knowledge
//! index and its own conversation memory. [`SupportSession`] wires one of
//! each together for a single user.

pub mod analysis;
pub mod memory;
pub mod responder;
pub mod router;
pub mod session;
pub mod synthesis;
pub mod transcript;

#[cfg(test)]
mod test_support;

pub use analysis::{Complexity, QueryAnalysis, QueryCategory, ESCALATION_CONFIDENCE_THRESHOLD};
pub use memory::{MemoryBuffer, MemoryMessage, MemoryRole};
pub use responder::{score_confidence, Responder, ResponderState, SpecialistAgent};
pub use router::{format_response, ConversationTurn, Route, TriageAgent};
pub use session::{SessionSettings, SupportSession};
pub use synthesis::{AnswerSynthesizer, LlmSynthesizer, SourceRef, Synthesis};
pub use transcript::Transcript;
