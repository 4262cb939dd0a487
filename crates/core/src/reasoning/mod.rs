//! Reasoning-service boundary.
//!
//! The loop only needs `respond(prompt) -> text`; earlier turns of the
//! conversation are the service's business. A provider opens one conversation
//! per session.

mod chat;

use async_trait::async_trait;
use pw_agent_protocol::SessionMode;

pub use chat::{ChatCompletionsProvider, ChatConversation};

use crate::error::Result;

/// One conversation with the reasoning service.
#[async_trait]
pub trait ReasoningService: Send {
	/// Sends `prompt` as the next user turn and returns the reply text.
	async fn respond(&mut self, prompt: &str) -> Result<String>;
}

/// Opens conversations for new sessions.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
	async fn open(&self, mode: SessionMode) -> Result<Box<dyn ReasoningService>>;
}
