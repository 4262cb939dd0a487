//! OpenAI-compatible `/chat/completions` client.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pw_agent_protocol::SessionMode;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ReasoningProvider, ReasoningService};
use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::prompt::SYSTEM_PROMPT;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct ChatMessage {
	role: String,
	content: String,
}

impl ChatMessage {
	fn new(role: &str, content: &str) -> Self {
		Self {
			role: role.into(),
			content: content.into(),
		}
	}
}

#[derive(Serialize)]
struct ChatRequest<'a> {
	model: &'a str,
	messages: &'a [ChatMessage],
	temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
	choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
	message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
	content: Option<String>,
}

/// Endpoint settings shared by every conversation of a provider.
struct Endpoint {
	client: Client,
	url: String,
	model: String,
	temperature: f32,
	api_key: Option<String>,
}

impl fmt::Debug for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Endpoint")
			.field("url", &self.url)
			.field("model", &self.model)
			.field("api_key", &self.api_key.as_ref().map(|_| "****"))
			.finish()
	}
}

/// Opens [`ChatConversation`]s against one endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsProvider {
	endpoint: Arc<Endpoint>,
}

impl ChatCompletionsProvider {
	/// Reads the API key from the variable named by `config.api_key_env`.
	/// A missing key is allowed for local servers that do not check it.
	pub fn from_config(config: &LlmConfig) -> Result<Self> {
		let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.trim().is_empty());
		if api_key.is_none() {
			tracing::warn!(target = "pw.llm", var = %config.api_key_env, "no API key set; sending unauthenticated requests");
		}
		Self::new(config, api_key)
	}

	pub fn new(config: &LlmConfig, api_key: Option<String>) -> Result<Self> {
		let client = Client::builder()
			.timeout(Duration::from_secs(config.timeout_secs))
			.build()
			.map_err(|e| Error::Reasoning(format!("failed to create HTTP client: {e}")))?;
		Ok(Self {
			endpoint: Arc::new(Endpoint {
				client,
				url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
				model: config.model.clone(),
				temperature: config.temperature,
				api_key,
			}),
		})
	}

	pub fn conversation(&self) -> ChatConversation {
		ChatConversation {
			endpoint: Arc::clone(&self.endpoint),
			messages: vec![ChatMessage::new("system", SYSTEM_PROMPT)],
		}
	}
}

#[async_trait]
impl ReasoningProvider for ChatCompletionsProvider {
	async fn open(&self, mode: SessionMode) -> Result<Box<dyn ReasoningService>> {
		tracing::debug!(target = "pw.llm", %mode, model = %self.endpoint.model, "opening conversation");
		Ok(Box::new(self.conversation()))
	}
}

/// Keeps the whole exchange so the service sees earlier turns.
#[derive(Debug)]
pub struct ChatConversation {
	endpoint: Arc<Endpoint>,
	messages: Vec<ChatMessage>,
}

impl ChatConversation {
	async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
		let endpoint = &self.endpoint;
		let body = ChatRequest {
			model: &endpoint.model,
			messages,
			temperature: endpoint.temperature,
		};
		let mut request = endpoint.client.post(&endpoint.url).json(&body);
		if let Some(key) = &endpoint.api_key {
			request = request.bearer_auth(key);
		}

		let response = request
			.send()
			.await
			.map_err(|e| Error::Reasoning(format!("request failed: {e}")))?;
		let status = response.status();
		if !status.is_success() {
			let text = response.text().await.unwrap_or_default();
			return Err(Error::Reasoning(format!("HTTP {status}: {}", sanitize(&text))));
		}
		let parsed: ChatResponse = response
			.json()
			.await
			.map_err(|e| Error::Reasoning(format!("invalid response: {e}")))?;
		parsed
			.choices
			.into_iter()
			.next()
			.and_then(|choice| choice.message.content)
			.ok_or_else(|| Error::Reasoning("response contained no message".into()))
	}
}

#[async_trait]
impl ReasoningService for ChatConversation {
	async fn respond(&mut self, prompt: &str) -> Result<String> {
		let mut messages = self.messages.clone();
		messages.push(ChatMessage::new("user", prompt));
		tracing::debug!(target = "pw.llm", turns = messages.len(), prompt, "sending prompt");

		let reply = self.complete(&messages).await?;
		tracing::debug!(target = "pw.llm", reply = %reply, "received reply");

		messages.push(ChatMessage::new("assistant", &reply));
		self.messages = messages;
		Ok(reply)
	}
}

/// Keeps error bodies short and free of echoed credentials.
fn sanitize(body: &str) -> String {
	let lower = body.to_lowercase();
	if lower.contains("api key") || lower.contains("unauthorized") || lower.contains("authentication") {
		return "authentication failed; check the configured API key".into();
	}
	let body = body.trim();
	match body.char_indices().nth(300) {
		Some((at, _)) => format!("{}...(truncated)", &body[..at]),
		None => body.to_string(),
	}
}
