//! Error types for the agent core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Runtime(#[from] pw_agent_runtime::Error),

	#[error("Session not found: {0}")]
	SessionNotFound(String),

	#[error("{0}")]
	UnsupportedMode(String),

	/// The reasoning service failed to produce a reply.
	#[error("Reasoning service error: {0}")]
	Reasoning(String),

	/// A browsing context or page could not be created.
	#[error("Browser resource unavailable: {0}")]
	Resource(String),

	#[error("No active page")]
	NoActivePage,

	#[error("Tab index {index} out of range ({count} open)")]
	TabOutOfRange { index: usize, count: usize },

	/// A page script threw or returned something unexpected.
	#[error("Script error: {0}")]
	Script(String),

	#[error("Element not found: {0}")]
	ElementNotFound(String),

	#[error("Timeout: {0}")]
	Timeout(String),

	#[error("Config error: {0}")]
	Config(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Failures that end a goal immediately instead of consuming a retry.
	pub fn is_resource_failure(&self) -> bool {
		matches!(self, Error::Resource(_))
	}

	pub fn is_timeout(&self) -> bool {
		match self {
			Error::Timeout(_) => true,
			Error::Runtime(e) => e.is_timeout(),
			_ => false,
		}
	}

	pub fn is_target_closed(&self) -> bool {
		matches!(self, Error::Runtime(e) if e.is_target_closed())
	}
}
