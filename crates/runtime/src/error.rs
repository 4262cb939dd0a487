//! Error types for the DevTools runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a browser over the DevTools protocol.
#[derive(Debug, Error)]
pub enum Error {
	/// No Chrome/Chromium executable could be located.
	#[error("Chrome/Chromium executable not found. Install Chrome or set PW_AGENT_CHROME")]
	BrowserNotFound,

	/// The browser process could not be started or never exposed its endpoint.
	#[error("Failed to launch browser: {0}")]
	LaunchFailed(String),

	/// Failed to establish the WebSocket connection.
	#[error("Failed to connect to DevTools endpoint: {0}")]
	ConnectionFailed(String),

	/// Transport-level error (WebSocket framing, closed socket).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Malformed or unexpected protocol traffic.
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// Error object returned by the browser for a command.
	#[error("{method} failed ({code}): {message}")]
	Remote { method: String, code: i64, message: String },

	/// Timeout waiting for an operation.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// Connection dropped before a response arrived.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout(_))
	}

	/// Returns true if the target (page, session, or browser) has gone away.
	pub fn is_target_closed(&self) -> bool {
		match self {
			Error::ChannelClosed => true,
			Error::Remote { message, .. } => {
				let message = message.to_ascii_lowercase();
				message.contains("no target with given id")
					|| message.contains("session with given id not found")
					|| message.contains("target closed")
			}
			_ => false,
		}
	}
}
