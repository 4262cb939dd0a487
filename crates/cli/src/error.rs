use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	/// The command failed and already printed its own envelope.
	#[error("")]
	OutputAlreadyPrinted,

	#[error("daemon not running; start it with `pw-agent daemon start`")]
	DaemonNotRunning,

	#[error("daemon error {code}: {message}")]
	Daemon { code: String, message: String },

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error(transparent)]
	Agent(#[from] pw_agent::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	pub fn is_output_already_printed(&self) -> bool {
		matches!(self, CliError::OutputAlreadyPrinted)
	}

	pub fn to_command_error(&self) -> CommandError {
		let code = match self {
			CliError::OutputAlreadyPrinted => ErrorCode::InternalError,
			CliError::DaemonNotRunning => ErrorCode::DaemonNotRunning,
			CliError::Daemon { code, .. } if code == "not_found" => ErrorCode::SessionNotFound,
			CliError::Daemon { code, .. } if code == "invalid_request" => ErrorCode::InvalidInput,
			CliError::Daemon { .. } => ErrorCode::DaemonError,
			CliError::InvalidInput(_) => ErrorCode::InvalidInput,
			CliError::Agent(e) => agent_error_code(e),
			CliError::Io(_) => ErrorCode::IoError,
			CliError::Json(_) => ErrorCode::InternalError,
			CliError::Anyhow(e) => match e.downcast_ref::<pw_agent::Error>() {
				Some(inner) => agent_error_code(inner),
				None => ErrorCode::InternalError,
			},
		};
		CommandError {
			code,
			message: format!("{self:#}"),
			details: None,
		}
	}
}

fn agent_error_code(err: &pw_agent::Error) -> ErrorCode {
	use pw_agent::Error;
	match err {
		Error::SessionNotFound(_) => ErrorCode::SessionNotFound,
		Error::UnsupportedMode(_) => ErrorCode::InvalidInput,
		Error::Reasoning(_) => ErrorCode::ReasoningError,
		Error::Config(_) => ErrorCode::ConfigError,
		Error::Io(_) => ErrorCode::IoError,
		Error::Runtime(_) | Error::Resource(_) => ErrorCode::BrowserUnavailable,
		_ => ErrorCode::InternalError,
	}
}
