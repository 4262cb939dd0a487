//! Result envelope printed by every command.
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "ok": true,
//!   "command": "run",
//!   "data": { ... },
//!   "timings": { "durationMs": 1234 }
//! }
//! ```
//!
//! On failure `data` is replaced by `error: { code, message, details? }`.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use pw_agent_protocol::{GoalOutcome, GoalStatus, SessionStatus};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// JSON envelope (default)
	#[default]
	Json,
	/// Human-readable text
	Text,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub schema_version: Option<u32>,
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
	/// Text-mode rendering; never serialized.
	#[serde(skip)]
	pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Browser could not be launched or reached
	BrowserUnavailable,
	/// The goal ended without completing
	GoalFailed,
	SessionNotFound,
	DaemonNotRunning,
	/// The daemon answered with an error
	DaemonError,
	/// The reasoning service could not be used
	ReasoningError,
	ConfigError,
	InvalidInput,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let code = match self {
			ErrorCode::BrowserUnavailable => "BROWSER_UNAVAILABLE",
			ErrorCode::GoalFailed => "GOAL_FAILED",
			ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
			ErrorCode::DaemonNotRunning => "DAEMON_NOT_RUNNING",
			ErrorCode::DaemonError => "DAEMON_ERROR",
			ErrorCode::ReasoningError => "REASONING_ERROR",
			ErrorCode::ConfigError => "CONFIG_ERROR",
			ErrorCode::InvalidInput => "INVALID_INPUT",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(code)
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
		}
	}
}

pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
	summary: Option<String>,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
			summary: None,
		}
	}

	/// Measures timings from `start` instead of builder creation.
	pub fn started_at(mut self, start: Instant) -> Self {
		self.start_time = start;
		self
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
			details: None,
		});
		self
	}

	pub fn error_with_details(mut self, code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
			details: Some(details),
		});
		self
	}

	pub fn summary(mut self, text: impl Into<String>) -> Self {
		self.summary = Some(text.into());
		self
	}

	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			schema_version: Some(SCHEMA_VERSION),
			ok: self.error.is_none() && self.data.is_some(),
			command: self.command,
			data: self.data,
			error: self.error,
			timings: Some(Timings::from(self.start_time.elapsed())),
			summary: self.summary,
		}
	}
}

pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();

	if let Some(summary) = &result.summary {
		let _ = write!(stdout, "{summary}");
		if !summary.ends_with('\n') {
			let _ = writeln!(stdout);
		}
	} else if let Some(data) = &result.data {
		if let Ok(json) = serde_json::to_string_pretty(data) {
			let _ = writeln!(stdout, "{json}");
		}
	}

	if let Some(error) = &result.error {
		let _ = writeln!(stdout, "Error [{}]: {}", error.code, error.message);
	}
}

pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}

/// Multi-line summary of a goal invocation for text output.
pub fn outcome_summary(outcome: &GoalOutcome) -> String {
	let status = match outcome.status {
		GoalStatus::Completed => "completed",
		GoalStatus::Failed => "failed",
	};
	let mut out = format!(
		"Goal {status} after {} action(s), {} failed attempt(s) in {}ms\n",
		outcome.actions.len(),
		outcome.failures.len(),
		outcome.elapsed_ms
	);
	for (i, action) in outcome.actions.iter().enumerate() {
		out.push_str(&format!("  {}. {}\n", i + 1, action.description));
	}
	if let Some(error) = &outcome.error {
		out.push_str(&format!("Last error: {error}\n"));
	}
	out
}

pub fn status_line(status: &SessionStatus) -> String {
	format!(
		"{}  {}  {}  commands={} retries={} tabs={} idle={}s",
		status.id,
		status.mode,
		if status.running { "running" } else { "idle" },
		status.command_count,
		status.retries,
		status.open_tabs,
		status.idle_secs
	)
}
