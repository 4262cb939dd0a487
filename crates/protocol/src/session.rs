//! Session lifecycle types exposed at the serving boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a session turns replies into actions.
///
/// Only the structured command channel exists; free-text replies are never
/// executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
	#[default]
	Interact,
}

impl fmt::Display for SessionMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SessionMode::Interact => f.write_str("interact"),
		}
	}
}

impl FromStr for SessionMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"" | "interact" => Ok(SessionMode::Interact),
			other => Err(format!("unsupported session mode \"{other}\" (only \"interact\" is available)")),
		}
	}
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
	pub id: String,
	pub mode: SessionMode,
	/// A goal is currently being worked on.
	pub running: bool,
	pub command_count: usize,
	pub retries: u32,
	pub completed: bool,
	pub open_tabs: usize,
	/// Unix epoch seconds.
	pub created_at: u64,
	pub idle_secs: u64,
}
