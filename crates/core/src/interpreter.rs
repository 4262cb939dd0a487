//! Turns a raw reasoning-service reply into a command and a hint.
//!
//! A reply is two lines: a JSON command, then a short note on what to do
//! next. Anything that does not decode into a known command is reported as
//! malformed instead of raising, so the loop can spend a retry on it.

use pw_agent_protocol::{Command, CommandError};

/// Used when a reply carries no second line.
pub const DEFAULT_HINT: &str = "continue with the task";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
	pub command: Option<Command>,
	pub hint: Option<String>,
	pub completed: bool,
	/// Why the reply was rejected, when `command` is `None`.
	pub error: Option<CommandError>,
}

impl Interpretation {
	fn malformed(error: CommandError) -> Self {
		Self {
			command: None,
			hint: None,
			completed: false,
			error: Some(error),
		}
	}

	pub fn is_malformed(&self) -> bool {
		self.command.is_none()
	}
}

pub fn interpret(reply: &str) -> Interpretation {
	let mut lines = reply
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty() && !line.starts_with("```"));

	let Some(payload) = lines.next() else {
		return Interpretation::malformed(CommandError::Syntax("empty reply".into()));
	};
	let command = match Command::decode(strip_inline_fence(payload)) {
		Ok(command) => command,
		Err(e) => return Interpretation::malformed(e),
	};
	if command.is_completed() {
		return Interpretation {
			command: Some(command),
			hint: None,
			completed: true,
			error: None,
		};
	}
	let hint = lines.next().unwrap_or(DEFAULT_HINT).to_string();
	Interpretation {
		command: Some(command),
		hint: Some(hint),
		completed: false,
		error: None,
	}
}

/// Removes a single-line `` `...` `` wrapper.
fn strip_inline_fence(line: &str) -> &str {
	line.strip_prefix('`')
		.and_then(|l| l.strip_suffix('`'))
		.unwrap_or(line)
}
