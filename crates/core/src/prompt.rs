//! Prompt assembly for the interaction loop.

use std::fmt;

use pw_agent_protocol::{ActionRecord, Command, TabSnapshot};

/// Everything the loop re-derives after an action, shared by every prompt kind.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
	pub goal: &'a str,
	pub tabs: &'a [TabSnapshot],
	/// Rendered element inventory (or the no-elements sentinel).
	pub elements: &'a str,
	/// Most recent executed actions, oldest first.
	pub recent: &'a [ActionRecord],
}

/// The goal, tabs, elements, hint and history sections of a prompt.
struct Sections<'a> {
	context: &'a PromptContext<'a>,
	hint: Option<&'a str>,
}

impl fmt::Display for Sections<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let context = self.context;
		writeln!(f, "**Final Goal:** {}", context.goal)?;
		if context.tabs.len() > 1 {
			f.write_str("\n**Open Tabs:**\n")?;
			for tab in context.tabs {
				writeln!(f, "{tab}")?;
			}
		}
		write!(f, "\n**Current Page Elements:**\n{}\n", context.elements)?;
		if let Some(hint) = self.hint {
			writeln!(f, "\n**Next Goal:** {hint}")?;
		}
		if !context.recent.is_empty() {
			f.write_str("\n**Commands Executed:**\n")?;
			for (i, action) in context.recent.iter().enumerate() {
				writeln!(f, "{}. {}", i + 1, action.command.to_json())?;
			}
		}
		Ok(())
	}
}

impl<'a> PromptContext<'a> {
	fn sections(&'a self, hint: Option<&'a str>) -> Sections<'a> {
		Sections { context: self, hint }
	}
}

/// Prompt after a successful action.
pub fn next_prompt(context: &PromptContext<'_>, hint: &str) -> String {
	format!("{}\nReply with the next command.", context.sections(Some(hint)))
}

/// Prompt after a command could not be applied.
pub fn corrective_prompt(context: &PromptContext<'_>, command: &Command, error: &str) -> String {
	format!(
		"The command {} failed with error: {error}. Please try a different approach.\n\n{}",
		command.to_json(),
		context.sections(None)
	)
}

/// Prompt after a reply that did not decode into a command.
pub fn malformed_prompt(context: &PromptContext<'_>, error: &str) -> String {
	format!(
		"Your previous reply could not be used ({error}). Produce a valid command: exactly one JSON object \
		 from the command list on the first line, then one short line describing the next step.\n\n{}",
		context.sections(None)
	)
}

/// Opening instructions for every conversation.
pub const SYSTEM_PROMPT: &str = r##"You control a web browser to accomplish a goal for the user.

Each turn you receive the goal, the interactive elements visible on the current page, the open tabs when there is more than one, and the commands executed so far. Reply with exactly two lines:

1. One command as a single-line JSON object.
2. A short description of what should happen next.

Commands ("by" is one of css, text, placeholder, label, xpath; it defaults to css):

{"action":"navigate","url":"https://example.org"}
{"action":"click","selector":"Log in","by":"text"}
{"action":"click","selector":"a.docs","by":"css","new_tab":true}
{"action":"fill","selector":"Email","by":"placeholder","value":"user@example.org"}
{"action":"select","selector":"Country","by":"label","option":"Canada"}
{"action":"press_key","key":"Enter"}
{"action":"wait","ms":1000}
{"action":"wait_for_element","selector":"#results","by":"css","timeout_ms":5000}
{"action":"switch_tab","index":1}
{"action":"close_tab","index":1}
{"action":"close_tab"}
{"action":"close_other_tabs"}
{"action":"completed"}

Rules:
- Use only the commands above, with only the fields shown. Anything else is rejected.
- Prefer selectors taken from the element list: ids with css, visible text with text, placeholders with placeholder.
- press_key goes to the focused element, so fill or click a field first.
- Tab indices refer to the tab list of the current turn.
- When a command fails, the next turn says why. Try a different selector or approach.
- Reply {"action":"completed"} as soon as the goal is achieved.

Example, goal "log in to example.org as demo/secret":
{"action":"navigate","url":"https://example.org/login"}
fill the username field

{"action":"fill","selector":"Username","by":"placeholder","value":"demo"}
fill the password field

{"action":"fill","selector":"Password","by":"label","value":"secret"}
submit the form

{"action":"click","selector":"Log in","by":"text"}
check that the dashboard is shown

{"action":"completed"}

Example, goal "search for rust on example.org":
{"action":"fill","selector":"input[name=q]","by":"css","value":"rust"}
submit the search

{"action":"press_key","key":"Enter"}
wait for the results

{"action":"completed"}
"##;
