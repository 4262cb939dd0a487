//! The closed action vocabulary proposed by the reasoning service.
//!
//! Every reply line is decoded by [`Command::decode`], a strict validator that
//! rejects unknown actions and unknown fields before serde ever sees the value.
//! Nothing outside this vocabulary is executable.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default timeout for [`Command::WaitForElement`] when the reply omits one.
pub const DEFAULT_WAIT_FOR_ELEMENT_MS: u64 = 5_000;

/// Strategy used to resolve a textual selector to a concrete element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
	/// `document.querySelector` semantics.
	#[default]
	Css,
	/// Visible text of a clickable element, exact match preferred over substring.
	Text,
	/// Substring of an input's `placeholder` attribute.
	Placeholder,
	/// Text of the `<label>` (or `aria-label`) associated with a control.
	Label,
	/// XPath expression evaluated against the document.
	Xpath,
}

impl SelectorKind {
	pub fn as_str(self) -> &'static str {
		match self {
			SelectorKind::Css => "css",
			SelectorKind::Text => "text",
			SelectorKind::Placeholder => "placeholder",
			SelectorKind::Label => "label",
			SelectorKind::Xpath => "xpath",
		}
	}
}

impl fmt::Display for SelectorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

fn default_wait_for_element_ms() -> u64 {
	DEFAULT_WAIT_FOR_ELEMENT_MS
}

fn is_false(value: &bool) -> bool {
	!*value
}

/// One primitive browser action.
///
/// Serialized as a flat JSON object tagged by `action`, e.g.
/// `{"action":"click","selector":"Login","by":"text"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
	Navigate {
		url: String,
	},
	Click {
		selector: String,
		#[serde(default)]
		by: SelectorKind,
		#[serde(default, skip_serializing_if = "is_false")]
		new_tab: bool,
	},
	Fill {
		selector: String,
		#[serde(default)]
		by: SelectorKind,
		value: String,
	},
	Select {
		selector: String,
		#[serde(default)]
		by: SelectorKind,
		option: String,
	},
	PressKey {
		key: String,
	},
	Wait {
		ms: u64,
	},
	WaitForElement {
		selector: String,
		#[serde(default)]
		by: SelectorKind,
		#[serde(default = "default_wait_for_element_ms")]
		timeout_ms: u64,
	},
	SwitchTab {
		index: usize,
	},
	CloseTab {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		index: Option<usize>,
	},
	CloseOtherTabs,
	Completed,
}

/// Errors produced while decoding a reply line into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
	#[error("reply is not valid JSON: {0}")]
	Syntax(String),

	#[error("command must be a JSON object")]
	NotAnObject,

	#[error("command is missing the \"action\" field")]
	MissingAction,

	#[error("unknown action \"{0}\"")]
	UnknownAction(String),

	#[error("field \"{field}\" is not accepted by action \"{action}\"")]
	UnknownField { action: String, field: String },

	#[error("invalid \"{action}\" command: {message}")]
	Invalid { action: String, message: String },
}

/// Fields accepted by each action, excluding the `action` tag itself.
const ACTION_FIELDS: &[(&str, &[&str])] = &[
	("navigate", &["url"]),
	("click", &["selector", "by", "new_tab"]),
	("fill", &["selector", "by", "value"]),
	("select", &["selector", "by", "option"]),
	("press_key", &["key"]),
	("wait", &["ms"]),
	("wait_for_element", &["selector", "by", "timeout_ms"]),
	("switch_tab", &["index"]),
	("close_tab", &["index"]),
	("close_other_tabs", &[]),
	("completed", &[]),
];

impl Command {
	/// Decodes one reply line, rejecting anything outside the known vocabulary.
	pub fn decode(line: &str) -> Result<Self, CommandError> {
		let value: Value = serde_json::from_str(line.trim()).map_err(|e| CommandError::Syntax(e.to_string()))?;
		Self::from_value(value)
	}

	/// Validates and converts an already-parsed JSON value.
	pub fn from_value(value: Value) -> Result<Self, CommandError> {
		let object = value.as_object().ok_or(CommandError::NotAnObject)?;
		let action = object.get("action").and_then(Value::as_str).ok_or(CommandError::MissingAction)?.to_string();

		let allowed = ACTION_FIELDS
			.iter()
			.find(|(name, _)| *name == action)
			.map(|(_, fields)| *fields)
			.ok_or_else(|| CommandError::UnknownAction(action.clone()))?;

		if let Some(field) = object.keys().find(|key| key.as_str() != "action" && !allowed.contains(&key.as_str())) {
			return Err(CommandError::UnknownField {
				action,
				field: field.clone(),
			});
		}

		let command: Command = serde_json::from_value(value).map_err(|e| CommandError::Invalid {
			action: action.clone(),
			message: e.to_string(),
		})?;
		command.validate().map_err(|message| CommandError::Invalid { action, message })?;
		Ok(command)
	}

	fn validate(&self) -> Result<(), String> {
		let blank = |name: &str, value: &str| {
			if value.trim().is_empty() {
				Err(format!("\"{name}\" must not be empty"))
			} else {
				Ok(())
			}
		};
		match self {
			Command::Navigate { url } => blank("url", url),
			Command::Click { selector, .. } | Command::Fill { selector, .. } | Command::WaitForElement { selector, .. } => blank("selector", selector),
			Command::Select { selector, option, .. } => {
				blank("selector", selector)?;
				blank("option", option)
			}
			Command::PressKey { key } => blank("key", key),
			_ => Ok(()),
		}
	}

	/// The `action` tag of this command.
	pub fn action(&self) -> &'static str {
		match self {
			Command::Navigate { .. } => "navigate",
			Command::Click { .. } => "click",
			Command::Fill { .. } => "fill",
			Command::Select { .. } => "select",
			Command::PressKey { .. } => "press_key",
			Command::Wait { .. } => "wait",
			Command::WaitForElement { .. } => "wait_for_element",
			Command::SwitchTab { .. } => "switch_tab",
			Command::CloseTab { .. } => "close_tab",
			Command::CloseOtherTabs => "close_other_tabs",
			Command::Completed => "completed",
		}
	}

	pub fn is_completed(&self) -> bool {
		matches!(self, Command::Completed)
	}

	/// Compact JSON form, the same shape the reasoning service is asked to emit.
	pub fn to_json(&self) -> String {
		serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"action\":\"{}\"}}", self.action()))
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Command::Navigate { url } => write!(f, "navigate {url}"),
			Command::Click { selector, by, new_tab } => {
				write!(f, "click {by} {selector:?}")?;
				if *new_tab {
					f.write_str(" in new tab")?;
				}
				Ok(())
			}
			Command::Fill { selector, by, value } => write!(f, "fill {by} {selector:?} with {value:?}"),
			Command::Select { selector, by, option } => write!(f, "select {option:?} in {by} {selector:?}"),
			Command::PressKey { key } => write!(f, "press {key}"),
			Command::Wait { ms } => write!(f, "wait {ms}ms"),
			Command::WaitForElement { selector, by, timeout_ms } => {
				write!(f, "wait for {by} {selector:?} (up to {timeout_ms}ms)")
			}
			Command::SwitchTab { index } => write!(f, "switch to tab {index}"),
			Command::CloseTab { index: Some(index) } => write!(f, "close tab {index}"),
			Command::CloseTab { index: None } => f.write_str("close current tab"),
			Command::CloseOtherTabs => f.write_str("close other tabs"),
			Command::Completed => f.write_str("completed"),
		}
	}
}
