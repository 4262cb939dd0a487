//! Page-derived snapshots handed to the reasoning service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One visible interactive element found by a grounding pass.
///
/// Only non-empty attributes are kept. Descriptors are rebuilt on every pass
/// and never outlive the prompt they were produced for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescriptor {
	pub tag: String,
	#[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
	pub element_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub placeholder: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub aria_label: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub role: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub href: Option<String>,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub new_tab: bool,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub dropdown: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub options: Vec<String>,
}

impl ElementDescriptor {
	/// Drops attributes that are present but blank.
	pub fn normalized(mut self) -> Self {
		for field in [
			&mut self.element_type,
			&mut self.id,
			&mut self.name,
			&mut self.placeholder,
			&mut self.text,
			&mut self.aria_label,
			&mut self.role,
			&mut self.href,
		] {
			if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
				*field = None;
			}
		}
		self.options.retain(|o| !o.trim().is_empty());
		self
	}
}

impl fmt::Display for ElementDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<{}", self.tag)?;
		let attrs = [
			("type", &self.element_type),
			("id", &self.id),
			("name", &self.name),
			("placeholder", &self.placeholder),
			("aria-label", &self.aria_label),
			("role", &self.role),
			("href", &self.href),
		];
		for (key, value) in attrs {
			if let Some(value) = value {
				write!(f, " {key}={value:?}")?;
			}
		}
		if self.new_tab {
			f.write_str(" opens-new-tab")?;
		}
		if self.dropdown {
			f.write_str(" dropdown")?;
		}
		if !self.options.is_empty() {
			write!(f, " options={:?}", self.options)?;
		}
		f.write_str(">")?;
		if let Some(text) = &self.text {
			f.write_str(text)?;
		}
		Ok(())
	}
}

/// A tab as seen at the moment of the call.
///
/// `index` is the position in the context's live page list and is recomputed
/// on every call, so it is not a stable identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSnapshot {
	pub index: usize,
	pub title: String,
	pub url: String,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub current: bool,
}

impl fmt::Display for TabSnapshot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let title = if self.title.is_empty() { "(untitled)" } else { &self.title };
		write!(f, "[{}] {} - {}", self.index, title, self.url)?;
		if self.current {
			f.write_str(" (current)")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn descriptor_display_skips_absent_attributes() {
		let el = ElementDescriptor {
			tag: "input".into(),
			element_type: Some("text".into()),
			placeholder: Some("Search".into()),
			..Default::default()
		};
		assert_eq!(el.to_string(), r#"<input type="text" placeholder="Search">"#);
	}

	#[test]
	fn descriptor_display_includes_flags_and_text() {
		let el = ElementDescriptor {
			tag: "a".into(),
			href: Some("/help".into()),
			text: Some("Help".into()),
			new_tab: true,
			..Default::default()
		};
		assert_eq!(el.to_string(), r#"<a href="/help" opens-new-tab>Help"#);
	}

	#[test]
	fn normalized_drops_blank_attributes() {
		let el = ElementDescriptor {
			tag: "button".into(),
			id: Some("  ".into()),
			text: Some("Go".into()),
			options: vec!["".into(), "One".into()],
			..Default::default()
		}
		.normalized();
		assert_eq!(el.id, None);
		assert_eq!(el.text.as_deref(), Some("Go"));
		assert_eq!(el.options, vec!["One".to_string()]);
	}

	#[test]
	fn descriptor_deserializes_from_script_output() {
		let json = r#"{"tag":"select","name":"country","dropdown":true,"options":["Canada","Chile"]}"#;
		let el: ElementDescriptor = serde_json::from_str(json).unwrap();
		assert!(el.dropdown);
		assert_eq!(el.options.len(), 2);
		assert_eq!(el.element_type, None);
	}

	#[test]
	fn tab_display_marks_current() {
		let tab = TabSnapshot {
			index: 1,
			title: String::new(),
			url: "about:blank".into(),
			current: true,
		};
		assert_eq!(tab.to_string(), "[1] (untitled) - about:blank (current)");
	}
}
