//! Trusted keyboard and mouse input for [`Page`].

use serde_json::json;

use super::Page;
use crate::error::Result;

/// DevTools key description: `(key, code, windowsVirtualKeyCode, text)`.
struct KeyDef {
	key: String,
	code: String,
	key_code: u32,
	text: Option<String>,
}

fn key_definition(key: &str) -> KeyDef {
	let named = |code: &str, key_code: u32, text: Option<&str>| KeyDef {
		key: key.to_string(),
		code: code.to_string(),
		key_code,
		text: text.map(str::to_string),
	};
	match key {
		"Enter" => named("Enter", 13, Some("\r")),
		"Tab" => named("Tab", 9, None),
		"Escape" => named("Escape", 27, None),
		"Backspace" => named("Backspace", 8, None),
		"Delete" => named("Delete", 46, None),
		"ArrowUp" => named("ArrowUp", 38, None),
		"ArrowDown" => named("ArrowDown", 40, None),
		"ArrowLeft" => named("ArrowLeft", 37, None),
		"ArrowRight" => named("ArrowRight", 39, None),
		"Home" => named("Home", 36, None),
		"End" => named("End", 35, None),
		"PageUp" => named("PageUp", 33, None),
		"PageDown" => named("PageDown", 34, None),
		" " | "Space" => KeyDef {
			key: " ".into(),
			code: "Space".into(),
			key_code: 32,
			text: Some(" ".into()),
		},
		other => {
			let mut chars = other.chars();
			match (chars.next(), chars.next()) {
				(Some(c), None) => {
					let upper = c.to_ascii_uppercase();
					let code = if c.is_ascii_alphabetic() {
						format!("Key{upper}")
					} else if c.is_ascii_digit() {
						format!("Digit{c}")
					} else {
						String::new()
					};
					KeyDef {
						key: c.to_string(),
						code,
						key_code: upper as u32,
						text: Some(c.to_string()),
					}
				}
				_ => named(other, 0, None),
			}
		}
	}
}

impl Page {
	/// Moves, presses, and releases the left button at `(x, y)`.
	pub(crate) async fn mouse_click(&self, x: f64, y: f64) -> Result<()> {
		self.send("Input.dispatchMouseEvent", json!({ "type": "mouseMoved", "x": x, "y": y }))
			.await?;
		for kind in ["mousePressed", "mouseReleased"] {
			self.send(
				"Input.dispatchMouseEvent",
				json!({ "type": kind, "x": x, "y": y, "button": "left", "buttons": 1, "clickCount": 1 }),
			)
			.await?;
		}
		Ok(())
	}

	/// Sends a keyDown/keyUp pair for a named key (`Enter`, `Tab`, `a`, ...).
	pub(crate) async fn keyboard_press(&self, key: &str) -> Result<()> {
		let def = key_definition(key);
		let mut down = json!({
			"type": if def.text.is_some() { "keyDown" } else { "rawKeyDown" },
			"key": def.key,
			"code": def.code,
			"windowsVirtualKeyCode": def.key_code,
		});
		if let Some(text) = &def.text {
			down["text"] = json!(text);
		}
		self.send("Input.dispatchKeyEvent", down).await?;
		self.send(
			"Input.dispatchKeyEvent",
			json!({ "type": "keyUp", "key": def.key, "code": def.code, "windowsVirtualKeyCode": def.key_code }),
		)
		.await?;
		Ok(())
	}
}
