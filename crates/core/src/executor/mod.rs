//! Executes one [`Command`] against the session's pages.
//!
//! Every call ends in exactly one of three ways: the command was applied, it
//! could not be applied ([`Outcome::Failed`] with a reason the reasoning
//! service can act on), or an error was raised. Tab commands are delegated to
//! the [`TabCoordinator`].

mod scripts;

use std::time::Duration;

use pw_agent_protocol::{Command, SelectorKind};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use crate::config::ExecutorConfig;
use crate::engine::PageHandle;
use crate::error::{Error, Result};
use crate::tabs::TabCoordinator;

/// Longest fixed delay a `wait` command may request.
const MAX_WAIT_MS: u64 = 60_000;

/// Result of executing one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	Applied,
	Failed(String),
	Completed,
}

#[derive(Debug, Deserialize)]
struct SelectResult {
	found: bool,
	#[serde(default)]
	native: bool,
	#[serde(default)]
	matched: Option<String>,
	#[serde(default)]
	options: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Point {
	x: f64,
	y: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Executor {
	config: ExecutorConfig,
}

impl Executor {
	pub fn new(config: ExecutorConfig) -> Self {
		Self { config }
	}

	pub async fn execute(&self, command: &Command, tabs: &mut TabCoordinator) -> Result<Outcome> {
		tracing::debug!(target = "pw.exec", action = command.action(), %command, "executing");
		let outcome = match command {
			Command::Navigate { url } => self.navigate(tabs, url).await?,
			Command::Click { selector, by, new_tab } => self.click(&active(tabs)?, selector, *by, *new_tab).await?,
			Command::Fill { selector, by, value } => self.fill(&active(tabs)?, selector, *by, value).await?,
			Command::Select { selector, by, option } => self.select(&active(tabs)?, selector, *by, option).await?,
			Command::PressKey { key } => self.press_key(&active(tabs)?, key).await?,
			Command::Wait { ms } => {
				let ms = (*ms).min(MAX_WAIT_MS);
				tokio::time::sleep(Duration::from_millis(ms)).await;
				Outcome::Applied
			}
			Command::WaitForElement { selector, by, timeout_ms } => {
				self.wait_for_element(&active(tabs)?, selector, *by, *timeout_ms).await?
			}
			Command::SwitchTab { index } => tab_outcome(tabs.switch_to(*index).await.map(|_| ()))?,
			Command::CloseTab { index } => tab_outcome(tabs.close_tab(*index).await)?,
			Command::CloseOtherTabs => {
				let closed = tabs.close_other_tabs().await?;
				tracing::debug!(target = "pw.exec", closed, "closed other tabs");
				Outcome::Applied
			}
			Command::Completed => Outcome::Completed,
		};
		match &outcome {
			Outcome::Failed(reason) => tracing::info!(target = "pw.exec", %command, %reason, "command failed"),
			_ => tracing::info!(target = "pw.exec", %command, "command applied"),
		}
		Ok(outcome)
	}

	/// Loads `url` in the active page, opening one if every tab is closed.
	async fn navigate(&self, tabs: &mut TabCoordinator, url: &str) -> Result<Outcome> {
		let url = match normalize_url(url) {
			Ok(url) => url,
			Err(reason) => return Ok(Outcome::Failed(reason)),
		};
		let page = match tabs.current() {
			Some(page) => page,
			None => tabs.open_page().await?,
		};
		page.goto(&url, Duration::from_millis(self.config.navigation_timeout_ms)).await?;
		Ok(Outcome::Applied)
	}

	async fn click(&self, page: &PageHandle, selector: &str, by: SelectorKind, new_tab: bool) -> Result<Outcome> {
		let args = json!({ "selector": selector, "by": by, "newTab": new_tab });
		if page.evaluate(&scripts::call("pwClick", scripts::CLICK, &args)).await?.as_bool() == Some(true) {
			return Ok(Outcome::Applied);
		}
		if by == SelectorKind::Text && self.native_text_click(page, selector).await? {
			return Ok(Outcome::Applied);
		}
		Ok(not_found(selector, by))
	}

	/// Trusted-input fallback for text clicks: role button by accessible name,
	/// then role link by accessible name, then any element containing the
	/// text regardless of case.
	async fn native_text_click(&self, page: &PageHandle, text: &str) -> Result<bool> {
		for role in ["button", "link", ""] {
			let args = json!({ "role": role, "text": text });
			let located = page.evaluate(&scripts::call("pwLocate", scripts::LOCATE, &args)).await?;
			if located.is_null() {
				continue;
			}
			let point: Point = serde_json::from_value(located)?;
			page.click_at(point.x, point.y).await?;
			tracing::debug!(target = "pw.exec", text, role, "clicked via native fallback");
			return Ok(true);
		}
		Ok(false)
	}

	async fn fill(&self, page: &PageHandle, selector: &str, by: SelectorKind, value: &str) -> Result<Outcome> {
		let args = json!({ "selector": selector, "by": by, "value": value });
		if page.evaluate(&scripts::call("pwFill", scripts::FILL, &args)).await?.as_bool() == Some(true) {
			Ok(Outcome::Applied)
		} else {
			Ok(not_found(selector, by))
		}
	}

	async fn select(&self, page: &PageHandle, selector: &str, by: SelectorKind, option: &str) -> Result<Outcome> {
		let args = json!({ "selector": selector, "by": by, "option": option });
		let result: SelectResult =
			serde_json::from_value(page.evaluate(&scripts::call("pwSelect", scripts::SELECT, &args)).await?)?;
		if !result.found {
			return Ok(not_found(selector, by));
		}
		if result.native {
			return Ok(match result.matched {
				Some(_) => Outcome::Applied,
				None => Outcome::Failed(format!(
					"Option {option:?} not found in {by} {selector:?}. Available options: {}",
					result.options.join(", ")
				)),
			});
		}

		// Custom dropdown: give the popup time to render, then click the option.
		tokio::time::sleep(Duration::from_millis(self.config.combobox_open_delay_ms)).await;
		let picked = page
			.evaluate(&scripts::call("pwPickOption", scripts::PICK_OPTION, &json!({ "option": option })))
			.await?;
		if picked.as_bool() == Some(true) {
			return Ok(Outcome::Applied);
		}
		// The control still has focus from opening it.
		if let Err(e) = page.press_key("Escape").await {
			tracing::debug!(target = "pw.exec", error = %e, "could not close dropdown");
		}
		Ok(Outcome::Failed(format!("Option {option:?} not found in dropdown {by} {selector:?}")))
	}

	async fn press_key(&self, page: &PageHandle, key: &str) -> Result<Outcome> {
		let focused = page.evaluate(&scripts::call("pwFocused", scripts::FOCUSED, &json!({}))).await?;
		if focused.as_bool() != Some(true) {
			return Ok(Outcome::Failed(format!("Cannot press {key}: no element has focus")));
		}
		page.press_key(key).await?;
		Ok(Outcome::Applied)
	}

	async fn wait_for_element(&self, page: &PageHandle, selector: &str, by: SelectorKind, timeout_ms: u64) -> Result<Outcome> {
		let timeout_ms = timeout_ms.min(self.config.wait_for_element_timeout_ms);
		let args = json!({ "selector": selector, "by": by });
		let expression = scripts::call("pwExists", scripts::EXISTS, &args);
		let deadline = Instant::now() + Duration::from_millis(timeout_ms);
		let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
		loop {
			if page.evaluate(&expression).await?.as_bool() == Some(true) {
				return Ok(Outcome::Applied);
			}
			if Instant::now() >= deadline {
				return Ok(Outcome::Failed(format!("Timed out after {timeout_ms}ms waiting for {by} {selector:?}")));
			}
			tokio::time::sleep(poll.min(deadline.saturating_duration_since(Instant::now()))).await;
		}
	}
}

fn active(tabs: &mut TabCoordinator) -> Result<PageHandle> {
	tabs.current().ok_or(Error::NoActivePage)
}

fn not_found(selector: &str, by: SelectorKind) -> Outcome {
	Outcome::Failed(Error::ElementNotFound(format!("{by} {selector:?}")).to_string())
}

/// Out-of-range tab indices are ordinary failures.
fn tab_outcome(result: Result<()>) -> Result<Outcome> {
	match result {
		Ok(()) => Ok(Outcome::Applied),
		Err(e @ (Error::TabOutOfRange { .. } | Error::NoActivePage)) => Ok(Outcome::Failed(e.to_string())),
		Err(e) => Err(e),
	}
}

/// Adds `https://` to scheme-less URLs and refuses script URLs.
fn normalize_url(url: &str) -> std::result::Result<String, String> {
	let url = url.trim();
	let lower = url.to_ascii_lowercase();
	if lower.starts_with("javascript:") {
		return Err("javascript: URLs are not navigable".to_string());
	}
	if url.contains("://") || ["about:", "data:", "file:", "chrome:"].iter().any(|s| lower.starts_with(s)) {
		Ok(url.to_string())
	} else {
		Ok(format!("https://{url}"))
	}
}
