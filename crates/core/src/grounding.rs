//! Element grounding: a compact inventory of the visible, interactive
//! elements on a page.
//!
//! The inventory is what the reasoning service "sees" instead of raw markup.
//! It is produced fresh on every pass, in document order, and capped so a
//! busy page cannot blow up the prompt.
//!
//! Extraction is read-only and infallible from the caller's point of view:
//! any script or transport error is logged and rendered as the same
//! [`NO_INTERACTIVE_ELEMENTS`] sentinel an empty page produces.

use pw_agent_protocol::ElementDescriptor;
use serde_json::json;

use crate::config::AgentConfig;
use crate::engine::EnginePage;
use crate::error::{Error, Result};
use crate::script;

/// Rendered in place of an inventory when nothing qualifies.
pub const NO_INTERACTIVE_ELEMENTS: &str = "No interactive elements found on the page.";

/// Bounds applied to one grounding pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroundingLimits {
	pub max_elements: usize,
	pub max_options: usize,
	pub text_limit: usize,
}

impl Default for GroundingLimits {
	fn default() -> Self {
		Self::from(&AgentConfig::default())
	}
}

impl From<&AgentConfig> for GroundingLimits {
	fn from(config: &AgentConfig) -> Self {
		Self {
			max_elements: config.max_elements,
			max_options: config.max_options,
			text_limit: config.text_limit,
		}
	}
}

/// Collects interactive elements from `page`, in document order.
pub async fn extract_elements(page: &dyn EnginePage, limits: GroundingLimits) -> Result<Vec<ElementDescriptor>> {
	let args = json!({
		"max": limits.max_elements,
		"maxOptions": limits.max_options,
		"textLimit": limits.text_limit,
	});
	let value = page.evaluate(&script::invoke(GROUND_JS, &args)).await?;
	let raw: Vec<ElementDescriptor> =
		serde_json::from_value(value).map_err(|e| Error::Script(format!("unexpected grounding result: {e}")))?;

	Ok(raw
		.into_iter()
		.map(ElementDescriptor::normalized)
		.map(|mut el| {
			el.options.truncate(limits.max_options);
			el
		})
		.take(limits.max_elements)
		.collect())
}

/// One descriptor per line, or the sentinel when there are none.
pub fn render(elements: &[ElementDescriptor]) -> String {
	if elements.is_empty() {
		return NO_INTERACTIVE_ELEMENTS.to_string();
	}
	elements.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}

/// Extracts and renders; never fails.
pub async fn ground(page: &dyn EnginePage, limits: GroundingLimits) -> String {
	match extract_elements(page, limits).await {
		Ok(elements) => {
			tracing::debug!(target = "pw.ground", page = page.id(), count = elements.len(), "grounded page");
			render(&elements)
		}
		Err(e) => {
			tracing::warn!(target = "pw.ground", page = page.id(), error = %e, "element extraction failed");
			NO_INTERACTIVE_ELEMENTS.to_string()
		}
	}
}

/// Walks the document once with a combined selector so results stay in
/// document order.
const GROUND_JS: &str = r#"
function pwGround(args) {
	const INTERACTIVE = [
		'a[href]', 'button', 'input:not([type="hidden"])', 'select', 'textarea', 'summary',
		'[role="button"]', '[role="link"]', '[role="checkbox"]', '[role="radio"]', '[role="switch"]',
		'[role="tab"]', '[role="menuitem"]', '[role="option"]', '[role="combobox"]', '[role="listbox"]',
		'[role="textbox"]', '[role="searchbox"]', '[contenteditable="true"]', '[onclick]'
	].join(',');

	function isVisible(el) {
		const rect = el.getBoundingClientRect();
		if (rect.width === 0 || rect.height === 0) return false;
		const style = window.getComputedStyle(el);
		return style.display !== 'none' && style.visibility !== 'hidden';
	}

	function clean(str, limit) {
		if (!str) return null;
		const text = String(str).replace(/\s+/g, ' ').trim();
		return text ? text.substring(0, limit) : null;
	}

	// Typed input values (passwords included) never leave the page; only
	// button-like inputs expose their value as a caption.
	function caption(el) {
		if (el.tagName === 'INPUT') {
			const type = (el.getAttribute('type') || 'text').toLowerCase();
			return ['submit', 'button', 'reset'].includes(type) ? el.value : null;
		}
		if (el.tagName === 'TEXTAREA') return null;
		return el.innerText;
	}

	function opensNewTab(el) {
		return el.tagName === 'A' && (el.getAttribute('target') || '').toLowerCase() === '_blank';
	}

	const out = [];
	for (const el of document.querySelectorAll(INTERACTIVE)) {
		if (out.length >= args.max) break;
		if (!isVisible(el)) continue;

		const role = el.getAttribute('role');
		const item = {
			tag: el.tagName.toLowerCase(),
			type: el.getAttribute('type'),
			id: el.id || null,
			name: el.getAttribute('name'),
			placeholder: el.getAttribute('placeholder'),
			text: clean(caption(el), args.textLimit),
			ariaLabel: el.getAttribute('aria-label'),
			role: role,
			href: el.getAttribute('href'),
			newTab: opensNewTab(el),
			dropdown: el.tagName === 'SELECT' || role === 'combobox' || role === 'listbox',
			options: []
		};
		if (el.tagName === 'SELECT') {
			item.text = null;
			for (const opt of Array.from(el.options).slice(0, args.maxOptions)) {
				const label = clean(opt.text, args.textLimit);
				if (label) item.options.push(label);
			}
		}
		for (const key of Object.keys(item)) {
			if (item[key] === null || item[key] === '') delete item[key];
		}
		out.push(item);
	}
	return out;
}
"#;
