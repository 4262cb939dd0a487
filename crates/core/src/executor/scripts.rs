//! Page functions used by the executor.
//!
//! Each function body runs with the shared [`PRELUDE`] in scope, which holds
//! the selector resolver for every [`SelectorKind`](pw_agent_protocol::SelectorKind).

use serde_json::Value;

use crate::script;

/// Wraps `body` as `function name(args) { PRELUDE; body }` and applies it.
pub(super) fn call(name: &str, body: &str, args: &Value) -> String {
	script::invoke(&format!("function {name}(args) {{\n{PRELUDE}\n{body}\n}}"), args)
}

const PRELUDE: &str = r#"
	const clean = s => String(s || '').replace(/\s+/g, ' ').trim();
	const visible = el => {
		const rect = el.getBoundingClientRect();
		if (rect.width === 0 || rect.height === 0) return false;
		const style = window.getComputedStyle(el);
		return style.display !== 'none' && style.visibility !== 'hidden';
	};
	const labelOf = el => clean(el.innerText || el.value || el.getAttribute('aria-label'));
	const CLICKABLE = 'a, button, input[type="submit"], input[type="button"], summary, [role="button"], [role="link"], ' +
		'[role="tab"], [role="menuitem"], [role="option"], [role="checkbox"], [onclick]';

	function byExactText(want) {
		const hits = Array.from(document.body.querySelectorAll('*'))
			.filter(el => visible(el) && clean(el.textContent) === want);
		return hits.length ? hits[hits.length - 1] : null;
	}

	function resolve(selector, by) {
		switch (by) {
		case 'css':
			return document.querySelector(selector);
		case 'xpath':
			return document.evaluate(selector, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
		case 'placeholder': {
			const want = selector.toLowerCase();
			return Array.from(document.querySelectorAll('[placeholder]'))
				.find(el => el.getAttribute('placeholder').toLowerCase().includes(want)) || null;
		}
		case 'label': {
			const want = clean(selector).toLowerCase();
			for (const label of document.querySelectorAll('label')) {
				if (!clean(label.textContent).toLowerCase().includes(want)) continue;
				const control = label.control || label.querySelector('input, select, textarea');
				if (control) return control;
			}
			return Array.from(document.querySelectorAll('[aria-label]'))
				.find(el => clean(el.getAttribute('aria-label')).toLowerCase().includes(want)) || null;
		}
		case 'text': {
			const want = clean(selector);
			const lower = want.toLowerCase();
			const candidates = Array.from(document.querySelectorAll(CLICKABLE)).filter(visible);
			return candidates.find(el => labelOf(el) === want)
				|| candidates.find(el => labelOf(el).toLowerCase().includes(lower))
				|| byExactText(want);
		}
		}
		return null;
	}

	function activate(el) {
		el.scrollIntoView({ block: 'center', inline: 'center' });
		const opts = { bubbles: true, cancelable: true, view: window, button: 0 };
		el.dispatchEvent(new PointerEvent('pointerdown', opts));
		el.dispatchEvent(new MouseEvent('mousedown', opts));
		el.dispatchEvent(new PointerEvent('pointerup', opts));
		el.dispatchEvent(new MouseEvent('mouseup', opts));
		el.click();
	}
"#;

/// `{selector, by, newTab}` -> `bool`. A forced `target` is restored after
/// the click, and links that already open a new tab are left alone.
pub(super) const CLICK: &str = r#"
	const el = resolve(args.selector, args.by);
	if (!el) return false;
	const link = el.closest('a[href]');
	const swap = args.newTab && link !== null && link.getAttribute('target') !== '_blank';
	const previous = swap ? link.getAttribute('target') : null;
	if (swap) link.setAttribute('target', '_blank');
	try {
		activate(el);
	} finally {
		if (swap) {
			if (previous === null) link.removeAttribute('target');
			else link.setAttribute('target', previous);
		}
	}
	return true;
"#;

/// `{role, text}` -> `{x, y}` centre of the match, or `null`.
///
/// Reaches what [`CLICK`]'s text resolver cannot. With a role, candidates are
/// matched by accessible name (`aria-labelledby`, `aria-label`, associated
/// `<label>`, visible text, image `alt`, `title`) instead of visible text
/// alone. Without a role, any visible element whose text contains `text`,
/// ignoring case, matches; the innermost such element wins.
pub(super) const LOCATE: &str = r#"
	const ROLES = {
		button: 'button, input[type="submit"], input[type="button"], input[type="reset"], input[type="image"], [role="button"]',
		link: 'a[href], area[href], [role="link"]'
	};
	const accessibleName = el => {
		const labelledBy = clean((el.getAttribute('aria-labelledby') || '').split(/\s+/)
			.map(id => document.getElementById(id)).filter(Boolean).map(n => n.textContent).join(' '));
		if (labelledBy) return labelledBy;
		const aria = clean(el.getAttribute('aria-label'));
		if (aria) return aria;
		if (el.labels && el.labels.length) {
			const labels = clean(Array.from(el.labels).map(l => l.textContent).join(' '));
			if (labels) return labels;
		}
		const text = clean(el.innerText || el.value);
		if (text) return text;
		const img = el.matches('img, input[type="image"]') ? el : el.querySelector('img[alt]');
		if (img && clean(img.alt)) return clean(img.alt);
		return clean(el.getAttribute('title'));
	};
	const want = clean(args.text);
	const lower = want.toLowerCase();
	let el = null;
	if (args.role) {
		const candidates = Array.from(document.querySelectorAll(ROLES[args.role])).filter(visible);
		el = candidates.find(c => accessibleName(c) === want)
			|| candidates.find(c => accessibleName(c).toLowerCase().includes(lower))
			|| null;
	} else {
		const hits = Array.from(document.body.querySelectorAll('*'))
			.filter(c => visible(c) && clean(c.textContent).toLowerCase().includes(lower));
		el = hits.find(c => !Array.from(c.children).some(child => hits.includes(child))) || null;
	}
	if (!el) return null;
	el.scrollIntoView({ block: 'center', inline: 'center' });
	const rect = el.getBoundingClientRect();
	return { x: rect.left + rect.width / 2, y: rect.top + rect.height / 2 };
"#;

/// `{selector, by, value}` -> `bool`. Uses the native value setter so
/// framework-managed inputs see the change.
pub(super) const FILL: &str = r#"
	const el = resolve(args.selector, args.by);
	if (!el) return false;
	el.focus();
	if (el.isContentEditable) {
		el.textContent = args.value;
	} else {
		const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
		Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, args.value);
	}
	el.dispatchEvent(new Event('input', { bubbles: true }));
	el.dispatchEvent(new Event('change', { bubbles: true }));
	return true;
"#;

/// `{selector, by, option}` -> `{found, native, matched, options}`.
/// Non-native controls are opened and left for [`PICK_OPTION`].
pub(super) const SELECT: &str = r#"
	const el = resolve(args.selector, args.by);
	if (!el) return { found: false };
	if (el instanceof HTMLSelectElement) {
		const options = Array.from(el.options);
		const labels = options.map(o => clean(o.text));
		const want = clean(args.option);
		const match = options.find(o => clean(o.text) === want)
			|| options.find(o => o.value === args.option)
			|| options.find(o => clean(o.text).toLowerCase().includes(want.toLowerCase()));
		if (!match) return { found: true, native: true, matched: null, options: labels };
		el.value = match.value;
		el.dispatchEvent(new Event('input', { bubbles: true }));
		el.dispatchEvent(new Event('change', { bubbles: true }));
		return { found: true, native: true, matched: clean(match.text), options: labels };
	}
	el.focus();
	activate(el);
	return { found: true, native: false };
"#;

/// `{option}` -> `bool`.
pub(super) const PICK_OPTION: &str = r#"
	const want = clean(args.option);
	const candidates = Array.from(document.querySelectorAll('[role="option"], [role="menuitem"], [role="listbox"] li'))
		.filter(visible);
	const el = candidates.find(o => labelOf(o) === want)
		|| candidates.find(o => labelOf(o).toLowerCase().includes(want.toLowerCase()));
	if (!el) return false;
	activate(el);
	return true;
"#;

pub(super) const FOCUSED: &str = r#"
	const el = document.activeElement;
	return !!el && el !== document.body && el !== document.documentElement;
"#;

/// `{selector, by}` -> `bool`.
pub(super) const EXISTS: &str = r#"
	const el = resolve(args.selector, args.by);
	return !!el && visible(el);
"#;
