//! In-memory engine and reasoning service for unit tests.
//!
//! [`FakePage`] understands the page scripts the crate sends (it dispatches on
//! the `pwName` of each invocation) and simulates them over a flat list of
//! [`FakeElement`]s. Element `i` occupies the box `(0, i*20)..(100, i*20+20)`.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pw_agent_protocol::SessionMode;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use crate::engine::{ContextHandle, Engine, EngineContext, EnginePage, PageHandle};
use crate::error::{Error, Result};
use crate::reasoning::{ReasoningProvider, ReasoningService};
use crate::script;

static NEXT_PAGE: AtomicUsize = AtomicUsize::new(1);

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
	pub tag: String,
	pub id: Option<String>,
	pub role: Option<String>,
	pub text: String,
	pub placeholder: Option<String>,
	/// `aria-label` or an associated `<label>`.
	pub label: Option<String>,
	pub title: Option<String>,
	/// The `type` attribute of an `input`.
	pub input_type: Option<String>,
	pub href: Option<String>,
	pub target_blank: bool,
	pub visible: bool,
	pub value: String,
	pub options: Vec<String>,
	/// Opens this URL in a new page when clicked.
	pub popup: Option<String>,
	pub clicks: usize,
	pub focused: bool,
}

impl FakeElement {
	fn new(tag: &str) -> Self {
		Self {
			tag: tag.into(),
			visible: true,
			..Default::default()
		}
	}

	pub fn button(text: &str) -> Self {
		Self {
			text: text.into(),
			..Self::new("button")
		}
	}

	pub fn link(text: &str, href: &str) -> Self {
		Self {
			text: text.into(),
			href: Some(href.into()),
			..Self::new("a")
		}
	}

	pub fn input(placeholder: &str) -> Self {
		Self {
			placeholder: Some(placeholder.into()),
			..Self::new("input")
		}
	}

	pub fn select(name: &str, options: &[String]) -> Self {
		Self {
			id: Some(name.into()),
			label: Some(name.into()),
			options: options.to_vec(),
			..Self::new("select")
		}
	}

	pub fn combobox(label: &str) -> Self {
		Self {
			role: Some("combobox".into()),
			label: Some(label.into()),
			..Self::new("div")
		}
	}

	pub fn option(text: &str) -> Self {
		Self {
			role: Some("option".into()),
			text: text.into(),
			..Self::new("li")
		}
	}

	/// A `div` that is not in the clickable set.
	pub fn plain(text: &str) -> Self {
		Self {
			text: text.into(),
			..Self::new("div")
		}
	}

	pub fn with_id(mut self, id: &str) -> Self {
		self.id = Some(id.into());
		self
	}

	pub fn with_role(mut self, role: &str) -> Self {
		self.role = Some(role.into());
		self
	}

	pub fn with_label(mut self, label: &str) -> Self {
		self.label = Some(label.into());
		self
	}

	pub fn with_type(mut self, input_type: &str) -> Self {
		self.input_type = Some(input_type.into());
		self
	}

	pub fn with_title(mut self, title: &str) -> Self {
		self.title = Some(title.into());
		self
	}

	pub fn target_blank(mut self) -> Self {
		self.target_blank = true;
		self
	}

	pub fn opens_popup(mut self, url: &str) -> Self {
		self.popup = Some(url.into());
		self
	}

	pub fn hidden(mut self) -> Self {
		self.visible = false;
		self
	}

	pub fn focused(mut self) -> Self {
		self.focused = true;
		self
	}

	fn role_matches(&self, role: &str) -> bool {
		self.role.as_deref() == Some(role)
			|| match role {
				"button" => self.tag == "button",
				"link" => self.tag == "a",
				_ => false,
			}
	}

	fn is_clickable(&self) -> bool {
		matches!(self.tag.as_str(), "a" | "button")
			|| self
				.role
				.as_deref()
				.is_some_and(|r| matches!(r, "button" | "link" | "tab" | "menuitem" | "option" | "checkbox"))
	}

	/// What the click script matches text selectors against: visible text,
	/// then value, then `aria-label`.
	fn script_label(&self) -> &str {
		[Some(self.text.as_str()), Some(self.value.as_str()), self.label.as_deref()]
			.into_iter()
			.flatten()
			.find(|s| !s.is_empty())
			.unwrap_or_default()
	}

	/// Accessible name as the locate script computes it.
	fn accessible_name(&self) -> &str {
		[self.label.as_deref(), Some(self.text.as_str()), Some(self.value.as_str()), self.title.as_deref()]
			.into_iter()
			.flatten()
			.find(|s| !s.is_empty())
			.unwrap_or_default()
	}

	fn descriptor(&self, max_options: usize) -> Value {
		let mut item = json!({ "tag": self.tag });
		let mut put = |key: &str, value: Option<&str>| {
			if let Some(v) = value.filter(|v| !v.is_empty()) {
				item[key] = json!(v);
			}
		};
		put("type", self.input_type.as_deref());
		put("id", self.id.as_deref());
		put("role", self.role.as_deref());
		put("placeholder", self.placeholder.as_deref());
		put("ariaLabel", self.label.as_deref());
		put("href", self.href.as_deref());
		match self.tag.as_str() {
			"select" | "textarea" => {}
			"input" => {
				if matches!(self.input_type.as_deref(), Some("submit" | "button" | "reset")) {
					put("text", Some(&self.value));
				}
			}
			_ => put("text", Some(&self.text)),
		}
		if self.target_blank {
			item["newTab"] = json!(true);
		}
		let dropdown = self.tag == "select" || matches!(self.role.as_deref(), Some("combobox" | "listbox"));
		if dropdown {
			item["dropdown"] = json!(true);
		}
		if !self.options.is_empty() {
			item["options"] = json!(self.options.iter().take(max_options).collect::<Vec<_>>());
		}
		item
	}
}

/// A scripted page with a flat element list.
pub struct FakePage {
	id: String,
	url: Mutex<String>,
	title: Mutex<String>,
	elements: Mutex<Vec<FakeElement>>,
	failing: Mutex<HashSet<String>>,
	unreachable: Mutex<HashSet<String>>,
	keys: Mutex<Vec<String>>,
	front: AtomicUsize,
	closed: AtomicBool,
	context: Mutex<Weak<FakeContext>>,
}

impl FakePage {
	pub fn new(url: &str) -> Arc<Self> {
		let n = NEXT_PAGE.fetch_add(1, Ordering::Relaxed);
		Arc::new(Self {
			id: format!("page-{n}"),
			url: Mutex::new(url.into()),
			title: Mutex::new(String::new()),
			elements: Mutex::new(Vec::new()),
			failing: Mutex::new(HashSet::new()),
			unreachable: Mutex::new(HashSet::new()),
			keys: Mutex::new(Vec::new()),
			front: AtomicUsize::new(0),
			closed: AtomicBool::new(false),
			context: Mutex::new(Weak::new()),
		})
	}

	pub fn add(&self, element: FakeElement) {
		self.elements.lock().push(element);
	}

	pub fn set_title(&self, title: &str) {
		*self.title.lock() = title.into();
	}

	pub fn element(&self, index: usize) -> FakeElement {
		self.elements.lock()[index].clone()
	}

	pub fn elements(&self) -> Vec<FakeElement> {
		self.elements.lock().clone()
	}

	pub fn current_url(&self) -> String {
		self.url.lock().clone()
	}

	/// Makes every invocation of the named page function throw.
	pub fn fail_scripts(&self, name: &str) {
		self.failing.lock().insert(name.into());
	}

	/// Makes navigation to `url` fail like an unresolvable host.
	pub fn unreachable(&self, url: &str) {
		self.unreachable.lock().insert(url.into());
	}

	pub fn pressed_keys(&self) -> Vec<String> {
		self.keys.lock().clone()
	}

	pub fn front_count(&self) -> usize {
		self.front.load(Ordering::Relaxed)
	}

	fn find(&self, selector: &str, by: &str) -> Option<usize> {
		let elements = self.elements.lock();
		let lower = selector.to_lowercase();
		match by {
			"css" => {
				let id = selector.strip_prefix('#')?;
				elements.iter().position(|e| e.id.as_deref() == Some(id))
			}
			"placeholder" => elements
				.iter()
				.position(|e| e.placeholder.as_deref().is_some_and(|p| p.to_lowercase().contains(&lower))),
			"label" => elements
				.iter()
				.position(|e| e.label.as_deref().is_some_and(|l| l.to_lowercase().contains(&lower))),
			"text" => {
				let candidates: Vec<usize> = (0..elements.len())
					.filter(|&i| elements[i].visible && elements[i].is_clickable())
					.collect();
				candidates
					.iter()
					.copied()
					.find(|&i| elements[i].script_label() == selector)
					.or_else(|| {
						candidates
							.iter()
							.copied()
							.find(|&i| elements[i].script_label().to_lowercase().contains(&lower))
					})
					.or_else(|| elements.iter().rposition(|e| e.visible && e.text == selector))
			}
			"xpath" => {
				let text = selector.strip_prefix("//*[text()='")?.strip_suffix("']")?;
				elements.iter().position(|e| e.text == text)
			}
			_ => None,
		}
	}

	fn activate(&self, index: usize, force_new_tab: bool) {
		let popup = {
			let mut elements = self.elements.lock();
			let el = &mut elements[index];
			el.clicks += 1;
			match (&el.popup, &el.href) {
				(Some(url), _) => Some(url.clone()),
				(None, Some(href)) if el.target_blank || force_new_tab => Some(href.clone()),
				(None, Some(href)) => {
					*self.url.lock() = href.clone();
					None
				}
				_ => None,
			}
		};
		let context = self.context.lock().upgrade();
		if let (Some(url), Some(context)) = (popup, context) {
			context.spawn(&url);
		}
	}

	fn run(&self, name: &str, args: &Value) -> Result<Value> {
		let str_arg = |key: &str| args[key].as_str().unwrap_or_default().to_string();
		match name {
			"pwGround" => {
				let max = args["max"].as_u64().unwrap_or(50) as usize;
				let max_options = args["maxOptions"].as_u64().unwrap_or(10) as usize;
				let items: Vec<Value> = self
					.elements
					.lock()
					.iter()
					.filter(|e| e.visible)
					.take(max)
					.map(|e| e.descriptor(max_options))
					.collect();
				Ok(Value::Array(items))
			}
			"pwClick" => {
				let Some(index) = self.find(&str_arg("selector"), &str_arg("by")) else {
					return Ok(json!(false));
				};
				self.activate(index, args["newTab"].as_bool().unwrap_or(false));
				Ok(json!(true))
			}
			"pwLocate" => {
				let role = str_arg("role");
				let text = str_arg("text");
				let lower = text.to_lowercase();
				let elements = self.elements.lock();
				let hit = if role.is_empty() {
					elements.iter().position(|e| e.visible && e.text.to_lowercase().contains(&lower))
				} else {
					let candidates: Vec<usize> = (0..elements.len())
						.filter(|&i| elements[i].visible && elements[i].role_matches(&role))
						.collect();
					candidates
						.iter()
						.copied()
						.find(|&i| elements[i].accessible_name() == text)
						.or_else(|| {
							candidates
								.iter()
								.copied()
								.find(|&i| elements[i].accessible_name().to_lowercase().contains(&lower))
						})
				};
				Ok(hit.map_or(Value::Null, |i| json!({ "x": 50.0, "y": i as f64 * 20.0 + 10.0 })))
			}
			"pwFill" => {
				let Some(index) = self.find(&str_arg("selector"), &str_arg("by")) else {
					return Ok(json!(false));
				};
				self.elements.lock()[index].value = str_arg("value");
				Ok(json!(true))
			}
			"pwSelect" => {
				let Some(index) = self.find(&str_arg("selector"), &str_arg("by")) else {
					return Ok(json!({ "found": false }));
				};
				let mut elements = self.elements.lock();
				let el = &mut elements[index];
				if el.tag != "select" {
					el.clicks += 1;
					return Ok(json!({ "found": true, "native": false }));
				}
				let want = str_arg("option");
				let matched = el
					.options
					.iter()
					.find(|o| **o == want)
					.or_else(|| el.options.iter().find(|o| o.to_lowercase().contains(&want.to_lowercase())))
					.cloned();
				if let Some(option) = &matched {
					el.value = option.clone();
				}
				Ok(json!({ "found": true, "native": true, "matched": matched, "options": el.options }))
			}
			"pwPickOption" => {
				let want = str_arg("option");
				let hit = self
					.elements
					.lock()
					.iter()
					.position(|e| e.visible && e.role.as_deref() == Some("option") && e.text.contains(&want));
				match hit {
					Some(i) => {
						self.activate(i, false);
						Ok(json!(true))
					}
					None => Ok(json!(false)),
				}
			}
			"pwFocused" => Ok(json!(self.elements.lock().iter().any(|e| e.focused))),
			"pwExists" => Ok(json!(self.find(&str_arg("selector"), &str_arg("by")).is_some())),
			other => Err(Error::Script(format!("ReferenceError: {other} is not defined"))),
		}
	}
}

#[async_trait]
impl EnginePage for FakePage {
	fn id(&self) -> &str {
		&self.id
	}

	async fn url(&self) -> Result<String> {
		Ok(self.url.lock().clone())
	}

	async fn title(&self) -> Result<String> {
		Ok(self.title.lock().clone())
	}

	async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
		if self.unreachable.lock().contains(url) {
			return Err(Error::Script(format!("navigation to {url} failed: net::ERR_NAME_NOT_RESOLVED")));
		}
		*self.url.lock() = url.into();
		Ok(())
	}

	async fn evaluate(&self, expression: &str) -> Result<Value> {
		if self.is_closed() {
			return Err(Error::Script(format!("page {} is closed", self.id)));
		}
		let (name, args) =
			script::parse_invocation(expression).ok_or_else(|| Error::Script("SyntaxError: unexpected expression".into()))?;
		if self.failing.lock().contains(&name) {
			return Err(Error::Script(format!("Error: {name} failed")));
		}
		self.run(&name, &args)
	}

	async fn click_at(&self, _x: f64, y: f64) -> Result<()> {
		let index = (y / 20.0) as usize;
		if index >= self.elements.lock().len() {
			return Ok(());
		}
		self.activate(index, false);
		Ok(())
	}

	async fn press_key(&self, key: &str) -> Result<()> {
		self.keys.lock().push(key.into());
		Ok(())
	}

	async fn bring_to_front(&self) -> Result<()> {
		self.front.fetch_add(1, Ordering::Relaxed);
		Ok(())
	}

	async fn wait_for_load(&self, _timeout: Duration) -> Result<()> {
		Ok(())
	}

	async fn close(&self) -> Result<()> {
		self.closed.store(true, Ordering::Release);
		Ok(())
	}

	fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}
}

/// A context whose pages are [`FakePage`]s.
pub struct FakeContext {
	me: Weak<FakeContext>,
	pages: Mutex<Vec<Arc<FakePage>>>,
	page_tx: broadcast::Sender<PageHandle>,
	fail_new_page: AtomicBool,
	closed: AtomicBool,
}

impl FakeContext {
	pub fn new() -> Arc<Self> {
		let (page_tx, _) = broadcast::channel(16);
		Arc::new_cyclic(|me| Self {
			me: me.clone(),
			pages: Mutex::new(Vec::new()),
			page_tx,
			fail_new_page: AtomicBool::new(false),
			closed: AtomicBool::new(false),
		})
	}

	/// Opens a page as if the page itself had called `window.open`.
	pub fn spawn(&self, url: &str) -> Arc<FakePage> {
		let page = FakePage::new(url);
		*page.context.lock() = self.me.clone();
		self.pages.lock().push(Arc::clone(&page));
		let _ = self.page_tx.send(Arc::clone(&page) as PageHandle);
		page
	}

	pub fn fake_pages(&self) -> Vec<Arc<FakePage>> {
		self.pages.lock().clone()
	}

	pub fn fail_new_pages(&self) {
		self.fail_new_page.store(true, Ordering::Relaxed);
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}
}

#[async_trait]
impl EngineContext for FakeContext {
	async fn new_page(&self) -> Result<PageHandle> {
		if self.fail_new_page.load(Ordering::Relaxed) {
			return Err(Error::Resource("create page: browser has disconnected".into()));
		}
		Ok(self.spawn("about:blank") as PageHandle)
	}

	fn pages(&self) -> Vec<PageHandle> {
		self.pages
			.lock()
			.iter()
			.filter(|p| !p.is_closed())
			.map(|p| Arc::clone(p) as PageHandle)
			.collect()
	}

	fn subscribe_pages(&self) -> broadcast::Receiver<PageHandle> {
		self.page_tx.subscribe()
	}

	async fn close(&self) -> Result<()> {
		for page in self.fake_pages() {
			page.close().await?;
		}
		self.closed.store(true, Ordering::Release);
		Ok(())
	}
}

/// Hands out [`FakeContext`]s and remembers them.
#[derive(Default)]
pub struct FakeEngine {
	contexts: Mutex<Vec<Arc<FakeContext>>>,
	fail: AtomicBool,
}

impl FakeEngine {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn contexts(&self) -> Vec<Arc<FakeContext>> {
		self.contexts.lock().clone()
	}

	pub fn fail_contexts(&self) {
		self.fail.store(true, Ordering::Relaxed);
	}
}

#[async_trait]
impl Engine for FakeEngine {
	async fn new_context(&self) -> Result<ContextHandle> {
		if self.fail.load(Ordering::Relaxed) {
			return Err(Error::Resource("create browser context: browser has disconnected".into()));
		}
		let context = FakeContext::new();
		self.contexts.lock().push(Arc::clone(&context));
		Ok(context as ContextHandle)
	}

	async fn close(&self) -> Result<()> {
		Ok(())
	}
}

/// Replays canned replies and records every prompt it receives.
pub struct ScriptedService {
	replies: VecDeque<Result<String>>,
	prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedService {
	pub fn new<I, S>(replies: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			replies: replies.into_iter().map(|r| Ok(r.into())).collect(),
			prompts: Arc::new(Mutex::new(Vec::new())),
		}
	}

	/// Queues a service error after the replies queued so far.
	pub fn then_error(mut self, message: &str) -> Self {
		self.replies.push_back(Err(Error::Reasoning(message.into())));
		self
	}

	pub fn then_reply(mut self, reply: &str) -> Self {
		self.replies.push_back(Ok(reply.into()));
		self
	}

	pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
		Arc::clone(&self.prompts)
	}
}

#[async_trait]
impl ReasoningService for ScriptedService {
	async fn respond(&mut self, prompt: &str) -> Result<String> {
		self.prompts.lock().push(prompt.to_string());
		self.replies
			.pop_front()
			.unwrap_or_else(|| Err(Error::Reasoning("no scripted reply left".into())))
	}
}

/// Opens a conversation that always answers `completed`.
pub struct CompletingProvider;

#[async_trait]
impl ReasoningProvider for CompletingProvider {
	async fn open(&self, _mode: SessionMode) -> Result<Box<dyn ReasoningService>> {
		Ok(Box::new(ScriptedService::new(std::iter::repeat_n(r#"{"action":"completed"}"#, 64))))
	}
}
