//! Runs the in-page scripts against a real headless Chromium.
//!
//! Every test skips itself when no browser can be launched (set
//! `PW_AGENT_CHROME` to point at one).

use std::time::{Duration, Instant};

use pw_agent::grounding::{self, GroundingLimits};
use pw_agent::{Browser, BrowserConfig, Command, Engine, Executor, ExecutorConfig, Outcome, PageHandle, SelectorKind, TabCoordinator};
use serde_json::Value;

struct Harness {
	browser: Browser,
	tabs: TabCoordinator,
	page: PageHandle,
	executor: Executor,
}

impl Harness {
	/// Opens one page showing `html`, or `None` when Chromium is unavailable.
	async fn start(html: &str) -> Option<Self> {
		let config = BrowserConfig {
			remote_debugging_port: 0,
			..BrowserConfig::default()
		};
		let browser = match Browser::from_config(&config).await {
			Ok(browser) => browser,
			Err(e) => {
				eprintln!("skipping: cannot launch Chromium ({e})");
				return None;
			}
		};
		let context = browser.new_context().await.expect("new context");
		let mut tabs = TabCoordinator::new(context, Duration::from_secs(5));
		tabs.install_listener();
		let page = tabs.open_page().await.expect("open page");
		let harness = Self {
			browser,
			tabs,
			page,
			executor: Executor::new(ExecutorConfig::default()),
		};
		harness.write(html).await;
		Some(harness)
	}

	/// Replaces the document; inline scripts run.
	async fn write(&self, html: &str) {
		let html = serde_json::to_string(html).expect("encode html");
		self.eval(&format!("document.open(); document.write({html}); document.close(); true")).await;
	}

	async fn eval(&self, expression: &str) -> Value {
		self.page.evaluate(expression).await.expect("evaluate")
	}

	async fn run(&mut self, command: Command) -> Outcome {
		tokio::time::timeout(Duration::from_secs(15), self.executor.execute(&command, &mut self.tabs))
			.await
			.expect("command hung")
			.expect("command raised")
	}

	async fn finish(mut self) {
		self.tabs.close_all().await;
		self.browser.close().await.expect("close browser");
	}
}

fn click(selector: &str, by: SelectorKind, new_tab: bool) -> Command {
	Command::Click {
		selector: selector.into(),
		by,
		new_tab,
	}
}

#[tokio::test]
async fn new_tab_click_restores_link_target() {
	let Some(mut harness) = Harness::start(r#"<a id="docs" href="about:blank">Docs</a>"#).await else {
		return;
	};

	assert_eq!(harness.run(click("#docs", SelectorKind::Css, true)).await, Outcome::Applied);
	assert_eq!(harness.eval("document.getElementById('docs').hasAttribute('target')").await, Value::Bool(false));

	let deadline = Instant::now() + Duration::from_secs(5);
	while harness.tabs.open_count() < 2 {
		assert!(Instant::now() < deadline, "no second tab appeared");
		tokio::time::sleep(Duration::from_millis(50)).await;
	}
	let snapshot = harness.tabs.get_all_pages().await;
	assert!(snapshot[0].current, "the opener stays current");
	harness.finish().await;
}

#[tokio::test]
async fn fill_dispatches_input_and_change() {
	let html = r#"<input id="q" placeholder="Search the docs">
<script>
	window.__events = [];
	const q = document.getElementById('q');
	q.addEventListener('input', () => window.__events.push('input'));
	q.addEventListener('change', () => window.__events.push('change'));
</script>"#;
	let Some(mut harness) = Harness::start(html).await else {
		return;
	};

	let fill = Command::Fill {
		selector: "Search".into(),
		by: SelectorKind::Placeholder,
		value: "rust".into(),
	};
	assert_eq!(harness.run(fill).await, Outcome::Applied);
	assert_eq!(harness.eval("document.getElementById('q').value").await, "rust");
	let events = harness.eval("window.__events").await;
	let events: Vec<&str> = events.as_array().expect("event list").iter().filter_map(Value::as_str).collect();
	assert!(events.contains(&"input"), "{events:?}");
	assert!(events.contains(&"change"), "{events:?}");
	harness.finish().await;
}

#[tokio::test]
async fn unmatched_select_option_lists_the_choices() {
	let html = r#"<select id="country"><option>Canada</option><option>Mexico</option></select>"#;
	let Some(mut harness) = Harness::start(html).await else {
		return;
	};

	let select = Command::Select {
		selector: "#country".into(),
		by: SelectorKind::Css,
		option: "Peru".into(),
	};
	match harness.run(select).await {
		Outcome::Failed(reason) => assert!(reason.ends_with("Available options: Canada, Mexico"), "{reason}"),
		other => panic!("expected a failure, got {other:?}"),
	}

	let select = Command::Select {
		selector: "#country".into(),
		by: SelectorKind::Css,
		option: "mexico".into(),
	};
	assert_eq!(harness.run(select).await, Outcome::Applied);
	assert_eq!(harness.eval("document.getElementById('country').value").await, "Mexico");
	harness.finish().await;
}

#[tokio::test]
async fn grounding_caps_and_skips_hidden_elements() {
	let mut html = String::from(
		r#"<button style="display:none">Ghost one</button>
<button style="visibility:hidden">Ghost two</button>
<input type="password" id="pw" placeholder="Password">
<script>document.getElementById('pw').value = 'hunter2';</script>
"#,
	);
	for i in 0..60 {
		html.push_str(&format!("<button>Button {i}</button>\n"));
	}
	let Some(harness) = Harness::start(&html).await else {
		return;
	};

	let observation = grounding::ground(harness.page.as_ref(), GroundingLimits::default()).await;
	let lines: Vec<&str> = observation.lines().collect();
	assert_eq!(lines.len(), 50);
	assert!(lines[0].starts_with("<input"), "{}", lines[0]);
	assert!(lines[0].contains("Password"));
	assert_eq!(lines[1], "<button>Button 0");
	assert!(!observation.contains("Ghost"));
	assert!(!observation.contains("hunter2"));
	harness.finish().await;
}

#[tokio::test]
async fn icon_button_is_clicked_by_accessible_name() {
	let html = r#"<button aria-label="Close dialog" style="width:32px;height:32px"
	onclick="document.title = 'closed'"><svg width="16" height="16"></svg></button>"#;
	let Some(mut harness) = Harness::start(html).await else {
		return;
	};

	assert_eq!(harness.run(click("Close dialog", SelectorKind::Text, false)).await, Outcome::Applied);
	assert_eq!(harness.eval("document.title").await, "closed");
	harness.finish().await;
}

#[tokio::test]
async fn alert_on_click_does_not_stall_the_page() {
	let html = r#"<button onclick="alert('saved'); document.title = 'after alert'">Save</button>"#;
	let Some(mut harness) = Harness::start(html).await else {
		return;
	};

	assert_eq!(harness.run(click("Save", SelectorKind::Text, false)).await, Outcome::Applied);
	assert_eq!(harness.eval("document.title").await, "after alert");
	harness.finish().await;
}
