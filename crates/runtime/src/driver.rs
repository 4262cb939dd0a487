//! Browser process management and endpoint discovery.
//!
//! Locates a Chrome/Chromium executable, launches it with remote debugging
//! enabled on a throwaway profile, and resolves the browser-level WebSocket
//! URL from the `/json/version` discovery endpoint.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Environment variable that overrides executable discovery.
pub const CHROME_ENV: &str = "PW_AGENT_CHROME";

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Response from the `/json/version` discovery endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser", default)]
	pub browser: Option<String>,
}

/// How to start a local browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
	/// Explicit executable; discovered when `None`.
	pub executable: Option<PathBuf>,
	pub headless: bool,
	/// `0` lets the browser pick a free port.
	pub port: u16,
	/// How long to wait for the debugging endpoint to come up.
	pub timeout: Duration,
	pub extra_args: Vec<String>,
}

impl Default for LaunchOptions {
	fn default() -> Self {
		Self {
			executable: None,
			headless: true,
			port: 0,
			timeout: Duration::from_secs(15),
			extra_args: Vec::new(),
		}
	}
}

/// A browser started by [`launch`]. Killed when dropped.
#[derive(Debug)]
pub struct BrowserProcess {
	child: Child,
	ws_url: String,
	port: u16,
	_profile: TempDir,
}

impl BrowserProcess {
	pub fn ws_url(&self) -> &str {
		&self.ws_url
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	/// Kills the process and waits for it to exit.
	pub async fn kill(&mut self) -> Result<()> {
		if self.child.try_wait()?.is_none() {
			self.child.kill().await?;
		}
		Ok(())
	}
}

/// Locates a Chrome/Chromium executable.
///
/// Checked in order: `explicit`, then `PW_AGENT_CHROME`, then well-known
/// command names on `PATH`, then well-known install locations.
pub fn find_chrome(explicit: Option<&Path>) -> Result<PathBuf> {
	if let Some(path) = explicit {
		return usable_path(path).ok_or_else(|| Error::LaunchFailed(format!("{} does not exist", path.display())));
	}
	if let Some(path) = std::env::var_os(CHROME_ENV).filter(|v| !v.is_empty()) {
		let path = PathBuf::from(path);
		if let Some(found) = usable_path(&path) {
			return Ok(found);
		}
		warn!(target = "pw.cdp", path = %path.display(), "{CHROME_ENV} does not point at a file; searching defaults");
	}
	find_in_candidates(default_candidates().iter().copied()).ok_or(Error::BrowserNotFound)
}

fn usable_path(path: &Path) -> Option<PathBuf> {
	path.is_file().then(|| path.to_path_buf())
}

fn default_candidates() -> &'static [&'static str] {
	if cfg!(target_os = "macos") {
		&[
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
			"/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
		]
	} else if cfg!(target_os = "windows") {
		&[
			r"C:\Program Files\Google\Chrome\Application\chrome.exe",
			r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
			r"C:\Program Files\Chromium\Application\chrome.exe",
			r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe",
		]
	} else {
		&[
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"brave-browser",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/google-chrome",
			"/usr/bin/chromium-browser",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
	}
}

fn find_in_candidates<'a>(candidates: impl IntoIterator<Item = &'a str>) -> Option<PathBuf> {
	for candidate in candidates {
		let path = Path::new(candidate);
		if path.is_absolute() {
			if let Some(found) = usable_path(path) {
				return Some(found);
			}
		} else if let Ok(found) = which::which(candidate) {
			return Some(found);
		}
	}
	None
}

/// Starts a browser with remote debugging on a fresh temporary profile.
pub async fn launch(options: &LaunchOptions) -> Result<BrowserProcess> {
	let executable = find_chrome(options.executable.as_deref())?;
	let profile = TempDir::with_prefix("pw-agent-profile-")?;

	let mut args = vec![
		format!("--remote-debugging-port={}", options.port),
		format!("--user-data-dir={}", profile.path().display()),
		"--no-first-run".to_string(),
		"--no-default-browser-check".to_string(),
		"--disable-popup-blocking".to_string(),
	];
	if options.headless {
		args.push("--headless=new".to_string());
	}
	args.extend(options.extra_args.iter().cloned());
	args.push("about:blank".to_string());

	debug!(target = "pw.cdp", executable = %executable.display(), ?args, "launching browser");

	let mut child = Command::new(&executable)
		.args(&args)
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.kill_on_drop(true)
		.spawn()
		.map_err(|e| Error::LaunchFailed(format!("{}: {e}", executable.display())))?;

	let deadline = tokio::time::Instant::now() + options.timeout;
	let mut last_error = "endpoint not reachable".to_string();
	loop {
		tokio::time::sleep(POLL_INTERVAL).await;

		if let Some(status) = child.try_wait()? {
			return Err(Error::LaunchFailed(format!(
				"browser exited before the debugging endpoint became available ({status})"
			)));
		}

		let port = match options.port {
			0 => read_active_port(profile.path()),
			port => Some(port),
		};
		if let Some(port) = port {
			match fetch_version(&format!("http://127.0.0.1:{port}")).await {
				Ok(info) => {
					debug!(target = "pw.cdp", port, browser = info.browser.as_deref().unwrap_or("unknown"), "browser ready");
					return Ok(BrowserProcess {
						child,
						ws_url: info.web_socket_debugger_url,
						port,
						_profile: profile,
					});
				}
				Err(e) => last_error = e.to_string(),
			}
		}

		if tokio::time::Instant::now() >= deadline {
			let _ = child.kill().await;
			return Err(Error::LaunchFailed(format!(
				"debugging endpoint not available after {}ms: {last_error}",
				options.timeout.as_millis()
			)));
		}
	}
}

/// Reads the port a browser wrote to `DevToolsActivePort` in its profile.
fn read_active_port(profile: &Path) -> Option<u16> {
	let contents = std::fs::read_to_string(profile.join("DevToolsActivePort")).ok()?;
	parse_active_port(&contents)
}

fn parse_active_port(contents: &str) -> Option<u16> {
	contents.lines().next()?.trim().parse().ok().filter(|port| *port != 0)
}

/// Fetches `/json/version` from an HTTP debugging endpoint such as
/// `http://127.0.0.1:9222`.
pub async fn fetch_version(http_base: &str) -> Result<VersionInfo> {
	let url = format!("{}/json/version", http_base.trim_end_matches('/'));
	let client = reqwest::Client::builder()
		.timeout(Duration::from_secs(2))
		.build()
		.map_err(|e| Error::ConnectionFailed(format!("failed to create HTTP client: {e}")))?;

	let response = client.get(&url).send().await.map_err(|e| Error::ConnectionFailed(format!("{url}: {e}")))?;
	if !response.status().is_success() {
		return Err(Error::ConnectionFailed(format!("{url}: unexpected status {}", response.status())));
	}
	response
		.json::<VersionInfo>()
		.await
		.map_err(|e| Error::ProtocolError(format!("failed to parse {url}: {e}")))
}

/// Resolves a user-supplied endpoint to a browser-level WebSocket URL.
///
/// `ws://`/`wss://` URLs are returned unchanged; `http://`/`https://` URLs are
/// resolved through `/json/version`; a bare port number means
/// `http://127.0.0.1:<port>`.
pub async fn resolve_ws_endpoint(endpoint: &str) -> Result<String> {
	let endpoint = endpoint.trim();
	if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
		return Ok(endpoint.to_string());
	}
	let http_base = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
		endpoint.to_string()
	} else if let Ok(port) = endpoint.parse::<u16>() {
		format!("http://127.0.0.1:{port}")
	} else {
		return Err(Error::ConnectionFailed(format!(
			"unsupported endpoint \"{endpoint}\" (expected ws://, http:// or a port)"
		)));
	};
	Ok(fetch_version(&http_base).await?.web_socket_debugger_url)
}
