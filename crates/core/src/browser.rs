//! [`Browser`]: the process-wide DevTools engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pw_agent_runtime::{BrowserProcess, Connection, LaunchOptions, WebSocketTransport};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::browser_context::BrowserContext;
use crate::config::BrowserConfig;
use crate::engine::{ContextHandle, Engine};
use crate::error::{Error, Result};

/// One browser shared by every session. Sessions only ever touch it through
/// the contexts it creates.
pub struct Browser {
	connection: Arc<Connection>,
	process: Mutex<Option<BrowserProcess>>,
	run_handle: JoinHandle<()>,
	dialog_handle: JoinHandle<()>,
}

impl Browser {
	/// Attaches to `cdp_endpoint` when configured, otherwise launches a browser.
	pub async fn from_config(config: &BrowserConfig) -> Result<Self> {
		let command_timeout = Duration::from_millis(config.command_timeout_ms);
		match &config.cdp_endpoint {
			Some(endpoint) => Self::connect(endpoint, command_timeout).await,
			None => {
				let options = LaunchOptions {
					executable: config.executable.clone(),
					headless: config.headless,
					port: config.remote_debugging_port,
					timeout: Duration::from_millis(config.launch_timeout_ms),
					extra_args: Vec::new(),
				};
				Self::launch(&options, command_timeout).await
			}
		}
	}

	/// `command_timeout` bounds every DevTools command sent through the browser.
	pub async fn launch(options: &LaunchOptions, command_timeout: Duration) -> Result<Self> {
		let process = pw_agent_runtime::launch(options).await?;
		tracing::info!(target = "pw.cdp", port = process.port(), "browser launched");
		let ws_url = process.ws_url().to_string();
		Self::open(&ws_url, Some(process), command_timeout).await
	}

	/// Attaches to a running browser (`ws://`, `http://`, or a bare port).
	pub async fn connect(endpoint: &str, command_timeout: Duration) -> Result<Self> {
		let ws_url = pw_agent_runtime::resolve_ws_endpoint(endpoint).await?;
		tracing::info!(target = "pw.cdp", url = %ws_url, "attaching to browser");
		Self::open(&ws_url, None, command_timeout).await
	}

	async fn open(ws_url: &str, process: Option<BrowserProcess>, command_timeout: Duration) -> Result<Self> {
		let parts = WebSocketTransport::connect(ws_url).await?;
		let connection = Arc::new(Connection::new(parts).with_command_timeout(command_timeout));
		let runner = Arc::clone(&connection);
		let run_handle = tokio::spawn(async move { runner.run().await });
		let dialog_handle = connection.spawn_dialog_handler();

		connection.send("Target.setDiscoverTargets", json!({ "discover": true })).await?;
		let version = connection.send("Browser.getVersion", json!({})).await?;
		tracing::debug!(target = "pw.cdp", product = version["product"].as_str().unwrap_or("unknown"), "connected");

		Ok(Self {
			connection,
			process: Mutex::new(process),
			run_handle,
			dialog_handle,
		})
	}

	fn stop_tasks(&self) {
		self.dialog_handle.abort();
		self.run_handle.abort();
	}
}

#[async_trait]
impl Engine for Browser {
	async fn new_context(&self) -> Result<ContextHandle> {
		if self.connection.is_closed() {
			return Err(Error::Resource("browser connection is closed".into()));
		}
		let context = BrowserContext::create(Arc::clone(&self.connection)).await?;
		Ok(context as ContextHandle)
	}

	/// Closes a launched browser; an attached browser is left running.
	async fn close(&self) -> Result<()> {
		let Some(mut process) = self.process.lock().await.take() else {
			self.stop_tasks();
			return Ok(());
		};
		if let Err(e) = self.connection.send("Browser.close", json!({})).await {
			tracing::debug!(target = "pw.cdp", error = %e, "Browser.close failed; killing process");
		}
		process.kill().await?;
		self.stop_tasks();
		Ok(())
	}
}
