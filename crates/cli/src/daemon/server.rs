use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pw_agent::{ChatCompletionsProvider, Config, SessionMode, SessionRegistry};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
#[cfg(windows)]
use tokio::net::{TcpListener as Listener, TcpStream as Stream};
#[cfg(unix)]
use tokio::net::{UnixListener as Listener, UnixStream as Stream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[cfg(windows)]
use super::DAEMON_TCP_PORT;
use super::LazyBrowser;
#[cfg(unix)]
use super::daemon_socket_path;
use super::protocol::{DaemonRequest, DaemonResponse};

pub struct Daemon {
	registry: Arc<SessionRegistry>,
	sweep_interval: Duration,
	shutdown_tx: watch::Sender<bool>,
	shutdown_rx: watch::Receiver<bool>,
	listener: Listener,
}

impl Daemon {
	/// Binds the socket. The browser is launched when the first session is
	/// created.
	pub async fn start(config: &Config) -> Result<Self> {
		let engine = Arc::new(LazyBrowser::new(config.browser.clone()));
		let provider = Arc::new(ChatCompletionsProvider::from_config(&config.llm).context("Failed to configure reasoning service")?);
		let registry = Arc::new(SessionRegistry::new(engine, provider, config));
		let listener = bind().await?;
		let (shutdown_tx, shutdown_rx) = watch::channel(false);

		Ok(Self {
			registry,
			sweep_interval: Duration::from_secs(config.registry.sweep_interval_secs.max(1)),
			shutdown_tx,
			shutdown_rx,
			listener,
		})
	}

	/// Serves until a `shutdown` request or SIGINT/SIGTERM, then closes every
	/// session and the browser.
	pub async fn run(mut self) -> Result<()> {
		let sweeper = self.registry.spawn_sweeper(self.sweep_interval);
		info!(
			target = "pw.daemon",
			sweep_secs = self.sweep_interval.as_secs(),
			idle_timeout_secs = self.registry.idle_timeout().as_secs(),
			"daemon ready"
		);

		let signal = shutdown_signal();
		tokio::pin!(signal);

		let result = loop {
			tokio::select! {
				_ = self.shutdown_rx.changed() => {
					if *self.shutdown_rx.borrow() {
						info!(target = "pw.daemon", "shutdown requested via message");
						break Ok(());
					}
				}
				name = &mut signal => {
					info!(target = "pw.daemon", signal = name, "received signal, shutting down");
					break Ok(());
				}
				accept = self.listener.accept() => {
					let stream = match accept.context("Daemon accept failed") {
						Ok((stream, _)) => stream,
						Err(err) => break Err(err),
					};
					let registry = Arc::clone(&self.registry);
					let shutdown_tx = self.shutdown_tx.clone();
					tokio::spawn(async move {
						if let Err(err) = handle_client(stream, registry, shutdown_tx).await {
							warn!(target = "pw.daemon", error = %err, "daemon connection error");
						}
					});
				}
			}
		};

		sweeper.abort();
		if let Err(e) = self.registry.shutdown().await {
			warn!(target = "pw.daemon", error = %e, "error during shutdown");
		}
		#[cfg(unix)]
		{
			let _ = std::fs::remove_file(daemon_socket_path());
		}
		result
	}
}

#[cfg(unix)]
async fn bind() -> Result<Listener> {
	let socket_path = daemon_socket_path();
	if socket_path.exists() {
		if Stream::connect(&socket_path).await.is_ok() {
			anyhow::bail!("daemon already running at {}", socket_path.display());
		}
		std::fs::remove_file(&socket_path)
			.with_context(|| format!("Failed to remove stale socket: {}", socket_path.display()))?;
	}
	if let Some(parent) = socket_path.parent()
		&& !parent.exists()
	{
		std::fs::create_dir_all(parent).with_context(|| format!("Failed to create socket directory: {}", parent.display()))?;
	}
	let listener =
		Listener::bind(&socket_path).with_context(|| format!("Failed to bind daemon socket: {}", socket_path.display()))?;
	info!(target = "pw.daemon", socket = %socket_path.display(), "daemon listening");
	Ok(listener)
}

#[cfg(windows)]
async fn bind() -> Result<Listener> {
	let addr = format!("127.0.0.1:{DAEMON_TCP_PORT}");
	let listener = Listener::bind(&addr)
		.await
		.with_context(|| format!("Failed to bind daemon TCP socket: {addr}"))?;
	info!(target = "pw.daemon", addr, "daemon listening");
	Ok(listener)
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
	use tokio::signal::unix::{SignalKind, signal};

	let (Ok(mut sigterm), Ok(mut sigint)) = (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) else {
		warn!(target = "pw.daemon", "failed to install signal handlers");
		return std::future::pending().await;
	};
	tokio::select! {
		_ = sigterm.recv() => "SIGTERM",
		_ = sigint.recv() => "SIGINT",
	}
}

#[cfg(windows)]
async fn shutdown_signal() -> &'static str {
	match tokio::signal::ctrl_c().await {
		Ok(()) => "Ctrl+C",
		Err(_) => std::future::pending().await,
	}
}

async fn handle_client(stream: Stream, registry: Arc<SessionRegistry>, shutdown_tx: watch::Sender<bool>) -> Result<()> {
	let (read_half, mut write_half) = tokio::io::split(stream);
	let mut reader = BufReader::new(read_half);
	let mut line = String::new();

	loop {
		line.clear();
		let bytes = reader.read_line(&mut line).await.context("Failed reading daemon request")?;
		if bytes == 0 {
			break;
		}
		if line.trim().is_empty() {
			continue;
		}

		let request = match serde_json::from_str::<DaemonRequest>(line.trim_end()) {
			Ok(req) => req,
			Err(err) => {
				let response = DaemonResponse::Error {
					code: "invalid_request".to_string(),
					message: err.to_string(),
				};
				write_response(&mut write_half, &response).await?;
				continue;
			}
		};

		let shutdown = request == DaemonRequest::Shutdown;
		let response = handle_request(&registry, request).await;
		write_response(&mut write_half, &response).await?;
		if shutdown {
			let _ = shutdown_tx.send(true);
			break;
		}
	}

	Ok(())
}

async fn write_response<W>(writer: &mut W, response: &DaemonResponse) -> Result<()>
where
	W: tokio::io::AsyncWrite + Unpin,
{
	let payload = serde_json::to_string(response).context("Failed to serialize response")?;
	writer
		.write_all(format!("{payload}\n").as_bytes())
		.await
		.context("Failed writing daemon response")?;
	writer.flush().await.context("Failed flushing daemon response")?;
	Ok(())
}

pub(crate) async fn handle_request(registry: &SessionRegistry, request: DaemonRequest) -> DaemonResponse {
	debug!(target = "pw.daemon", ?request, "request");
	match request {
		DaemonRequest::Ping => DaemonResponse::Pong,
		DaemonRequest::CreateSession { mode } => {
			let mode = match parse_mode(mode.as_deref()) {
				Ok(mode) => mode,
				Err(err) => return daemon_error(&err),
			};
			match registry.create(mode).await {
				Ok(id) => DaemonResponse::Session { id },
				Err(err) => daemon_error(&err),
			}
		}
		DaemonRequest::SessionStatus { id } => match registry.status(&id) {
			Ok(status) => DaemonResponse::Status { status },
			Err(err) => daemon_error(&err),
		},
		DaemonRequest::SubmitGoal { id, goal } => {
			if goal.trim().is_empty() {
				return DaemonResponse::Error {
					code: "invalid_request".into(),
					message: "goal must not be empty".into(),
				};
			}
			let id = match id {
				Some(id) => id,
				None => match registry.create(SessionMode::Interact).await {
					Ok(id) => id,
					Err(err) => return daemon_error(&err),
				},
			};
			match registry.submit(&id, &goal).await {
				Ok(outcome) => DaemonResponse::Outcome { id, outcome },
				Err(err) => daemon_error(&err),
			}
		}
		DaemonRequest::CloseSession { id } => match registry.close(&id).await {
			Ok(()) => DaemonResponse::Ok,
			Err(err) => daemon_error(&err),
		},
		DaemonRequest::ListSessions => DaemonResponse::Sessions { list: registry.list() },
		DaemonRequest::Shutdown => DaemonResponse::Ok,
	}
}

pub(crate) fn parse_mode(mode: Option<&str>) -> pw_agent::Result<SessionMode> {
	mode.unwrap_or_default().parse().map_err(pw_agent::Error::UnsupportedMode)
}

fn daemon_error(err: &pw_agent::Error) -> DaemonResponse {
	let code = match err {
		pw_agent::Error::SessionNotFound(_) => "not_found",
		pw_agent::Error::UnsupportedMode(_) => "unsupported_mode",
		e if e.is_resource_failure() => "browser_unavailable",
		pw_agent::Error::Reasoning(_) => "reasoning_failed",
		_ => "internal",
	};
	DaemonResponse::Error {
		code: code.to_string(),
		message: err.to_string(),
	}
}
