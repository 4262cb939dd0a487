//! Session daemon: a [`pw_agent::SessionRegistry`] behind a local socket
//! speaking line-delimited JSON.

mod engine;
mod protocol;
mod server;

use anyhow::Context;
pub use engine::LazyBrowser;
pub use protocol::{DaemonRequest, DaemonResponse};
pub use server::Daemon;
pub(crate) use server::parse_mode;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
#[cfg(windows)]
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::error::{CliError, Result};

pub const DAEMON_TCP_PORT: u16 = 19333;

/// `$XDG_RUNTIME_DIR/pw-agent.sock` when set (already user-permissioned),
/// otherwise `/tmp/pw-agent-{uid}.sock`.
#[cfg(unix)]
pub fn daemon_socket_path() -> std::path::PathBuf {
	use std::path::PathBuf;

	if let Some(xdg_runtime) = std::env::var_os("XDG_RUNTIME_DIR").filter(|v| !v.is_empty()) {
		return PathBuf::from(xdg_runtime).join("pw-agent.sock");
	}

	let uid = unsafe { libc::getuid() };
	PathBuf::from(format!("/tmp/pw-agent-{uid}.sock"))
}

/// Sends one request. A daemon that is not listening yields
/// [`CliError::DaemonNotRunning`].
pub async fn send_request(request: &DaemonRequest) -> Result<DaemonResponse> {
	let stream = match connect_daemon().await {
		Ok(stream) => stream,
		Err(err) if is_not_running(&err) => return Err(CliError::DaemonNotRunning),
		Err(err) => return Err(anyhow::Error::new(err).context("Failed to connect to daemon").into()),
	};
	Ok(send_request_stream(stream, request).await?)
}

/// `Some(true)` if the daemon answered, `None` if nothing is listening.
pub async fn ping() -> Result<Option<bool>> {
	match send_request(&DaemonRequest::Ping).await {
		Ok(response) => Ok(Some(response == DaemonResponse::Pong)),
		Err(CliError::DaemonNotRunning) => Ok(None),
		Err(err) => Err(err),
	}
}

/// Turns `Error` responses into [`CliError::Daemon`].
pub fn expect_ok(response: DaemonResponse) -> Result<DaemonResponse> {
	match response {
		DaemonResponse::Error { code, message } => Err(CliError::Daemon { code, message }),
		other => Ok(other),
	}
}

#[cfg(unix)]
async fn connect_daemon() -> std::io::Result<UnixStream> {
	UnixStream::connect(daemon_socket_path()).await
}

#[cfg(windows)]
async fn connect_daemon() -> std::io::Result<TcpStream> {
	TcpStream::connect(("127.0.0.1", DAEMON_TCP_PORT)).await
}

fn is_not_running(err: &std::io::Error) -> bool {
	matches!(err.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused)
}

pub(crate) async fn send_request_stream<S>(mut stream: S, request: &DaemonRequest) -> anyhow::Result<DaemonResponse>
where
	S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
	let payload = serde_json::to_string(request).context("Failed to serialize daemon request")?;
	stream
		.write_all(format!("{payload}\n").as_bytes())
		.await
		.context("Failed writing daemon request")?;
	stream.flush().await.context("Failed flushing daemon request")?;

	let mut reader = BufReader::new(stream);
	let mut line = String::new();
	let read = reader.read_line(&mut line).await.context("Failed reading daemon response")?;
	if read == 0 {
		anyhow::bail!("daemon closed the connection without responding");
	}
	serde_json::from_str(&line).context("Failed parsing daemon response")
}
