use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow};
use pw_agent::Config;
use serde_json::json;

use crate::daemon::{self, Daemon, DaemonRequest, DaemonResponse};
use crate::error::{CliError, Result};
use crate::output::{OutputFormat, ResultBuilder, print_result, status_line};

const STARTUP_POLL: Duration = Duration::from_millis(100);
const STARTUP_ATTEMPTS: usize = 50;

#[cfg(unix)]
fn daemon_pid_path() -> PathBuf {
	daemon::daemon_socket_path().with_extension("pid")
}

#[cfg(unix)]
fn read_pid_file(path: &std::path::Path) -> Option<u32> {
	std::fs::read_to_string(path).ok()?.trim().parse::<u32>().ok()
}

pub async fn start(config: &Config, foreground: bool, format: OutputFormat) -> Result<()> {
	if matches!(daemon::ping().await?, Some(true)) {
		let result = ResultBuilder::new("daemon start")
			.data(json!({
				"started": false,
				"running": true,
				"alreadyRunning": true
			}))
			.summary("daemon already running")
			.build();
		print_result(&result, format);
		return Ok(());
	}

	if foreground {
		let daemon = Daemon::start(config).await?;
		let result = ResultBuilder::new("daemon start")
			.data(json!({ "started": true, "foreground": true }))
			.summary("daemon started (foreground)")
			.build();
		print_result(&result, format);
		daemon.run().await?;
		return Ok(());
	}

	#[cfg(windows)]
	{
		Err(CliError::InvalidInput(
			"background daemon mode is not available on Windows; use --foreground".into(),
		))
	}

	#[cfg(unix)]
	{
		// Re-run this invocation in the foreground as a detached child; forking
		// would not survive the tokio runtime.
		let exe = std::env::current_exe().context("Failed to get executable path")?;
		let mut child = std::process::Command::new(&exe)
			.args(std::env::args_os().skip(1))
			.arg("--foreground")
			.stdin(std::process::Stdio::null())
			.stdout(std::process::Stdio::null())
			.stderr(std::process::Stdio::null())
			.spawn()
			.context("Failed to spawn daemon")?;

		let mut running = false;
		for _ in 0..STARTUP_ATTEMPTS {
			tokio::time::sleep(STARTUP_POLL).await;
			if matches!(daemon::ping().await?, Some(true)) {
				running = true;
				break;
			}
			if child.try_wait().context("Failed to inspect daemon process state")?.is_some() {
				break;
			}
		}
		if !running {
			return Err(anyhow!("Daemon failed to start; run `pw-agent daemon start --foreground -v` to see why").into());
		}

		let pid_path = daemon_pid_path();
		std::fs::write(&pid_path, child.id().to_string())?;
		let result = ResultBuilder::new("daemon start")
			.data(json!({
				"started": true,
				"running": true,
				"foreground": false,
				"pid": child.id(),
				"pidFile": pid_path.display().to_string()
			}))
			.summary(format!("daemon started (pid {})", child.id()))
			.build();
		print_result(&result, format);
		Ok(())
	}
}

pub async fn stop(format: OutputFormat) -> Result<()> {
	let stopped = match daemon::send_request(&DaemonRequest::Shutdown).await {
		Ok(response) => {
			daemon::expect_ok(response)?;
			true
		}
		Err(CliError::DaemonNotRunning) => false,
		Err(err) => return Err(err),
	};
	#[cfg(unix)]
	{
		let _ = std::fs::remove_file(daemon_pid_path());
	}

	let result = ResultBuilder::new("daemon stop")
		.data(json!({ "stopped": stopped }))
		.summary(if stopped { "daemon stopped" } else { "daemon not running" })
		.build();
	print_result(&result, format);
	Ok(())
}

pub async fn status(format: OutputFormat) -> Result<()> {
	let Some(true) = daemon::ping().await? else {
		let result = ResultBuilder::new("daemon status")
			.data(json!({ "running": false }))
			.summary("daemon not running")
			.build();
		print_result(&result, format);
		return Ok(());
	};

	let list = match daemon::expect_ok(daemon::send_request(&DaemonRequest::ListSessions).await?)? {
		DaemonResponse::Sessions { list } => list,
		other => return Err(anyhow!("unexpected daemon response: {other:?}").into()),
	};
	let mut summary = format!("daemon running, {} session(s)\n", list.len());
	for status in &list {
		summary.push_str(&status_line(status));
		summary.push('\n');
	}
	#[cfg(unix)]
	let pid = read_pid_file(&daemon_pid_path());
	#[cfg(windows)]
	let pid: Option<u32> = None;

	let result = ResultBuilder::new("daemon status")
		.data(json!({
			"running": true,
			"pid": pid,
			"sessions": list
		}))
		.summary(summary)
		.build();
	print_result(&result, format);
	Ok(())
}
