//! Drives a foreground daemon over its socket. The browser is only launched
//! for the first session, so none of this needs Chromium.
#![cfg(unix)]

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tempfile::TempDir;

struct DaemonProcess {
	child: Child,
	socket: PathBuf,
}

impl DaemonProcess {
	fn start(runtime_dir: &Path) -> Self {
		let child = Command::new(env!("CARGO_BIN_EXE_pw-agent"))
			.env("XDG_RUNTIME_DIR", runtime_dir)
			.env("XDG_CONFIG_HOME", runtime_dir)
			.args(["daemon", "start", "--foreground"])
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.spawn()
			.expect("failed to spawn daemon");
		let socket = runtime_dir.join("pw-agent.sock");

		let deadline = Instant::now() + Duration::from_secs(10);
		while UnixStream::connect(&socket).is_err() {
			assert!(Instant::now() < deadline, "daemon did not start");
			std::thread::sleep(Duration::from_millis(50));
		}
		Self { child, socket }
	}

	fn connect(&self) -> Connection {
		let stream = UnixStream::connect(&self.socket).unwrap();
		stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
		Connection {
			reader: BufReader::new(stream.try_clone().unwrap()),
			writer: stream,
		}
	}

	fn wait_for_exit(&mut self) -> bool {
		let deadline = Instant::now() + Duration::from_secs(10);
		while Instant::now() < deadline {
			if let Some(status) = self.child.try_wait().unwrap() {
				return status.success();
			}
			std::thread::sleep(Duration::from_millis(50));
		}
		false
	}
}

impl Drop for DaemonProcess {
	fn drop(&mut self) {
		let _ = self.child.kill();
		let _ = self.child.wait();
	}
}

struct Connection {
	reader: BufReader<UnixStream>,
	writer: UnixStream,
}

impl Connection {
	fn send_raw(&mut self, line: &str) -> Value {
		self.writer.write_all(format!("{line}\n").as_bytes()).unwrap();
		let mut response = String::new();
		self.reader.read_line(&mut response).unwrap();
		serde_json::from_str(&response).unwrap()
	}

	fn send(&mut self, request: Value) -> Value {
		self.send_raw(&request.to_string())
	}
}

#[test]
fn daemon_speaks_line_delimited_json() {
	let tmp = TempDir::new().unwrap();
	let mut daemon = DaemonProcess::start(tmp.path());
	let mut conn = daemon.connect();

	assert_eq!(conn.send(json!({ "type": "ping" })), json!({ "type": "pong" }));
	assert_eq!(conn.send(json!({ "type": "list_sessions" })), json!({ "type": "sessions", "list": [] }));

	let missing = conn.send(json!({ "type": "session_status", "id": "nope" }));
	assert_eq!(missing["type"], "error");
	assert_eq!(missing["code"], "not_found");

	let bad_mode = conn.send(json!({ "type": "create_session", "mode": "freetext" }));
	assert_eq!(bad_mode["code"], "unsupported_mode");

	let garbage = conn.send_raw("not json at all");
	assert_eq!(garbage["code"], "invalid_request");

	let unknown = conn.send(json!({ "type": "execute_script", "code": "alert(1)" }));
	assert_eq!(unknown["code"], "invalid_request");

	// The connection survives errors.
	assert_eq!(conn.send(json!({ "type": "ping" })), json!({ "type": "pong" }));

	assert_eq!(conn.send(json!({ "type": "shutdown" })), json!({ "type": "ok" }));
	assert!(daemon.wait_for_exit(), "daemon did not exit cleanly");
	assert!(!daemon.socket.exists());
}

#[test]
fn cli_client_talks_to_the_daemon() {
	let tmp = TempDir::new().unwrap();
	let mut daemon = DaemonProcess::start(tmp.path());

	let run = |args: &[&str]| {
		let output = Command::new(env!("CARGO_BIN_EXE_pw-agent"))
			.env("XDG_RUNTIME_DIR", tmp.path())
			.env("XDG_CONFIG_HOME", tmp.path())
			.args(args)
			.output()
			.unwrap();
		let json: Value = serde_json::from_slice(&output.stdout).unwrap_or(Value::Null);
		(output.status.success(), json)
	};

	let (success, json) = run(&["daemon", "status"]);
	assert!(success);
	assert_eq!(json["data"]["running"], true);
	assert_eq!(json["data"]["sessions"], json!([]));

	let (success, json) = run(&["session", "close", "nope"]);
	assert!(!success);
	assert_eq!(json["error"]["code"], "SESSION_NOT_FOUND");

	let (success, json) = run(&["daemon", "stop"]);
	assert!(success);
	assert_eq!(json["data"]["stopped"], true);
	assert!(daemon.wait_for_exit());
}
