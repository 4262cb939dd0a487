//! Request/response correlation for the DevTools protocol.
//!
//! Commands carry a connection-unique `id`; the browser answers with the same
//! `id` and either `result` or `error`. Anything with a `method` and no `id` is
//! an event and is fanned out to every subscriber. Commands addressed to an
//! attached target carry its flat-mode `sessionId`.
//!
//! A command that gets no reply within the connection's command timeout fails
//! with [`Error::Timeout`]. A page blocked on a JavaScript dialog never replies,
//! so [`Connection::spawn_dialog_handler`] answers those dialogs as they open.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::transport::TransportParts;

const EVENT_CAPACITY: usize = 512;

/// Upper bound on waiting for the reply to a single command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Outgoing command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
	pub id: u32,
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Reply to a [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
	pub id: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

/// Unsolicited notification from the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Discriminated union of inbound traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	/// Has `id`.
	Response(Response),
	/// Has `method` and no `id`.
	Event(Event),
	/// Forward-compatible catch-all.
	Unknown(Value),
}

struct Pending {
	method: String,
	tx: oneshot::Sender<Result<Value>>,
}

type CallbackMap = Arc<DashMap<u32, Pending>>;

/// Removes the pending callback if the request future is dropped early.
struct CancelGuard {
	id: u32,
	callbacks: CallbackMap,
	completed: bool,
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if !self.completed && self.callbacks.remove(&self.id).is_some() {
			tracing::debug!(target = "pw.cdp", id = self.id, "removed orphaned callback");
		}
	}
}

struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.completed = true;
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// A browser-level DevTools connection.
pub struct Connection {
	last_id: AtomicU32,
	callbacks: CallbackMap,
	outbound_tx: mpsc::UnboundedSender<Value>,
	/// Taken once by [`Connection::run`].
	parts: Mutex<Option<(TransportParts, mpsc::UnboundedReceiver<Value>)>>,
	events: broadcast::Sender<Event>,
	closed: AtomicBool,
	command_timeout: Duration,
}

impl Connection {
	pub fn new(parts: TransportParts) -> Self {
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		Self {
			last_id: AtomicU32::new(1),
			callbacks: Arc::new(DashMap::new()),
			outbound_tx,
			parts: Mutex::new(Some((parts, outbound_rx))),
			events,
			closed: AtomicBool::new(false),
			command_timeout: DEFAULT_COMMAND_TIMEOUT,
		}
	}

	/// Replaces [`DEFAULT_COMMAND_TIMEOUT`].
	pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
		self.command_timeout = timeout;
		self
	}

	pub fn command_timeout(&self) -> Duration {
		self.command_timeout
	}

	/// Subscribes to every event received after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.events.subscribe()
	}

	/// True once the dispatch loop has exited.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	/// Sends a browser-level command and awaits its result.
	pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
		self.send_to(None, method, params).await
	}

	/// Sends a command to an attached target session (`None` for the browser).
	///
	/// # Errors
	///
	/// Returns [`Error::Timeout`] when no reply arrives within the command
	/// timeout; the pending callback is dropped with the request.
	pub async fn send_to(&self, session_id: Option<&str>, method: &str, params: Value) -> Result<Value> {
		if self.is_closed() {
			return Err(Error::ChannelClosed);
		}
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		tracing::trace!(target = "pw.cdp", id, method, session = session_id.unwrap_or(""), "send");

		let (tx, rx) = oneshot::channel();
		self.callbacks.insert(
			id,
			Pending {
				method: method.to_string(),
				tx,
			},
		);
		let guard = CancelGuard {
			id,
			callbacks: Arc::clone(&self.callbacks),
			completed: false,
		};

		let request = Request {
			id,
			method: method.to_string(),
			params,
			session_id: session_id.map(str::to_string),
		};
		if self.outbound_tx.send(serde_json::to_value(&request)?).is_err() {
			tracing::error!(target = "pw.cdp", "outbound channel closed");
			return Err(Error::ChannelClosed);
		}

		match tokio::time::timeout(self.command_timeout, ResponseFuture { rx, guard }).await {
			Ok(result) => result,
			Err(_) => {
				tracing::warn!(target = "pw.cdp", id, method, timeout_ms = self.command_timeout.as_millis() as u64, "command timed out");
				Err(Error::Timeout(format!(
					"{method} got no reply within {}ms",
					self.command_timeout.as_millis()
				)))
			}
		}
	}

	/// Answers every `Page.javascriptDialogOpening` on this connection.
	///
	/// `alert`, `confirm` and `prompt` are dismissed; `beforeunload` is
	/// accepted so navigation and tab close go through. Pages only report
	/// dialogs after `Page.enable`. The task ends when the connection is dropped.
	pub fn spawn_dialog_handler(self: &Arc<Self>) -> JoinHandle<()> {
		let mut events = self.subscribe();
		let connection = Arc::downgrade(self);
		tokio::spawn(async move {
			loop {
				let event = match events.recv().await {
					Ok(event) => event,
					Err(RecvError::Lagged(skipped)) => {
						tracing::warn!(target = "pw.cdp", skipped, "dialog handler lagged");
						continue;
					}
					Err(RecvError::Closed) => break,
				};
				if event.method != "Page.javascriptDialogOpening" {
					continue;
				}
				let Some(connection) = connection.upgrade() else { break };
				let kind = event.params["type"].as_str().unwrap_or("alert").to_string();
				let accept = kind == "beforeunload";
				tracing::info!(
					target = "pw.cdp",
					kind = %kind,
					message = event.params["message"].as_str().unwrap_or_default(),
					accept,
					"answering javascript dialog"
				);
				tokio::spawn(async move {
					let handled = connection
						.send_to(event.session_id.as_deref(), "Page.handleJavaScriptDialog", json!({ "accept": accept }))
						.await;
					if let Err(e) = handled {
						tracing::debug!(target = "pw.cdp", kind = %kind, error = %e, "dialog already gone");
					}
				});
			}
		})
	}

	/// Runs the reader, writer and dispatch loop until the transport closes.
	///
	/// Pending requests are failed with [`Error::ChannelClosed`] on exit.
	pub async fn run(self: &Arc<Self>) {
		let Some((parts, mut outbound_rx)) = self.parts.lock().take() else {
			tracing::warn!(target = "pw.cdp", "connection loop already started");
			return;
		};
		let TransportParts {
			mut sender,
			receiver,
			mut message_rx,
		} = parts;

		let reader_handle = tokio::spawn(async move {
			if let Err(e) = receiver.run().await {
				tracing::error!(target = "pw.cdp", error = %e, "transport read error");
			}
		});

		let writer_handle = tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				if let Err(e) = sender.send(message).await {
					tracing::error!(target = "pw.cdp", error = %e, "transport write error");
					break;
				}
			}
		});

		while let Some(value) = message_rx.recv().await {
			match serde_json::from_value::<Message>(value) {
				Ok(message) => self.dispatch(message),
				Err(e) => tracing::error!(target = "pw.cdp", error = %e, "failed to parse message"),
			}
		}

		self.closed.store(true, Ordering::Release);
		self.callbacks.clear();
		writer_handle.abort();
		let _ = reader_handle.await;
		tracing::debug!(target = "pw.cdp", "connection closed");
	}

	fn dispatch(&self, message: Message) {
		match message {
			Message::Response(response) => {
				let Some((_, pending)) = self.callbacks.remove(&response.id) else {
					tracing::debug!(target = "pw.cdp", id = response.id, "response for unknown request (ignored)");
					return;
				};
				let result = match response.error {
					Some(error) => Err(parse_protocol_error(&pending.method, error)),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};
				let _ = pending.tx.send(result);
			}
			Message::Event(event) => {
				tracing::trace!(target = "pw.cdp", method = %event.method, "event");
				// No subscribers is fine.
				let _ = self.events.send(event);
			}
			Message::Unknown(value) => {
				tracing::debug!(target = "pw.cdp", message = %value, "unknown message (ignored)");
			}
		}
	}
}

/// Converts a browser error object into [`Error::Remote`].
fn parse_protocol_error(method: &str, error: ErrorPayload) -> Error {
	let message = match error.data {
		Some(data) if !data.is_empty() => format!("{} ({data})", error.message),
		_ => error.message,
	};
	Error::Remote {
		method: method.to_string(),
		code: error.code,
		message,
	}
}

#[cfg(test)]
mod tests;
