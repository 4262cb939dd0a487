//! Message transport for the DevTools protocol.
//!
//! A transport is split into a sending half ([`Transport`]) and a reading half
//! ([`TransportReceiver`]). The reader decodes frames into JSON values and
//! forwards them on an unbounded channel that [`Connection`](crate::Connection)
//! drains.

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{Error, Result};

#[cfg(test)]
pub(crate) mod memory;

/// Sending half of a transport.
pub trait Transport: Send + Sync {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Reading half of a transport. Runs until the peer closes the stream.
pub trait TransportReceiver: Send {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Both halves of a transport plus the channel its reader feeds.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport speaking to a browser-level DevTools endpoint.
pub struct WebSocketTransport;

impl WebSocketTransport {
	/// Opens `ws_url` and splits the socket into transport halves.
	pub async fn connect(ws_url: &str) -> Result<TransportParts> {
		let (stream, _) = tokio_tungstenite::connect_async(ws_url)
			.await
			.map_err(|e| Error::ConnectionFailed(format!("{ws_url}: {e}")))?;
		tracing::debug!(target = "pw.cdp", url = ws_url, "websocket connected");

		let (sink, stream) = stream.split();
		let (message_tx, message_rx) = mpsc::unbounded_channel();

		Ok(TransportParts {
			sender: Box::new(WebSocketTransportSender { sink }),
			receiver: Box::new(WebSocketTransportReceiver { stream, message_tx }),
			message_rx,
		})
	}
}

pub struct WebSocketTransportSender {
	sink: SplitSink<WsStream, WsMessage>,
}

impl Transport for WebSocketTransportSender {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			let text = serde_json::to_string(&message)?;
			self.sink.send(WsMessage::Text(text.into())).await.map_err(|e| Error::TransportError(e.to_string()))
		})
	}
}

pub struct WebSocketTransportReceiver {
	stream: SplitStream<WsStream>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for WebSocketTransportReceiver {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		let WebSocketTransportReceiver { mut stream, message_tx } = *self;
		Box::pin(async move {
			while let Some(frame) = stream.next().await {
				let frame = frame.map_err(|e| Error::TransportError(e.to_string()))?;
				let value = match frame {
					WsMessage::Text(text) => decode_frame(text.as_bytes()),
					WsMessage::Binary(bytes) => decode_frame(&bytes),
					WsMessage::Close(_) => break,
					_ => continue,
				};
				let Some(value) = value else { continue };
				if message_tx.send(value).is_err() {
					break;
				}
			}
			tracing::debug!(target = "pw.cdp", "websocket reader finished");
			Ok(())
		})
	}
}

/// Decodes one frame, dropping it (with a log line) if it is not JSON.
fn decode_frame(bytes: &[u8]) -> Option<Value> {
	match serde_json::from_slice(bytes) {
		Ok(value) => Some(value),
		Err(e) => {
			tracing::warn!(target = "pw.cdp", error = %e, "dropping undecodable frame");
			None
		}
	}
}

#[cfg(test)]
mod tests;
