//! In-memory transport used by the connection tests.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio::sync::mpsc;

use super::{Transport, TransportParts, TransportReceiver};
use crate::error::{Error, Result};

/// The browser side of an in-memory transport.
pub(crate) struct Peer {
	/// Messages the connection wrote.
	pub outbound: mpsc::UnboundedReceiver<Value>,
	/// Inject messages as if the browser sent them.
	pub inbound: mpsc::UnboundedSender<Value>,
}

pub(crate) fn pair() -> (TransportParts, Peer) {
	let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
	let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
	let parts = TransportParts {
		sender: Box::new(MemorySender { tx: outbound_tx }),
		receiver: Box::new(MemoryReceiver),
		message_rx: inbound_rx,
	};
	let peer = Peer {
		outbound: outbound_rx,
		inbound: inbound_tx,
	};
	(parts, peer)
}

struct MemorySender {
	tx: mpsc::UnboundedSender<Value>,
}

impl Transport for MemorySender {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		let sent = self.tx.send(message).map_err(|_| Error::TransportError("peer dropped".into()));
		Box::pin(async move { sent })
	}
}

struct MemoryReceiver;

impl TransportReceiver for MemoryReceiver {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async { Ok(()) })
	}
}
