use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::*;

#[test]
fn test_decode_frame_rejects_non_json() {
	assert!(decode_frame(b"not json").is_none());
	assert_eq!(decode_frame(br#"{"id":1}"#), Some(serde_json::json!({"id": 1})));
}

#[tokio::test]
async fn test_websocket_round_trip() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	// Echo server: answers each command with {"id": <id>, "result": {}}
	let server = tokio::spawn(async move {
		let (tcp, _) = listener.accept().await.unwrap();
		let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
		while let Some(Ok(frame)) = ws.next().await {
			if let WsMessage::Text(text) = frame {
				let request: Value = serde_json::from_str(&text).unwrap();
				let reply = serde_json::json!({"id": request["id"], "result": {}});
				ws.send(WsMessage::Text(reply.to_string().into())).await.unwrap();
			}
		}
	});

	let TransportParts {
		mut sender,
		receiver,
		mut message_rx,
	} = WebSocketTransport::connect(&format!("ws://{addr}")).await.unwrap();
	let reader = tokio::spawn(receiver.run());

	for id in 1..=3 {
		sender.send(serde_json::json!({"id": id, "method": "Browser.getVersion"})).await.unwrap();
		let reply = message_rx.recv().await.unwrap();
		assert_eq!(reply["id"], id);
	}

	drop(sender);
	server.abort();
	let _ = reader.await;
}

#[tokio::test]
async fn test_connect_refused_is_connection_failed() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let err = WebSocketTransport::connect(&format!("ws://{addr}")).await.err().unwrap();
	assert!(matches!(err, Error::ConnectionFailed(_)), "got {err:?}");
}

#[tokio::test]
async fn test_memory_pair_forwards_both_ways() {
	let (mut parts, mut peer) = memory::pair();

	parts.sender.send(serde_json::json!({"id": 7})).await.unwrap();
	assert_eq!(peer.outbound.recv().await.unwrap()["id"], 7);

	peer.inbound.send(serde_json::json!({"method": "Target.targetCreated"})).unwrap();
	assert_eq!(parts.message_rx.recv().await.unwrap()["method"], "Target.targetCreated");
}
