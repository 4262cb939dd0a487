use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::transport::memory::{self, Peer};

fn create_test_connection() -> (Arc<Connection>, Peer) {
	let (parts, peer) = memory::pair();
	let connection = Arc::new(Connection::new(parts));
	let runner = Arc::clone(&connection);
	tokio::spawn(async move { runner.run().await });
	(connection, peer)
}

#[test]
fn test_request_omits_absent_session() {
	let request = Request {
		id: 3,
		method: "Target.getTargets".into(),
		params: json!({}),
		session_id: None,
	};
	let value = serde_json::to_value(&request).unwrap();
	assert!(value.get("sessionId").is_none());

	let request = Request {
		session_id: Some("S1".into()),
		..request
	};
	assert_eq!(serde_json::to_value(&request).unwrap()["sessionId"], "S1");
}

#[test]
fn test_message_deserialization() {
	let message: Message = serde_json::from_str(r#"{"id": 42, "result": {"frameId": "F"}}"#).unwrap();
	assert!(matches!(message, Message::Response(ref r) if r.id == 42));

	let message: Message =
		serde_json::from_str(r#"{"method": "Target.targetCreated", "params": {"targetInfo": {}}, "sessionId": "S"}"#).unwrap();
	match message {
		Message::Event(event) => {
			assert_eq!(event.method, "Target.targetCreated");
			assert_eq!(event.session_id.as_deref(), Some("S"));
		}
		other => panic!("expected event, got {other:?}"),
	}

	let message: Message = serde_json::from_str(r#"{"weird": true}"#).unwrap();
	assert!(matches!(message, Message::Unknown(_)));
}

#[tokio::test]
async fn test_send_correlates_response() {
	let (connection, mut peer) = create_test_connection();

	let call = {
		let connection = Arc::clone(&connection);
		tokio::spawn(async move { connection.send_to(Some("S1"), "Page.navigate", json!({"url": "https://example.org"})).await })
	};

	let request = peer.outbound.recv().await.unwrap();
	assert_eq!(request["method"], "Page.navigate");
	assert_eq!(request["sessionId"], "S1");
	peer.inbound.send(json!({"id": request["id"], "result": {"frameId": "F1"}})).unwrap();

	let result = call.await.unwrap().unwrap();
	assert_eq!(result["frameId"], "F1");
}

#[tokio::test]
async fn test_error_response_becomes_remote_error() {
	let (connection, mut peer) = create_test_connection();

	let call = {
		let connection = Arc::clone(&connection);
		tokio::spawn(async move { connection.send("Target.closeTarget", json!({"targetId": "T9"})).await })
	};

	let request = peer.outbound.recv().await.unwrap();
	peer.inbound
		.send(json!({"id": request["id"], "error": {"code": -32602, "message": "No target with given id found"}}))
		.unwrap();

	let err = call.await.unwrap().unwrap_err();
	assert!(err.is_target_closed(), "got {err:?}");
	match err {
		Error::Remote { method, code, .. } => {
			assert_eq!(method, "Target.closeTarget");
			assert_eq!(code, -32602);
		}
		other => panic!("expected remote error, got {other:?}"),
	}
}

#[tokio::test]
async fn test_events_fan_out_to_subscribers() {
	let (connection, peer) = create_test_connection();
	let mut first = connection.subscribe();
	let mut second = connection.subscribe();

	peer.inbound.send(json!({"method": "Target.targetDestroyed", "params": {"targetId": "T1"}})).unwrap();

	for rx in [&mut first, &mut second] {
		let event = rx.recv().await.unwrap();
		assert_eq!(event.method, "Target.targetDestroyed");
		assert_eq!(event.params["targetId"], "T1");
	}
}

#[tokio::test]
async fn test_dropped_request_removes_callback() {
	let (connection, mut peer) = create_test_connection();

	let result = tokio::time::timeout(Duration::from_millis(20), connection.send("Browser.getVersion", json!({}))).await;
	assert!(result.is_err());
	let _ = peer.outbound.recv().await.unwrap();
	assert!(connection.callbacks.is_empty());
}

#[tokio::test]
async fn test_pending_requests_fail_when_transport_closes() {
	let (connection, mut peer) = create_test_connection();

	let call = {
		let connection = Arc::clone(&connection);
		tokio::spawn(async move { connection.send("Browser.getVersion", json!({})).await })
	};
	let _ = peer.outbound.recv().await.unwrap();
	drop(peer);

	let err = call.await.unwrap().unwrap_err();
	assert!(matches!(err, Error::ChannelClosed));

	tokio::time::sleep(Duration::from_millis(10)).await;
	assert!(connection.is_closed());
	assert!(matches!(connection.send("Browser.getVersion", json!({})).await, Err(Error::ChannelClosed)));
}

#[tokio::test]
async fn test_unanswered_command_times_out() {
	let (parts, mut peer) = memory::pair();
	let connection = Arc::new(Connection::new(parts).with_command_timeout(Duration::from_millis(50)));
	let runner = Arc::clone(&connection);
	tokio::spawn(async move { runner.run().await });

	let result = tokio::time::timeout(
		Duration::from_secs(2),
		connection.send_to(Some("S1"), "Runtime.evaluate", json!({"expression": "1"})),
	)
	.await
	.expect("send_to must resolve on its own");

	let err = result.unwrap_err();
	assert!(err.is_timeout(), "got {err:?}");
	assert!(err.to_string().contains("Runtime.evaluate"));
	let _ = peer.outbound.recv().await.unwrap();
	assert!(connection.callbacks.is_empty());
}

#[tokio::test]
async fn test_dialogs_are_dismissed_on_their_session() {
	let (connection, mut peer) = create_test_connection();
	let _handler = connection.spawn_dialog_handler();

	peer.inbound
		.send(json!({
			"method": "Page.javascriptDialogOpening",
			"params": {"type": "confirm", "message": "Leave?", "url": "https://example.org"},
			"sessionId": "S7"
		}))
		.unwrap();

	let reply = tokio::time::timeout(Duration::from_secs(2), peer.outbound.recv()).await.unwrap().unwrap();
	assert_eq!(reply["method"], "Page.handleJavaScriptDialog");
	assert_eq!(reply["sessionId"], "S7");
	assert_eq!(reply["params"]["accept"], false);
	peer.inbound.send(json!({"id": reply["id"], "result": {}})).unwrap();
}

#[tokio::test]
async fn test_beforeunload_is_accepted() {
	let (connection, mut peer) = create_test_connection();
	let _handler = connection.spawn_dialog_handler();

	peer.inbound
		.send(json!({"method": "Page.javascriptDialogOpening", "params": {"type": "beforeunload", "message": ""}, "sessionId": "S2"}))
		.unwrap();

	let reply = tokio::time::timeout(Duration::from_secs(2), peer.outbound.recv()).await.unwrap().unwrap();
	assert_eq!(reply["params"]["accept"], true);
}
