// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarm-monitor

//! Persistent websocket link to a display with correlated request/response

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::error::LinkError;

/// Default bound for a single request
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Value>>>>;

/// Session state of a [`DeviceLink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No transport
    Disconnected,
    /// Opening the socket
    Connecting,
    /// Socket open, registration being sent
    Registering,
    /// Requests accepted
    Ready,
}

/// Transport and dispatcher of one established session
struct Connection {
    sink: Arc<AsyncMutex<WsSink>>,
    shutdown: oneshot::Sender<()>,
    dispatcher: JoinHandle<()>,
}

impl Connection {
    async fn close(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.dispatcher.await {
            warn!("Link dispatcher ended abnormally: {}", e);
        }

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.close().await {
            debug!("Closing display socket: {}", e);
        }
    }
}

/// Removes a pending entry when the waiting call goes away, however it ends.
struct PendingSlot<'a> {
    pending: &'a PendingMap,
    id: String,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// Websocket session with a display device.
///
/// Requests carry a fresh correlation id and are matched with responses by a
/// background dispatcher, so several calls may wait concurrently while writes
/// to the socket stay serialized.
pub struct DeviceLink {
    registration: Value,
    call_timeout: Duration,
    state: Mutex<LinkState>,
    alive: Mutex<Arc<AtomicBool>>,
    connection: AsyncMutex<Option<Connection>>,
    pending: PendingMap,
}

impl DeviceLink {
    /// `registration` is sent once after every successful connect.
    pub fn new(registration: Value, call_timeout: Duration) -> Self {
        Self {
            registration,
            call_timeout,
            state: Mutex::new(LinkState::Disconnected),
            alive: Mutex::new(Arc::new(AtomicBool::new(false))),
            connection: AsyncMutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Current session state
    pub fn state(&self) -> LinkState {
        *self.state.lock()
    }

    fn set_state(&self, state: LinkState) {
        *self.state.lock() = state;
    }

    /// Ready and the dispatcher still reading.
    pub fn is_ready(&self) -> bool {
        self.state() == LinkState::Ready && self.alive.lock().load(Ordering::SeqCst)
    }

    /// Number of requests waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Open the socket, start the dispatcher and send the registration message.
    ///
    /// A no-op while the link is ready. A link whose dispatcher has stopped is
    /// torn down first.
    pub async fn connect(&self, url: &str, timeout: Duration) -> Result<(), LinkError> {
        let mut connection = self.connection.lock().await;

        if connection.is_some() && self.is_ready() {
            return Ok(());
        }

        if let Some(stale) = connection.take() {
            debug!("Tearing down stale display link before reconnecting");
            stale.close().await;
            self.cancel_pending();
        }

        self.set_state(LinkState::Connecting);
        info!("Connecting to display at {}", url);

        let stream = match tokio::time::timeout(timeout, connect_async(url)).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                self.set_state(LinkState::Disconnected);
                return Err(LinkError::Connection(format!("{}: {}", url, e)));
            }
            Err(_) => {
                self.set_state(LinkState::Disconnected);
                return Err(LinkError::Connection(format!(
                    "{}: no connection within {:?}",
                    url, timeout
                )));
            }
        };

        self.set_state(LinkState::Registering);

        let (sink, source) = stream.split();
        let alive = Arc::new(AtomicBool::new(true));
        *self.alive.lock() = alive.clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let dispatcher = tokio::spawn(dispatch(
            source,
            self.pending.clone(),
            alive,
            shutdown_rx,
        ));

        let conn = Connection {
            sink: Arc::new(AsyncMutex::new(sink)),
            shutdown: shutdown_tx,
            dispatcher,
        };

        if let Err(e) = send_frame(&conn.sink, &self.registration).await {
            conn.close().await;
            self.set_state(LinkState::Disconnected);
            return Err(e);
        }

        *connection = Some(conn);
        self.set_state(LinkState::Ready);
        info!("Registration sent to display at {}", url);
        Ok(())
    }

    /// Send a request and wait up to the default bound for its response.
    pub async fn call(&self, method: &str, payload: Option<Value>) -> Result<Value, LinkError> {
        self.call_with_timeout(method, payload, self.call_timeout).await
    }

    /// Send a request and wait up to `bound` for the response with the same id.
    ///
    /// A timeout only fails this call; the link stays ready. A response of
    /// type `error` is reported as [`LinkError::Rejected`].
    pub async fn call_with_timeout(
        &self,
        method: &str,
        payload: Option<Value>,
        bound: Duration,
    ) -> Result<Value, LinkError> {
        if self.state() != LinkState::Ready {
            return Err(LinkError::Connection("display link is not connected".into()));
        }

        let sink = {
            let connection = self.connection.lock().await;
            match connection.as_ref() {
                Some(conn) if self.is_ready() => conn.sink.clone(),
                _ => return Err(LinkError::Connection("display link is down".into())),
            }
        };

        let id = uuid::Uuid::new_v4().to_string();
        let (slot_tx, slot_rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), slot_tx);
        let _slot = PendingSlot {
            pending: &self.pending,
            id: id.clone(),
        };

        let mut request = json!({
            "id": id,
            "type": "request",
            "uri": method,
        });
        if let Some(payload) = payload {
            request["payload"] = payload;
        }

        debug!("-> {} ({})", method, id);

        // the bound covers the write as well as the wait for the response
        let exchange = async {
            send_frame(&sink, &request).await?;
            Ok::<_, LinkError>(slot_rx.await)
        };

        match tokio::time::timeout(bound, exchange).await {
            Ok(Err(e)) => Err(e),
            Ok(Ok(Ok(response))) => {
                debug!("<- {} ({})", method, id);
                check_response(method, response)
            }
            Ok(Ok(Err(_))) => Err(LinkError::Canceled {
                id,
                method: method.to_string(),
            }),
            Err(_) => {
                warn!("Request {} ({}) got no response within {:?}", id, method, bound);
                Err(LinkError::Timeout {
                    id,
                    method: method.to_string(),
                    after: bound,
                })
            }
        }
    }

    /// Stop the dispatcher, close the socket and cancel every pending request.
    ///
    /// Safe to call in any state.
    pub async fn disconnect(&self) {
        let conn = self.connection.lock().await.take();
        if let Some(conn) = conn {
            conn.close().await;
            info!("Display link closed");
        }

        self.cancel_pending();
        self.set_state(LinkState::Disconnected);
    }

    fn cancel_pending(&self) {
        let canceled: Vec<_> = self.pending.lock().drain().collect();
        if !canceled.is_empty() {
            warn!("Canceling {} pending display requests", canceled.len());
        }
        // dropping the senders wakes every waiter with a cancellation
    }
}

async fn send_frame(sink: &AsyncMutex<WsSink>, frame: &Value) -> Result<(), LinkError> {
    let mut sink = sink.lock().await;
    sink.send(Message::Text(frame.to_string().into()))
        .await
        .map_err(|e| LinkError::Connection(format!("send failed: {}", e)))
}

fn check_response(method: &str, response: Value) -> Result<Value, LinkError> {
    if response.get("type").and_then(Value::as_str) == Some("error") {
        let reason = response
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| response.to_string());
        return Err(LinkError::Rejected {
            method: method.to_string(),
            reason,
        });
    }
    Ok(response)
}

/// Correlation id of an inbound message; numbers are accepted as well as strings.
fn correlation_id(message: &Value) -> Option<String> {
    match message.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn route(text: &str, pending: &PendingMap) {
    let message: Value = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Discarding unparseable frame from display: {}", e);
            return;
        }
    };

    if message.get("type").and_then(Value::as_str) == Some("registered") {
        match message.pointer("/payload/client-key").and_then(Value::as_str) {
            Some(key) => info!("Display accepted registration, client key: {}", key),
            None => info!("Display accepted registration"),
        }
    }

    let Some(id) = correlation_id(&message) else {
        debug!("Message without correlation id: {}", text);
        return;
    };

    // removal makes the first response for an id the only one delivered
    let slot = pending.lock().remove(&id);
    match slot {
        Some(slot) => {
            if slot.send(message).is_err() {
                debug!("Request {} was abandoned before its response arrived", id);
            }
        }
        None => debug!("No pending request for response {}", id),
    }
}

async fn dispatch(
    mut source: SplitStream<WsStream>,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Display link dispatcher stopping");
                break;
            }
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => route(&text, &pending),
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => route(text, &pending),
                    Err(_) => warn!("Discarding non-UTF-8 binary frame ({} bytes)", data.len()),
                },
                Some(Ok(Message::Close(frame))) => {
                    warn!("Display closed the connection: {:?}", frame);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Display link read error: {}", e);
                    break;
                }
                None => {
                    warn!("Display link stream ended");
                    break;
                }
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_with(id: &str) -> (PendingMap, oneshot::Receiver<Value>) {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = oneshot::channel();
        pending.lock().insert(id.to_string(), tx);
        (pending, rx)
    }

    #[test]
    fn test_route_resolves_matching_id_once() {
        let (pending, mut rx) = pending_with("abc");

        route(r#"{"id":"abc","type":"response","payload":{"n":1}}"#, &pending);
        route(r#"{"id":"abc","type":"response","payload":{"n":2}}"#, &pending);

        assert!(pending.lock().is_empty());
        assert_eq!(rx.try_recv().unwrap()["payload"]["n"], 1);
    }

    #[test]
    fn test_route_ignores_unknown_and_garbage() {
        let (pending, mut rx) = pending_with("abc");

        route(r#"{"id":"other","type":"response"}"#, &pending);
        route(r#"{"type":"registered","payload":{"client-key":"k"}}"#, &pending);
        route("not json", &pending);
        route("[1,2,3]", &pending);

        assert_eq!(pending.lock().len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_route_numeric_ids() {
        let (pending, mut rx) = pending_with("7");
        route(r#"{"id":7,"type":"response"}"#, &pending);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_check_response_rejects_errors() {
        let err = check_response(
            "ssap://system/turnOff",
            json!({"type": "error", "id": "1", "error": "401 insufficient permissions"}),
        )
        .unwrap_err();
        assert!(matches!(err, LinkError::Rejected { ref reason, .. } if reason.contains("401")));

        let ok = check_response("x", json!({"type": "response", "payload": {}}));
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_call_while_disconnected() {
        let link = DeviceLink::new(json!({"type": "register"}), DEFAULT_CALL_TIMEOUT);

        let err = link.call("ssap://anything", None).await.unwrap_err();
        assert!(matches!(err, LinkError::Connection(_)));
        assert_eq!(link.pending_count(), 0);
        assert_eq!(link.state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let link = DeviceLink::new(json!({"type": "register"}), DEFAULT_CALL_TIMEOUT);
        link.disconnect().await;
        link.disconnect().await;
        assert_eq!(link.state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_disconnected() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let link = DeviceLink::new(json!({"type": "register"}), DEFAULT_CALL_TIMEOUT);
        let err = link
            .connect(&format!("ws://{}/", addr), Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, LinkError::Connection(_)));
        assert_eq!(link.state(), LinkState::Disconnected);
    }
}
