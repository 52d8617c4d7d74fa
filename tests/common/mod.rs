//! In-process fake webOS TV for link and controller tests

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Listens on a random local port and hands out one [`Session`] per accepted socket.
pub struct FakeTv {
    pub port: u16,
    sessions: mpsc::UnboundedReceiver<Session>,
}

/// One websocket connection as seen by the TV
pub struct Session {
    inbound: mpsc::UnboundedReceiver<Value>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl FakeTv {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake tv");
        let port = listener.local_addr().expect("local addr").port();
        let (sessions_tx, sessions) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                let (mut sink, mut source) = ws.split();
                let (in_tx, inbound) = mpsc::unbounded_channel();
                let (outbound, mut out_rx) = mpsc::unbounded_channel::<Message>();

                tokio::spawn(async move {
                    while let Some(message) = out_rx.recv().await {
                        let closing = matches!(message, Message::Close(_));
                        if sink.send(message).await.is_err() || closing {
                            break;
                        }
                    }
                });

                tokio::spawn(async move {
                    while let Some(Ok(message)) = source.next().await {
                        if let Message::Text(text) = message {
                            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                                let _ = in_tx.send(value);
                            }
                        }
                    }
                });

                if sessions_tx.send(Session { inbound, outbound }).is_err() {
                    break;
                }
            }
        });

        Self { port, sessions }
    }

    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/", self.port)
    }

    pub async fn next_session(&mut self) -> Session {
        tokio::time::timeout(Duration::from_secs(5), self.sessions.recv())
            .await
            .expect("no connection within 5s")
            .expect("fake tv stopped")
    }
}

impl Session {
    /// Next frame sent by the link.
    pub async fn recv(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.inbound.recv())
            .await
            .expect("no frame within 5s")
            .expect("link closed the socket")
    }

    /// Read the registration frame and answer it.
    pub async fn accept_registration(&mut self) -> Value {
        let register = self.recv().await;
        assert_eq!(register["type"], "register");
        self.send(json!({
            "id": register["id"],
            "type": "registered",
            "payload": {"client-key": "fake-key"},
        }));
        register
    }

    pub fn reply(&self, request: &Value, payload: Value) {
        self.send(json!({
            "id": request["id"],
            "type": "response",
            "payload": payload,
        }));
    }

    pub fn reject(&self, request: &Value, reason: &str) {
        self.send(json!({
            "id": request["id"],
            "type": "error",
            "error": reason,
            "payload": {},
        }));
    }

    pub fn send(&self, message: Value) {
        let _ = self.outbound.send(Message::Text(message.to_string()));
    }

    pub fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }
}
