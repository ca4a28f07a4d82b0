//! Mock brokerage WebSocket gateway for integration tests.
//!
//! Speaks just enough of the frame protocol to drive a client through the
//! handshake, placement, and settlement paths:
//! - Answers `get-profile`/`get-balances` with canned balance entries
//! - Answers `binary-options.open-option` per the configured behavior
//! - Answers `get-candles` with two bars, echoing the request id
//! - Records every received message and can push arbitrary frames

use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Trade id the mock assigns to accepted placements.
pub const MOCK_TRADE_ID: u64 = 777_001;

/// How the mock answers placement requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBehavior {
    /// Reply `option-opened` (without a request id, as the real gateway does).
    Accept,
    /// Reply `option` with a rejection message, echoing the request id.
    Reject,
    /// Never answer (placement deadline test).
    Silent,
}

pub struct MockBroker {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
    pushers: Arc<Mutex<Vec<mpsc::Sender<String>>>>,
    behavior: Arc<Mutex<OrderBehavior>>,
}

impl MockBroker {
    /// Start a mock gateway on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let connections: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
        let pushers: Arc<Mutex<Vec<mpsc::Sender<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let behavior = Arc::new(Mutex::new(OrderBehavior::Accept));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let messages_clone = messages.clone();
        let connections_clone = connections.clone();
        let pushers_clone = pushers.clone();
        let behavior_clone = behavior.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        let messages = messages_clone.clone();
                        let connections = connections_clone.clone();
                        let pushers = pushers_clone.clone();
                        let behavior = behavior_clone.clone();
                        tokio::spawn(handle_connection(
                            stream, messages, connections, pushers, behavior,
                        ));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            messages,
            connections,
            pushers,
            behavior,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    pub async fn connection_count(&self) -> u32 {
        *self.connections.lock().await
    }

    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.iter().cloned().collect()
    }

    pub async fn set_order_behavior(&self, behavior: OrderBehavior) {
        *self.behavior.lock().await = behavior;
    }

    /// Push an arbitrary frame to every connected client.
    pub async fn push(&self, frame: serde_json::Value) {
        let pushers = self.pushers.lock().await;
        for tx in pushers.iter() {
            let _ = tx.send(frame.to_string()).await;
        }
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
    pushers: Arc<Mutex<Vec<mpsc::Sender<String>>>>,
    behavior: Arc<Mutex<OrderBehavior>>,
) {
    {
        let mut count = connections.lock().await;
        *count += 1;
    }

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {e}");
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(32);
    pushers.lock().await.push(out_tx.clone());

    loop {
        tokio::select! {
            Some(text) = out_rx.recv() => {
                if write.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        {
                            let mut msgs = messages.lock().await;
                            msgs.push_back(text.to_string());
                        }
                        let order_behavior = *behavior.lock().await;
                        if let Some(reply) = reply_for(&text, order_behavior) {
                            let _ = out_tx.send(reply.to_string()).await;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }
}

fn canned_balances() -> serde_json::Value {
    serde_json::json!([
        {"id": 11, "type": 1, "amount": 5000, "currency": "NGN"},
        {"id": 12, "type": 4, "amount": 10000, "currency": "USD"}
    ])
}

fn reply_for(text: &str, behavior: OrderBehavior) -> Option<serde_json::Value> {
    let frame: serde_json::Value = serde_json::from_str(text).ok()?;
    if frame.get("name")?.as_str()? != "sendMessage" {
        return None;
    }

    let request_id = frame.get("request_id").cloned();
    let inner_name = frame.get("msg")?.get("name")?.as_str()?;

    match inner_name {
        "get-profile" => Some(serde_json::json!({
            "name": "profile",
            "msg": {"balances": canned_balances()}
        })),
        "get-balances" => Some(serde_json::json!({
            "name": "balances",
            "msg": canned_balances()
        })),
        "binary-options.open-option" => match behavior {
            OrderBehavior::Accept => Some(serde_json::json!({
                "name": "option-opened",
                "msg": {"option_id": MOCK_TRADE_ID}
            })),
            OrderBehavior::Reject => Some(serde_json::json!({
                "name": "option",
                "request_id": request_id,
                "msg": {"message": "Not enough money to open a position"}
            })),
            OrderBehavior::Silent => None,
        },
        "get-candles" => Some(serde_json::json!({
            "name": "candles",
            "request_id": request_id,
            "msg": {"candles": [
                {"from": 100, "to": 130, "open": 1.10, "close": 1.12, "min": 1.09, "max": 1.13},
                {"from": 130, "to": 160, "open": 1.12, "close": 1.11, "min": 1.10, "max": 1.14}
            ]}
        })),
        _ => None,
    }
}
