// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent daemon: one persistent WebSocket channel to the controller.
//!
//! Reconnects with exponential backoff plus jitter, heartbeats on an
//! interval, executes controller-initiated `exec` requests, and proxies
//! CLI requests from the IPC socket over the channel. On every
//! disconnect all in-flight proxied requests fail with a connection-lost
//! signal rather than hanging.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ep_wire::{ExecPayload, Frame, MsgType, WsRequest, WsResponse};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rand::Rng;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;
use crate::exec::run_exec;
use crate::ipc::IpcServer;
use crate::AgentError;

/// State shared between the channel loop and the IPC handler.
struct Shared {
    pending: Mutex<HashMap<String, oneshot::Sender<WsResponse>>>,
    sender: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            sender: Mutex::new(None),
        }
    }

    /// Fail every in-flight request; dropping the sender wakes the
    /// waiter with a connection-lost error.
    fn fail_pending(&self) {
        self.pending.lock().clear();
    }

    fn send_raw(&self, msg: Message) -> Result<(), AgentError> {
        let guard = self.sender.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(AgentError::NotConnected);
        };
        tx.send(msg).map_err(|_| AgentError::ConnectionLost)
    }
}

/// Proxy one CLI request over the channel and wait for the response.
async fn send_and_wait(
    shared: &Shared,
    request: WsRequest,
    timeout: Duration,
) -> Result<WsResponse, AgentError> {
    let (tx, rx) = oneshot::channel();
    let msg_id = request.id.clone();
    shared.pending.lock().insert(msg_id.clone(), tx);

    let text = serde_json::to_string(&request).map_err(ep_wire::ProtocolError::from)?;
    if let Err(e) = shared.send_raw(Message::Text(text.into())) {
        shared.pending.lock().remove(&msg_id);
        return Err(e);
    }

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(_)) => Err(AgentError::ConnectionLost),
        Err(_) => {
            shared.pending.lock().remove(&msg_id);
            Err(AgentError::ResponseTimeout)
        }
    }
}

async fn handle_ipc(shared: Arc<Shared>, timeout: Duration, request: WsRequest) -> WsResponse {
    let id = request.id.clone();
    match send_and_wait(&shared, request, timeout).await {
        Ok(response) => response,
        Err(e) => WsResponse::err(id, 503, e.to_string()),
    }
}

/// `controller_url` plus credential query parameters.
fn build_url(config: &AgentConfig) -> String {
    let base = config.controller_url.trim_end_matches('/');
    let sep = if base.contains('?') { '&' } else { '?' };
    format!(
        "{base}{sep}runner_id={}&token={}",
        config.runner_id, config.token
    )
}

/// Backoff step: how long to sleep now (with up to 10% uniform jitter)
/// and the doubled, capped delay for the next round.
fn next_delay(current: Duration, max: Duration) -> (Duration, Duration) {
    let jitter_max = (current.as_secs_f64() * 0.1).max(f64::EPSILON);
    let jitter = rand::rng().random_range(0.0..jitter_max);
    let sleep_for = current + Duration::from_secs_f64(jitter);
    let next = (current * 2).min(max);
    (sleep_for, next)
}

pub struct Agent {
    config: AgentConfig,
    shared: Arc<Shared>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::new()),
        }
    }

    /// Run the IPC server and the channel loop until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AgentError> {
        let ipc = {
            let shared = Arc::clone(&self.shared);
            let timeout = Duration::from_secs(self.config.request_timeout);
            IpcServer::start(self.config.socket_path.clone(), move |req| {
                handle_ipc(Arc::clone(&shared), timeout, req)
            })
            .await?
        };
        tracing::info!(socket = %self.config.socket_path, "IPC server started");

        self.ws_loop(&shutdown).await;

        ipc.stop().await;
        tracing::info!("Agent stopped");
        Ok(())
    }

    async fn ws_loop(&self, shutdown: &CancellationToken) {
        let url = build_url(&self.config);
        let max_delay = Duration::from_secs(self.config.reconnect_max_delay);
        let mut delay = Duration::from_secs(1);

        while !shutdown.is_cancelled() {
            tracing::info!(url = %self.config.controller_url, "Connecting to controller");
            match connect_async(url.as_str()).await {
                Ok((ws, _)) => {
                    tracing::info!("Connected to controller");
                    delay = Duration::from_secs(1);
                    self.run_connection(ws, shutdown).await;
                    if shutdown.is_cancelled() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "WS connection failed");
                }
            }

            let (sleep_for, next) = next_delay(delay, max_delay);
            delay = next;
            tracing::info!(delay = ?sleep_for, "Reconnecting");
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
    }

    async fn run_connection<S>(
        &self,
        ws: tokio_tungstenite::WebSocketStream<S>,
        shutdown: &CancellationToken,
    ) where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        *self.shared.sender.lock() = Some(tx.clone());

        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let period = Duration::from_secs(self.config.heartbeat_interval);
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = heartbeat.tick() => {
                    let ping = WsRequest::new(MsgType::Ping, json!({}));
                    if let Ok(text) = serde_json::to_string(&ping) {
                        let _ = tx.send(Message::Text(text.into()));
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_frame(&text, &tx),
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "controller closed the channel");
                        break;
                    }
                    None => {
                        tracing::info!("channel stream ended");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "channel error");
                        break;
                    }
                    _ => {} // Ping/Pong/Binary — ignore
                }
            }
        }

        *self.shared.sender.lock() = None;
        self.shared.fail_pending();
        writer.abort();
    }

    fn handle_frame(&self, text: &str, tx: &mpsc::UnboundedSender<Message>) {
        let frame: Frame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "unparsable frame, dropping");
                return;
            }
        };

        match frame {
            Frame::Response(response) => {
                let waiter = self.shared.pending.lock().remove(&response.id);
                if let Some(waiter) = waiter {
                    let _ = waiter.send(response);
                } else {
                    tracing::debug!(id = %response.id, "response with no pending request");
                }
            }
            Frame::Request(request) if request.msg_type == MsgType::Exec => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let response = handle_exec(request).await;
                    if let Ok(text) = serde_json::to_string(&response) {
                        let _ = tx.send(Message::Text(text.into()));
                    }
                });
            }
            Frame::Request(request) => {
                tracing::debug!(msg_type = ?request.msg_type, "unexpected request from controller");
            }
        }
    }
}

/// Run a controller-initiated exec and shape the structured response.
async fn handle_exec(request: WsRequest) -> WsResponse {
    let payload: ExecPayload = match serde_json::from_value(request.payload) {
        Ok(payload) => payload,
        Err(e) => return WsResponse::err(request.id, 400, format!("invalid exec payload: {e}")),
    };

    let result = run_exec(&payload.cmd, Duration::from_secs_f64(payload.timeout.max(0.0))).await;
    let data = json!({
        "exit_code": result.exit_code,
        "stdout": result.stdout,
        "stderr": result.stderr,
    });
    if result.exit_code == 0 {
        WsResponse::ok(request.id, data)
    } else {
        WsResponse {
            id: request.id,
            status: ep_wire::RespStatus::Error,
            data: Some(data),
            error: None,
        }
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
