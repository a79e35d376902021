// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent channel endpoint.
//!
//! Each agent authenticates with `(runner_id, token)` at connection
//! time; bad credentials close with code 4401. Inbound frames carrying
//! `status` resolve pending controller commands, everything else is a
//! service request answered in-line.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use ep_core::RunnerConfig;
use ep_wire::Frame;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::state::AppState;
use crate::ws_handler;

const CLOSE_UNAUTHORIZED: u16 = 4401;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub runner_id: String,
    pub token: String,
}

pub async fn ws_agent(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, params, socket))
}

async fn handle_socket(state: AppState, params: WsParams, mut socket: WebSocket) {
    let runner = match ep_store::runners::find_by_credentials(
        &state.pool,
        &params.runner_id,
        &params.token,
    )
    .await
    {
        Ok(Some(record)) => record.config,
        Ok(None) => {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_UNAUTHORIZED,
                    reason: "Invalid credentials".into(),
                })))
                .await;
            return;
        }
        Err(e) => {
            tracing::error!(runner_id = %params.runner_id, error = %e, "WS auth lookup failed");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_UNAUTHORIZED,
                    reason: "Invalid credentials".into(),
                })))
                .await;
            return;
        }
    };

    let runner_id = runner.runner_id.clone();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.sessions.connect(&runner_id, tx.clone());
    tracing::info!(runner_id = %runner_id, "WS agent connected");

    let (mut sink, mut stream) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let idle_timeout = Duration::from_secs(state.settings.ws_heartbeat_timeout);
    read_loop(&state, &runner, idle_timeout, &mut stream, &tx).await;

    state.sessions.disconnect(&runner_id);
    writer.abort();
    tracing::info!(runner_id = %runner_id, "WS agent disconnected");
}

async fn read_loop(
    state: &AppState,
    runner: &RunnerConfig,
    idle_timeout: Duration,
    stream: &mut futures_util::stream::SplitStream<WebSocket>,
    tx: &mpsc::UnboundedSender<String>,
) {
    loop {
        let frame = match tokio::time::timeout(idle_timeout, stream.next()).await {
            Err(_) => {
                tracing::info!(
                    runner_id = %runner.runner_id,
                    timeout_secs = idle_timeout.as_secs(),
                    "no traffic from agent, closing"
                );
                return;
            }
            Ok(None) => return,
            Ok(Some(Err(e))) => {
                tracing::warn!(runner_id = %runner.runner_id, error = %e, "WS error");
                return;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => match serde_json::from_str::<Frame>(&text) {
                Ok(Frame::Response(response)) => {
                    // Agent response to a controller-initiated command.
                    if !state.sessions.route_response(response) {
                        tracing::debug!(runner_id = %runner.runner_id, "stray response frame");
                    }
                }
                Ok(Frame::Request(request)) => {
                    let response = ws_handler::handle_message(state, runner, request).await;
                    match serde_json::to_string(&response) {
                        Ok(text) => {
                            let _ = tx.send(text);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "unserializable WS response");
                        }
                    }
                }
                Err(e) => {
                    let id = serde_json::from_str::<serde_json::Value>(&text)
                        .ok()
                        .and_then(|v| v.get("id").and_then(|v| v.as_str()).map(str::to_string))
                        .unwrap_or_default();
                    let response =
                        ep_wire::WsResponse::err(id, 400, format!("invalid frame: {e}"));
                    if let Ok(text) = serde_json::to_string(&response) {
                        let _ = tx.send(text);
                    }
                }
            },
            Message::Close(frame) => {
                tracing::info!(runner_id = %runner.runner_id, ?frame, "agent closed the channel");
                return;
            }
            _ => {} // Ping/Pong/Binary — ignore
        }
    }
}
