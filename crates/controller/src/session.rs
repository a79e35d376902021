// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of live agent sessions and the pending-request map.
//!
//! One session per runner. `send_command` pairs an outbound `exec` frame
//! with a oneshot future resolved by `route_response`; entries leave the
//! pending map on response, timeout, or disconnect. Lookups tolerate a
//! just-disconnected session by failing the caller, never by blocking.

use std::collections::HashMap;
use std::time::Duration;

use ep_wire::{new_message_id, MsgType, WsRequest, WsResponse};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Agent {0} not connected")]
    NotConnected(String),

    #[error("Agent {runner_id} did not respond within {timeout_secs}s")]
    Timeout { runner_id: String, timeout_secs: f64 },

    #[error("Agent {0} disconnected")]
    Disconnected(String),
}

struct Pending {
    resolve: oneshot::Sender<WsResponse>,
    runner_id: String,
}

/// Outbound frames are JSON text; the WS route owns the actual socket.
pub type SessionSender = mpsc::UnboundedSender<String>;

#[derive(Default)]
pub struct SessionManager {
    sessions: Mutex<HashMap<String, SessionSender>>,
    pending: Mutex<HashMap<String, Pending>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session, displacing any previous one for the runner.
    pub fn connect(&self, runner_id: &str, sender: SessionSender) {
        self.sessions
            .lock()
            .insert(runner_id.to_string(), sender);
    }

    /// Drop the session and fail every pending request routed to it.
    pub fn disconnect(&self, runner_id: &str) {
        self.sessions.lock().remove(runner_id);
        self.pending
            .lock()
            .retain(|_, entry| entry.runner_id != runner_id);
    }

    pub fn is_connected(&self, runner_id: &str) -> bool {
        self.sessions.lock().contains_key(runner_id)
    }

    pub fn connected_runners(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    /// Send an `exec` command and await the agent's response.
    pub async fn send_command(
        &self,
        runner_id: &str,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<WsResponse, ChannelError> {
        let msg_id = new_message_id();
        let request = WsRequest {
            id: msg_id.clone(),
            msg_type: MsgType::Exec,
            payload,
        };
        let text = match serde_json::to_string(&request) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "unserializable exec request");
                return Err(ChannelError::NotConnected(runner_id.to_string()));
            }
        };

        let (resolve, wait) = oneshot::channel();
        self.pending.lock().insert(
            msg_id.clone(),
            Pending {
                resolve,
                runner_id: runner_id.to_string(),
            },
        );

        let sent = {
            let sessions = self.sessions.lock();
            match sessions.get(runner_id) {
                None => Err(ChannelError::NotConnected(runner_id.to_string())),
                Some(sender) => sender
                    .send(text)
                    .map_err(|_| ChannelError::Disconnected(runner_id.to_string())),
            }
        };
        if let Err(e) = sent {
            self.pending.lock().remove(&msg_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ChannelError::Disconnected(runner_id.to_string())),
            Err(_) => {
                self.pending.lock().remove(&msg_id);
                Err(ChannelError::Timeout {
                    runner_id: runner_id.to_string(),
                    timeout_secs: timeout.as_secs_f64(),
                })
            }
        }
    }

    /// Resolve a pending future for a controller-initiated command.
    /// Returns false when no request is waiting on this id.
    pub fn route_response(&self, response: WsResponse) -> bool {
        let entry = self.pending.lock().remove(&response.id);
        match entry {
            Some(entry) => {
                let _ = entry.resolve.send(response);
                true
            }
            None => false,
        }
    }

    /// Poll until the runner's agent is connected or the deadline lapses.
    pub async fn wait_for_agent(
        &self,
        runner_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_connected(runner_id) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(poll_interval.min(deadline - tokio::time::Instant::now())).await;
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
