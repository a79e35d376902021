// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI ↔ agent IPC over a Unix stream socket.
//!
//! One request per connection, length-prefixed JSON frames (1 MiB cap).
//! The socket file is created mode 0o660.

use std::future::Future;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ep_wire::{read_message, write_message, WsRequest, WsResponse};
use tokio::net::UnixListener;

use crate::AgentError;

pub struct IpcServer {
    path: PathBuf,
    handle: tokio::task::JoinHandle<()>,
}

impl IpcServer {
    /// Bind the socket and serve requests with `handler`.
    pub async fn start<F, Fut>(path: impl Into<PathBuf>, handler: F) -> Result<Self, AgentError>
    where
        F: Fn(WsRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WsResponse> + Send + 'static,
    {
        let path = path.into();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o660))?;

        let handler = Arc::new(handler);
        let handle = tokio::spawn(async move {
            loop {
                let (stream, _addr) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "IPC accept failed");
                        continue;
                    }
                };
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, handler).await {
                        tracing::debug!(error = %e, "IPC connection ended with error");
                    }
                });
            }
        });

        Ok(Self { path, handle })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn stop(self) {
        self.handle.abort();
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn serve_connection<F, Fut>(
    mut stream: tokio::net::UnixStream,
    handler: Arc<F>,
) -> Result<(), AgentError>
where
    F: Fn(WsRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WsResponse> + Send + 'static,
{
    let request: WsRequest = match read_message(&mut stream).await {
        Ok(req) => req,
        Err(e) => {
            // Answer malformed input when the stream is still writable.
            let resp = WsResponse::err("", 400, format!("invalid request: {e}"));
            let _ = write_message(&mut stream, &resp).await;
            return Err(e.into());
        }
    };
    let response = handler(request).await;
    write_message(&mut stream, &response).await?;
    Ok(())
}

/// Blocking client for CLI commands.
pub struct IpcClient {
    socket_path: String,
    timeout: Duration,
}

impl IpcClient {
    pub fn new(socket_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    /// Send one request and wait for the response.
    pub fn request(&self, request: &WsRequest) -> Result<WsResponse, AgentError> {
        let mut stream = std::os::unix::net::UnixStream::connect(&self.socket_path)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        ep_wire::send_message_blocking(&mut stream, request)?;
        Ok(ep_wire::recv_message_blocking(&mut stream)?)
    }
}

#[cfg(test)]
#[path = "ipc_tests.rs"]
mod tests;
