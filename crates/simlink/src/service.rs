//! # Orchestration Service
//!
//! JSON-lines front end for the orchestration calls: one request object per
//! line in, one response object per line out, in order, per connection.
//!
//! Coordinator calls block for up to the lifecycle wait timeout, so each one
//! runs on tokio's blocking pool.

use std::io;
use std::sync::Arc;

use simlink_lifecycle::{OrchestrationRequest, OrchestrationResponse, Orchestrator};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

/// Accepts connections until `shutdown` is notified.
///
/// # Errors
///
/// Only fails if the listener itself fails; connection errors are logged.
pub async fn serve_orchestration(
    listener: TcpListener,
    orchestrator: Orchestrator,
    shutdown: Arc<Notify>,
) -> io::Result<()> {
    tracing::info!("orchestration service listening on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        tracing::debug!("orchestration client connected: {}", peer_addr);
                        let orchestrator = orchestrator.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, orchestrator).await {
                                tracing::warn!("orchestration client {} failed: {}", peer_addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("accept error: {}", e);
                    }
                }
            }
            () = shutdown.notified() => {
                tracing::info!("orchestration service shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, orchestrator: Orchestrator) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = dispatch(&line, &orchestrator).await;
        let mut encoded = serde_json::to_string(&response).map_err(io::Error::other)?;
        encoded.push('\n');
        writer.write_all(encoded.as_bytes()).await?;
    }
    Ok(())
}

async fn dispatch(line: &str, orchestrator: &Orchestrator) -> OrchestrationResponse {
    let request: OrchestrationRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            return OrchestrationResponse::Error {
                message: format!("invalid request: {e}"),
            }
        }
    };

    let orchestrator = orchestrator.clone();
    match tokio::task::spawn_blocking(move || orchestrator.handle(request)).await {
        Ok(response) => response,
        Err(e) => OrchestrationResponse::Error {
            message: format!("request aborted: {e}"),
        },
    }
}
