// src/mcp/mod.rs

pub mod handler;
pub mod protocol;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::AppState;
use handler::handle_mcp_request;
use protocol::{error_codes, Request, Response};

/// Handles one line of newline-delimited JSON-RPC. `None` means nothing is
/// written back (blank line or notification).
pub async fn handle_line(line: &str, state: &AppState) -> Option<Response> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    debug!("Received: {}", line);

    match serde_json::from_str::<Request>(line) {
        Ok(request) => handle_mcp_request(request, state).await,
        Err(parse_error) => {
            error!("JSON parse error: {}", parse_error);
            Some(Response::error(
                Value::Null,
                error_codes::PARSE_ERROR,
                format!("Parse error: {}", parse_error),
            ))
        }
    }
}

/// Serves MCP over a line-oriented reader/writer pair (stdin/stdout in the
/// binary) until EOF.
pub async fn serve<R, W>(reader: R, mut writer: W, state: AppState) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Starting MCP server on stdio with {} tools", state.registry.len());
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let Some(response) = handle_line(&line, &state).await else {
            continue;
        };
        match serde_json::to_string(&response) {
            Ok(response_json) => {
                debug!("Sending: {}", response_json);
                writer.write_all(response_json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Err(e) => error!("Failed to serialize response: {}", e),
        }
    }

    info!("EOF received, shutting down MCP server");
    Ok(())
}
