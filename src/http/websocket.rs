//! WebSocket upgrade proxying.
//!
//! Candidate selection, rate limiting, and the circuit breaker all apply to
//! the upgrade request, handled by the caller in `server.rs` before this
//! module ever runs; everything here just pumps frames bidirectionally
//! once the tunnel is established (§4.9).

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message as TgMessage};
use tracing::{error, info, warn};
use url::Url;

use crate::observability::metrics;

/// Accept the upgrade and hand the connected socket off to `proxy_ws`.
pub fn handle_ws_upgrade(ws: WebSocketUpgrade, backend_url: Url) -> Response {
    info!(backend = %backend_url, "handling websocket upgrade");
    metrics::record_long_lived_connection("websocket", 1);

    ws.on_upgrade(move |socket| async move {
        proxy_ws(socket, backend_url).await;
        metrics::record_long_lived_connection("websocket", -1);
    })
}

async fn proxy_ws(client_ws: WebSocket, backend_url: Url) {
    match connect_async(backend_url.as_str()).await {
        Ok((backend_ws, _)) => {
            let (mut b_sink, mut b_stream) = backend_ws.split();
            let (mut c_sink, mut c_stream) = client_ws.split();

            let client_to_backend = async {
                while let Some(Ok(msg)) = c_stream.next().await {
                    let b_msg = match msg {
                        Message::Text(t) => TgMessage::Text(t.to_string().into()),
                        Message::Binary(b) => TgMessage::Binary(b.into()),
                        Message::Ping(p) => TgMessage::Ping(p.into()),
                        Message::Pong(p) => TgMessage::Pong(p.into()),
                        Message::Close(c) => TgMessage::Close(c.map(tg_close_frame)),
                    };
                    if let Err(e) = b_sink.send(b_msg).await {
                        warn!(error = %e, "error forwarding frame to backend");
                        break;
                    }
                }
            };

            let backend_to_client = async {
                while let Some(Ok(msg)) = b_stream.next().await {
                    let c_msg = match msg {
                        TgMessage::Text(t) => Message::Text(t.to_string().into()),
                        TgMessage::Binary(b) => Message::Binary(b.into()),
                        TgMessage::Ping(p) => Message::Ping(p.into()),
                        TgMessage::Pong(p) => Message::Pong(p.into()),
                        TgMessage::Close(c) => Message::Close(c.map(ax_close_frame)),
                        TgMessage::Frame(_) => continue,
                    };
                    if let Err(e) = c_sink.send(c_msg).await {
                        warn!(error = %e, "error forwarding frame to client");
                        break;
                    }
                }
            };

            tokio::select! {
                _ = client_to_backend => {},
                _ = backend_to_client => {},
            }
            info!(backend = %backend_url, "websocket connection closed");
        }
        Err(e) => {
            error!(backend = %backend_url, error = %e, "failed to connect to backend websocket");
        }
    }
}

fn tg_close_frame(cf: axum::extract::ws::CloseFrame) -> tungstenite::protocol::CloseFrame {
    tungstenite::protocol::CloseFrame { code: cf.code.into(), reason: cf.reason.to_string().into() }
}

fn ax_close_frame(cf: tungstenite::protocol::CloseFrame) -> axum::extract::ws::CloseFrame {
    axum::extract::ws::CloseFrame { code: cf.code.into(), reason: cf.reason.to_string().into() }
}
