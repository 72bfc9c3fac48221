use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message as WsMessage};
use tracing::{error, info, warn};

use filetree_core::config::ServiceConfig;
use filetree_core::handler::{ConnectionHandle, TreeHandler};
use filetree_core::listing::TreeService;
use filetree_core::protocol::{self, Message, ServerInfo};
use filetree_core::CancelToken;

/// Accept WebSocket clients and serve tree requests until Ctrl+C.
pub async fn run(config: ServiceConfig, service: TreeService) -> Result<()> {
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!("listening on {}", config.bind_addr);

    let handler = Arc::new(TreeHandler::new(service));
    let store_label = format!("physical:{}", config.root_dir);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted.context("accept failed")?;
                let handler = handler.clone();
                let store_label = store_label.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, handler, store_label).await {
                        warn!("connection {} ended with error: {:#}", peer, e);
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<TreeHandler>,
    store_label: String,
) -> Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .context("WebSocket handshake failed")?;

    info!("client connected from {}", peer);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Vec<u8>>(256);
    let handle = ConnectionHandle::new(outgoing_tx);
    let cancel = CancelToken::new();

    // Greet the client before serving requests
    let server_info = ServerInfo {
        hostname: gethostname(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store_label,
    };
    let info_msg = Message::json(protocol::SERVER_INFO, 0, &server_info)?;
    handle.send_message(&info_msg).await?;

    let mut read_buf = Vec::new();

    loop {
        tokio::select! {
            // Incoming WebSocket messages
            ws_msg = ws_stream.next() => {
                match ws_msg {
                    Some(Ok(WsMessage::Binary(data))) => {
                        read_buf.extend_from_slice(&data);

                        // Decode all complete messages from buffer
                        loop {
                            match Message::decode(&read_buf) {
                                Ok(Some((msg, consumed))) => {
                                    read_buf.drain(..consumed);
                                    dispatch(msg, &handler, &handle, &cancel).await;
                                }
                                Ok(None) => break, // need more data
                                Err(e) => {
                                    error!("protocol decode error from {}: {}", peer, e);
                                    read_buf.clear();
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        ws_sink.send(WsMessage::Pong(data)).await?;
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        info!("client {} sent close frame", peer);
                        break;
                    }
                    Some(Ok(_)) => {} // text, pong
                    Some(Err(e)) => {
                        cancel.cancel();
                        return Err(e.into());
                    }
                    None => break,
                }
            }

            // Outgoing frames from request tasks
            outgoing = outgoing_rx.recv() => {
                match outgoing {
                    Some(data) => {
                        ws_sink.send(WsMessage::Binary(data.into())).await?;
                    }
                    None => break,
                }
            }
        }
    }

    // Abort any request still enumerating for this connection
    cancel.cancel();
    info!("client {} disconnected", peer);
    Ok(())
}

async fn dispatch(
    msg: Message,
    handler: &Arc<TreeHandler>,
    handle: &ConnectionHandle,
    cancel: &CancelToken,
) {
    match msg.header.msg_type {
        protocol::PING => {
            let pong = protocol::pong(msg.header.request_id);
            if let Err(e) = handle.send_message(&pong).await {
                warn!("failed to queue pong: {:#}", e);
            }
        }
        t if TreeHandler::handles(t) => {
            // Requests run off the connection loop; cancel-on-disconnect
            // interrupts them mid-enumeration.
            let handler = handler.clone();
            let handle = handle.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                handler.handle_message(msg, &handle, &cancel).await;
            });
        }
        other => {
            warn!("unhandled message type: 0x{:02x}", other);
        }
    }
}

fn gethostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
