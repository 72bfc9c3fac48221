use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cancel::CancelToken;
use crate::error::TreeError;
use crate::listing::TreeService;
use crate::protocol::{self, ChildrenRequest, ErrorKind, ItemsRequest, ItemsResponse, Message, RootRequest};

/// Handle to send encoded frames back to a connection
#[derive(Clone)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<Vec<u8>>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self { tx }
    }

    pub async fn send_message(&self, msg: &Message) -> Result<()> {
        self.tx
            .send(msg.encode())
            .await
            .map_err(|_| anyhow::anyhow!("connection channel closed"))
    }
}

/// Handles tree request messages (request-response)
pub struct TreeHandler {
    service: TreeService,
}

impl TreeHandler {
    pub fn new(service: TreeService) -> Self {
        Self { service }
    }

    /// Whether a message type belongs to this handler.
    pub fn handles(msg_type: u8) -> bool {
        matches!(
            msg_type,
            protocol::TREE_ROOT_REQ | protocol::TREE_CHILDREN_REQ | protocol::TREE_ITEMS_REQ
        )
    }

    /// Process one tree request and send the reply (page, items, or
    /// structured error) back on the connection.
    pub async fn handle_message(
        &self,
        msg: Message,
        handle: &ConnectionHandle,
        cancel: &CancelToken,
    ) {
        let request_id = msg.header.request_id;

        let result = match msg.header.msg_type {
            protocol::TREE_ROOT_REQ => self.handle_root(msg, handle, cancel).await,
            protocol::TREE_CHILDREN_REQ => self.handle_children(msg, handle, cancel).await,
            protocol::TREE_ITEMS_REQ => self.handle_items(msg, handle, cancel).await,
            other => {
                warn!("tree handler: unexpected message type 0x{:02x}", other);
                return;
            }
        };

        if let Err(e) = result {
            error!("tree request {} reply failed: {:#}", request_id, e);
        }
    }

    async fn handle_root(
        &self,
        msg: Message,
        handle: &ConnectionHandle,
        cancel: &CancelToken,
    ) -> Result<()> {
        let request_id = msg.header.request_id;
        // An empty payload means default pagination.
        let req: RootRequest = if msg.payload.is_empty() {
            RootRequest {
                skip: 0,
                take: protocol::default_take(),
            }
        } else {
            match msg.parse_json() {
                Ok(r) => r,
                Err(e) => {
                    return send_invalid(handle, request_id, format!("invalid TREE_ROOT_REQ: {}", e))
                        .await
                }
            }
        };

        info!("tree root: skip={} take={}", req.skip, req.take);

        match self.service.root(req.skip, req.take, cancel) {
            Ok(page) => {
                let reply = Message::json(protocol::TREE_PAGE_RESP, request_id, &page)?;
                handle.send_message(&reply).await
            }
            Err(e) => send_tree_error(handle, request_id, &e).await,
        }
    }

    async fn handle_children(
        &self,
        msg: Message,
        handle: &ConnectionHandle,
        cancel: &CancelToken,
    ) -> Result<()> {
        let request_id = msg.header.request_id;
        let req: ChildrenRequest = match msg.parse_json() {
            Ok(r) => r,
            Err(e) => {
                return send_invalid(
                    handle,
                    request_id,
                    format!("invalid TREE_CHILDREN_REQ: {}", e),
                )
                .await
            }
        };

        info!(
            "tree children: {:?} skip={} take={}",
            req.path, req.skip, req.take
        );

        match self.service.children(&req.path, req.skip, req.take, cancel) {
            Ok(page) => {
                let reply = Message::json(protocol::TREE_PAGE_RESP, request_id, &page)?;
                handle.send_message(&reply).await
            }
            Err(e) => send_tree_error(handle, request_id, &e).await,
        }
    }

    async fn handle_items(
        &self,
        msg: Message,
        handle: &ConnectionHandle,
        cancel: &CancelToken,
    ) -> Result<()> {
        let request_id = msg.header.request_id;
        let req: ItemsRequest = match msg.parse_json() {
            Ok(r) => r,
            Err(e) => {
                return send_invalid(handle, request_id, format!("invalid TREE_ITEMS_REQ: {}", e))
                    .await
            }
        };

        info!("tree items: {} paths", req.paths.len());

        match self.service.items(&req.paths, cancel) {
            Ok(items) => {
                let reply = Message::json(
                    protocol::TREE_ITEMS_RESP,
                    request_id,
                    &ItemsResponse { items },
                )?;
                handle.send_message(&reply).await
            }
            Err(e) => send_tree_error(handle, request_id, &e).await,
        }
    }
}

async fn send_tree_error(
    handle: &ConnectionHandle,
    request_id: u32,
    err: &TreeError,
) -> Result<()> {
    let msg = protocol::tree_error(request_id, err.kind(), err.to_string())?;
    handle.send_message(&msg).await
}

async fn send_invalid(handle: &ConnectionHandle, request_id: u32, message: String) -> Result<()> {
    let msg = protocol::tree_error(request_id, ErrorKind::InvalidArgument, message)?;
    handle.send_message(&msg).await
}
