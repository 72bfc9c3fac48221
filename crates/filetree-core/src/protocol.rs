use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header size: 1 (type) + 4 (length) + 4 (request_id) = 9 bytes
pub const HEADER_SIZE: usize = 9;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

// --- Message Types ---

// Control
pub const PING: u8 = 0x01;
pub const PONG: u8 = 0x02;
pub const SERVER_INFO: u8 = 0x03;

// Tree (request-response, request_id echoed in the reply)
pub const TREE_ROOT_REQ: u8 = 0x10;
pub const TREE_CHILDREN_REQ: u8 = 0x11;
pub const TREE_PAGE_RESP: u8 = 0x12;
pub const TREE_ITEMS_REQ: u8 = 0x13;
pub const TREE_ITEMS_RESP: u8 = 0x14;
pub const TREE_ERROR: u8 = 0x15;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("payload too large: {size} bytes (max {MAX_PAYLOAD_SIZE})")]
    PayloadTooLarge { size: usize },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Raw message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub msg_type: u8,
    pub length: u32,
    pub request_id: u32,
}

/// A decoded protocol message
#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(msg_type: u8, request_id: u32, payload: Vec<u8>) -> Self {
        Self {
            header: Header {
                msg_type,
                length: payload.len() as u32,
                request_id,
            },
            payload,
        }
    }

    /// Create a message with a JSON payload
    pub fn json<T: Serialize>(
        msg_type: u8,
        request_id: u32,
        data: &T,
    ) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_vec(data)?;
        Ok(Self::new(msg_type, request_id, payload))
    }

    /// Parse the payload as JSON
    pub fn parse_json<'a, T: Deserialize<'a>>(&'a self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Encode this message into bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_u8(self.header.msg_type);
        buf.put_u32_le(self.header.length);
        buf.put_u32_le(self.header.request_id);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode a message from bytes. Returns None if not enough data.
    pub fn decode(buf: &[u8]) -> Result<Option<(Message, usize)>, ProtocolError> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut cursor = &buf[..];
        let msg_type = cursor.get_u8();
        let length = cursor.get_u32_le();
        let request_id = cursor.get_u32_le();

        let payload_len = length as usize;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge { size: payload_len });
        }

        let total_len = HEADER_SIZE + payload_len;
        if buf.len() < total_len {
            return Ok(None);
        }

        let payload = buf[HEADER_SIZE..total_len].to_vec();

        let msg = Message {
            header: Header {
                msg_type,
                length,
                request_id,
            },
            payload,
        };

        Ok(Some((msg, total_len)))
    }
}

// --- JSON payload types ---

/// One rendered tree entry. Serialized field names match the documented
/// page shape (`hasChildren`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeItem {
    pub name: String,
    pub path: String,
    pub has_children: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// A bounded window of an ordered result set plus its total count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: u64,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootRequest {
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_take")]
    pub take: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildrenRequest {
    pub path: String,
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_take")]
    pub take: u64,
}

pub fn default_take() -> u64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsResponse {
    pub items: Vec<TreeItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Unavailable,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub hostname: String,
    pub version: String,
    pub store: String,
}

// --- Helper functions for building specific messages ---

/// Build a ping message
pub fn ping(request_id: u32) -> Message {
    Message::new(PING, request_id, vec![])
}

/// Build a pong reply
pub fn pong(request_id: u32) -> Message {
    Message::new(PONG, request_id, vec![])
}

/// Build a structured error reply
pub fn tree_error(
    request_id: u32,
    kind: ErrorKind,
    message: impl Into<String>,
) -> Result<Message, ProtocolError> {
    let body = ErrorBody {
        kind,
        message: message.into(),
    };
    Message::json(TREE_ERROR, request_id, &body)
}
