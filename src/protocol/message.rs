use super::table::RouteTable;
use super::MAX_PAYLOAD;
use crate::error::ProtocolError;
use crate::RouterId;
use serde::{Deserialize, Serialize};

/// One advertisement on the wire: the sender's id and a full snapshot of its
/// distance vector. Self-describing, so the decoder needs no external context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMessage {
    pub source: RouterId,
    pub table: RouteTable,
}

impl RouteMessage {
    pub fn new(source: RouterId, table: RouteTable) -> Self {
        Self { source, table }
    }

    /// Serializes the advertisement into a datagram payload. Tables too large
    /// for a single datagram are rejected rather than truncated.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let bytes = serde_json::to_vec(self)?;
        if bytes.len() > MAX_PAYLOAD {
            return Err(ProtocolError::Oversized {
                len: bytes.len(),
                max: MAX_PAYLOAD,
            });
        }
        Ok(bytes)
    }

    /// Parses a received payload. A well-formed message with an empty table
    /// decodes successfully; whether to merge it is the caller's decision.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() > MAX_PAYLOAD {
            return Err(ProtocolError::Oversized {
                len: bytes.len(),
                max: MAX_PAYLOAD,
            });
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}
