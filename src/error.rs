use thiserror::Error;

/// Errors produced while encoding or decoding advertisement payloads.
///
/// Every variant is local to a single datagram: the receive loop logs it and
/// moves on, it never terminates the engine.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload larger than the fixed receive buffer. Rejected outright rather
    /// than truncated.
    #[error("payload of {len} bytes exceeds the {max} byte maximum")]
    Oversized { len: usize, max: usize },

    /// Payload could not be parsed into a well-formed {source, table} pair.
    #[error("malformed advertisement: {0}")]
    Malformed(#[from] serde_json::Error),
}
