//! Protocol errors - errors raised while encoding or decoding gateway payloads

use thiserror::Error;

use crate::protocol::OpCode;

/// Protocol layer errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The payload is not valid JSON or does not match the expected shape
    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The envelope carries a different op code than the parser expected
    #[error("Unexpected op code: expected {expected}, got {actual}")]
    UnexpectedOpCode { expected: OpCode, actual: OpCode },

    /// An op number outside the protocol's table
    #[error("Unknown op code {0}")]
    UnknownOpCode(u8),

    /// The envelope's data field is null where a body is required
    #[error("Missing payload data for {0}")]
    MissingData(OpCode),
}
