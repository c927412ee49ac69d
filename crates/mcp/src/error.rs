//! MCP error types.

use crate::protocol::JsonRpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
}

impl Error {
    /// Convert into the JSON-RPC error sent back to the client.
    pub fn to_rpc_error(&self) -> JsonRpcError {
        let code = match self {
            Error::InvalidRequest(_) | Error::MessageTooLarge { .. } => {
                JsonRpcError::INVALID_REQUEST
            }
            Error::MethodNotFound(_) => JsonRpcError::METHOD_NOT_FOUND,
            Error::InvalidParams(_) | Error::ToolNotFound(_) => JsonRpcError::INVALID_PARAMS,
            Error::Io(_) | Error::Serialize(_) => JsonRpcError::INTERNAL_ERROR,
        };
        JsonRpcError::new(code, self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_failure_is_internal_error() {
        let err = Error::from(serde_json::from_str::<serde_json::Value>("{").unwrap_err());
        assert_eq!(err.to_rpc_error().code, JsonRpcError::INTERNAL_ERROR);
    }

    #[test]
    fn lookup_failures_map_to_client_codes() {
        assert_eq!(
            Error::ToolNotFound("nope".into()).to_rpc_error().code,
            JsonRpcError::INVALID_PARAMS
        );
        assert_eq!(
            Error::MessageTooLarge { size: 2, max: 1 }.to_rpc_error().code,
            JsonRpcError::INVALID_REQUEST
        );
        assert_eq!(
            Error::MethodNotFound("x".into()).to_rpc_error().code,
            JsonRpcError::METHOD_NOT_FOUND
        );
    }
}
