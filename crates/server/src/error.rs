//! Structured errors for the nimbus-sw host surface.
//!
//! Worker and storage failures arrive as `nimbus_core::Error` and convert
//! directly; these cover what only the host can get wrong.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Tool parameters that do not describe a valid request.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A tool result could not be encoded.
    #[error("ENCODE_FAILED: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<HostError> for McpError {
    fn from(err: HostError) -> Self {
        let code = match &err {
            HostError::InvalidInput(_) => -32602,
            HostError::Encode(_) => -32603,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_code() {
        let err: McpError = HostError::InvalidInput("bad header".into()).into();
        assert_eq!(err.code, ErrorCode(-32602));
        assert!(err.message.contains("INVALID_INPUT"));
    }
}
