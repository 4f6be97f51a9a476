use rs_matter::error::{Error as MatterError, ErrorCode};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum NodeError {
    #[error("Cluster 0x{cluster:04X} attribute 0x{attribute:04X} is not supported")]
    NotSupported { cluster: u32, attribute: u32 },

    #[error("Out of memory: {0}")]
    NoMemory(&'static str),

    #[error("Invalid value '{value}': {reason}")]
    InvalidValue { value: String, reason: String },

    #[error("Matter error: {0:?}")]
    Matter(ErrorCode),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl NodeError {
    /// The Matter status code closest to this error, for callers that report
    /// through the interaction model.
    pub fn code(&self) -> ErrorCode {
        match self {
            // Reported as UnsupportedAttribute, not an access control failure
            NodeError::NotSupported { .. } => ErrorCode::AttributeNotFound,
            NodeError::NoMemory(_) => ErrorCode::NoMemory,
            NodeError::InvalidValue { .. } => ErrorCode::InvalidDataType,
            NodeError::Matter(code) => *code,
            NodeError::IoError(_) | NodeError::SerdeJsonError(_) => ErrorCode::StdIoError,
        }
    }
}

impl From<MatterError> for NodeError {
    fn from(e: MatterError) -> Self {
        NodeError::Matter(e.code())
    }
}

impl From<ErrorCode> for NodeError {
    fn from(code: ErrorCode) -> Self {
        NodeError::Matter(code)
    }
}

pub type Result<T> = std::result::Result<T, NodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let err = NodeError::NotSupported {
            cluster: 0x0006,
            attribute: 0x0000,
        };
        assert_eq!(err.code(), ErrorCode::AttributeNotFound);
        assert_eq!(NodeError::NoMemory("pool").code(), ErrorCode::NoMemory);
        assert_eq!(
            NodeError::from(ErrorCode::UnsupportedAccess).code(),
            ErrorCode::UnsupportedAccess
        );
    }
}
