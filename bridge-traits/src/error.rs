use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("TLS verification failed for {host}: {message}")]
    TlsVerification { host: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether repeating the same request later may succeed.
    ///
    /// TLS failures are scoped to one host and count as transient so the
    /// caller can move on without treating the whole source as broken.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BridgeError::Timeout(_)
                | BridgeError::ConnectionFailed(_)
                | BridgeError::TlsVerification { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
