use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("Engine has been released")]
    Released,
}

pub type Result<T> = std::result::Result<T, BridgeError>;
