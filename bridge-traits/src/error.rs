use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Native module failed to instantiate: {0}")]
    Instantiation(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
