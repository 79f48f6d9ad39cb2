use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store rejected {op} for asset {asset_id} after {attempts} attempt(s): {reason}")]
    StoreRejected {
        asset_id: u64,
        op: &'static str,
        reason: String,
        attempts: usize,
    },

    #[error("size mismatch for asset {asset_id}: {detail}")]
    SizeMismatch { asset_id: u64, detail: String },

    #[error("network error during {op} for asset {asset_id} after {attempts} attempt(s): {reason}")]
    Network {
        asset_id: u64,
        op: &'static str,
        reason: String,
        attempts: usize,
    },

    #[error("Format error: {0}")]
    Format(String),

    #[error("Config error: {0}")]
    Config(String),
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, UploadError>;
