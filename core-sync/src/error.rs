use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("A sync session is already running against this database")]
    SessionActive,

    #[error("Sync failed during {stage}: {message}")]
    Stage { stage: String, message: String },

    #[error("Upload not found: {0}")]
    UploadNotFound(String),

    #[error("Upload {0} is already staged and cannot be removed")]
    NotQueued(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
