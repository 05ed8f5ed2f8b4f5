use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Could not apply value to record {record_id}: {message}")]
    Apply { record_id: i64, message: String },
}

pub type Result<T> = std::result::Result<T, MetadataError>;
