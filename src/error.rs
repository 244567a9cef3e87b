use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy for the partfile container.
///
/// Construction errors surface here and leave no files behind. Write
/// operations against an already-created file or a duplicate chunk id are
/// non-fatal by contract (see [`crate::events::Event::Warning`]) and never
/// produce one of these errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument `{field}`: {message}")]
    InvalidArgument { field: &'static str, message: String },

    #[error("already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("invalid geometry: {message}")]
    InvalidGeometry { message: String },

    #[error("missing chunk {chunk_id}")]
    MissingChunk { chunk_id: u64 },

    #[error("not ready: {message}")]
    NotReady { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation not supported: {operation}")]
    NotSupported { operation: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
