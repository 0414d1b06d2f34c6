use thiserror::Error;

/// Errors surfaced by the compression planner and the compressed kernels.
#[derive(Debug, Error)]
pub enum CompressError {
    #[error("Redundant compression, block already compressed")]
    AlreadyCompressed,

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Dimension mismatch: {0}")]
    Shape(String),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Resource exhausted: {0}")]
    Resource(String),

    #[error("Worker task failed: {0}")]
    Worker(Box<CompressError>),
}

impl CompressError {
    /// Wraps the first error observed in a parallel region.
    pub fn worker(inner: CompressError) -> Self {
        CompressError::Worker(Box::new(inner))
    }
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic")]
    BadMagic,

    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u16),

    #[error("Unknown column group tag: {0}")]
    UnknownTag(u8),

    #[error("Unexpected EOF while reading {0}")]
    Truncated(&'static str),
}
