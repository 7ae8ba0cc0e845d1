//! Error types for the crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum MdictError {
    /// An error originating from the underlying byte source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The header region is implausibly sized, not valid XML, or missing
    /// the dictionary element.
    #[error("bad header: {0}")]
    BadHeader(String),

    /// A block carries an unknown compression tag, is truncated, or was
    /// rejected by a codec.
    #[error("malformed block: {0}")]
    MalformedBlock(String),

    /// The file declares header encryption (`Encrypted` bit 0), which
    /// requires an external registration key.
    #[error("file requires a registration key to decrypt")]
    Decryption,

    /// No keyword matched the query.
    #[error("keyword not found: {0:?}")]
    NotFound(String),

    /// A `@@@LINK=` redirect chain exceeded the depth limit.
    #[error("redirect chain exceeded {0} links")]
    LinkCycle(usize),

    /// A mutex guarding the shared file handle or block cache was poisoned.
    #[error("a lock guarding shared reader state was poisoned")]
    LockPoisoned,
}

/// A convenience `Result` type alias using the crate's [`MdictError`].
pub type Result<T> = std::result::Result<T, MdictError>;
