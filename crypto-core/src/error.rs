/// Crate result specialization.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the crypto-service abstraction.
///
/// This is the one place in the workspace that may see primitive-level
/// failures (bad padding, unwrap failures, signature mismatches); the
/// envelope engine and the TLS layer each fold these into their own
/// permanent error state rather than exposing them directly (spec §7).
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The requested algorithm isn't supported by this backend.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A key of the wrong size or kind was supplied.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Ciphertext length isn't a multiple of the cipher's block size.
    #[error("input is not a multiple of the block size")]
    NotBlockAligned,

    /// A MAC, signature, or key-unwrap integrity check failed.
    #[error("cryptographic verification failed")]
    VerificationFailed,

    /// The underlying primitive rejected the operation (bad padding, a
    /// malformed ciphertext, an RNG failure, ...).
    #[error("primitive operation failed: {0}")]
    Primitive(String),
}
