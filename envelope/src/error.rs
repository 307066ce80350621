/// Crate result specialization.
pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable or permanent push/pop outcomes (spec §7).
///
/// `Overflow` and `Underflow` are recoverable: the caller retries with more
/// buffer room or more input and the envelope's state is unchanged. Every
/// other variant is permanent: once returned, the envelope latches into an
/// error state and returns the same error from every subsequent push/pop.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The destination buffer has no room for more output. Retry after the
    /// caller has drained the buffer.
    #[error("buffer overflow, no room for more output")]
    Overflow,

    /// Not enough input is available to make progress. Retry after the
    /// caller has supplied more bytes.
    #[error("buffer underflow, need more input")]
    Underflow,

    /// A length, tag, or structural element didn't parse.
    #[error("malformed data: {0}")]
    BadData(String),

    /// The caller must supply a resource (password, key, ...) before the
    /// envelope can continue.
    #[error("missing resource: {0:?}")]
    MissingResource(crate::content::ResourceKind),

    /// A signature, MAC, or MDC check failed.
    #[error("signature or integrity check failed")]
    VerificationFailed,

    /// An action-list or content-list operation was misused (duplicate
    /// action, unknown kind, action required but absent).
    #[error("envelope usage error: {0}")]
    Usage(String),

    /// The underlying crypto service failed.
    #[error(transparent)]
    Crypto(#[from] crypto_core::Error),

    /// I/O failure from an underlying reader.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error leaves the envelope usable (the caller may retry
    /// the same call after adjusting buffer room or supplying more input).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Overflow | Error::Underflow)
    }
}
