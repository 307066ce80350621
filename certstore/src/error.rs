//! Error taxonomy for the cert-store server (spec §7): every error here
//! maps to a `uint16` status written back to the client rather than a
//! torn-down connection, since the protocol is a single idempotent
//! request/response with no session state to preserve.

/// Crate result specialization.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The request line wasn't a well-formed `GET <path> HTTP/1.x`.
    #[error("malformed HTTP request: {0}")]
    BadRequest(String),

    /// Only GET is accepted; anything else is rejected outright.
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// The query string named no attribute from the fixed table, or
    /// named more than one.
    #[error("invalid certificate store query attribute '{0}'")]
    BadAttribute(String),

    /// A base64-flagged attribute's value didn't decode.
    #[error("invalid base64-encoded query value '{0}'")]
    BadEncoding(String),

    /// The lookup found no certificate matching the query.
    #[error("no certificate found for query")]
    NotFound,

    /// The underlying keyset / cert store failed for a reason other
    /// than "not found" (storage error, corrupt record).
    #[error("certificate store error: {0}")]
    StoreError(String),

    /// The transport returned an I/O error.
    #[error("transport I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Maps this error to the `uint16` status value written ahead of
    /// the (absent) certificate body, mirroring cryptlib's convention
    /// of reusing its generic `CRYPT_ERROR_*` codes for this purpose.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::BadRequest(_) => 1,
            Error::UnsupportedMethod(_) => 1,
            Error::BadAttribute(_) => 2,  // CRYPT_ERROR_BADDATA
            Error::BadEncoding(_) => 2,   // CRYPT_ERROR_BADDATA
            Error::NotFound => 3,         // CRYPT_ERROR_NOTFOUND
            Error::StoreError(_) => 4,
            Error::Io(_) => 5,
        }
    }
}
