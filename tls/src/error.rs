//! Error taxonomy for the TLS layer (spec §7): recoverable transport
//! conditions stay outside this enum (the caller's I/O type reports
//! those); everything a handshake or record unwrap can detect that is
//! specific to this protocol lives here, with a fatal alert description
//! attached so the session can be torn down uniformly.

/// Crate result specialization.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the record layer, handshake state machine, and
/// session cache.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// A record or handshake message violated the wire format (spec §7
    /// "bad data"): bad version, bad length, truncated message.
    #[error("malformed TLS message: {0}")]
    BadMessage(String),

    /// Record MAC or padding verification failed. Reported only after
    /// the timing-uniform checks in §4.G have both run, never as an
    /// early exit (spec property 7).
    #[error("record integrity check failed")]
    BadRecordMac,

    /// A peer-supplied signature or Finished MAC didn't verify.
    #[error("cryptographic verification failed")]
    VerificationFailed,

    /// The client and server cipher-suite lists share no usable entry,
    /// or the server rejected the client's protocol version.
    #[error("handshake negotiation failed: {0}")]
    HandshakeFailure(String),

    /// The peer sent a message out of the expected sequence for the
    /// current role and handshake phase.
    #[error("unexpected handshake message: {0}")]
    UnexpectedMessage(String),

    /// The dummy `SSL_RSA_EXPORT_WITH_RC4_40_MD5` suite was selected by
    /// a peer, which real cryptlib-compatible peers never do (spec §6).
    #[error("peer selected a suite offered only to provoke an alert")]
    NoSecureCipher,

    /// A fatal alert was received from the peer.
    #[error("received fatal alert: level={level} description={description}")]
    PeerAlert { level: u8, description: u8 },

    /// The session has already sent or received a close alert and
    /// cannot be used further.
    #[error("session already closed")]
    SessionClosed,

    /// An underlying crypto-service operation failed.
    #[error(transparent)]
    Crypto(#[from] crypto_core::Error),

    /// The transport returned an I/O error.
    #[error("transport I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Maps this error to the TLS/SSL alert description byte that should
    /// be sent to the peer, per the mapping implied by spec §7/§4.G and
    /// `ssl.h`'s `SSL_ALERT_*`/`TLS_ALERT_*` table.
    pub fn alert_description(&self) -> u8 {
        match self {
            Error::BadMessage(_) => 50,       // decode_error
            Error::BadRecordMac => 20,        // bad_record_mac
            Error::VerificationFailed => 51,  // decrypt_error
            Error::HandshakeFailure(_) => 40, // handshake_failure
            Error::UnexpectedMessage(_) => 10,
            Error::NoSecureCipher => 71, // insufficient_security
            Error::PeerAlert { .. } => 0,
            Error::SessionClosed => 0,
            Error::Crypto(_) => 80, // internal_error
            Error::Io(_) => 80,
        }
    }
}
