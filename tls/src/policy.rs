//! Interoperability and feature policy (spec §9 "Open Questions"), in the
//! style of `openpgp::policy::StandardPolicy`: rather than hard-code the
//! answer to a question the spec leaves open, expose it as a field a
//! caller can tune, with a default that matches the reference deployment.

/// Knobs for behavior the specification leaves as an open question or an
/// explicit, deliberate deviation from a newer RFC.
#[derive(Debug, Clone)]
pub struct Policy {
    /// When set, `CertificateVerify` is computed over
    /// `"certificate verify" || client_random || server_random` rather
    /// than the handshake-transcript hash.
    ///
    /// This is a deliberate interoperability trade-off, not a bug: some
    /// hardware signing modules can only sign a fixed-format buffer and
    /// cannot be handed an arbitrary transcript digest. Turning this off
    /// produces a stricter, transcript-bound `CertificateVerify` at the
    /// cost of refusing those signers. Default: on, matching the
    /// reference deployment's signer population.
    pub certificate_verify_fixed_buffer: bool,

    /// Whether a resumed session reverses the Finished-exchange roles
    /// (server sends its `Finished` first). Spec §4.H: a full handshake
    /// has the client send `Finished` first; resumption reverses this.
    /// This is always derived from whether the handshake is a resumption,
    /// never a free choice, but kept here so callers can assert their
    /// expectation in one place.
    pub resumption_reverses_finished_order: bool,

    /// Largest number of resumable sessions the in-memory scoreboard
    /// holds (spec §4.I). `scorebrd.c` sizes this modestly since cryptlib
    /// targets embedded/library use rather than a high-connection-count
    /// server.
    pub scoreboard_capacity: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            certificate_verify_fixed_buffer: true,
            resumption_reverses_finished_order: true,
            scoreboard_capacity: 64,
        }
    }
}
