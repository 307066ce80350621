//! Ephemeral Diffie-Hellman for the `DHE_RSA`/`DHE_PSK` key-exchange suites
//! (spec §4.H "Messages" — `ServerKeyExchange` DH parameters). cryptlib
//! treats the DH context the same as any other keyex context
//! (`initDHcontextSSL` in `ssl_cry.c`); this workspace keeps DH standalone
//! from [`crypto_core::KeyexContext`] since unlike RSA transport it's a
//! two-sided agreement, not a wrap/unwrap of an opaque blob.

use crypto_core::Backend;
use num_bigint_dig::BigUint;

use crate::error::Result;

/// A fixed 256-bit safe-prime MODP group with generator 2, in the style of
/// RFC 2409's Oakley groups but sized for a reference implementation's
/// `modpow` calls to stay fast. A real deployment negotiating with
/// non-reference peers loads the peer's own `(p, g)` instead
/// (`DhParams::from_wire`); this fixed group is what the server offers
/// when it generates fresh `ServerKeyExchange` parameters.
const GROUP_P_HEX: &str = "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC7";

/// The agreed-upon DH group (prime `p` and generator `g`).
#[derive(Debug, Clone)]
pub struct DhParams {
    pub p: BigUint,
    pub g: BigUint,
}

impl DhParams {
    /// The fixed group a server generates `ServerKeyExchange` parameters
    /// in.
    pub fn default_group() -> Self {
        DhParams {
            p: BigUint::parse_bytes(GROUP_P_HEX.as_bytes(), 16).expect("valid hex constant"),
            g: BigUint::from(2u32),
        }
    }

    /// Parameters as received from a peer's `ServerKeyExchange` message.
    pub fn from_wire(p_bytes: &[u8], g_bytes: &[u8]) -> Self {
        DhParams {
            p: BigUint::from_bytes_be(p_bytes),
            g: BigUint::from_bytes_be(g_bytes),
        }
    }
}

/// One side's ephemeral DH keypair for a single handshake.
pub struct DhKeyPair {
    pub params: DhParams,
    private: BigUint,
    pub public: BigUint,
}

impl DhKeyPair {
    /// Generates a fresh keypair in `params`, drawing the private exponent
    /// from `backend`'s CSPRNG.
    pub fn generate(params: DhParams, backend: &dyn Backend) -> Result<Self> {
        let mut bytes = vec![0u8; 32];
        backend.random(&mut bytes)?;
        bytes[0] &= 0x7f; // stay well under p
        if bytes.iter().all(|&b| b == 0) {
            bytes[31] = 1;
        }
        let private = BigUint::from_bytes_be(&bytes);
        let public = params.g.modpow(&private, &params.p);
        Ok(DhKeyPair { params, private, public })
    }

    /// Computes `peer_public ^ private mod p`, the shared premaster secret,
    /// as a big-endian byte string (spec §4.H "PSK mode" / plain DHE).
    pub fn shared_secret(&self, peer_public: &BigUint) -> Vec<u8> {
        peer_public.modpow(&self.private, &self.params.p).to_bytes_be()
    }

    pub fn public_bytes(&self) -> Vec<u8> {
        self.public.to_bytes_be()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_core::SoftwareBackend;

    #[test]
    fn dh_agreement_matches_both_sides() {
        let backend = SoftwareBackend;
        let params = DhParams::default_group();
        let client = DhKeyPair::generate(params.clone(), &backend).unwrap();
        let server = DhKeyPair::generate(params, &backend).unwrap();

        let client_shared = client.shared_secret(&server.public);
        let server_shared = server.shared_secret(&client.public);
        assert_eq!(client_shared, server_shared);
    }
}
