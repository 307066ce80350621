//! Cipher-suite negotiation table (spec §4.H "Cipher-suite negotiation"),
//! grounded in `ssl.h`'s `SSL_CIPHERSUITE_TYPE` enum and numeric IDs.
//!
//! Only the suites a from-scratch reimplementation actually needs to
//! interoperate with cryptlib-family peers are carried: RSA/DHE key
//! exchange, PSK, and the AES/3DES/RC4 bulk ciphers, plus the dummy
//! export-RC4 suite used to provoke buggy servers into alerting instead
//! of silently closing (spec §6).

use crypto_core::{HashAlgorithm, SymmetricAlgorithm};

/// How the premaster secret is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchange {
    /// RSA key transport: the client encrypts the premaster under the
    /// server's RSA public key.
    Rsa,
    /// Ephemeral Diffie-Hellman, signed by the server's long-term key.
    DheRsa,
    /// Pre-shared key, no certificate exchange.
    Psk,
    /// Ephemeral DH combined with a PSK identity.
    DhePsk,
}

impl KeyExchange {
    /// Whether this key exchange requires the server to send a
    /// `ServerKeyExchange` message.
    pub fn needs_server_keyex(self) -> bool {
        matches!(self, KeyExchange::DheRsa | KeyExchange::DhePsk)
    }

    /// Whether this key exchange requires the server to send a
    /// `Certificate` message.
    pub fn needs_server_cert(self) -> bool {
        matches!(self, KeyExchange::Rsa | KeyExchange::DheRsa)
    }
}

/// The numeric IEEE/IANA cipher-suite identifier, as it appears on the
/// wire in `ClientHello`/`ServerHello` (`ssl.h`'s `SSL_CIPHERSUITE_TYPE`).
pub type SuiteId = u16;

/// A fully-resolved cipher suite: key exchange, bulk cipher, and MAC
/// hash, plus its wire identifier and dummy/real classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuite {
    pub id: SuiteId,
    pub keyex: KeyExchange,
    pub cipher: SymmetricAlgorithm,
    pub mac_hash: HashAlgorithm,
    /// Effective bulk-cipher key size in bytes. Distinguishes the
    /// export-grade 40-bit RC4 dummy suite from the real 128-bit one,
    /// even though both name `SymmetricAlgorithm::Rc4`.
    pub key_size: usize,
    /// True only for `SSL_RSA_EXPORT_WITH_RC4_40_MD5`: included in a
    /// client's offered list purely to force buggy servers into
    /// alerting rather than silently dropping the connection (spec §6).
    /// A cryptlib-compatible peer never selects it.
    pub is_dummy: bool,
}

/// The full preference-ordered suite table (spec §4.H): PSK suites
/// first when a PSK identity is configured, then DHE-RSA, then RSA,
/// from strongest to weakest cipher, with the export-grade RC4 dummy
/// suite present only for its provocative effect.
pub const SUITE_TABLE: &[CipherSuite] = &[
    // PSK (highest preference when a PSK identity is available).
    CipherSuite {
        id: 0x008C,
        keyex: KeyExchange::Psk,
        cipher: SymmetricAlgorithm::Aes128,
        mac_hash: HashAlgorithm::Sha1,
        key_size: 16,
        is_dummy: false,
    },
    CipherSuite {
        id: 0x0090,
        keyex: KeyExchange::DhePsk,
        cipher: SymmetricAlgorithm::Aes128,
        mac_hash: HashAlgorithm::Sha1,
        key_size: 16,
        is_dummy: false,
    },
    // DHE-RSA.
    CipherSuite {
        id: 0x0033,
        keyex: KeyExchange::DheRsa,
        cipher: SymmetricAlgorithm::Aes128,
        mac_hash: HashAlgorithm::Sha1,
        key_size: 16,
        is_dummy: false,
    },
    CipherSuite {
        id: 0x0016,
        keyex: KeyExchange::DheRsa,
        cipher: SymmetricAlgorithm::TripleDes,
        mac_hash: HashAlgorithm::Sha1,
        key_size: 24,
        is_dummy: false,
    },
    // RSA transport.
    CipherSuite {
        id: 0x002F,
        keyex: KeyExchange::Rsa,
        cipher: SymmetricAlgorithm::Aes128,
        mac_hash: HashAlgorithm::Sha1,
        key_size: 16,
        is_dummy: false,
    },
    CipherSuite {
        id: 0x0035,
        keyex: KeyExchange::Rsa,
        cipher: SymmetricAlgorithm::Aes256,
        mac_hash: HashAlgorithm::Sha1,
        key_size: 32,
        is_dummy: false,
    },
    CipherSuite {
        id: 0x000A,
        keyex: KeyExchange::Rsa,
        cipher: SymmetricAlgorithm::TripleDes,
        mac_hash: HashAlgorithm::Sha1,
        key_size: 24,
        is_dummy: false,
    },
    CipherSuite {
        id: 0x0005,
        keyex: KeyExchange::Rsa,
        cipher: SymmetricAlgorithm::Rc4,
        mac_hash: HashAlgorithm::Sha1,
        key_size: 16,
        is_dummy: false,
    },
    CipherSuite {
        id: 0x0004,
        keyex: KeyExchange::Rsa,
        cipher: SymmetricAlgorithm::Rc4,
        mac_hash: HashAlgorithm::Md5,
        key_size: 16,
        is_dummy: false,
    },
    // Dummy export suite: offered by the client purely to provoke a
    // proper alert from buggy servers instead of a silent close.
    CipherSuite {
        id: 0x0003,
        keyex: KeyExchange::Rsa,
        cipher: SymmetricAlgorithm::Rc4,
        mac_hash: HashAlgorithm::Md5,
        key_size: 5,
        is_dummy: true,
    },
];

/// Looks up a suite by wire id.
pub fn find(id: SuiteId) -> Option<&'static CipherSuite> {
    SUITE_TABLE.iter().find(|s| s.id == id)
}

/// The client's offered list, preference-ordered, with the dummy suite
/// appended last so a buggy server has every real option to choose
/// before falling back to it.
pub fn client_offer(have_psk: bool) -> Vec<SuiteId> {
    SUITE_TABLE
        .iter()
        .filter(|s| have_psk || !matches!(s.keyex, KeyExchange::Psk | KeyExchange::DhePsk))
        .map(|s| s.id)
        .collect()
}

/// Server-side selection: the first table entry (in the table's own
/// preference order) that the client also offered, skipping DHE suites
/// if the server key isn't signature-capable and skipping the dummy
/// suite entirely (a real server must never select it).
pub fn server_select(offered: &[SuiteId], server_can_sign: bool) -> Option<&'static CipherSuite> {
    SUITE_TABLE.iter().find(|s| {
        !s.is_dummy
            && offered.contains(&s.id)
            && (!s.keyex.needs_server_keyex() || server_can_sign)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_selects_highest_preference_common_suite() {
        let offered = vec![0x0004, 0x002F, 0x0035];
        let chosen = server_select(&offered, true).unwrap();
        assert_eq!(chosen.id, 0x002F);
    }

    #[test]
    fn server_never_selects_dummy_suite() {
        let offered = vec![0x0003];
        assert!(server_select(&offered, true).is_none());
    }

    #[test]
    fn server_skips_dhe_without_signing_key() {
        let offered = vec![0x0033, 0x002F];
        let chosen = server_select(&offered, false).unwrap();
        assert_eq!(chosen.id, 0x002F);
    }
}
