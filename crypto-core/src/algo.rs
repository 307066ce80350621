use std::fmt;

/// Bulk (symmetric) cipher algorithms, each implicitly bound to one block
/// mode: CBC for the TLS record layer and CMS, CFB for PGP (RFC 4880's
/// "OpenPGP CFB", a self-synchronizing variant with a repeated IV quick
/// check, handled by the PGP-specific encryptor/decryptor rather than here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymmetricAlgorithm {
    /// AES with a 128-bit key.
    Aes128,
    /// AES with a 256-bit key.
    Aes256,
    /// CAST5 (RFC 2144), 128-bit key. PGP's historical default.
    Cast5,
    /// Triple-DES (EDE3), 192-bit key. TLS 1.0 legacy cipher suites.
    TripleDes,
    /// RC4, 128-bit key. Included only so the TLS suite-negotiation table
    /// can name the dummy `SSL_RSA_EXPORT_WITH_RC4_40_MD5` entry (spec §6);
    /// cryptlib-compatible clients never actually select it.
    Rc4,
}

impl SymmetricAlgorithm {
    /// Key size in bytes.
    pub fn key_size(self) -> usize {
        match self {
            SymmetricAlgorithm::Aes128 => 16,
            SymmetricAlgorithm::Aes256 => 32,
            SymmetricAlgorithm::Cast5 => 16,
            SymmetricAlgorithm::TripleDes => 24,
            SymmetricAlgorithm::Rc4 => 16,
        }
    }

    /// Block size in bytes, or 1 for a stream cipher.
    pub fn block_size(self) -> usize {
        match self {
            SymmetricAlgorithm::Aes128 | SymmetricAlgorithm::Aes256 => 16,
            SymmetricAlgorithm::Cast5 => 8,
            SymmetricAlgorithm::TripleDes => 8,
            SymmetricAlgorithm::Rc4 => 1,
        }
    }

    /// Whether this is a block cipher (padding and an IV apply) as opposed
    /// to a stream cipher.
    pub fn is_block_cipher(self) -> bool {
        self.block_size() > 1
    }
}

impl fmt::Display for SymmetricAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            SymmetricAlgorithm::Aes128 => "AES-128",
            SymmetricAlgorithm::Aes256 => "AES-256",
            SymmetricAlgorithm::Cast5 => "CAST5",
            SymmetricAlgorithm::TripleDes => "3DES",
            SymmetricAlgorithm::Rc4 => "RC4",
        };
        f.write_str(s)
    }
}

/// Hash algorithms used for handshake transcripts, MACs, and signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// MD5. Used only inside the TLS/SSL PRF and Finished computation.
    Md5,
    /// SHA-1.
    Sha1,
    /// SHA-256.
    Sha256,
}

impl HashAlgorithm {
    /// Digest size in bytes.
    pub fn digest_size(self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
        };
        f.write_str(s)
    }
}

/// Public-key algorithms used for key exchange and signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublicKeyAlgorithm {
    /// RSA, used both as a transport key-exchange mechanism (PKCS #1 v1.5
    /// encryption of the premaster/session key) and for signing.
    Rsa,
}

/// The format a `sign`/`verify` operation should use, per spec §4.C and
/// the interoperability note in §4.H / §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFormat {
    /// `DigestInfo`-wrapped PKCS #1 v1.5 signature over a single hash.
    /// Used for OpenPGP and CMS signatures.
    Pkcs1DigestInfo,
    /// Raw PKCS #1 v1.5 signature over a concatenated MD5‖SHA-1 digest,
    /// with no `DigestInfo` wrapper. This is the spec-compliant TLS 1.0/1.1
    /// `CertificateVerify`/`ServerKeyExchange` signature format.
    TlsRawConcat,
}
