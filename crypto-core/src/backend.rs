//! The crypto-service abstraction (spec §4.C).
//!
//! This is the only place in the workspace that names specific algorithms;
//! the envelope engine and the TLS layer each talk to these traits, never to
//! a concrete cipher implementation directly. A deployment that wants a
//! hardware-backed or FIPS-validated backend implements these traits once
//! and plugs it in, the way `sequoia-openpgp` lets a `nettle`, `openssl`, or
//! `botan` backend stand in for the `Backend` trait in
//! `openpgp/src/crypto/backend/interface.rs`.

use crate::algo::{HashAlgorithm, SignatureFormat, SymmetricAlgorithm};
use crate::Result;

/// Which direction a [`CipherContext`] was created to run in.
///
/// cryptlib's bulk-cipher contexts are direction-specific (an SSL session
/// keeps a distinct read context and write context); a stream-cipher-mode
/// context (PGP's CFB) can only run the direction it was built for, while a
/// CBC context can technically run either, but callers still only ever
/// drive it in the direction it was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Will only be asked to encrypt.
    Encrypt,
    /// Will only be asked to decrypt.
    Decrypt,
}

/// A bulk-cipher context: block-oriented encryption/decryption in place.
///
/// IV state is carried inside the context across calls, mirroring
/// cryptlib's `cipher_encrypt_in_place`/`cipher_decrypt_in_place`: a caller
/// processes a stream as a sequence of block-aligned chunks without having
/// to manage chaining state itself.
pub trait CipherContext: Send {
    /// The algorithm this context was created for.
    fn algorithm(&self) -> SymmetricAlgorithm;

    /// Encrypts `data` in place. `data.len()` must be a multiple of
    /// [`block_size`](SymmetricAlgorithm::block_size), except for stream
    /// ciphers, which accept any length.
    fn encrypt_in_place(&mut self, data: &mut [u8]) -> Result<()>;

    /// Decrypts `data` in place. Same alignment requirement as
    /// [`encrypt_in_place`](Self::encrypt_in_place).
    fn decrypt_in_place(&mut self, data: &mut [u8]) -> Result<()>;

    /// Re-initializes the context with a fresh IV (TLS 1.1 explicit IV,
    /// or a PGP literal-data sub-key context). Leaves the key unchanged.
    fn set_iv(&mut self, iv: &[u8]) -> Result<()>;
}

/// A hash or MAC context.
///
/// The same trait serves both roles: a plain hash context is a MAC context
/// with no key, used for handshake transcripts and for hashing under a
/// signature; a keyed context computes the hash/MAC/PRF-chain construction
/// implied by its [`MacKind`].
pub trait HashContext: Send {
    /// The digest algorithm.
    fn algorithm(&self) -> HashAlgorithm;

    /// Feeds more data into the running hash.
    fn update(&mut self, data: &[u8]);

    /// Returns the digest without consuming the context, so the same
    /// transcript can be extended further (used for the TLS handshake hash,
    /// which is read at `CertificateVerify` time and again at `Finished`
    /// time).
    fn peek_digest(&self) -> Vec<u8>;

    /// Consumes the context and returns the final digest.
    fn finalize(self: Box<Self>) -> Vec<u8>;

    /// Resets the context to its initial, empty state.
    fn reset(&mut self);

    /// Returns a boxed clone, so a running transcript can be branched (one
    /// copy kept running, one finalized) without re-hashing from scratch.
    fn try_clone(&self) -> Box<dyn HashContext>;
}

/// Which MAC construction a [`mac`](Backend::mac) context computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacKind {
    /// Standard HMAC, keyed with `key`, using the named hash.
    Hmac(HashAlgorithm),
    /// The SSL 3.0 two-pass proto-HMAC construction (spec §4.G):
    /// `H(key ‖ pad2 ‖ H(key ‖ pad1 ‖ data))`.
    SslProto(HashAlgorithm),
}

/// A message-authentication-code context.
pub trait MacContext: Send {
    /// Feeds more data into the running MAC.
    fn update(&mut self, data: &[u8]);

    /// Consumes the context and returns the tag.
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

/// A public- or symmetric-key context used to wrap/unwrap a bulk session
/// key (CMS/PGP recipient-info, or a TLS RSA-transport premaster).
pub trait KeyexContext: Send {
    /// Wraps `key_bytes` for the holder of this context's key.
    fn wrap(&self, key_bytes: &[u8]) -> Result<Vec<u8>>;

    /// Unwraps `wrapped`, recovering the original key bytes. Implementors
    /// must take the same amount of time on a malformed `wrapped` value as
    /// on a well-formed one that merely fails the post-decryption sanity
    /// check (the Bleichenbacher-oracle defense cryptlib and TLS both rely
    /// on): return a syntactically valid but wrong key on failure rather
    /// than an early error, and let the caller (the handshake or SKESK/PKESK
    /// logic) detect the mismatch downstream.
    fn unwrap(&self, wrapped: &[u8]) -> Result<Vec<u8>>;
}

/// A signing/verification context bound to one asymmetric key pair.
pub trait SignContext: Send {
    /// Signs `digest` (already hashed by the caller) in `format`.
    fn sign(&self, digest: &[u8], format: SignatureFormat) -> Result<Vec<u8>>;

    /// Verifies `signature` over `digest` in `format`.
    fn verify(&self, digest: &[u8], signature: &[u8], format: SignatureFormat) -> Result<()>;
}

/// Top-level crypto-service entry point: creates contexts and produces
/// random bytes. One `Backend` implementation is the whole of what the
/// envelope engine and TLS layer know about concrete cryptography.
pub trait Backend: Send + Sync {
    /// Fills `buf` with cryptographically secure random bytes.
    fn random(&self, buf: &mut [u8]) -> Result<()>;

    /// Creates a cipher context for `algo`, keyed with `key`, with the given
    /// initial IV (all zero if the caller hasn't chosen one yet), fixed to
    /// run in `direction`.
    fn cipher(&self, algo: SymmetricAlgorithm, key: &[u8], iv: &[u8], direction: Direction)
        -> Result<Box<dyn CipherContext>>;

    /// Creates a hash context for `algo`.
    fn hash(&self, algo: HashAlgorithm) -> Result<Box<dyn HashContext>>;

    /// Creates a MAC context of the given kind, keyed with `key`.
    fn mac(&self, kind: MacKind, key: &[u8]) -> Result<Box<dyn MacContext>>;
}
