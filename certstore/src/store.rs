//! The lookup backend a cert-store server is bound to. `certstore.c`
//! resolves queries against cryptlib's generic keyset abstraction via
//! `krnlSendMessage(..., IMESSAGE_KEY_GETKEY, ...)`; this crate keeps
//! the same seam as a trait so the HTTP-facing code never depends on
//! how certificates are actually persisted.

use crate::attribute::KeyId;
use crate::error::Result;

/// A source of DER-encoded certificates addressable by [`KeyId`].
///
/// Implementations return `Ok(None)` for "not found" (not an error in
/// itself, per the original's "not finding a cert isn't a real error"
/// comment); `Err` is reserved for backend failures.
pub trait CertStore: Send + Sync {
    fn lookup(&self, id: &KeyId) -> Result<Option<Vec<u8>>>;
}

/// A fixed in-memory table, useful for tests and for embedding a small
/// static set of certificates without a real keyset behind it.
#[derive(Default)]
pub struct MemoryCertStore {
    by_cert_id: std::collections::HashMap<Vec<u8>, Vec<u8>>,
    by_name: std::collections::HashMap<String, Vec<u8>>,
    by_uri: std::collections::HashMap<String, Vec<u8>>,
    by_issuer_id: std::collections::HashMap<Vec<u8>, Vec<u8>>,
    by_issuer_and_serial: std::collections::HashMap<Vec<u8>, Vec<u8>>,
    by_key_id_hash: std::collections::HashMap<Vec<u8>, Vec<u8>>,
}

impl MemoryCertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_cert_id(&mut self, id: Vec<u8>, der: Vec<u8>) {
        self.by_cert_id.insert(id, der);
    }

    pub fn insert_name(&mut self, name: String, der: Vec<u8>) {
        self.by_name.insert(name, der);
    }

    pub fn insert_uri(&mut self, uri: String, der: Vec<u8>) {
        self.by_uri.insert(uri, der);
    }

    pub fn insert_issuer_id(&mut self, hash: Vec<u8>, der: Vec<u8>) {
        self.by_issuer_id.insert(hash, der);
    }

    pub fn insert_issuer_and_serial(&mut self, hash: Vec<u8>, der: Vec<u8>) {
        self.by_issuer_and_serial.insert(hash, der);
    }

    pub fn insert_key_id_hash(&mut self, hash: Vec<u8>, der: Vec<u8>) {
        self.by_key_id_hash.insert(hash, der);
    }
}

impl CertStore for MemoryCertStore {
    fn lookup(&self, id: &KeyId) -> Result<Option<Vec<u8>>> {
        let hit = match id {
            KeyId::CertId(bytes) => self.by_cert_id.get(bytes),
            KeyId::Name(name) => self.by_name.get(name),
            KeyId::Uri(uri) => self.by_uri.get(uri),
            KeyId::IssuerId(hash) => self.by_issuer_id.get(hash),
            KeyId::IssuerAndSerialNumber(hash) => self.by_issuer_and_serial.get(hash),
            KeyId::KeyIdHash(hash) => self.by_key_id_hash.get(hash),
        };
        Ok(hit.cloned())
    }
}
