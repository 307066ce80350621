//! Handshake state machine (spec §4.H), driving [`RecordLayer`] over any
//! `Read + Write` transport. `client` and `server` each host one
//! direction's driver; both share the transcript, key-derivation, and
//! Finished-message plumbing defined here.

pub mod client;
pub mod messages;
pub mod server;

use std::io::{Read, Write};

use crypto_core::{Backend, Direction, HashAlgorithm, HashContext};

use crate::error::{Error, Result};
use crate::record::{ContentType, ProtocolVersion, RecordLayer};
use crate::suite::CipherSuite;

/// The running MD5 and SHA-1 hashes over every handshake message body
/// (framed, but excluding record-layer headers) seen so far in either
/// direction. Needed in full for SSL 3.0's dual-hash Finished and for
/// the TLS Finished's `MD5(HS)||SHA1(HS)` seed; only ever read via
/// `peek_digest`/`try_clone` so the running state survives past
/// `CertificateVerify` into `Finished`.
pub(crate) struct Transcript {
    md5: Box<dyn HashContext>,
    sha1: Box<dyn HashContext>,
}

impl Transcript {
    fn new(backend: &dyn Backend) -> Result<Self> {
        Ok(Transcript { md5: backend.hash(HashAlgorithm::Md5)?, sha1: backend.hash(HashAlgorithm::Sha1)? })
    }

    fn update(&mut self, data: &[u8]) {
        self.md5.update(data);
        self.sha1.update(data);
    }
}

/// Reads one complete handshake-layer message from `transport`,
/// unwrapping as many `Handshake`-type records as needed, and folds its
/// framed bytes into `transcript`.
pub(crate) fn read_handshake_message(
    transport: &mut dyn Read,
    records: &mut RecordLayer,
    transcript: &mut Transcript,
    pending: &mut Vec<u8>,
) -> Result<(messages::HandshakeType, Vec<u8>)> {
    loop {
        if let Some((kind, body, consumed)) = messages::split_one(pending)? {
            let framed = pending[..consumed].to_vec();
            pending.drain(..consumed);
            transcript.update(&framed);
            return Ok((kind, body));
        }
        let record = read_one_record(transport, records, ContentType::Handshake)?;
        pending.extend(record);
    }
}

/// Reads exactly one TLS record's header and body off `transport` and
/// unwraps it, verifying its content type matches `expected`.
fn read_one_record(transport: &mut dyn Read, records: &mut RecordLayer, expected: ContentType) -> Result<Vec<u8>> {
    let mut header = [0u8; crate::record::RECORD_HEADER_SIZE];
    transport.read_exact(&mut header).map_err(|e| Error::Io(e.to_string()))?;
    let content_type = ContentType::from_byte(header[0])?;
    let length = u16::from_be_bytes([header[3], header[4]]) as usize;
    let mut body = vec![0u8; length];
    transport.read_exact(&mut body).map_err(|e| Error::Io(e.to_string()))?;
    if content_type as u8 != expected as u8 {
        return Err(Error::UnexpectedMessage(format!(
            "expected content type {}, got {}",
            expected as u8, content_type as u8
        )));
    }
    records.unwrap(expected, body)
}

pub(crate) fn write_handshake_message(
    transport: &mut dyn Write,
    records: &mut RecordLayer,
    transcript: &mut Transcript,
    kind: messages::HandshakeType,
    body: &[u8],
) -> Result<()> {
    let framed = messages::frame(kind, body);
    transcript.update(&framed);
    let record = records.wrap(ContentType::Handshake, &framed)?;
    transport.write_all(&record).map_err(|e| Error::Io(e.to_string()))?;
    Ok(())
}

pub(crate) fn write_change_cipher_spec(transport: &mut dyn Write, records: &mut RecordLayer) -> Result<()> {
    let record = records.wrap(ContentType::ChangeCipherSpec, &[0x01])?;
    transport.write_all(&record).map_err(|e| Error::Io(e.to_string()))
}

pub(crate) fn read_change_cipher_spec(transport: &mut dyn Read) -> Result<()> {
    let mut header = [0u8; crate::record::RECORD_HEADER_SIZE];
    transport.read_exact(&mut header).map_err(|e| Error::Io(e.to_string()))?;
    let content_type = ContentType::from_byte(header[0])?;
    if content_type as u8 != ContentType::ChangeCipherSpec as u8 {
        return Err(Error::UnexpectedMessage("expected ChangeCipherSpec".into()));
    }
    let length = u16::from_be_bytes([header[3], header[4]]) as usize;
    let mut body = vec![0u8; length];
    transport.read_exact(&mut body).map_err(|e| Error::Io(e.to_string()))?;
    // ChangeCipherSpec is never encrypted itself; it only signals that the
    // *next* record uses the newly installed keys, which the caller
    // installs into the record layer itself right before this call returns.
    Ok(())
}

/// Splits a freshly derived key block into the six fields TLS/SSL define
/// (spec §4.H "Key block derivation": MAC-write, MAC-read, cipher-write,
/// cipher-read, IV-write, IV-read, in client-then-server order), and
/// installs them into `records` for the given connection role.
pub(crate) fn install_key_block(
    records: &mut RecordLayer,
    backend: &dyn Backend,
    suite: &CipherSuite,
    key_block: &[u8],
    is_client: bool,
) -> Result<()> {
    let mac_len = suite.mac_hash.digest_size();
    let key_len = suite.key_size;
    let iv_len = if suite.cipher.is_block_cipher() { suite.cipher.block_size() } else { 0 };

    let mut pos = 0;
    let client_mac = &key_block[pos..pos + mac_len];
    pos += mac_len;
    let server_mac = &key_block[pos..pos + mac_len];
    pos += mac_len;
    let client_key = &key_block[pos..pos + key_len];
    pos += key_len;
    let server_key = &key_block[pos..pos + key_len];
    pos += key_len;
    let client_iv = &key_block[pos..pos + iv_len];
    pos += iv_len;
    let server_iv = &key_block[pos..pos + iv_len];

    let (write_mac, read_mac, write_key, read_key, write_iv, read_iv) = if is_client {
        (client_mac, server_mac, client_key, server_key, client_iv, server_iv)
    } else {
        (server_mac, client_mac, server_key, client_key, server_iv, client_iv)
    };

    let write_cipher = backend.cipher(suite.cipher, write_key, write_iv, Direction::Encrypt)?;
    let read_cipher = backend.cipher(suite.cipher, read_key, read_iv, Direction::Decrypt)?;
    records.install_keys(suite.mac_hash, suite.cipher.block_size(), write_cipher, write_mac.to_vec(), read_cipher, read_mac.to_vec());
    Ok(())
}

pub(crate) fn finished_value(
    backend: &dyn Backend,
    version: ProtocolVersion,
    master_secret: &[u8],
    label: &[u8],
    sender: &[u8; 4],
    transcript: &Transcript,
) -> Result<Vec<u8>> {
    if version.is_ssl3() {
        Ok(crate::prf::ssl3_finished(backend, master_secret, sender, transcript.md5.as_ref(), transcript.sha1.as_ref())?)
    } else {
        Ok(crate::prf::tls_finished(backend, master_secret, label, transcript.md5.as_ref(), transcript.sha1.as_ref())?)
    }
}

pub(crate) use crate::prf::{SENDER_CLIENT, SENDER_SERVER};

/// Derives the key block from the master secret and installs it into
/// `records` for the given connection role. Shared by both handshake
/// directions since key-block derivation and layout don't depend on who's
/// asking (spec §4.H "Key block derivation").
pub(crate) fn install_negotiated_keys(
    records: &mut RecordLayer,
    backend: &dyn Backend,
    suite: &CipherSuite,
    master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    is_client: bool,
) -> Result<()> {
    let key_len = suite.key_size;
    let iv_len = if suite.cipher.is_block_cipher() { suite.cipher.block_size() } else { 0 };
    let key_block_len = 2 * suite.mac_hash.digest_size() + 2 * key_len + 2 * iv_len;
    let key_block = crate::prf::key_block(backend, records.version().is_ssl3(), master_secret, client_random, server_random, key_block_len)?;
    install_key_block(records, backend, suite, &key_block, is_client)
}

/// Hashes `data` the way `SignatureFormat::TlsRawConcat` expects: a
/// concatenated MD5‖SHA-1 digest with no `DigestInfo` wrapper (spec §4.H
/// "Deviation... in CertificateVerify" reuses the same raw-concat format
/// for `ServerKeyExchange` signatures).
pub(crate) fn raw_concat_digest(backend: &dyn Backend, data: &[u8]) -> Result<Vec<u8>> {
    let mut md5 = backend.hash(HashAlgorithm::Md5)?;
    md5.update(data);
    let mut sha1 = backend.hash(HashAlgorithm::Sha1)?;
    sha1.update(data);
    let mut digest = md5.finalize();
    digest.extend(sha1.finalize());
    Ok(digest)
}
