//! TLS/SSL record layer (spec §4.G), grounded in `ssl_cry.c`'s
//! `encryptData`/`decryptData`/`macDataSSL`/`macDataTLS` and `ssl_rw.c`'s
//! packet wrap/unwrap framing.

use crypto_core::{Backend, CipherContext, HashAlgorithm, MacKind};

use crate::error::{Error, Result};

/// The negotiated protocol version (spec §4.H "Messages" — `ServerHello`
/// picks the min of client-offered and server-max).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    Ssl3,
    Tls10,
    Tls11,
}

impl ProtocolVersion {
    /// The two-byte wire encoding (`ssl.h`'s `SSL_MAJOR_VERSION`/
    /// `SSL_MINOR_VERSION_*`).
    pub fn wire(self) -> (u8, u8) {
        let minor = match self {
            ProtocolVersion::Ssl3 => 0,
            ProtocolVersion::Tls10 => 1,
            ProtocolVersion::Tls11 => 2,
        };
        (3, minor)
    }

    pub fn from_wire(major: u8, minor: u8) -> Result<Self> {
        match (major, minor) {
            (3, 0) => Ok(ProtocolVersion::Ssl3),
            (3, 1) => Ok(ProtocolVersion::Tls10),
            (3, 2) => Ok(ProtocolVersion::Tls11),
            _ => Err(Error::BadMessage(format!("unsupported protocol version {major}.{minor}"))),
        }
    }

    pub fn is_ssl3(self) -> bool {
        self == ProtocolVersion::Ssl3
    }

    /// Whether block-cipher records carry an explicit per-record IV
    /// (spec §4.G "Explicit IV").
    pub fn has_explicit_iv(self) -> bool {
        self == ProtocolVersion::Tls11
    }
}

/// Record content types (spec §4.G, `ssl.h`'s `SSL_MSG_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            20 => Ok(ContentType::ChangeCipherSpec),
            21 => Ok(ContentType::Alert),
            22 => Ok(ContentType::Handshake),
            23 => Ok(ContentType::ApplicationData),
            other => Err(Error::BadMessage(format!("unknown record content type {other}"))),
        }
    }
}

/// Keys and sequence state for one direction (read or write) of a record
/// layer, installed once per `ChangeCipherSpec` (spec §4.H "Key block
/// derivation").
struct DirectionState {
    cipher: Option<Box<dyn CipherContext>>,
    mac_key: Vec<u8>,
    seq: u64,
}

impl DirectionState {
    fn plaintext_only(mac_key: Vec<u8>) -> Self {
        DirectionState { cipher: None, mac_key, seq: 0 }
    }
}

/// Fixed 5-byte record header size (spec §4.G).
pub const RECORD_HEADER_SIZE: usize = 5;
/// Maximum plaintext payload per record (spec §4.G, `ssl.h`'s
/// `MAX_PACKET_SIZE`).
pub const MAX_PLAINTEXT: usize = 16384;

/// The record layer for one TLS/SSL connection: wraps outbound plaintext
/// into records and unwraps inbound records back into plaintext, with
/// independent read/write cipher and MAC state and sequence numbers.
pub struct RecordLayer {
    backend: std::sync::Arc<dyn Backend>,
    version: ProtocolVersion,
    mac_hash: HashAlgorithm,
    block_size: usize,
    write: DirectionState,
    read: DirectionState,
}

impl RecordLayer {
    /// A record layer with no cipher installed yet (pre-`ChangeCipherSpec`):
    /// records are sent/received in the clear.
    pub fn new_cleartext(backend: std::sync::Arc<dyn Backend>, version: ProtocolVersion) -> Self {
        RecordLayer {
            backend,
            version,
            mac_hash: HashAlgorithm::Sha1,
            block_size: 1,
            write: DirectionState::plaintext_only(Vec::new()),
            read: DirectionState::plaintext_only(Vec::new()),
        }
    }

    /// Installs the negotiated bulk cipher and MAC keys for both
    /// directions, ending the cleartext phase (spec §4.H "Key block
    /// derivation" — the caller has already split the key block and knows
    /// which half is "write" for this role).
    /// Updates the record-layer version once the handshake negotiates it,
    /// without disturbing sequence numbers or installed keys.
    pub fn negotiate_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn install_keys(
        &mut self,
        mac_hash: HashAlgorithm,
        block_size: usize,
        write_cipher: Box<dyn CipherContext>,
        write_mac_key: Vec<u8>,
        read_cipher: Box<dyn CipherContext>,
        read_mac_key: Vec<u8>,
    ) {
        self.mac_hash = mac_hash;
        self.block_size = block_size;
        self.write = DirectionState { cipher: Some(write_cipher), mac_key: write_mac_key, seq: 0 };
        self.read = DirectionState { cipher: Some(read_cipher), mac_key: read_mac_key, seq: 0 };
    }

    fn mac_kind(&self) -> MacKind {
        if self.version.is_ssl3() {
            MacKind::SslProto(self.mac_hash)
        } else {
            MacKind::Hmac(self.mac_hash)
        }
    }

    /// Wraps `plaintext` as one record of `content_type`, returning the
    /// full wire bytes (header, optional explicit IV, ciphertext, MAC,
    /// padding) (spec §4.G "Outbound wrap").
    pub fn wrap(&mut self, content_type: ContentType, plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.len() > MAX_PLAINTEXT {
            return Err(Error::BadMessage("plaintext exceeds maximum record size".into()));
        }
        let (major, minor) = self.version.wire();

        let mut mac_input = Vec::with_capacity(13 + plaintext.len());
        mac_input.extend_from_slice(&self.write.seq.to_be_bytes());
        mac_input.push(content_type as u8);
        mac_input.push(major);
        mac_input.push(minor);
        mac_input.extend_from_slice(&(plaintext.len() as u16).to_be_bytes());
        mac_input.extend_from_slice(plaintext);

        let mut mac_ctx = self.backend.mac(self.mac_kind(), &self.write.mac_key)?;
        mac_ctx.update(&mac_input);
        let mac = mac_ctx.finalize();

        let mut body = plaintext.to_vec();
        body.extend_from_slice(&mac);

        if self.block_size > 1 {
            let pad_len = self.block_size - (body.len() % self.block_size);
            body.extend(std::iter::repeat((pad_len - 1) as u8).take(pad_len));
        }

        let mut explicit_iv = Vec::new();
        if self.version.has_explicit_iv() && self.block_size > 1 {
            explicit_iv = vec![0u8; self.block_size];
            self.backend.random(&mut explicit_iv)?;
            if let Some(cipher) = self.write.cipher.as_mut() {
                cipher.set_iv(&explicit_iv)?;
            }
        }

        if let Some(cipher) = self.write.cipher.as_mut() {
            cipher.encrypt_in_place(&mut body)?;
        }

        let total_len = explicit_iv.len() + body.len();
        let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + total_len);
        record.push(content_type as u8);
        record.push(major);
        record.push(minor);
        record.extend_from_slice(&(total_len as u16).to_be_bytes());
        record.extend(explicit_iv);
        record.extend(body);

        self.write.seq += 1;
        Ok(record)
    }

    /// Unwraps one record's body (the bytes after the 5-byte header,
    /// exactly `length` of them) back into plaintext (spec §4.G "Inbound
    /// unwrap"). Defeats Vaudenay-style padding oracles by always running
    /// the MAC check, using the computed (possibly nonsense) plaintext
    /// length when the padding itself is invalid, and folding both checks
    /// into a single error.
    pub fn unwrap(&mut self, content_type: ContentType, mut body: Vec<u8>) -> Result<Vec<u8>> {
        let (major, minor) = self.version.wire();

        if self.version.has_explicit_iv() && self.block_size > 1 {
            if body.len() < self.block_size {
                self.read.seq += 1;
                return Err(Error::BadRecordMac);
            }
            let iv: Vec<u8> = body.drain(..self.block_size).collect();
            if let Some(cipher) = self.read.cipher.as_mut() {
                cipher.set_iv(&iv)?;
            }
        }

        if let Some(cipher) = self.read.cipher.as_mut() {
            if self.block_size > 1 && body.len() % self.block_size != 0 {
                self.read.seq += 1;
                return Err(Error::BadRecordMac);
            }
            cipher.decrypt_in_place(&mut body)?;
        }

        let mac_len = self.mac_hash.digest_size();

        let (content_len, pad_ok) = if self.block_size > 1 {
            strip_block_padding(&body, self.block_size, self.version.is_ssl3())
        } else {
            (body.len(), true)
        };

        // Never branch on `pad_ok` before computing the MAC: always run the
        // MAC over a plausible length, even a nonsense one.
        let plaintext_len = content_len.saturating_sub(mac_len);
        let mac_start = plaintext_len;

        let mut mac_input = Vec::with_capacity(13 + plaintext_len);
        mac_input.extend_from_slice(&self.read.seq.to_be_bytes());
        mac_input.push(content_type as u8);
        mac_input.push(major);
        mac_input.push(minor);
        mac_input.extend_from_slice(&(plaintext_len as u16).to_be_bytes());
        mac_input.extend_from_slice(&body[..plaintext_len.min(body.len())]);

        let mut mac_ctx = self.backend.mac(self.mac_kind(), &self.read.mac_key)?;
        mac_ctx.update(&mac_input);
        let computed_mac = mac_ctx.finalize();

        let received_mac = if mac_start + mac_len <= body.len() {
            &body[mac_start..mac_start + mac_len]
        } else {
            &[][..]
        };
        let mac_ok = received_mac.len() == mac_len && constant_time_eq(&computed_mac, received_mac);

        self.read.seq += 1;

        if !pad_ok || !mac_ok {
            return Err(Error::BadRecordMac);
        }

        Ok(body[..plaintext_len].to_vec())
    }
}

/// Strips TLS/SSL block-cipher padding from decrypted `body`. Returns
/// `(content_len, ok)`: `content_len` is where the padding began (the end
/// of plaintext-plus-MAC) if `ok`, or `body.len()` (a deliberately
/// unreliable fallback, never used to skip the MAC check) if not. TLS
/// checks every padding byte equals the pad-length byte; SSL 3.0 only
/// checks the pad-length byte itself (the spec is silent on pad
/// contents).
fn strip_block_padding(body: &[u8], block_size: usize, is_ssl3: bool) -> (usize, bool) {
    if body.is_empty() {
        return (0, false);
    }
    let pad_len = body[body.len() - 1] as usize;
    if pad_len + 1 > body.len() {
        return (body.len(), false);
    }
    if is_ssl3 {
        if pad_len > block_size - 1 {
            return (body.len(), false);
        }
        return (body.len() - pad_len - 1, true);
    }
    let pad_start = body.len() - pad_len - 1;
    let ok = body[pad_start..body.len() - 1].iter().all(|&b| b as usize == pad_len);
    (pad_start, ok)
}

/// Compares two byte slices without short-circuiting on the first
/// mismatch, so the comparison takes the same time regardless of how
/// early a difference occurs (spec §4.G "Timing").
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_core::{Direction, SoftwareBackend, SymmetricAlgorithm};
    use std::sync::Arc;

    fn keyed_layer(version: ProtocolVersion) -> (RecordLayer, RecordLayer) {
        let backend: Arc<dyn Backend> = Arc::new(SoftwareBackend);
        let key = [0x42u8; 16];
        let iv = [0x00u8; 16];
        let mac_key = [0x24u8; 20];

        let mut a = RecordLayer::new_cleartext(backend.clone(), version);
        let mut b = RecordLayer::new_cleartext(backend.clone(), version);

        a.install_keys(
            HashAlgorithm::Sha1,
            16,
            backend.cipher(SymmetricAlgorithm::Aes128, &key, &iv, Direction::Encrypt).unwrap(),
            mac_key.to_vec(),
            backend.cipher(SymmetricAlgorithm::Aes128, &key, &iv, Direction::Decrypt).unwrap(),
            mac_key.to_vec(),
        );
        b.install_keys(
            HashAlgorithm::Sha1,
            16,
            backend.cipher(SymmetricAlgorithm::Aes128, &key, &iv, Direction::Encrypt).unwrap(),
            mac_key.to_vec(),
            backend.cipher(SymmetricAlgorithm::Aes128, &key, &iv, Direction::Decrypt).unwrap(),
            mac_key.to_vec(),
        );
        (a, b)
    }

    #[test]
    fn wrap_unwrap_round_trips_tls10() {
        let (mut writer, mut reader) = keyed_layer(ProtocolVersion::Tls10);
        let record = writer.wrap(ContentType::ApplicationData, b"hello record layer").unwrap();
        let body = record[RECORD_HEADER_SIZE..].to_vec();
        let plaintext = reader.unwrap(ContentType::ApplicationData, body).unwrap();
        assert_eq!(plaintext, b"hello record layer");
    }

    #[test]
    fn wrap_unwrap_round_trips_tls11_explicit_iv() {
        let (mut writer, mut reader) = keyed_layer(ProtocolVersion::Tls11);
        let record = writer.wrap(ContentType::ApplicationData, b"explicit iv payload").unwrap();
        let body = record[RECORD_HEADER_SIZE..].to_vec();
        let plaintext = reader.unwrap(ContentType::ApplicationData, body).unwrap();
        assert_eq!(plaintext, b"explicit iv payload");
    }

    #[test]
    fn tampered_mac_is_rejected() {
        let (mut writer, mut reader) = keyed_layer(ProtocolVersion::Tls10);
        let record = writer.wrap(ContentType::ApplicationData, b"tamper me").unwrap();
        let mut body = record[RECORD_HEADER_SIZE..].to_vec();
        let last = body.len() - 1;
        body[last] ^= 0xff;
        assert!(reader.unwrap(ContentType::ApplicationData, body).is_err());
    }

    #[test]
    fn sequence_number_increments_on_every_processed_record() {
        let (mut writer, mut reader) = keyed_layer(ProtocolVersion::Tls10);
        let r1 = writer.wrap(ContentType::ApplicationData, b"one").unwrap();
        let r2 = writer.wrap(ContentType::ApplicationData, b"two").unwrap();
        assert_eq!(writer.write.seq, 2);
        reader.unwrap(ContentType::ApplicationData, r1[RECORD_HEADER_SIZE..].to_vec()).unwrap();
        reader.unwrap(ContentType::ApplicationData, r2[RECORD_HEADER_SIZE..].to_vec()).unwrap();
        assert_eq!(reader.read.seq, 2);
    }
}
