//! Handshake sub-protocol message wire format (spec §4.H "Messages"),
//! grounded in `ssl.h`'s `SSL_HAND_*` constants and `ssl_cry.c`'s
//! `initDHcontextSSL` for the `ServerKeyExchange` DH parameter encoding.

use crate::error::{Error, Result};
use crate::suite::SuiteId;

/// Handshake message type byte (`ssl.h`'s `SSL_HAND_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    ClientHello = 0x01,
    ServerHello = 0x02,
    Certificate = 0x0B,
    ServerKeyExchange = 0x0C,
    CertificateRequest = 0x0D,
    ServerHelloDone = 0x0E,
    CertificateVerify = 0x0F,
    ClientKeyExchange = 0x10,
    Finished = 0x14,
}

impl HandshakeType {
    pub fn from_byte(b: u8) -> Result<Self> {
        use HandshakeType::*;
        Ok(match b {
            0x01 => ClientHello,
            0x02 => ServerHello,
            0x0B => Certificate,
            0x0C => ServerKeyExchange,
            0x0D => CertificateRequest,
            0x0E => ServerHelloDone,
            0x0F => CertificateVerify,
            0x10 => ClientKeyExchange,
            0x14 => Finished,
            other => return Err(Error::BadMessage(format!("unknown handshake message type {other}"))),
        })
    }
}

fn read_u8(buf: &[u8], pos: &mut usize) -> Result<u8> {
    let b = *buf.get(*pos).ok_or_else(|| Error::BadMessage("truncated message".into()))?;
    *pos += 1;
    Ok(b)
}

fn read_bytes<'a>(buf: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = pos.checked_add(len).ok_or_else(|| Error::BadMessage("length overflow".into()))?;
    let slice = buf.get(*pos..end).ok_or_else(|| Error::BadMessage("truncated message".into()))?;
    *pos = end;
    Ok(slice)
}

fn read_u16_len_vec(buf: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
    let hi = read_u8(buf, pos)? as usize;
    let lo = read_u8(buf, pos)? as usize;
    let len = (hi << 8) | lo;
    Ok(read_bytes(buf, pos, len)?.to_vec())
}

fn read_u8_len_vec(buf: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
    let len = read_u8(buf, pos)? as usize;
    Ok(read_bytes(buf, pos, len)?.to_vec())
}

fn push_u16_len(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    out.extend_from_slice(data);
}

fn push_u8_len(out: &mut Vec<u8>, data: &[u8]) {
    out.push(data.len() as u8);
    out.extend_from_slice(data);
}

/// `ClientHello` (spec §4.H "Messages"): unrecognised extensions are
/// skipped rather than rejected, so this keeps only the raw extension
/// bytes rather than parsing them.
#[derive(Debug, Clone)]
pub struct ClientHello {
    pub version: (u8, u8),
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<SuiteId>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<u8>,
}

impl ClientHello {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.version.0);
        out.push(self.version.1);
        out.extend_from_slice(&self.random);
        push_u8_len(&mut out, &self.session_id);

        let mut suites = Vec::with_capacity(self.cipher_suites.len() * 2);
        for id in &self.cipher_suites {
            suites.extend_from_slice(&id.to_be_bytes());
        }
        push_u16_len(&mut out, &suites);
        push_u8_len(&mut out, &self.compression_methods);
        if !self.extensions.is_empty() {
            push_u16_len(&mut out, &self.extensions);
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut pos = 0;
        let major = read_u8(buf, &mut pos)?;
        let minor = read_u8(buf, &mut pos)?;
        let random_slice = read_bytes(buf, &mut pos, 32)?;
        let mut random = [0u8; 32];
        random.copy_from_slice(random_slice);
        let session_id = read_u8_len_vec(buf, &mut pos)?;
        let suite_bytes = read_u16_len_vec(buf, &mut pos)?;
        let cipher_suites = suite_bytes.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
        let compression_methods = read_u8_len_vec(buf, &mut pos)?;
        let extensions = if pos < buf.len() { read_u16_len_vec(buf, &mut pos)? } else { Vec::new() };
        Ok(ClientHello { version: (major, minor), random, session_id, cipher_suites, compression_methods, extensions })
    }
}

/// `ServerHello`.
#[derive(Debug, Clone)]
pub struct ServerHello {
    pub version: (u8, u8),
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suite: SuiteId,
    pub compression_method: u8,
}

impl ServerHello {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.version.0);
        out.push(self.version.1);
        out.extend_from_slice(&self.random);
        push_u8_len(&mut out, &self.session_id);
        out.extend_from_slice(&self.cipher_suite.to_be_bytes());
        out.push(self.compression_method);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut pos = 0;
        let major = read_u8(buf, &mut pos)?;
        let minor = read_u8(buf, &mut pos)?;
        let random_slice = read_bytes(buf, &mut pos, 32)?;
        let mut random = [0u8; 32];
        random.copy_from_slice(random_slice);
        let session_id = read_u8_len_vec(buf, &mut pos)?;
        let suite_hi = read_u8(buf, &mut pos)?;
        let suite_lo = read_u8(buf, &mut pos)?;
        let cipher_suite = u16::from_be_bytes([suite_hi, suite_lo]);
        let compression_method = read_u8(buf, &mut pos)?;
        Ok(ServerHello { version: (major, minor), random, session_id, cipher_suite, compression_method })
    }
}

/// Server certificate chain: a sequence of length-prefixed DER
/// certificates, leaf first (spec §4.H "Server certificate").
#[derive(Debug, Clone)]
pub struct CertificateChain {
    pub certs: Vec<Vec<u8>>,
}

impl CertificateChain {
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for cert in &self.certs {
            body.extend_from_slice(&u24_be(cert.len()));
            body.extend_from_slice(cert);
        }
        let mut out = Vec::with_capacity(3 + body.len());
        out.extend_from_slice(&u24_be(body.len()));
        out.extend_from_slice(&body);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut pos = 0;
        let total_len = read_u24(buf, &mut pos)?;
        let end = pos + total_len;
        if end > buf.len() {
            return Err(Error::BadMessage("certificate chain length overruns message".into()));
        }
        let mut certs = Vec::new();
        while pos < end {
            let cert_len = read_u24(buf, &mut pos)?;
            certs.push(read_bytes(buf, &mut pos, cert_len)?.to_vec());
        }
        Ok(CertificateChain { certs })
    }
}

fn u24_be(n: usize) -> [u8; 3] {
    [(n >> 16) as u8, (n >> 8) as u8, n as u8]
}

fn read_u24(buf: &[u8], pos: &mut usize) -> Result<usize> {
    let b = read_bytes(buf, pos, 3)?;
    Ok(((b[0] as usize) << 16) | ((b[1] as usize) << 8) | b[2] as usize)
}

/// Ephemeral-DH `ServerKeyExchange` (spec §4.H "Server key exchange"):
/// `(p, g, Ys)`, each length-prefixed, plus a signature over
/// `client_random || server_random || p || g || Ys`.
#[derive(Debug, Clone)]
pub struct ServerKeyExchangeDhe {
    pub p: Vec<u8>,
    pub g: Vec<u8>,
    pub ys: Vec<u8>,
    pub signature: Vec<u8>,
}

impl ServerKeyExchangeDhe {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_u16_len(&mut out, &self.p);
        push_u16_len(&mut out, &self.g);
        push_u16_len(&mut out, &self.ys);
        push_u16_len(&mut out, &self.signature);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut pos = 0;
        let p = read_u16_len_vec(buf, &mut pos)?;
        let g = read_u16_len_vec(buf, &mut pos)?;
        let ys = read_u16_len_vec(buf, &mut pos)?;
        let signature = read_u16_len_vec(buf, &mut pos)?;
        Ok(ServerKeyExchangeDhe { p, g, ys, signature })
    }

    /// The bytes the server's signature (and the verifier) runs over.
    pub fn signed_data(client_random: &[u8; 32], server_random: &[u8; 32], p: &[u8], g: &[u8], ys: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(client_random);
        buf.extend_from_slice(server_random);
        push_u16_len(&mut buf, p);
        push_u16_len(&mut buf, g);
        push_u16_len(&mut buf, ys);
        buf
    }
}

/// `ClientKeyExchange`, shape depends on the negotiated key exchange
/// (spec §4.H "Client key exchange").
#[derive(Debug, Clone)]
pub enum ClientKeyExchange {
    /// RSA transport: the PKCS #1 v1.5-encrypted premaster.
    Rsa(Vec<u8>),
    /// DHE: the client's DH public value.
    Dhe(Vec<u8>),
    /// PSK: a UTF-8 identity (and, for DHE-PSK, also a DH public value).
    Psk { identity: Vec<u8>, dh_public: Option<Vec<u8>> },
}

impl ClientKeyExchange {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            ClientKeyExchange::Rsa(premaster) => push_u16_len(&mut out, premaster),
            ClientKeyExchange::Dhe(public) => push_u16_len(&mut out, public),
            ClientKeyExchange::Psk { identity, dh_public } => {
                push_u16_len(&mut out, identity);
                if let Some(public) = dh_public {
                    push_u16_len(&mut out, public);
                }
            }
        }
        out
    }

    pub fn decode_rsa(buf: &[u8]) -> Result<Self> {
        let mut pos = 0;
        Ok(ClientKeyExchange::Rsa(read_u16_len_vec(buf, &mut pos)?))
    }

    pub fn decode_dhe(buf: &[u8]) -> Result<Self> {
        let mut pos = 0;
        Ok(ClientKeyExchange::Dhe(read_u16_len_vec(buf, &mut pos)?))
    }

    pub fn decode_psk(buf: &[u8], with_dh: bool) -> Result<Self> {
        let mut pos = 0;
        let identity = read_u16_len_vec(buf, &mut pos)?;
        let dh_public = if with_dh { Some(read_u16_len_vec(buf, &mut pos)?) } else { None };
        Ok(ClientKeyExchange::Psk { identity, dh_public })
    }
}

/// RSA transport premaster layout: `version[2] || random[46]` (spec
/// §4.H): the embedded version must equal the client's *originally
/// offered* version, to detect a version-rollback attack.
pub fn rsa_premaster(offered_version: (u8, u8), random46: &[u8; 46]) -> Vec<u8> {
    let mut out = Vec::with_capacity(48);
    out.push(offered_version.0);
    out.push(offered_version.1);
    out.extend_from_slice(random46);
    out
}

/// Constructs the PSK premaster (spec §4.H "PSK mode"):
/// `uint16 len-of-zeroes || zeroes[len] || uint16 len-of-psk || psk`,
/// where `len-of-zeroes` equals the PSK length.
pub fn psk_premaster(psk: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + psk.len() * 2);
    out.extend_from_slice(&(psk.len() as u16).to_be_bytes());
    out.extend(std::iter::repeat(0u8).take(psk.len()));
    out.extend_from_slice(&(psk.len() as u16).to_be_bytes());
    out.extend_from_slice(psk);
    out
}

/// `CertificateVerify` / `Finished` both carry a single opaque blob in
/// this codec: the former a signature, the latter a 12-byte (TLS) or
/// 36-byte (SSL 3.0) MAC value.
#[derive(Debug, Clone)]
pub struct OpaqueBlob(pub Vec<u8>);

impl OpaqueBlob {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_u16_len(&mut out, &self.0);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut pos = 0;
        Ok(OpaqueBlob(read_u16_len_vec(buf, &mut pos)?))
    }
}

/// `Finished` carries its fixed-size MAC value directly, with no
/// length prefix (unlike `CertificateVerify`'s variable-length
/// signature).
pub fn encode_finished(value: &[u8]) -> Vec<u8> {
    value.to_vec()
}

/// Wraps a handshake message body with its 1-byte type and 3-byte
/// length header, the form that is hashed into the transcript and
/// carried inside `Handshake`-type records.
pub fn frame(kind: HandshakeType, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    out.push(kind as u8);
    out.extend_from_slice(&u24_be(body.len()));
    out.extend_from_slice(body);
    out
}

/// Splits one framed handshake message off the front of `buf`, if a
/// complete one is present. Returns `(kind, body, consumed)`.
pub fn split_one(buf: &[u8]) -> Result<Option<(HandshakeType, Vec<u8>, usize)>> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let kind = HandshakeType::from_byte(buf[0])?;
    let mut pos = 1;
    let len = read_u24(buf, &mut pos)?;
    if buf.len() < 4 + len {
        return Ok(None);
    }
    let body = buf[4..4 + len].to_vec();
    Ok(Some((kind, body, 4 + len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_hello_round_trips() {
        let hello = ClientHello {
            version: (3, 1),
            random: [0x42; 32],
            session_id: vec![],
            cipher_suites: vec![0x002F, 0x0033],
            compression_methods: vec![0],
            extensions: vec![],
        };
        let encoded = hello.encode();
        let decoded = ClientHello::decode(&encoded).unwrap();
        assert_eq!(decoded.version, (3, 1));
        assert_eq!(decoded.cipher_suites, vec![0x002F, 0x0033]);
    }

    #[test]
    fn certificate_chain_round_trips_leaf_first() {
        let chain = CertificateChain { certs: vec![vec![1, 2, 3], vec![4, 5]] };
        let encoded = chain.encode();
        let decoded = CertificateChain::decode(&encoded).unwrap();
        assert_eq!(decoded.certs, vec![vec![1, 2, 3], vec![4, 5]]);
    }

    #[test]
    fn psk_premaster_zero_length_matches_psk_length() {
        let psk = b"shared-secret";
        let pm = psk_premaster(psk);
        let zero_len = u16::from_be_bytes([pm[0], pm[1]]) as usize;
        assert_eq!(zero_len, psk.len());
        assert!(pm[2..2 + zero_len].iter().all(|&b| b == 0));
    }

    #[test]
    fn frame_and_split_round_trip() {
        let framed = frame(HandshakeType::ServerHelloDone, &[]);
        let (kind, body, consumed) = split_one(&framed).unwrap().unwrap();
        assert_eq!(kind, HandshakeType::ServerHelloDone);
        assert!(body.is_empty());
        assert_eq!(consumed, framed.len());
    }
}
