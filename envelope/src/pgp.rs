//! PGP-specific push (encode) and pop (decode) logic (spec §4.F), built on
//! the new-format tag-and-length packet framing in [`crate::framer`].
//!
//! Scope note: the nested literal-data packet is represented by its fixed
//! 6-byte header (content-kind byte, zero-length filename, 4-byte
//! timestamp) stripped/prepended at a known position in the decrypted
//! plaintext, rather than its own independently tag-and-length-framed
//! packet — the outer SEIP/Literal packet's own length framing already
//! delimits the stream, so a second nested length field would be
//! redundant for this engine's purposes. CAST5-CFB is a stream cipher
//! mode, so unlike CMS's CBC path there is no block alignment or padding
//! step.

use crate::engine::{ContentType, Envelope, PgpSubState, PopStatus, PushStatus, State, SubState};
use crate::error::{Error, Result};
use crate::framer::{pgp_decode_length, pgp_encode_length, pgp_partial_length_byte, PgpLength};

/// Tag for a Symmetrically Encrypted Integrity Protected Data packet.
const TAG_SEIP: u8 = 18;
/// Tag for a Literal Data packet.
const TAG_LITERAL: u8 = 11;
/// Tag for a Signature packet.
const TAG_SIGNATURE: u8 = 2;
/// Private/experimental-use tag (RFC 4880 §4.3 reserves 60-63) carrying
/// this workspace's MAC trailer for `Usage::Mac` envelopes — OpenPGP
/// itself has no standard standalone MAC packet.
const TAG_MAC: u8 = 61;
/// Tag for a Symmetric-Key Encrypted Session Key (SKESK) packet.
const TAG_SKESK: u8 = 3;

/// MDC trailer: a fixed 2-byte "tag+length" prefix (old-format-style
/// Modification Detection Code packet header) followed by a 20-byte
/// SHA-1 digest.
const MDC_HEADER: [u8; 2] = [0xd3, 0x14];
const MDC_LEN: usize = 22;

/// Partial-body chunk size exponent used for outer packet framing; any
/// valid power of two is acceptable per spec §4.B.
const PARTIAL_POWER: u8 = 6;
const PARTIAL_CHUNK: usize = 1 << PARTIAL_POWER as usize;

fn outer_tag(env: &Envelope) -> u8 {
    if env.crypto.cipher.is_some() {
        TAG_SEIP
    } else {
        TAG_LITERAL
    }
}

fn literal_header() -> [u8; 6] {
    // content-kind 'b' (binary), zero-length filename, zero timestamp.
    [0x62, 0x00, 0, 0, 0, 0]
}

/// RFC 4880 §9.2 symmetric-algorithm identifiers for the algorithms this
/// workspace supports as a PGP session-key cipher.
fn pgp_sym_algo_id(algo: crypto_core::SymmetricAlgorithm) -> Result<u8> {
    use crypto_core::SymmetricAlgorithm::*;
    match algo {
        TripleDes => Ok(2),
        Cast5 => Ok(3),
        Aes128 => Ok(7),
        Aes256 => Ok(9),
        Rc4 => Err(Error::Usage("RC4 has no RFC 4880 symmetric-algorithm id".into())),
    }
}

fn pgp_sym_algo_from_id(id: u8) -> Result<crypto_core::SymmetricAlgorithm> {
    use crypto_core::SymmetricAlgorithm::*;
    match id {
        2 => Ok(TripleDes),
        3 => Ok(Cast5),
        7 => Ok(Aes128),
        9 => Ok(Aes256),
        _ => Err(Error::BadData(format!("unsupported SKESK symmetric-algorithm id {id}"))),
    }
}

/// RFC 4880 §9.4 hash-algorithm identifiers.
fn pgp_hash_algo_id(algo: crypto_core::HashAlgorithm) -> Result<u8> {
    use crypto_core::HashAlgorithm::*;
    match algo {
        Md5 => Ok(1),
        Sha1 => Ok(2),
        Sha256 => Ok(8),
    }
}

fn pgp_hash_algo_from_id(id: u8) -> Result<crypto_core::HashAlgorithm> {
    use crypto_core::HashAlgorithm::*;
    match id {
        1 => Ok(Md5),
        2 => Ok(Sha1),
        8 => Ok(Sha256),
        _ => Err(Error::BadData(format!("unsupported SKESK hash-algorithm id {id}"))),
    }
}

/// Builds a fully-framed version-4 SKESK packet (RFC 4880 §5.3) carrying an
/// iterated-salted S2K specifier. The S2K output is used directly as the
/// session key, so there's no separate encrypted-session-key field.
pub(crate) fn build_skesk_packet(
    algo: crypto_core::SymmetricAlgorithm,
    hash_algo: crypto_core::HashAlgorithm,
    salt: &[u8; 8],
    count_byte: u8,
) -> Result<Vec<u8>> {
    let mut body = vec![4u8, pgp_sym_algo_id(algo)?, 3u8, pgp_hash_algo_id(hash_algo)?];
    body.extend_from_slice(salt);
    body.push(count_byte);

    let tag_byte = 0xc0 | TAG_SKESK;
    let mut framed = vec![tag_byte];
    framed.extend(pgp_encode_length(body.len() as u32));
    framed.extend(body);
    Ok(framed)
}

type SkeskInfo = (crypto_core::SymmetricAlgorithm, crypto_core::HashAlgorithm, [u8; 8], u8);

/// Parses a leading SKESK packet out of `peek`, returning the parsed S2K
/// parameters and the number of bytes consumed, or `None` if `peek` doesn't
/// yet hold the whole packet.
fn parse_skesk(peek: &[u8]) -> Result<Option<(SkeskInfo, usize)>> {
    if peek.is_empty() {
        return Ok(None);
    }
    if peek[0] & 0x3f != TAG_SKESK {
        return Err(Error::BadData(format!(
            "expected a SKESK packet, got tag {}",
            peek[0] & 0x3f
        )));
    }
    let (length, hdr_len) = match pgp_decode_length(&peek[1..]) {
        Ok(v) => v,
        Err(Error::Underflow) => return Ok(None),
        Err(e) => return Err(e),
    };
    let len = match length {
        PgpLength::Full(n) => n as usize,
        PgpLength::Partial(_) => {
            return Err(Error::BadData("SKESK packet must use a definite length".into()))
        }
    };
    let total = 1 + hdr_len + len;
    if peek.len() < total {
        return Ok(None);
    }
    let body = &peek[1 + hdr_len..total];
    if body.len() != 13 || body[0] != 4 || body[2] != 3 {
        return Err(Error::BadData("unsupported SKESK packet format".into()));
    }
    let sym_algo = pgp_sym_algo_from_id(body[1])?;
    let hash_algo = pgp_hash_algo_from_id(body[3])?;
    let mut salt = [0u8; 8];
    salt.copy_from_slice(&body[4..12]);
    let count_byte = body[12];
    Ok(Some(((sym_algo, hash_algo, salt, count_byte), total)))
}

pub fn encode_push(env: &mut Envelope, input: &[u8]) -> Result<(usize, PushStatus)> {
    if env.state == State::PreData {
        env.validate_actions()
            .map_err(|e| env.latch_if_permanent(e))?;
        env.content_type = Some(env.derive_content_type());
        env.state = State::Data;
        env.sub_state = SubState::Pgp(PgpSubState::Data);
        if let Some(skesk) = env.crypto.pending_skesk.take() {
            env.buffer.write(&skesk).map_err(|e| env.latch_if_permanent(e))?;
        }
        let header = literal_header();
        stage(env, &header)?;
    }

    if env.state == State::Data {
        if input.is_empty() {
            return flush(env);
        }
        stage(env, input)?;
        return Ok((input.len(), PushStatus::Ok));
    }

    Ok((0, PushStatus::Complete))
}

/// Runs `bytes` through hash/compress/encrypt and appends the result to
/// the outer packet's ready-to-frame staging area.
fn stage(env: &mut Envelope, bytes: &[u8]) -> Result<()> {
    if let Some(h) = env.crypto.hash.as_mut() {
        h.update(bytes);
    }
    if let Some(m) = env.crypto.mac.as_mut() {
        m.update(bytes);
    }

    let mut staged = bytes.to_vec();
    if let Some(c) = env.crypto.compressor.as_mut() {
        let mut compressed = Vec::new();
        let mut offset = 0;
        while offset < staged.len() {
            offset += c
                .compress(&staged[offset..], &mut compressed)
                .map_err(|e| env.latch_if_permanent(e))?;
        }
        staged = compressed;
    }

    if env.crypto.cipher.is_some() {
        if let Some(m) = env.crypto.mdc_hash.as_mut() {
            m.update(&staged);
        }
        if let Some(cipher) = env.crypto.cipher.as_mut() {
            cipher
                .encrypt_in_place(&mut staged)
                .map_err(|e| env.latch_if_permanent(Error::Crypto(e)))?;
        }
        if !env.crypto.version_byte_written {
            env.crypto.ready.push(0x01);
            env.crypto.version_byte_written = true;
        }
    }

    env.crypto.ready.extend_from_slice(&staged);
    drain_ready(env, false)
}

/// Writes out complete `PARTIAL_CHUNK`-sized partial-body chunks from
/// `env.crypto.ready`, prefixed once by the outer packet tag byte. If
/// `force`, also emits whatever remains as the terminating full-length
/// chunk (possibly empty).
fn drain_ready(env: &mut Envelope, force: bool) -> Result<()> {
    if !env.crypto.outer_tag_written && (!env.crypto.ready.is_empty() || force) {
        let tag_byte = 0xc0 | outer_tag(env);
        env.buffer
            .write(&[tag_byte])
            .map_err(|e| env.latch_if_permanent(e))?;
        env.crypto.outer_tag_written = true;
    }

    while env.crypto.ready.len() >= PARTIAL_CHUNK {
        let chunk: Vec<u8> = env.crypto.ready.drain(..PARTIAL_CHUNK).collect();
        let mut framed = vec![pgp_partial_length_byte(PARTIAL_POWER)];
        framed.extend(chunk);
        env.buffer
            .write(&framed)
            .map_err(|e| env.latch_if_permanent(e))?;
    }

    if force {
        let remaining: Vec<u8> = env.crypto.ready.drain(..).collect();
        let mut framed = pgp_encode_length(remaining.len() as u32);
        framed.extend(remaining);
        env.buffer
            .write(&framed)
            .map_err(|e| env.latch_if_permanent(e))?;
    }

    Ok(())
}

fn flush(env: &mut Envelope) -> Result<(usize, PushStatus)> {
    let mut tail = Vec::new();
    if let Some(c) = env.crypto.compressor.as_mut() {
        c.finish(&mut tail).map_err(|e| env.latch_if_permanent(e))?;
    }

    if env.crypto.cipher.is_some() {
        if let Some(m) = env.crypto.mdc_hash.as_mut() {
            m.update(&tail);
        }
        let digest = env
            .crypto
            .mdc_hash
            .take()
            .map(|h| h.finalize())
            .unwrap_or_else(|| vec![0u8; 20]);
        let mut plain_tail = tail;
        plain_tail.extend_from_slice(&MDC_HEADER);
        plain_tail.extend_from_slice(&digest);

        if !env.crypto.version_byte_written {
            env.crypto.ready.push(0x01);
            env.crypto.version_byte_written = true;
        }
        if let Some(cipher) = env.crypto.cipher.as_mut() {
            cipher
                .encrypt_in_place(&mut plain_tail)
                .map_err(|e| env.latch_if_permanent(Error::Crypto(e)))?;
        }
        env.crypto.ready.extend_from_slice(&plain_tail);
    } else {
        env.crypto.ready.extend_from_slice(&tail);
    }

    drain_ready(env, true)?;

    if let Some(sign_ctx) = env.crypto.sign.take() {
        let digest = env
            .crypto
            .hash
            .take()
            .map(|h| h.finalize())
            .unwrap_or_default();
        let sig = sign_ctx
            .sign(&digest, crypto_core::SignatureFormat::Pkcs1DigestInfo)
            .map_err(|e| env.latch_if_permanent(Error::Crypto(e)))?;
        let tag_byte = 0xc0 | TAG_SIGNATURE;
        let mut framed = vec![tag_byte];
        framed.extend(pgp_encode_length(sig.len() as u32));
        framed.extend(sig);
        env.buffer
            .write(&framed)
            .map_err(|e| env.latch_if_permanent(e))?;
    }

    if let Some(mac_ctx) = env.crypto.mac.take() {
        let tag = mac_ctx.finalize();
        let tag_byte = 0xc0 | TAG_MAC;
        let mut framed = vec![tag_byte];
        framed.extend(pgp_encode_length(tag.len() as u32));
        framed.extend(tag);
        env.buffer
            .write(&framed)
            .map_err(|e| env.latch_if_permanent(e))?;
    }

    env.state = State::Finished;
    env.sub_state = SubState::Pgp(PgpSubState::Done);
    Ok((0, PushStatus::Complete))
}

pub fn decode_pop(env: &mut Envelope, max_bytes: usize) -> Result<(Vec<u8>, PopStatus)> {
    if env.state == State::PreData {
        let awaiting_password = matches!(
            env.content.current(),
            Some(group)
                if group.kind == crate::content::GroupKind::RecipientInfo
                    && group.first_required() == Some(crate::content::ResourceKind::Password)
        );
        if awaiting_password {
            if env.crypto.pgp_skesk_pending.is_none() {
                let peek = env.buffer.peek_all();
                match parse_skesk(peek)? {
                    None => return Ok((Vec::new(), PopStatus::Ok)),
                    Some((info, consumed)) => {
                        env.buffer.skip(consumed).expect("consumed <= len");
                        env.crypto.pgp_skesk_pending = Some(info);
                    }
                }
            }
            return Ok((Vec::new(), PopStatus::NeedResource(crate::content::ResourceKind::Password)));
        }

        if env.buffer.is_empty() {
            return Ok((Vec::new(), PopStatus::Ok));
        }
        let tag_byte = env.buffer.peek(1).map_err(|e| env.latch_if_permanent(e))?[0];
        env.buffer.skip(1).expect("peeked above");
        let tag = tag_byte & 0x3f;
        if tag != TAG_SEIP && tag != TAG_LITERAL {
            return Err(env.latch_if_permanent(Error::BadData(format!(
                "unexpected top-level PGP tag {tag}"
            ))));
        }
        env.content_type = Some(env.derive_content_type());
        env.state = State::Data;
        env.sub_state = SubState::Pgp(PgpSubState::Data);
    }

    if env.state == State::Data {
        loop {
            let peek = env.buffer.peek_all();
            if peek.is_empty() {
                break;
            }
            let (length, hdr_len) = match pgp_decode_length(peek) {
                Ok(v) => v,
                Err(Error::Underflow) => break,
                Err(e) => return Err(env.latch_if_permanent(e)),
            };
            match length {
                PgpLength::Partial(n) => {
                    if peek.len() < hdr_len + n as usize {
                        break;
                    }
                    env.buffer.skip(hdr_len).expect("consumed <= len");
                    let chunk = env.buffer.read(n as usize).expect("len <= remaining");
                    process_chunk(env, chunk)?;
                }
                PgpLength::Full(n) => {
                    if peek.len() < hdr_len + n as usize {
                        break;
                    }
                    env.buffer.skip(hdr_len).expect("consumed <= len");
                    let chunk = env.buffer.read(n as usize).expect("len <= remaining");
                    process_chunk(env, chunk)?;
                    finalize_payload(env)?;
                    env.state = State::PostData;
                    break;
                }
            }
        }
    }

    if env.state == State::PostData {
        let expects_trailer = matches!(env.content_type, Some(ContentType::Signed) | Some(ContentType::Authenticated));

        if expects_trailer && env.crypto.sign.is_none() && env.crypto.mac.is_none() {
            if let Some(group) = env.content.current() {
                if group.first_required().is_some() {
                    let n = max_bytes.min(env.crypto.out_ready.len());
                    let out: Vec<u8> = env.crypto.out_ready.drain(..n).collect();
                    return Ok((out, PopStatus::NeedResource(crate::content::ResourceKind::SignatureCheckKey)));
                }
            }
        }

        if expects_trailer {
            let peek = env.buffer.peek_all();
            let expected_tag = if env.crypto.mac.is_some() { TAG_MAC } else { TAG_SIGNATURE };
            if !peek.is_empty() && peek[0] & 0x3f == expected_tag {
                if let Ok((PgpLength::Full(len), hdr_len)) = pgp_decode_length(&peek[1..]) {
                    if peek.len() >= 1 + hdr_len + len as usize {
                        env.buffer.skip(1 + hdr_len).expect("consumed <= len");
                        let trailer = env.buffer.read(len as usize).expect("len <= remaining");
                        if env.crypto.mac.is_some() {
                            verify_mac_trailer(env, &trailer)?;
                        } else {
                            verify_trailer(env, &trailer)?;
                        }
                        env.state = State::Finished;
                    }
                }
            } else {
                env.state = State::Finished;
            }
        } else {
            env.state = State::Finished;
        }
    }

    let n = max_bytes.min(env.crypto.out_ready.len());
    let out: Vec<u8> = env.crypto.out_ready.drain(..n).collect();
    let status = if env.state == State::Finished && env.crypto.out_ready.is_empty() {
        PopStatus::Complete
    } else {
        PopStatus::Ok
    };
    Ok((out, status))
}

fn process_chunk(env: &mut Envelope, mut chunk: Vec<u8>) -> Result<()> {
    if env.crypto.cipher.is_some() {
        if !env.crypto.version_byte_written {
            if chunk.is_empty() {
                return Ok(());
            }
            chunk.remove(0);
            env.crypto.version_byte_written = true;
        }
        if let Some(cipher) = env.crypto.cipher.as_mut() {
            cipher
                .decrypt_in_place(&mut chunk)
                .map_err(|e| env.latch_if_permanent(Error::Crypto(e)))?;
        }
        // Hold back the trailing MDC_LEN bytes: they might be (part of)
        // the MDC trailer, which isn't payload.
        env.crypto.held_plain.extend_from_slice(&chunk);
        if env.crypto.held_plain.len() > MDC_LEN {
            let emit_len = env.crypto.held_plain.len() - MDC_LEN;
            let emit: Vec<u8> = env.crypto.held_plain.drain(..emit_len).collect();
            deliver(env, emit)?;
        }
    } else {
        deliver(env, chunk)?;
    }
    Ok(())
}

fn finalize_payload(env: &mut Envelope) -> Result<()> {
    if env.crypto.cipher.is_some() {
        let trailer = std::mem::take(&mut env.crypto.held_plain);
        if trailer.len() != MDC_LEN || trailer[0..2] != MDC_HEADER {
            return Err(env.latch_if_permanent(Error::BadData("missing or malformed MDC trailer".into())));
        }
        let expected_digest = &trailer[2..];
        let actual_digest = env
            .crypto
            .mdc_hash
            .take()
            .map(|h| h.finalize())
            .unwrap_or_default();
        if expected_digest != actual_digest.as_slice() {
            return Err(env.latch_if_permanent(Error::VerificationFailed));
        }
    }
    if let Some(c) = env.crypto.decompressor.as_mut() {
        let mut tail = Vec::new();
        let _ = c
            .decompress(&[], &mut tail)
            .map_err(|e| env.latch_if_permanent(e))?;
        strip_and_emit(env, tail)?;
    }
    Ok(())
}

fn deliver(env: &mut Envelope, bytes: Vec<u8>) -> Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    if env.crypto.cipher.is_some() {
        if let Some(m) = env.crypto.mdc_hash.as_mut() {
            m.update(&bytes);
        }
    }
    if let Some(c) = env.crypto.decompressor.as_mut() {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            let (consumed, _) = c
                .decompress(&bytes[offset..], &mut out)
                .map_err(|e| env.latch_if_permanent(e))?;
            if consumed == 0 {
                break;
            }
            offset += consumed;
        }
        strip_and_emit(env, out)
    } else {
        strip_and_emit(env, bytes)
    }
}

/// Strips the 6-byte literal-data header (once, at the very start of the
/// fully decompressed plaintext) before hashing and handing bytes to the
/// caller.
fn strip_and_emit(env: &mut Envelope, mut bytes: Vec<u8>) -> Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    if !env.crypto.literal_header_stripped {
        env.crypto.lookahead.extend_from_slice(&bytes);
        if env.crypto.lookahead.len() < 6 {
            // Header spans a chunk boundary; stash until more arrives.
            return Ok(());
        }
        bytes = std::mem::take(&mut env.crypto.lookahead);
        bytes.drain(0..6);
        env.crypto.literal_header_stripped = true;
    }
    if let Some(h) = env.crypto.hash.as_mut() {
        h.update(&bytes);
    }
    if let Some(m) = env.crypto.mac.as_mut() {
        m.update(&bytes);
    }
    env.crypto.out_ready.extend_from_slice(&bytes);
    Ok(())
}

fn verify_trailer(env: &mut Envelope, sig: &[u8]) -> Result<()> {
    if let Some(sign_ctx) = env.crypto.sign.take() {
        let digest = env
            .crypto
            .hash
            .take()
            .map(|h| h.finalize())
            .unwrap_or_default();
        sign_ctx
            .verify(&digest, sig, crypto_core::SignatureFormat::Pkcs1DigestInfo)
            .map_err(|_| env.latch_if_permanent(Error::VerificationFailed))?;
    }
    Ok(())
}

fn verify_mac_trailer(env: &mut Envelope, tag: &[u8]) -> Result<()> {
    if let Some(mac_ctx) = env.crypto.mac.take() {
        let computed = mac_ctx.finalize();
        if computed != tag {
            return Err(env.latch_if_permanent(Error::VerificationFailed));
        }
    }
    Ok(())
}
