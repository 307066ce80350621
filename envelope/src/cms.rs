//! CMS-specific push (encode) and pop (decode) logic (spec §4.F), built
//! on the indefinite-length OCTET STRING segment framing in
//! [`crate::framer`].
//!
//! Scope note (see [`crate::engine`]): this workspace doesn't serialize a
//! `ContentInfo`/`RecipientInfo` ASN.1 tree — that belongs to a
//! certificate/ASN.1 layer the spec excludes. What's implemented here is
//! the part spec §4.B/§4.F actually specify in detail: the segment framer
//! and the push/pop byte-pump (compress/encrypt/hash/sign) over it.

use crate::engine::{pkcs5_pad, pkcs5_unpad_len, CmsSubState, ContentType, Envelope, PopStatus, PushStatus, State, SubState};
use crate::error::{Error, Result};
use crate::framer::{cms_encode_segment, CmsSegmentDecoder, SegmentHeader, CMS_EOC, CMS_MIN_SEGMENT};

/// Encode-side push: compresses/encrypts/hashes `input` and frames the
/// result into indefinite-length CMS segments written to `env.buffer`.
pub fn encode_push(env: &mut Envelope, input: &[u8]) -> Result<(usize, PushStatus)> {
    if env.state == State::PreData {
        env.validate_actions()
            .map_err(|e| env.latch_if_permanent(e))?;
        env.content_type = Some(env.derive_content_type());
        env.state = State::Data;
        env.sub_state = SubState::Cms(CmsSubState::Data);
    }

    if env.state == State::Data {
        if input.is_empty() {
            return flush(env);
        }

        if let Some(h) = env.crypto.hash.as_mut() {
            h.update(input);
        }
        if let Some(m) = env.crypto.mac.as_mut() {
            m.update(input);
        }

        let mut staged = input.to_vec();
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

        let to_emit = if env.crypto.cipher.is_some() {
            let bs = env.crypto.block_size;
            env.crypto.block_overhang.extend_from_slice(&staged);
            let whole = (env.crypto.block_overhang.len() / bs) * bs;
            let mut block_data: Vec<u8> = env.crypto.block_overhang.drain(..whole).collect();
            if !block_data.is_empty() {
                if let Some(cipher) = env.crypto.cipher.as_mut() {
                    cipher
                        .encrypt_in_place(&mut block_data)
                        .map_err(|e| env.latch_if_permanent(Error::Crypto(e)))?;
                }
            }
            block_data
        } else {
            staged
        };

        env.crypto.ready.extend_from_slice(&to_emit);
        drain_ready(env, false)?;
        return Ok((input.len(), PushStatus::Ok));
    }

    Ok((0, PushStatus::Complete))
}

/// Writes out any ready-to-frame bytes as CMS segments, respecting the
/// minimum-segment-size rule unless `force` (the terminating segment is
/// exempt).
fn drain_ready(env: &mut Envelope, force: bool) -> Result<()> {
    if env.crypto.ready.is_empty() {
        return Ok(());
    }
    if force || env.crypto.ready.len() >= CMS_MIN_SEGMENT {
        let segment = cms_encode_segment(&env.crypto.ready);
        env.buffer
            .write(&segment)
            .map_err(|e| env.latch_if_permanent(e))?;
        env.crypto.ready.clear();
    }
    Ok(())
}

fn flush(env: &mut Envelope) -> Result<(usize, PushStatus)> {
    let mut tail = Vec::new();
    if let Some(c) = env.crypto.compressor.as_mut() {
        c.finish(&mut tail).map_err(|e| env.latch_if_permanent(e))?;
    }

    let mut to_encrypt = std::mem::take(&mut env.crypto.block_overhang);
    to_encrypt.extend(tail);

    if env.crypto.cipher.is_some() {
        let bs = env.crypto.block_size;
        pkcs5_pad(&mut to_encrypt, bs);
        if let Some(cipher) = env.crypto.cipher.as_mut() {
            cipher
                .encrypt_in_place(&mut to_encrypt)
                .map_err(|e| env.latch_if_permanent(Error::Crypto(e)))?;
        }
    }

    env.crypto.ready.extend_from_slice(&to_encrypt);
    drain_ready(env, true)?;

    env.buffer
        .write(&CMS_EOC)
        .map_err(|e| env.latch_if_permanent(e))?;

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
        let segment = cms_encode_segment(&sig);
        env.buffer
            .write(&segment)
            .map_err(|e| env.latch_if_permanent(e))?;
    }

    if let Some(mac_ctx) = env.crypto.mac.take() {
        let tag = mac_ctx.finalize();
        let segment = cms_encode_segment(&tag);
        env.buffer
            .write(&segment)
            .map_err(|e| env.latch_if_permanent(e))?;
    }

    env.state = State::Finished;
    env.sub_state = SubState::Cms(CmsSubState::Done);
    Ok((0, PushStatus::Complete))
}

/// Decode-side pop: parses segments out of `env.buffer`, decrypts,
/// decompresses, and hashes, returning up to `max_bytes` of plaintext.
pub fn decode_pop(env: &mut Envelope, max_bytes: usize) -> Result<(Vec<u8>, PopStatus)> {
    if env.state == State::PreData {
        env.content_type = Some(env.derive_content_type());
        env.state = State::Data;
        env.sub_state = SubState::Cms(CmsSubState::Data);
    }

    if env.state == State::Data {
        loop {
            let peek = env.buffer.peek_all();
            if peek.is_empty() {
                break;
            }
            match CmsSegmentDecoder::try_fast_path(peek).map_err(|e| env.latch_if_permanent(e))? {
                None => break,
                Some((SegmentHeader::EndOfContents, consumed)) => {
                    env.buffer.skip(consumed).expect("consumed <= len");
                    finalize_payload(env)?;
                    env.state = State::PostData;
                    break;
                }
                Some((SegmentHeader::Segment(len), consumed)) => {
                    if peek.len() < consumed + len {
                        break;
                    }
                    env.buffer.skip(consumed).expect("consumed <= len");
                    let data = env.buffer.read(len).expect("len <= remaining");
                    process_segment(env, data)?;
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
            if let Some((SegmentHeader::Segment(len), consumed)) =
                CmsSegmentDecoder::try_fast_path(peek).map_err(|e| env.latch_if_permanent(e))?
            {
                if peek.len() >= consumed + len {
                    env.buffer.skip(consumed).expect("consumed <= len");
                    let trailer = env.buffer.read(len).expect("len <= remaining");
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

fn process_segment(env: &mut Envelope, data: Vec<u8>) -> Result<()> {
    let decrypted = if env.crypto.cipher.is_some() {
        let mut data = data;
        if let Some(cipher) = env.crypto.cipher.as_mut() {
            cipher
                .decrypt_in_place(&mut data)
                .map_err(|e| env.latch_if_permanent(Error::Crypto(e)))?;
        }
        data
    } else {
        data
    };

    // Hold back the most recently decrypted block-cipher segment: it
    // might be the final, padded one, which we can't strip until we've
    // seen the end-of-contents marker.
    if env.crypto.cipher.is_some() {
        let previous = std::mem::replace(&mut env.crypto.held_plain, decrypted);
        emit_plaintext(env, previous)?;
    } else {
        emit_plaintext(env, decrypted)?;
    }
    Ok(())
}

fn finalize_payload(env: &mut Envelope) -> Result<()> {
    let mut last = std::mem::take(&mut env.crypto.held_plain);
    if env.crypto.cipher.is_some() && !last.is_empty() {
        let bs = env.crypto.block_size;
        let len = pkcs5_unpad_len(&last, bs).map_err(|e| env.latch_if_permanent(e))?;
        last.truncate(len);
    }
    emit_plaintext(env, last)?;
    if let Some(c) = env.crypto.decompressor.as_mut() {
        let mut tail = Vec::new();
        let (_, _finished) = c
            .decompress(&[], &mut tail)
            .map_err(|e| env.latch_if_permanent(e))?;
        if let Some(h) = env.crypto.hash.as_mut() {
            h.update(&tail);
        }
        if let Some(m) = env.crypto.mac.as_mut() {
            m.update(&tail);
        }
        env.crypto.out_ready.extend_from_slice(&tail);
    }
    Ok(())
}

fn emit_plaintext(env: &mut Envelope, bytes: Vec<u8>) -> Result<()> {
    if bytes.is_empty() {
        return Ok(());
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
        if let Some(h) = env.crypto.hash.as_mut() {
            h.update(&out);
        }
        if let Some(m) = env.crypto.mac.as_mut() {
            m.update(&out);
        }
        env.crypto.out_ready.extend_from_slice(&out);
    } else {
        if let Some(h) = env.crypto.hash.as_mut() {
            h.update(&bytes);
        }
        if let Some(m) = env.crypto.mac.as_mut() {
            m.update(&bytes);
        }
        env.crypto.out_ready.extend_from_slice(&bytes);
    }
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
