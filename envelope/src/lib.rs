//! Streaming CMS/PGP message enveloping engine (spec §4.A-F): framing,
//! segmentation, padding, compression, hashing, MACing and encryption
//! interleaved over a bounded buffer, suspendable on any byte boundary.

pub mod action;
pub mod buffer;
pub mod cms;
pub mod compress;
pub mod content;
pub mod engine;
pub mod error;
pub mod framer;
pub mod pgp;
pub mod s2k;

pub use action::{Action, ActionKind, ActionList, AddOutcome, CryptoHandle};
pub use buffer::StreamBuffer;
pub use content::{Attribute, ContentList, Group, GroupKind, GroupPayload, ResourceKind, Verdict};
pub use engine::{ContentType, Envelope, Format, Mode, PopStatus, PushStatus, State, Usage};
pub use error::{Error, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_core::{Direction, SignatureFormat, SoftwareBackend, SymmetricAlgorithm};
    use rsa::{RsaPrivateKey, RsaPublicKey};
    use std::sync::Arc;

    fn backend() -> Arc<dyn crypto_core::Backend> {
        Arc::new(SoftwareBackend)
    }

    /// Drives an encode envelope to completion over `payload`, feeding it
    /// `chunk_size` bytes at a time and draining the wire buffer after
    /// every push, to exercise the resumable push/pop discipline.
    fn run_encode(env: &mut Envelope, payload: &[u8], chunk_size: usize) -> Vec<u8> {
        let mut wire = Vec::new();
        for chunk in payload.chunks(chunk_size.max(1)) {
            let mut remaining = chunk;
            while !remaining.is_empty() {
                match env.push(remaining) {
                    Ok((consumed, _)) => remaining = &remaining[consumed..],
                    Err(e) if e.is_recoverable() => {
                        let (bytes, _) = env.pop(4096).unwrap();
                        wire.extend(bytes);
                    }
                    Err(e) => panic!("encode push failed: {e}"),
                }
            }
            let (bytes, _) = env.pop(4096).unwrap();
            wire.extend(bytes);
        }
        // flush
        loop {
            match env.push(&[]) {
                Ok((_, PushStatus::Complete)) => break,
                Ok((_, PushStatus::Ok)) => {}
                Err(e) => panic!("encode flush failed: {e}"),
            }
        }
        let (bytes, _) = env.pop(1 << 20).unwrap();
        wire.extend(bytes);
        wire
    }

    /// Drives a decode envelope to completion, feeding wire bytes
    /// `chunk_size` bytes at a time (as small as one byte, to exercise the
    /// byte-at-a-time resumption discipline).
    fn run_decode(env: &mut Envelope, wire: &[u8], chunk_size: usize) -> Vec<u8> {
        let mut plaintext = Vec::new();
        for chunk in wire.chunks(chunk_size.max(1)) {
            let (_, _) = env.push(chunk).unwrap();
            loop {
                let (bytes, status) = env.pop(4096).unwrap();
                let got_some = !bytes.is_empty();
                plaintext.extend(bytes);
                if status == PopStatus::Complete || !got_some {
                    break;
                }
            }
        }
        loop {
            let (bytes, status) = env.pop(4096).unwrap();
            let got_some = !bytes.is_empty();
            plaintext.extend(bytes);
            if status == PopStatus::Complete || !got_some {
                break;
            }
        }
        plaintext
    }

    /// E2: CMS encrypted, indefinite-length, byte-at-a-time stress test
    /// with the 10-byte-minimum-segment rule (spec §8).
    #[test]
    fn e2_cms_encrypt_quick_brown_fox_byte_at_a_time() {
        let payload = b"the quick brown fox jumps over the lazy dog!"; // 45 bytes
        let key = [0x24u8; 16];
        let iv = [0x00u8; 16];

        let mut enc = Envelope::new(Format::Cms, Mode::Encode, 4096, backend());
        enc.enable_encrypt(SymmetricAlgorithm::Aes128, &key, &iv, Direction::Encrypt)
            .unwrap();
        let wire = run_encode(&mut enc, payload, 1);

        let mut dec = Envelope::new(Format::Cms, Mode::Decode, 4096, backend());
        dec.enable_encrypt(SymmetricAlgorithm::Aes128, &key, &iv, Direction::Decrypt)
            .unwrap();
        let recovered = run_decode(&mut dec, &wire, 1);

        assert_eq!(recovered, payload);
    }

    /// E1 (adapted): CMS signed content, verified on decode.
    #[test]
    fn e1_cms_signed_round_trips_and_verifies() {
        use rand::rngs::OsRng;
        let priv_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let pub_key = RsaPublicKey::from(&priv_key);

        let payload = b"a signed CMS message body";

        let mut enc = Envelope::new(Format::Cms, Mode::Encode, 4096, backend());
        enc.enable_hash(crypto_core::HashAlgorithm::Sha1).unwrap();
        enc.enable_sign(
            Box::new(crypto_core::software::RsaSignContext::new_keypair(priv_key)),
            vec![1, 2, 3],
        );
        let wire = run_encode(&mut enc, payload, 7);

        let mut dec = Envelope::new(Format::Cms, Mode::Decode, 4096, backend());
        dec.enable_hash(crypto_core::HashAlgorithm::Sha1).unwrap();
        dec.enable_sign(
            Box::new(crypto_core::software::RsaSignContext::new_public(pub_key)),
            vec![1, 2, 3],
        );
        let recovered = run_decode(&mut dec, &wire, 5);

        assert_eq!(recovered, payload);
    }

    /// Drives a PGP password-protected decode envelope, resolving the
    /// `NeedResource(Password)` the leading SKESK packet triggers the first
    /// time it's seen.
    fn run_decode_with_password(env: &mut Envelope, wire: &[u8], chunk_size: usize, password: &[u8]) -> Vec<u8> {
        let mut plaintext = Vec::new();
        let mut resolved = false;
        let mut pump = |env: &mut Envelope, plaintext: &mut Vec<u8>, resolved: &mut bool| loop {
            let (bytes, status) = env.pop(4096).unwrap();
            let got_some = !bytes.is_empty();
            plaintext.extend(bytes);
            match status {
                PopStatus::Complete => break,
                PopStatus::NeedResource(ResourceKind::Password) if !*resolved => {
                    env.resolve_pgp_password(password).unwrap();
                    *resolved = true;
                }
                _ => {
                    if !got_some {
                        break;
                    }
                }
            }
        };
        for chunk in wire.chunks(chunk_size.max(1)) {
            let (_, _) = env.push(chunk).unwrap();
            pump(env, &mut plaintext, &mut resolved);
        }
        pump(env, &mut plaintext, &mut resolved);
        plaintext
    }

    /// E3: PGP MDC-protected encryption under a password-derived (S2K)
    /// session key, and tamper detection on the ciphertext (spec §8).
    #[test]
    fn e3_pgp_mdc_round_trips() {
        let payload = b"this PGP message is integrity-protected by an MDC packet";
        let password = b"test";

        let mut enc = Envelope::new(Format::Pgp, Mode::Encode, 4096, backend());
        enc.enable_pgp_password_encrypt(SymmetricAlgorithm::Cast5, crypto_core::HashAlgorithm::Sha1, password)
            .unwrap();
        enc.enable_mdc().unwrap();
        let wire = run_encode(&mut enc, payload, payload.len());

        let mut dec = Envelope::new(Format::Pgp, Mode::Decode, 4096, backend());
        dec.require_pgp_password();
        dec.enable_mdc().unwrap();
        let recovered = run_decode_with_password(&mut dec, &wire, wire.len(), password);

        assert_eq!(recovered, payload);
    }

    #[test]
    fn e3_pgp_mdc_tamper_detected() {
        let payload = b"integrity matters";
        let password = b"test";

        let mut enc = Envelope::new(Format::Pgp, Mode::Encode, 4096, backend());
        enc.enable_pgp_password_encrypt(SymmetricAlgorithm::Cast5, crypto_core::HashAlgorithm::Sha1, password)
            .unwrap();
        enc.enable_mdc().unwrap();
        let mut wire = run_encode(&mut enc, payload, payload.len());

        // Flip a ciphertext byte inside the packet body (skip the 1-byte
        // tag and partial-length header).
        let idx = wire.len() - 3;
        wire[idx] ^= 0xff;

        let mut dec = Envelope::new(Format::Pgp, Mode::Decode, 4096, backend());
        dec.require_pgp_password();
        dec.enable_mdc().unwrap();

        let mut saw_error = false;
        let (_, _) = dec.push(&wire).unwrap();
        let mut resolved = false;
        loop {
            match dec.pop(4096) {
                Ok((bytes, status)) => {
                    if status == PopStatus::NeedResource(ResourceKind::Password) && !resolved {
                        dec.resolve_pgp_password(password).unwrap();
                        resolved = true;
                        continue;
                    }
                    if bytes.is_empty() && status != PopStatus::Complete {
                        break;
                    }
                    if status == PopStatus::Complete {
                        break;
                    }
                }
                Err(_) => {
                    saw_error = true;
                    break;
                }
            }
        }
        assert!(saw_error, "tampered MDC ciphertext must be rejected");
    }

    /// Exercises `Usage::Mac` end to end (review: the Mac action must be
    /// reachable and actually verified), on the CMS path, and confirms a
    /// tampered MAC trailer is rejected.
    #[test]
    fn cms_mac_round_trips_and_detects_tampering() {
        let payload = b"authenticated but not encrypted";
        let key = b"a shared mac key";

        let mut enc = Envelope::new(Format::Cms, Mode::Encode, 4096, backend());
        enc.enable_mac(crypto_core::MacKind::Hmac(crypto_core::HashAlgorithm::Sha256), key)
            .unwrap();
        let wire = run_encode(&mut enc, payload, 9);

        let mut dec = Envelope::new(Format::Cms, Mode::Decode, 4096, backend());
        dec.enable_mac(crypto_core::MacKind::Hmac(crypto_core::HashAlgorithm::Sha256), key)
            .unwrap();
        let recovered = run_decode(&mut dec, &wire, 11);
        assert_eq!(recovered, payload);

        let mut tampered = wire.clone();
        let idx = tampered.len() - 2;
        tampered[idx] ^= 0xff;
        let mut dec2 = Envelope::new(Format::Cms, Mode::Decode, 4096, backend());
        dec2.enable_mac(crypto_core::MacKind::Hmac(crypto_core::HashAlgorithm::Sha256), key)
            .unwrap();
        let (_, _) = dec2.push(&tampered).unwrap();
        let mut saw_error = false;
        loop {
            match dec2.pop(4096) {
                Ok((_, PopStatus::Complete)) => break,
                Ok((bytes, _)) if bytes.is_empty() => break,
                Ok(_) => {}
                Err(_) => {
                    saw_error = true;
                    break;
                }
            }
        }
        assert!(saw_error, "tampered MAC trailer must be rejected");
    }

    /// Exercises the deferred signature-check-key flow: `pop` reports
    /// `NeedResource(SignatureCheckKey)` once the signed payload has been
    /// fully read but no verification key is bound yet, and supplying one
    /// via `resolve_signature_check_key` lets decoding complete.
    #[test]
    fn cms_signed_decode_needs_signature_check_key() {
        use rand::rngs::OsRng;
        let priv_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let pub_key = RsaPublicKey::from(&priv_key);
        let payload = b"deferred key resolution";

        let mut enc = Envelope::new(Format::Cms, Mode::Encode, 4096, backend());
        enc.enable_hash(crypto_core::HashAlgorithm::Sha1).unwrap();
        enc.enable_sign(
            Box::new(crypto_core::software::RsaSignContext::new_keypair(priv_key)),
            vec![9, 9, 9],
        );
        let wire = run_encode(&mut enc, payload, payload.len());

        let mut dec = Envelope::new(Format::Cms, Mode::Decode, 4096, backend());
        dec.require_signature_check(vec![9, 9, 9], crypto_core::HashAlgorithm::Sha1)
            .unwrap();
        let (_, _) = dec.push(&wire).unwrap();

        let mut plaintext = Vec::new();
        let mut saw_need_resource = false;
        loop {
            let (bytes, status) = dec.pop(4096).unwrap();
            plaintext.extend(&bytes);
            match status {
                PopStatus::NeedResource(ResourceKind::SignatureCheckKey) => {
                    saw_need_resource = true;
                    dec.resolve_signature_check_key(Box::new(
                        crypto_core::software::RsaSignContext::new_public(pub_key.clone()),
                    ));
                }
                PopStatus::Complete => break,
                PopStatus::Ok if bytes.is_empty() => break,
                PopStatus::Ok => {}
            }
        }

        assert!(saw_need_resource, "decode must report NeedResource before a check key is bound");
        assert_eq!(plaintext, payload);
    }
}
