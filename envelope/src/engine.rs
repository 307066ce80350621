//! Envelope engine (spec §4.F): the push/pop state machines shared by the
//! CMS and PGP formats, wired to [`crate::buffer::StreamBuffer`],
//! [`crate::framer`], [`crate::action::ActionList`], and
//! [`crate::content::ContentList`].
//!
//! Scope note: building a PKCS#7 `ContentInfo`/`RecipientInfo` ASN.1 tree
//! (or its PGP packet-tag equivalent) in full generality is explicitly the
//! job of a certificate/ASN.1 layer this workspace doesn't implement (spec
//! Non-goals). The header/trailer emitted here carries the minimum
//! self-describing framing the engine itself owns: BER/PGP length-prefixed
//! TLV groups built from [`crate::framer`], not a general ASN.1 writer.

use crate::action::{ActionKind, ActionList};
use crate::buffer::StreamBuffer;
use crate::content::ContentList;
use crate::error::{Error, Result};
use crypto_core::Backend;

/// Which wire format an envelope speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Cms,
    Pgp,
}

/// Encode or decode; fixed for the envelope's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Encode,
    Decode,
}

/// The inner payload's content type (spec §3), driven by the envelope's
/// [`Usage`] at the `PreData` → `Data` transition and carried through to
/// decode, where it decides whether a trailer segment (signature or MAC)
/// is expected (spec §4.E/§4.F). Real CMS `RecipientInfo` `EnvelopedData`
/// framing (a distinct content type from plain `EncryptedData`) needs
/// ASN.1 `SET` parsing this workspace doesn't implement (see the
/// recipient-keyex Non-goal in `SPEC_FULL.md`), so that distinction isn't
/// modelled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Data,
    Signed,
    Authenticated,
    Compressed,
    Encrypted,
}

/// Top-level envelope lifecycle state (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    PreData,
    Data,
    PostData,
    ExtraData,
    Finished,
}

/// Outcome of [`Envelope::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushStatus {
    /// All bytes were consumed; the envelope is ready for more input.
    Ok,
    /// The envelope has reached `Finished`.
    Complete,
}

/// Outcome of [`Envelope::pop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopStatus {
    /// `bytes` were produced; more may follow.
    Ok,
    /// No more bytes will ever be produced.
    Complete,
    /// The caller must supply a resource before decoding can continue.
    NeedResource(crate::content::ResourceKind),
}

/// CMS-specific header/trailer sub-states (spec §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmsSubState {
    None,
    Header,
    KeyInfo,
    EncrInfo,
    Data,
    Flushed,
    Signature,
    Done,
}

/// PGP-specific header/trailer sub-states (spec §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgpSubState {
    None,
    Header,
    Data,
    DataHeader,
    Done,
}

/// Format-specific sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubState {
    Cms(CmsSubState),
    Pgp(PgpSubState),
}

/// Running per-direction crypto state the push/pop loops drive.
pub(crate) struct CryptoState {
    pub(crate) backend: std::sync::Arc<dyn Backend>,
    pub(crate) cipher: Option<Box<dyn crypto_core::CipherContext>>,
    pub(crate) block_size: usize,
    /// Unaligned tail bytes held back across segment boundaries for
    /// block-cipher processing (spec §4.F push semantics).
    pub(crate) block_overhang: Vec<u8>,
    pub(crate) hash: Option<Box<dyn crypto_core::HashContext>>,
    /// Running SHA-1 for a PGP MDC packet (spec §4.F PGP-specific details).
    pub(crate) mdc_hash: Option<Box<dyn crypto_core::HashContext>>,
    pub(crate) compressor: Option<crate::compress::Compressor>,
    pub(crate) decompressor: Option<crate::compress::Decompressor>,
    pub(crate) sign: Option<Box<dyn crypto_core::SignContext>>,
    /// Keyed MAC over pushed/popped payload bytes for `Usage::Mac`
    /// envelopes (spec §3 "mac" usage).
    pub(crate) mac: Option<Box<dyn crypto_core::MacContext>>,
    /// Carried look-ahead output stashed by a decompressing pop so it can
    /// be re-prepended on the next real pop (spec §4.F look-ahead reads).
    pub(crate) lookahead: Vec<u8>,
    /// Encode side: processed (compressed/encrypted) bytes waiting to be
    /// segment-framed and written to `buffer`, held back until there's
    /// enough to satisfy the minimum-segment-size rule (spec §4.B).
    pub(crate) ready: Vec<u8>,
    /// Decode side: the most recently decrypted block-cipher segment,
    /// held back because it might turn out to be the final (padded) one
    /// (spec §4.F CMS-specific details).
    pub(crate) held_plain: Vec<u8>,
    /// Decode side: plaintext bytes produced and awaiting delivery to the
    /// caller via `pop`.
    pub(crate) out_ready: Vec<u8>,
    /// PGP only: whether the outer packet tag byte has been written/read.
    pub(crate) outer_tag_written: bool,
    /// PGP only: whether the SEIP version byte has been written/read.
    pub(crate) version_byte_written: bool,
    /// PGP only: whether the 6-byte literal-data header has been stripped
    /// from the decrypted/decompressed plaintext yet (decode side).
    pub(crate) literal_header_stripped: bool,
    /// PGP only, encode side: a fully-framed SKESK packet (tag 3) waiting
    /// to be written ahead of the outer SEIP/Literal packet, built by
    /// [`Envelope::enable_pgp_password_encrypt`].
    pub(crate) pending_skesk: Option<Vec<u8>>,
    /// PGP only, decode side: an SKESK packet's S2K parameters, parsed but
    /// not yet turned into a session key because the password hasn't been
    /// supplied yet (see [`Envelope::resolve_pgp_password`]).
    pub(crate) pgp_skesk_pending:
        Option<(crypto_core::SymmetricAlgorithm, crypto_core::HashAlgorithm, [u8; 8], u8)>,
}

/// An envelope: one streaming encode or decode session over a bounded
/// buffer.
pub struct Envelope {
    pub format: Format,
    pub mode: Mode,
    pub content_type: Option<ContentType>,
    pub state: State,
    pub sub_state: SubState,
    pub buffer: StreamBuffer,
    pub aux_buffer: Option<StreamBuffer>,
    pub actions: ActionList,
    pub content: ContentList,
    /// Latched permanent error; once set, every push/pop returns it.
    pub error: Option<Error>,
    /// Bytes remaining in the current payload segment/packet (decode), or
    /// declared definite length (encode), if known.
    pub data_left: Option<usize>,
    pub(crate) crypto: CryptoState,
}

impl Envelope {
    /// Starts a new envelope.
    pub fn new(
        format: Format,
        mode: Mode,
        buffer_capacity: usize,
        backend: std::sync::Arc<dyn Backend>,
    ) -> Self {
        let sub_state = match (format, mode) {
            (Format::Cms, _) => SubState::Cms(CmsSubState::None),
            (Format::Pgp, _) => SubState::Pgp(PgpSubState::None),
        };
        Envelope {
            format,
            mode,
            content_type: None,
            state: State::PreData,
            sub_state,
            buffer: StreamBuffer::new(buffer_capacity),
            aux_buffer: None,
            actions: ActionList::new(),
            content: ContentList::new(),
            error: None,
            data_left: None,
            crypto: CryptoState {
                backend,
                cipher: None,
                block_size: 1,
                block_overhang: Vec::new(),
                hash: None,
                mdc_hash: None,
                compressor: None,
                decompressor: None,
                sign: None,
                mac: None,
                lookahead: Vec::new(),
                ready: Vec::new(),
                held_plain: Vec::new(),
                out_ready: Vec::new(),
                outer_tag_written: false,
                version_byte_written: false,
                literal_header_stripped: false,
                pending_skesk: None,
                pgp_skesk_pending: None,
            },
        }
    }

    /// Generic push used by decode envelopes: appends raw wire bytes to
    /// `buffer` (compacting first if needed). All format-specific
    /// processing happens lazily in `pop`.
    pub(crate) fn raw_push(&mut self, input: &[u8]) -> Result<(usize, PushStatus)> {
        self.buffer
            .write(input)
            .map_err(|e| self.latch_if_permanent(e))?;
        Ok((input.len(), PushStatus::Ok))
    }

    /// Generic pop used by encode envelopes: reads already-framed wire
    /// bytes out of `buffer`.
    pub(crate) fn raw_pop(&mut self, max_bytes: usize) -> Result<(Vec<u8>, PopStatus)> {
        let n = max_bytes.min(self.buffer.len());
        let bytes = self.buffer.read(n).unwrap_or_default();
        let status = if self.state == State::Finished && self.buffer.is_empty() {
            PopStatus::Complete
        } else {
            PopStatus::Ok
        };
        Ok((bytes, status))
    }

    /// Dispatches to the format-specific encode/decode push implementation.
    pub fn push(&mut self, input: &[u8]) -> Result<(usize, PushStatus)> {
        self.check_latched()?;
        match self.mode {
            Mode::Encode => match self.format {
                Format::Cms => crate::cms::encode_push(self, input),
                Format::Pgp => crate::pgp::encode_push(self, input),
            },
            Mode::Decode => self.raw_push(input),
        }
    }

    /// Dispatches to the format-specific encode/decode pop implementation.
    pub fn pop(&mut self, max_bytes: usize) -> Result<(Vec<u8>, PopStatus)> {
        self.check_latched()?;
        match self.mode {
            Mode::Decode => match self.format {
                Format::Cms => crate::cms::decode_pop(self, max_bytes),
                Format::Pgp => crate::pgp::decode_pop(self, max_bytes),
            },
            Mode::Encode => self.raw_pop(max_bytes),
        }
    }

    /// Enables bulk encryption/decryption with an already-wrapped session
    /// key, and records the action in the action list.
    pub fn enable_encrypt(
        &mut self,
        algo: crypto_core::SymmetricAlgorithm,
        key: &[u8],
        iv: &[u8],
        direction: crypto_core::Direction,
    ) -> Result<()> {
        let ctx = self.crypto.backend.cipher(algo, key, iv, direction)?;
        self.crypto.block_size = algo.block_size();
        self.crypto.cipher = Some(ctx);
        self.actions
            .add(ActionKind::Encrypt, crate::action::CryptoHandle::Symmetric(algo), false);
        Ok(())
    }

    /// Enables a running hash (signed content, or MDC) over pushed/popped
    /// payload bytes.
    pub fn enable_hash(&mut self, algo: crypto_core::HashAlgorithm) -> Result<()> {
        let ctx = self.crypto.backend.hash(algo)?;
        self.crypto.hash = Some(ctx);
        self.actions
            .add(ActionKind::Hash, crate::action::CryptoHandle::Hash(algo), false);
        Ok(())
    }

    /// Enables compression ahead of encryption (encode) or after
    /// decryption (decode).
    pub fn enable_compress(&mut self) {
        match self.mode {
            Mode::Encode => self.crypto.compressor = Some(crate::compress::Compressor::new()),
            Mode::Decode => self.crypto.decompressor = Some(crate::compress::Decompressor::new()),
        }
        self.actions.add(
            ActionKind::Compress,
            crate::action::CryptoHandle::Hash(crypto_core::HashAlgorithm::Sha1),
            false,
        );
    }

    /// Enables the PGP MDC (Modification Detection Code) running SHA-1
    /// hash over the SEIP packet's plaintext (spec §4.F PGP-specific
    /// details).
    pub fn enable_mdc(&mut self) -> Result<()> {
        self.crypto.mdc_hash = Some(self.crypto.backend.hash(crypto_core::HashAlgorithm::Sha1)?);
        Ok(())
    }

    /// Enables signing (encode) or sets the verification key (decode)
    /// over the envelope's hash action.
    pub fn enable_sign(&mut self, ctx: Box<dyn crypto_core::SignContext>, key_id: Vec<u8>) {
        self.crypto.sign = Some(ctx);
        self.actions
            .add(ActionKind::Sign, crate::action::CryptoHandle::PublicKey(key_id), false);
    }

    /// Enables a keyed MAC (`Usage::Mac`, spec §3) over pushed/popped
    /// payload bytes, computed the same way a signed envelope's hash is:
    /// fed the plaintext as it's pushed (encode) or emitted (decode), then
    /// finalised into a trailer segment read/written alongside the
    /// signature trailer (see `cms.rs`/`pgp.rs`).
    pub fn enable_mac(&mut self, kind: crypto_core::MacKind, key: &[u8]) -> Result<()> {
        let ctx = self.crypto.backend.mac(kind, key)?;
        self.crypto.mac = Some(ctx);
        let algo = match kind {
            crypto_core::MacKind::Hmac(h) => h,
            crypto_core::MacKind::SslProto(h) => h,
        };
        self.actions
            .add(ActionKind::Mac, crate::action::CryptoHandle::Hash(algo), false);
        Ok(())
    }

    /// Registers that this decode envelope carries a trailer (signature
    /// segment) requiring a verification key the caller doesn't have yet
    /// (spec §4.E). Once `pop` surfaces `PopStatus::NeedResource`, the
    /// caller resolves it with [`Envelope::resolve_signature_check_key`]
    /// and calls `pop` again to continue.
    pub fn require_signature_check(&mut self, key_id: Vec<u8>, hash_algo: crypto_core::HashAlgorithm) -> Result<()> {
        self.enable_hash(hash_algo)?;
        self.content.push(crate::content::Group {
            kind: crate::content::GroupKind::SignerInfo,
            payload: crate::content::GroupPayload::Signature(crate::content::SignatureParams {
                hash_algorithm: hash_algo,
                key_id,
                issuer_and_serial: None,
                authenticated_attributes: None,
            }),
            processed: false,
            cached_verdict: None,
            required: vec![crate::content::ResourceKind::SignatureCheckKey],
        });
        self.actions
            .add(ActionKind::Sign, crate::action::CryptoHandle::PublicKey(Vec::new()), false);
        Ok(())
    }

    /// Supplies the signature-check key a prior `pop` reported as needed
    /// via `PopStatus::NeedResource(ResourceKind::SignatureCheckKey)`.
    pub fn resolve_signature_check_key(&mut self, ctx: Box<dyn crypto_core::SignContext>) {
        self.crypto.sign = Some(ctx);
        if let Some(group) = self.content.current_mut() {
            group.resolve(crate::content::ResourceKind::SignatureCheckKey);
        }
    }

    /// Enables password-based PGP encryption (spec §4.F, §8 E3/E6): derives
    /// the session key from `password` via RFC 4880 iterated-salted S2K
    /// under a freshly generated salt, enables bulk encryption with it, and
    /// stashes a SKESK (tag 3) packet carrying the S2K parameters to be
    /// written ahead of the payload by `pgp.rs`.
    pub fn enable_pgp_password_encrypt(
        &mut self,
        algo: crypto_core::SymmetricAlgorithm,
        hash_algo: crypto_core::HashAlgorithm,
        password: &[u8],
    ) -> Result<()> {
        let mut salt = [0u8; 8];
        self.crypto.backend.random(&mut salt)?;
        let count_byte = crate::s2k::DEFAULT_COUNT_BYTE;
        let key = crate::s2k::derive_key(
            self.crypto.backend.as_ref(),
            hash_algo,
            password,
            &salt,
            count_byte,
            algo.key_size(),
        )?;
        let iv = vec![0u8; algo.block_size()];
        self.enable_encrypt(algo, &key, &iv, crypto_core::Direction::Encrypt)?;
        self.crypto.pending_skesk = Some(crate::pgp::build_skesk_packet(algo, hash_algo, &salt, count_byte)?);
        Ok(())
    }

    /// Registers that this PGP decode envelope expects a password-derived
    /// session key rather than one supplied up front (spec §4.E). Once
    /// `pop` has parsed the leading SKESK packet's S2K parameters, it
    /// surfaces `PopStatus::NeedResource(ResourceKind::Password)`; the
    /// caller resolves it with [`Envelope::resolve_pgp_password`].
    pub fn require_pgp_password(&mut self) {
        self.content.push(crate::content::Group {
            kind: crate::content::GroupKind::RecipientInfo,
            payload: crate::content::GroupPayload::Encryption(crate::content::EncryptionParams {
                algorithm: crypto_core::SymmetricAlgorithm::Cast5,
                salt: Vec::new(),
                iv: Vec::new(),
                kdf_iterations: 0,
            }),
            processed: false,
            cached_verdict: None,
            required: vec![crate::content::ResourceKind::Password],
        });
    }

    /// Supplies the password a prior `pop` reported as needed via
    /// `PopStatus::NeedResource(ResourceKind::Password)`, deriving the
    /// session key from the SKESK packet's S2K parameters parsed so far.
    pub fn resolve_pgp_password(&mut self, password: &[u8]) -> Result<()> {
        let (algo, hash_algo, salt, count_byte) = self
            .crypto
            .pgp_skesk_pending
            .take()
            .ok_or_else(|| Error::Usage("no pending PGP password request".into()))?;
        let key = crate::s2k::derive_key(
            self.crypto.backend.as_ref(),
            hash_algo,
            password,
            &salt,
            count_byte,
            algo.key_size(),
        )?;
        let iv = vec![0u8; algo.block_size()];
        self.enable_encrypt(algo, &key, &iv, crypto_core::Direction::Decrypt)?;
        if let Some(group) = self.content.current_mut() {
            group.resolve(crate::content::ResourceKind::Password);
        }
        Ok(())
    }

    /// The content type driven by this envelope's usage (spec §3; see
    /// [`ContentType`]'s doc comment for the `EnvelopedData` caveat).
    pub(crate) fn derive_content_type(&self) -> ContentType {
        match self.usage() {
            Usage::Sign => ContentType::Signed,
            Usage::Mac => ContentType::Authenticated,
            Usage::Encrypt => ContentType::Encrypted,
            Usage::Compress => ContentType::Compressed,
            Usage::None => ContentType::Data,
        }
    }

    /// If a permanent error has already been latched, every further call
    /// must return it without doing work (spec §3 error state, §4.F
    /// failure semantics).
    pub(crate) fn check_latched(&self) -> Result<()> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        Ok(())
    }

    /// Latches a permanent (non-recoverable) error, unless `err` is itself
    /// recoverable (`Overflow`/`Underflow`), which never latches.
    pub(crate) fn latch_if_permanent(&mut self, err: Error) -> Error {
        if !err.is_recoverable() {
            self.error = Some(err.clone());
        }
        err
    }

    /// Resolves the envelope's "usage" (spec §3) from the actions present:
    /// none/compress, encrypt, mac, or sign.
    pub fn usage(&self) -> Usage {
        if self.actions.find(ActionKind::Sign).is_some() {
            Usage::Sign
        } else if self.actions.find(ActionKind::Mac).is_some() {
            Usage::Mac
        } else if self.actions.find(ActionKind::Encrypt).is_some() {
            Usage::Encrypt
        } else if self.actions.find(ActionKind::Compress).is_some() {
            Usage::Compress
        } else {
            Usage::None
        }
    }

    /// Validates the action-list configuration against the legal
    /// combinations table in spec §3, returning a usage error if it
    /// doesn't match.
    pub fn validate_actions(&self) -> Result<()> {
        match self.usage() {
            Usage::Encrypt => {
                if self.actions.find(ActionKind::Encrypt).is_none() {
                    return Err(Error::Usage("encrypt usage needs an encrypt action".into()));
                }
            }
            Usage::Mac => {
                if self.actions.find(ActionKind::Mac).is_none() {
                    return Err(Error::Usage("mac usage needs a mac action".into()));
                }
            }
            Usage::Sign => {
                if self.actions.find(ActionKind::Hash).is_none() {
                    return Err(Error::Usage("sign usage needs at least one hash action".into()));
                }
                if self.format == Format::Pgp {
                    if self.actions.find_all(ActionKind::Hash).count() > 1 {
                        return Err(Error::Usage("PGP allows at most one hash action".into()));
                    }
                    if self.actions.find_all(ActionKind::Sign).count() > 1 {
                        return Err(Error::Usage("PGP allows at most one sign action".into()));
                    }
                }
            }
            Usage::Compress | Usage::None => {}
        }
        Ok(())
    }
}

/// The envelope's derived "usage" (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    None,
    Compress,
    Encrypt,
    Mac,
    Sign,
}

/// PKCS #5 padding: `block - (len mod block)` bytes, each set to the pad
/// length (range `1..=block`). Used by both CMS and PGP block-cipher
/// flush (spec §4.F flush semantics).
pub(crate) fn pkcs5_pad(data: &mut Vec<u8>, block_size: usize) {
    let pad_len = block_size - (data.len() % block_size);
    data.extend(std::iter::repeat(pad_len as u8).take(pad_len));
}

/// Validates and strips PKCS #5 padding from a decrypted block-aligned
/// buffer. Returns the unpadded length. On invalid padding, still returns
/// an error but leaves evaluation of the full (nonsense) length to the
/// caller to feed to a MAC first, for constant-time failure handling, the
/// same discipline the record layer uses (spec §4.G/§4.F CMS-specific
/// details).
pub(crate) fn pkcs5_unpad_len(data: &[u8], block_size: usize) -> Result<usize> {
    if data.is_empty() || data.len() % block_size != 0 {
        return Err(Error::BadData("padded data not block-aligned".into()));
    }
    let pad_len = *data.last().unwrap() as usize;
    if pad_len == 0 || pad_len > block_size || pad_len > data.len() {
        return Err(Error::BadData("invalid PKCS#5 padding length".into()));
    }
    if data[data.len() - pad_len..].iter().any(|&b| b as usize != pad_len) {
        return Err(Error::BadData("invalid PKCS#5 padding bytes".into()));
    }
    Ok(data.len() - pad_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkcs5_pad_round_trips() {
        let mut data = b"0123456789".to_vec();
        let original_len = data.len();
        pkcs5_pad(&mut data, 16);
        assert_eq!(data.len() % 16, 0);
        assert_eq!(pkcs5_unpad_len(&data, 16).unwrap(), original_len);
    }

    #[test]
    fn pkcs5_pad_adds_full_block_when_aligned() {
        let mut data = vec![0u8; 16];
        pkcs5_pad(&mut data, 16);
        assert_eq!(data.len(), 32);
        assert_eq!(pkcs5_unpad_len(&data, 16).unwrap(), 16);
    }

    #[test]
    fn pkcs5_unpad_rejects_bad_padding() {
        let mut data = vec![0u8; 16];
        data[15] = 0; // pad length 0 is invalid
        assert!(pkcs5_unpad_len(&data, 16).is_err());
    }
}
