//! Client-side handshake driver (spec §4.H), grounded in `ssl_cry.c`'s
//! client-role message sequencing and `sessmgr.c`'s top-level session
//! state machine shape.

use std::io::{Read, Write};
use std::sync::Arc;

use crypto_core::{Backend, KeyexContext, SignContext, SignatureFormat};

use super::messages::{
    self, CertificateChain, ClientHello, ClientKeyExchange, HandshakeType, ServerHello, ServerKeyExchangeDhe,
};
use super::{
    finished_value, install_negotiated_keys, raw_concat_digest, read_change_cipher_spec, read_handshake_message,
    write_change_cipher_spec, write_handshake_message, Transcript, SENDER_CLIENT, SENDER_SERVER,
};
use crate::dh::{DhKeyPair, DhParams};
use crate::error::{Error, Result};
use crate::policy::Policy;
use crate::prf;
use crate::record::{ProtocolVersion, RecordLayer};
use crate::session::Scoreboard;
use crate::suite::{self, CipherSuite, KeyExchange};

/// What the client needs supplied up front to drive a handshake. Server
/// certificate parsing and chain validation are out of scope for this
/// crate (spec's ASN.1/certificate-parser Non-goals); a caller that wants
/// RSA-transport or signature-checked DHE suites supplies the verify
/// context itself, built from whatever cert store it uses.
pub struct ClientParams<'a> {
    pub backend: Arc<dyn Backend>,
    pub policy: &'a Policy,
    pub offered_version: ProtocolVersion,
    pub psk: Option<(&'a [u8], &'a [u8])>,
    pub resume_session_id: Option<Vec<u8>>,
    pub scoreboard: Option<&'a Scoreboard>,
    /// Verifies the server's `ServerKeyExchange` signature for DHE
    /// suites. `None` restricts DHE-RSA negotiation.
    pub server_verify_key: Option<&'a dyn SignContext>,
    /// Wraps the RSA-transport premaster with the server's public key
    /// (mirrors `ServerParams::rsa_decrypt_key`). `None` disables RSA
    /// suites client-side.
    pub server_encrypt_key: Option<&'a dyn KeyexContext>,
}

/// The outcome of a completed handshake: the record layer, ready for
/// application data, plus the session id and whether this was a
/// resumption (spec §4.H "Session resumption").
pub struct EstablishedSession {
    pub records: RecordLayer,
    pub session_id: Vec<u8>,
    pub master_secret: Vec<u8>,
    pub resumed: bool,
}

pub fn run<T: Read + Write>(transport: &mut T, params: ClientParams) -> Result<EstablishedSession> {
    let backend = params.backend.clone();
    let mut transcript = Transcript::new(backend.as_ref())?;
    let mut records = RecordLayer::new_cleartext(backend.clone(), params.offered_version);

    let mut client_random = [0u8; 32];
    backend.random(&mut client_random)?;

    let cipher_suites = suite::client_offer(params.psk.is_some());
    let resume_id = params.resume_session_id.clone().unwrap_or_default();
    let (major, minor) = params.offered_version.wire();
    let hello = ClientHello {
        version: (major, minor),
        random: client_random,
        session_id: resume_id.clone(),
        cipher_suites,
        compression_methods: vec![0],
        extensions: Vec::new(),
    };
    write_handshake_message(transport, &mut records, &mut transcript, HandshakeType::ClientHello, &hello.encode())?;

    let mut pending = Vec::new();
    let (kind, body) = read_handshake_message(transport, &mut records, &mut transcript, &mut pending)?;
    if kind != HandshakeType::ServerHello {
        return Err(Error::UnexpectedMessage("expected ServerHello".into()));
    }
    let server_hello = ServerHello::decode(&body)?;
    let negotiated_version = ProtocolVersion::from_wire(server_hello.version.0, server_hello.version.1)?;
    records.negotiate_version(negotiated_version);

    let suite = suite::find(server_hello.cipher_suite)
        .ok_or_else(|| Error::HandshakeFailure("server selected an unknown cipher suite".into()))?;
    if suite.is_dummy {
        return Err(Error::NoSecureCipher);
    }
    tracing::debug!(?negotiated_version, suite_id = suite.id, "client negotiated handshake parameters");

    let resuming = !resume_id.is_empty() && resume_id == server_hello.session_id;

    let (session_id, master_secret, resumed) = if resuming {
        finish_resumed(
            transport,
            &mut records,
            &mut transcript,
            backend.as_ref(),
            client_random,
            server_hello,
            suite,
            resume_id,
            params.scoreboard,
            &mut pending,
        )?
    } else {
        finish_full(
            transport,
            &mut records,
            &mut transcript,
            backend.as_ref(),
            client_random,
            params.offered_version,
            server_hello,
            suite,
            params.psk,
            params.server_verify_key,
            params.server_encrypt_key,
            params.scoreboard,
            &mut pending,
        )?
    };

    Ok(EstablishedSession { records, session_id, master_secret, resumed })
}

#[allow(clippy::too_many_arguments)]
fn finish_full<T: Read + Write>(
    transport: &mut T,
    records: &mut RecordLayer,
    transcript: &mut Transcript,
    backend: &dyn Backend,
    client_random: [u8; 32],
    offered_version: ProtocolVersion,
    server_hello: ServerHello,
    suite: &CipherSuite,
    psk: Option<(&[u8], &[u8])>,
    server_verify_key: Option<&dyn SignContext>,
    server_encrypt_key: Option<&dyn KeyexContext>,
    scoreboard: Option<&Scoreboard>,
    pending: &mut Vec<u8>,
) -> Result<(Vec<u8>, Vec<u8>, bool)> {
    let server_random = server_hello.random;

    if suite.keyex.needs_server_cert() {
        let (kind, body) = read_handshake_message(transport, records, transcript, pending)?;
        if kind != HandshakeType::Certificate {
            return Err(Error::UnexpectedMessage("expected Certificate".into()));
        }
        let _chain = CertificateChain::decode(&body)?;
    }

    let mut dh_public: Option<(DhParams, Vec<u8>)> = None;
    if suite.keyex.needs_server_keyex() {
        let (kind, body) = read_handshake_message(transport, records, transcript, pending)?;
        if kind != HandshakeType::ServerKeyExchange {
            return Err(Error::UnexpectedMessage("expected ServerKeyExchange".into()));
        }
        let ske = ServerKeyExchangeDhe::decode(&body)?;
        if let Some(verify_key) = server_verify_key {
            let signed = ServerKeyExchangeDhe::signed_data(&client_random, &server_random, &ske.p, &ske.g, &ske.ys);
            let digest = raw_concat_digest(backend, &signed)?;
            verify_key.verify(&digest, &ske.signature, SignatureFormat::TlsRawConcat)?;
        }
        dh_public = Some((DhParams::from_wire(&ske.p, &ske.g), ske.ys));
    }

    let (mut kind, mut body) = read_handshake_message(transport, records, transcript, pending)?;
    if kind == HandshakeType::CertificateRequest {
        // Optional client auth: respond with an empty certificate and skip
        // CertificateVerify, a standard fallback when the client has none.
        write_handshake_message(transport, records, transcript, HandshakeType::Certificate, &CertificateChain { certs: vec![] }.encode())?;
        let next = read_handshake_message(transport, records, transcript, pending)?;
        kind = next.0;
        body = next.1;
    }
    if kind != HandshakeType::ServerHelloDone {
        return Err(Error::UnexpectedMessage("expected ServerHelloDone".into()));
    }
    let _ = body;

    let premaster = match suite.keyex {
        KeyExchange::Rsa => {
            let encrypt_key = server_encrypt_key
                .ok_or_else(|| Error::HandshakeFailure("RSA suite selected without a server encrypt key".into()))?;
            let (major, minor) = offered_version.wire();
            let mut random46 = [0u8; 46];
            backend.random(&mut random46)?;
            let premaster = messages::rsa_premaster((major, minor), &random46);
            let wrapped = encrypt_key.wrap(&premaster)?;
            let client_kex = ClientKeyExchange::Rsa(wrapped);
            write_handshake_message(transport, records, transcript, HandshakeType::ClientKeyExchange, &client_kex.encode())?;
            premaster
        }
        KeyExchange::DheRsa => {
            let (dh_params, peer_public_bytes) = dh_public.expect("validated by needs_server_keyex above");
            let keypair = DhKeyPair::generate(dh_params, backend)?;
            let peer_public = num_bigint_dig::BigUint::from_bytes_be(&peer_public_bytes);
            let shared = keypair.shared_secret(&peer_public);
            let client_kex = ClientKeyExchange::Dhe(keypair.public_bytes());
            write_handshake_message(transport, records, transcript, HandshakeType::ClientKeyExchange, &client_kex.encode())?;
            shared
        }
        KeyExchange::Psk | KeyExchange::DhePsk => {
            let (identity, secret) =
                psk.ok_or_else(|| Error::HandshakeFailure("PSK suite selected without a PSK identity".into()))?;
            let client_kex = ClientKeyExchange::Psk { identity: identity.to_vec(), dh_public: None };
            write_handshake_message(transport, records, transcript, HandshakeType::ClientKeyExchange, &client_kex.encode())?;
            messages::psk_premaster(secret)
        }
    };

    let is_ssl3 = records.version().is_ssl3();
    let master_secret = if is_ssl3 {
        prf::ssl3_master_secret(backend, &premaster, &client_random, &server_random)?
    } else {
        prf::tls_master_secret(backend, &premaster, &client_random, &server_random)?
    };

    let new_session_id = server_hello.session_id.clone();
    if let Some(board) = scoreboard {
        if !new_session_id.is_empty() {
            board.insert(&new_session_id, master_secret.clone(), false)?;
        }
    }

    install_negotiated_keys(records, backend, suite, &master_secret, &client_random, &server_random, true)?;

    write_change_cipher_spec(transport, records)?;
    let client_finished = finished_value(backend, records.version(), &master_secret, b"client finished", SENDER_CLIENT, transcript)?;
    write_handshake_message(transport, records, transcript, HandshakeType::Finished, &messages::encode_finished(&client_finished))?;

    read_change_cipher_spec(transport)?;
    let (kind, body) = read_handshake_message(transport, records, transcript, pending)?;
    if kind != HandshakeType::Finished {
        return Err(Error::UnexpectedMessage("expected Finished".into()));
    }
    let expected_server_finished = finished_value(backend, records.version(), &master_secret, b"server finished", SENDER_SERVER, transcript)?;
    if body != expected_server_finished {
        return Err(Error::VerificationFailed);
    }

    Ok((new_session_id, master_secret, false))
}

#[allow(clippy::too_many_arguments)]
fn finish_resumed<T: Read + Write>(
    transport: &mut T,
    records: &mut RecordLayer,
    transcript: &mut Transcript,
    backend: &dyn Backend,
    client_random: [u8; 32],
    server_hello: ServerHello,
    suite: &CipherSuite,
    session_id: Vec<u8>,
    scoreboard: Option<&Scoreboard>,
    pending: &mut Vec<u8>,
) -> Result<(Vec<u8>, Vec<u8>, bool)> {
    let board = scoreboard.ok_or_else(|| Error::HandshakeFailure("resumption requested without a session cache".into()))?;
    let cached = board.lookup(&session_id)?.ok_or_else(|| Error::HandshakeFailure("resumed session not found in cache".into()))?;
    let master_secret = cached.master_secret;
    let server_random = server_hello.random;

    install_negotiated_keys(records, backend, suite, &master_secret, &client_random, &server_random, true)?;

    // Resumption reverses the Finished-exchange roles: server sends first.
    read_change_cipher_spec(transport)?;
    let (kind, body) = read_handshake_message(transport, records, transcript, pending)?;
    if kind != HandshakeType::Finished {
        return Err(Error::UnexpectedMessage("expected Finished".into()));
    }
    let expected_server_finished = finished_value(backend, records.version(), &master_secret, b"server finished", SENDER_SERVER, transcript)?;
    if body != expected_server_finished {
        return Err(Error::VerificationFailed);
    }

    write_change_cipher_spec(transport, records)?;
    let client_finished = finished_value(backend, records.version(), &master_secret, b"client finished", SENDER_CLIENT, transcript)?;
    write_handshake_message(transport, records, transcript, HandshakeType::Finished, &messages::encode_finished(&client_finished))?;

    Ok((session_id, master_secret, true))
}
