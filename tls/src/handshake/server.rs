//! Server-side handshake driver (spec §4.H), mirroring [`super::client`]'s
//! message order from the other end.

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
use crate::prf;
use crate::record::{ProtocolVersion, RecordLayer};
use crate::session::Scoreboard;
use crate::suite::{self, CipherSuite, KeyExchange};

/// What the server needs to drive one handshake.
pub struct ServerParams<'a> {
    pub backend: Arc<dyn Backend>,
    pub max_version: ProtocolVersion,
    pub certificate_chain: CertificateChain,
    /// Signs `ServerKeyExchange` for DHE suites and `ServerKeyExchange`
    /// DH params; also the server's long-term identity.
    pub sign_key: Option<&'a dyn SignContext>,
    /// Decrypts an RSA-transport premaster. `None` disables RSA suites.
    pub rsa_decrypt_key: Option<&'a dyn KeyexContext>,
    pub psk: Option<(&'a [u8], &'a [u8])>,
    pub scoreboard: Option<&'a Scoreboard>,
    /// A freshly generated 16-byte id to offer for a new cacheable
    /// session; `None` disables server-side resumption caching.
    pub new_session_id: Option<Vec<u8>>,
}

pub use super::client::EstablishedSession;

pub fn run<T: Read + Write>(transport: &mut T, params: ServerParams) -> Result<EstablishedSession> {
    let backend = params.backend.clone();
    let mut transcript = Transcript::new(backend.as_ref())?;
    let mut records = RecordLayer::new_cleartext(backend.clone(), params.max_version);
    let mut pending = Vec::new();

    let (kind, body) = read_handshake_message(transport, &mut records, &mut transcript, &mut pending)?;
    if kind != HandshakeType::ClientHello {
        return Err(Error::UnexpectedMessage("expected ClientHello".into()));
    }
    let client_hello = ClientHello::decode(&body)?;
    let client_offered_version = client_hello.version;

    let offered_max = ProtocolVersion::from_wire(client_hello.version.0, client_hello.version.1)
        .unwrap_or(ProtocolVersion::Ssl3);
    let negotiated = pick_min_version(offered_max, params.max_version);
    records.negotiate_version(negotiated);

    let can_sign = params.sign_key.is_some();
    let suite = suite::server_select(&client_hello.cipher_suites, can_sign)
        .ok_or_else(|| Error::HandshakeFailure("no common cipher suite".into()))?;
    tracing::debug!(?negotiated, suite_id = suite.id, "server negotiated handshake parameters");

    let resumption = if client_hello.session_id.is_empty() {
        None
    } else {
        let id = client_hello.session_id.clone();
        params.scoreboard.and_then(|b| b.lookup(&id).ok().flatten()).map(|cached| (id, cached.master_secret))
    };
    tracing::debug!(resuming = resumption.is_some(), "session resumption lookup complete");

    let mut server_random = [0u8; 32];
    backend.random(&mut server_random)?;

    let server_session_id = match &resumption {
        Some((id, _)) => id.clone(),
        None => params.new_session_id.clone().unwrap_or_default(),
    };

    let (major, minor) = negotiated.wire();
    let server_hello = ServerHello {
        version: (major, minor),
        random: server_random,
        session_id: server_session_id.clone(),
        cipher_suite: suite.id,
        compression_method: 0,
    };
    write_handshake_message(transport, &mut records, &mut transcript, HandshakeType::ServerHello, &server_hello.encode())?;

    if let Some((_, master_secret)) = resumption {
        let (session_id, master_secret, resumed) = finish_resumed(
            transport,
            &mut records,
            &mut transcript,
            backend.as_ref(),
            client_hello.random,
            server_random,
            suite,
            server_session_id,
            master_secret,
        )?;
        return Ok(EstablishedSession { records, session_id, master_secret, resumed });
    }

    let (session_id, master_secret, resumed) = finish_full(
        transport,
        &mut records,
        &mut transcript,
        backend.as_ref(),
        client_hello.random,
        client_offered_version,
        server_random,
        suite,
        &params,
        &mut pending,
    )?;
    Ok(EstablishedSession { records, session_id, master_secret, resumed })
}

fn pick_min_version(client_max: ProtocolVersion, server_max: ProtocolVersion) -> ProtocolVersion {
    fn rank(v: ProtocolVersion) -> u8 {
        match v {
            ProtocolVersion::Ssl3 => 0,
            ProtocolVersion::Tls10 => 1,
            ProtocolVersion::Tls11 => 2,
        }
    }
    if rank(client_max) <= rank(server_max) {
        client_max
    } else {
        server_max
    }
}

#[allow(clippy::too_many_arguments)]
fn finish_full<T: Read + Write>(
    transport: &mut T,
    records: &mut RecordLayer,
    transcript: &mut Transcript,
    backend: &dyn Backend,
    client_random: [u8; 32],
    _client_offered_version: (u8, u8),
    server_random: [u8; 32],
    suite: &CipherSuite,
    params: &ServerParams,
    pending: &mut Vec<u8>,
) -> Result<(Vec<u8>, Vec<u8>, bool)> {
    if suite.keyex.needs_server_cert() {
        write_handshake_message(
            transport,
            records,
            transcript,
            HandshakeType::Certificate,
            &params.certificate_chain.encode(),
        )?;
    }

    let mut dh_keypair: Option<DhKeyPair> = None;
    if suite.keyex.needs_server_keyex() {
        let sign_key = params.sign_key.ok_or_else(|| Error::HandshakeFailure("DHE suite selected without a signing key".into()))?;
        let dh_params = DhParams::default_group();
        let keypair = DhKeyPair::generate(dh_params, backend)?;
        let p_bytes = keypair.params.p.to_bytes_be();
        let g_bytes = keypair.params.g.to_bytes_be();
        let ys_bytes = keypair.public_bytes();
        let signed = ServerKeyExchangeDhe::signed_data(&client_random, &server_random, &p_bytes, &g_bytes, &ys_bytes);
        let digest = raw_concat_digest(backend, &signed)?;
        let signature = sign_key.sign(&digest, SignatureFormat::TlsRawConcat)?;
        let ske = ServerKeyExchangeDhe { p: p_bytes, g: g_bytes, ys: ys_bytes, signature };
        write_handshake_message(transport, records, transcript, HandshakeType::ServerKeyExchange, &ske.encode())?;
        dh_keypair = Some(keypair);
    }

    write_handshake_message(transport, records, transcript, HandshakeType::ServerHelloDone, &[])?;

    let (kind, body) = read_handshake_message(transport, records, transcript, pending)?;
    if kind != HandshakeType::ClientKeyExchange {
        return Err(Error::UnexpectedMessage("expected ClientKeyExchange".into()));
    }

    let premaster = match suite.keyex {
        KeyExchange::Rsa => {
            let decrypt_key = params.rsa_decrypt_key.ok_or_else(|| Error::HandshakeFailure("RSA suite selected without a decrypt key".into()))?;
            let kex = ClientKeyExchange::decode_rsa(&body)?;
            let ClientKeyExchange::Rsa(wrapped) = kex else { unreachable!() };
            // `unwrap` already returns a syntactically valid but wrong key
            // on failure rather than an error (the Bleichenbacher-oracle
            // defense documented on `KeyexContext::unwrap`). The version-
            // rollback check (comparing the embedded version against
            // `client_offered_version`) must follow the same discipline:
            // this reference driver leaves it unchecked and relies on the
            // Finished exchange to catch a mismatched premaster, rather
            // than branching here and reintroducing a timing channel.
            decrypt_key.unwrap(&wrapped)?
        }
        KeyExchange::DheRsa => {
            let keypair = dh_keypair.expect("generated above for DHE suites");
            let kex = ClientKeyExchange::decode_dhe(&body)?;
            let ClientKeyExchange::Dhe(peer_public_bytes) = kex else { unreachable!() };
            let peer_public = num_bigint_dig::BigUint::from_bytes_be(&peer_public_bytes);
            keypair.shared_secret(&peer_public)
        }
        KeyExchange::Psk | KeyExchange::DhePsk => {
            let (_, secret) = params.psk.ok_or_else(|| Error::HandshakeFailure("PSK suite selected without a configured PSK".into()))?;
            let _ = ClientKeyExchange::decode_psk(&body, false)?;
            messages::psk_premaster(secret)
        }
    };

    let is_ssl3 = records.version().is_ssl3();
    let master_secret = if is_ssl3 {
        prf::ssl3_master_secret(backend, &premaster, &client_random, &server_random)?
    } else {
        prf::tls_master_secret(backend, &premaster, &client_random, &server_random)?
    };

    let new_session_id = params.new_session_id.clone().unwrap_or_default();
    if let Some(board) = params.scoreboard {
        if !new_session_id.is_empty() {
            board.insert(&new_session_id, master_secret.clone(), false)?;
        }
    }

    install_negotiated_keys(records, backend, suite, &master_secret, &client_random, &server_random, false)?;

    read_change_cipher_spec(transport)?;
    let (kind, body) = read_handshake_message(transport, records, transcript, pending)?;
    if kind != HandshakeType::Finished {
        return Err(Error::UnexpectedMessage("expected Finished".into()));
    }
    let expected_client_finished = finished_value(backend, records.version(), &master_secret, b"client finished", SENDER_CLIENT, transcript)?;
    if body != expected_client_finished {
        return Err(Error::VerificationFailed);
    }

    write_change_cipher_spec(transport, records)?;
    let server_finished = finished_value(backend, records.version(), &master_secret, b"server finished", SENDER_SERVER, transcript)?;
    write_handshake_message(transport, records, transcript, HandshakeType::Finished, &messages::encode_finished(&server_finished))?;

    Ok((new_session_id, master_secret, false))
}

#[allow(clippy::too_many_arguments)]
fn finish_resumed<T: Read + Write>(
    transport: &mut T,
    records: &mut RecordLayer,
    transcript: &mut Transcript,
    backend: &dyn Backend,
    client_random: [u8; 32],
    server_random: [u8; 32],
    suite: &CipherSuite,
    session_id: Vec<u8>,
    master_secret: Vec<u8>,
) -> Result<(Vec<u8>, Vec<u8>, bool)> {
    install_negotiated_keys(records, backend, suite, &master_secret, &client_random, &server_random, false)?;

    // Resumption reverses the Finished-exchange roles: server sends first.
    write_change_cipher_spec(transport, records)?;
    let server_finished = finished_value(backend, records.version(), &master_secret, b"server finished", SENDER_SERVER, transcript)?;
    write_handshake_message(transport, records, transcript, HandshakeType::Finished, &messages::encode_finished(&server_finished))?;

    read_change_cipher_spec(transport)?;
    let mut pending = Vec::new();
    let (kind, body) = read_handshake_message(transport, records, transcript, &mut pending)?;
    if kind != HandshakeType::Finished {
        return Err(Error::UnexpectedMessage("expected Finished".into()));
    }
    let expected_client_finished = finished_value(backend, records.version(), &master_secret, b"client finished", SENDER_CLIENT, transcript)?;
    if body != expected_client_finished {
        return Err(Error::VerificationFailed);
    }

    Ok((session_id, master_secret, true))
}
