//! `tls-psk-client`/`tls-psk-server` subcommands: a connectivity smoke
//! test that runs a real pre-shared-key handshake end to end and
//! exchanges one application-data record, exercising the record layer
//! and handshake driver the way spec §8's end-to-end scenarios do,
//! without needing a certificate to stand up.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use crypto_core::SoftwareBackend;
use tls::record::ContentType;
use tls::{ClientParams, Policy, ProtocolVersion, ServerParams};

pub fn run_client(addr: &str, version: ProtocolVersion, identity: &str, secret_hex: &str, message: &str) -> Result<()> {
    let secret = hex::decode(secret_hex).context("PSK secret must be valid hex")?;
    let backend: Arc<dyn crypto_core::Backend> = Arc::new(SoftwareBackend);
    let policy = Policy::default();

    let mut stream = TcpStream::connect(addr).with_context(|| format!("connecting to {addr}"))?;
    let params = ClientParams {
        backend,
        policy: &policy,
        offered_version: version,
        psk: Some((identity.as_bytes(), &secret)),
        resume_session_id: None,
        scoreboard: None,
        server_verify_key: None,
        server_encrypt_key: None,
    };
    let mut session = tls::client::run(&mut stream, params).map_err(|e| anyhow::anyhow!("handshake failed: {e}"))?;
    tracing::info!(resumed = session.resumed, "client handshake complete");

    let record = session
        .records
        .wrap(ContentType::ApplicationData, message.as_bytes())
        .map_err(|e| anyhow::anyhow!("wrap failed: {e}"))?;
    stream.write_all(&record).context("writing application data")?;

    let reply = read_one_record(&mut stream, &mut session.records)?;
    println!("{}", String::from_utf8_lossy(&reply));
    Ok(())
}

pub fn run_server(addr: &str, version: ProtocolVersion, identity: &str, secret_hex: &str) -> Result<()> {
    let secret = hex::decode(secret_hex).context("PSK secret must be valid hex")?;
    let backend: Arc<dyn crypto_core::Backend> = Arc::new(SoftwareBackend);

    let listener = TcpListener::bind(addr).with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "TLS PSK server listening");
    let (mut stream, peer) = listener.accept().context("accepting a connection")?;
    tracing::info!(%peer, "accepted connection");

    let params = ServerParams {
        backend,
        max_version: version,
        certificate_chain: tls::handshake::messages::CertificateChain { certs: vec![] },
        sign_key: None,
        rsa_decrypt_key: None,
        psk: Some((identity.as_bytes(), &secret)),
        scoreboard: None,
        new_session_id: None,
    };
    let mut session = tls::server::run(&mut stream, params).map_err(|e| anyhow::anyhow!("handshake failed: {e}"))?;
    tracing::info!(resumed = session.resumed, "server handshake complete");

    let request = read_one_record(&mut stream, &mut session.records)?;
    tracing::info!(bytes = request.len(), "received application data, echoing back");
    let record = session
        .records
        .wrap(ContentType::ApplicationData, &request)
        .map_err(|e| anyhow::anyhow!("wrap failed: {e}"))?;
    stream.write_all(&record).context("writing echo")?;
    Ok(())
}

fn read_one_record(stream: &mut TcpStream, records: &mut tls::RecordLayer) -> Result<Vec<u8>> {
    let mut header = [0u8; 5];
    stream.read_exact(&mut header).context("reading record header")?;
    let length = u16::from_be_bytes([header[3], header[4]]) as usize;
    let mut body = vec![0u8; length];
    stream.read_exact(&mut body).context("reading record body")?;
    let content_type = ContentType::from_byte(header[0]).map_err(|e| anyhow::anyhow!("{e}"))?;
    if content_type != ContentType::ApplicationData {
        bail!("expected application data, got content type {}", header[0]);
    }
    records.unwrap(content_type, body).map_err(|e| anyhow::anyhow!("unwrap failed: {e}"))
}
