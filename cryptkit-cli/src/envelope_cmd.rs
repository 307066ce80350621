//! `encrypt`/`decrypt` subcommands: drive an [`envelope::Envelope`]
//! end to end over a file, the same push/pop discipline the crate's
//! own round-trip tests use, with a fixed 64 KiB buffer chunk.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use crypto_core::{Direction, SoftwareBackend};
use envelope::{Envelope, Mode, PopStatus, PushStatus};

use crate::cli::{CipherArg, EnvelopeFormat};

const CHUNK: usize = 65536;

#[allow(clippy::too_many_arguments)]
pub fn run(
    mode: Mode,
    format: EnvelopeFormat,
    cipher: CipherArg,
    key_hex: &str,
    iv_hex: &str,
    mdc: bool,
    input: &Path,
    output: &Path,
) -> Result<()> {
    let key = hex::decode(key_hex).context("key must be valid hex")?;
    let iv = hex::decode(iv_hex).context("IV must be valid hex")?;
    let algo = cipher.to_algorithm();
    if key.len() != algo.key_size() {
        bail!("{} needs a {}-byte key, got {}", cipher, algo.key_size(), key.len());
    }
    if algo.is_block_cipher() && iv.len() != algo.block_size() {
        bail!("{} needs a {}-byte IV, got {}", cipher, algo.block_size(), iv.len());
    }

    let direction = match mode {
        Mode::Encode => Direction::Encrypt,
        Mode::Decode => Direction::Decrypt,
    };

    let backend: Arc<dyn crypto_core::Backend> = Arc::new(SoftwareBackend);
    let mut env = Envelope::new(format.to_format(), mode, CHUNK, backend);
    env.enable_encrypt(algo, &key, &iv, direction)
        .context("failed to install the symmetric cipher")?;
    if mdc {
        env.enable_mdc().context("failed to enable the MDC hash")?;
    }

    let input_bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let produced = match mode {
        Mode::Encode => drive_encode(&mut env, &input_bytes)?,
        Mode::Decode => drive_decode(&mut env, &input_bytes)?,
    };
    fs::write(output, &produced).with_context(|| format!("writing {}", output.display()))?;

    tracing::info!(bytes_in = input_bytes.len(), bytes_out = produced.len(), ?mode, "envelope processed");
    Ok(())
}

fn drive_encode(env: &mut Envelope, payload: &[u8]) -> Result<Vec<u8>> {
    let mut wire = Vec::new();
    let mut remaining = payload;
    loop {
        match env.push(remaining) {
            Ok((consumed, PushStatus::Ok)) => {
                remaining = &remaining[consumed..];
                let (bytes, _) = env.pop(CHUNK)?;
                wire.extend(bytes);
                if remaining.is_empty() {
                    break;
                }
            }
            Ok((_, PushStatus::Complete)) => break,
            Err(e) if e.is_recoverable() => {
                let (bytes, _) = env.pop(CHUNK)?;
                wire.extend(bytes);
            }
            Err(e) => return Err(e.into()),
        }
    }
    loop {
        match env.push(&[])? {
            (_, PushStatus::Complete) => break,
            (_, PushStatus::Ok) => {}
        }
    }
    let (bytes, _) = env.pop(1 << 20)?;
    wire.extend(bytes);
    Ok(wire)
}

fn drive_decode(env: &mut Envelope, wire: &[u8]) -> Result<Vec<u8>> {
    let mut plaintext = Vec::new();
    for chunk in wire.chunks(CHUNK) {
        env.push(chunk)?;
        drain(env, &mut plaintext)?;
    }
    drain(env, &mut plaintext)?;
    Ok(plaintext)
}

fn drain(env: &mut Envelope, plaintext: &mut Vec<u8>) -> Result<()> {
    loop {
        let (bytes, status) = env.pop(CHUNK)?;
        let got_some = !bytes.is_empty();
        plaintext.extend(bytes);
        match status {
            PopStatus::Complete => break,
            PopStatus::NeedResource(kind) => bail!("decoding needs a resource this CLI doesn't supply: {kind:?}"),
            PopStatus::Ok if !got_some => break,
            PopStatus::Ok => {}
        }
    }
    Ok(())
}
