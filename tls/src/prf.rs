//! TLS and SSL 3.0 key derivation (spec §4.H "Master-secret derivation"
//! and "Key block derivation"), grounded in `ssl_cry.c`'s
//! `premasterToMaster`/`masterToKeys`/`completeSSLDualMAC`/
//! `completeTLSHashedMAC`.

use crypto_core::{Backend, HashAlgorithm, HashContext, MacKind};

use crate::error::Result;

fn hmac_once(backend: &dyn Backend, hash: HashAlgorithm, secret: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut ctx = backend.mac(MacKind::Hmac(hash), secret)?;
    ctx.update(data);
    Ok(ctx.finalize())
}

/// TLS 1.0/1.1's `P_hash`: `HMAC(secret, A(1) || seed) || HMAC(secret, A(2)
/// || seed) || ...`, where `A(0) = seed` and `A(i) = HMAC(secret, A(i-1))`.
fn p_hash(backend: &dyn Backend, hash: HashAlgorithm, secret: &[u8], seed: &[u8], out_len: usize) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(out_len + HashAlgorithm::Sha1.digest_size());
    let mut a = hmac_once(backend, hash, secret, seed)?;
    while result.len() < out_len {
        let mut input = a.clone();
        input.extend_from_slice(seed);
        result.extend_from_slice(&hmac_once(backend, hash, secret, &input)?);
        a = hmac_once(backend, hash, secret, &a)?;
    }
    result.truncate(out_len);
    Ok(result)
}

/// The TLS 1.0/1.1 PRF: `P_MD5(S1, label||seed) XOR P_SHA1(S2, label||seed)`,
/// where the secret is split into two (possibly overlapping, if its length
/// is odd) halves `S1`/`S2` (spec §4.H).
pub fn tls_prf(backend: &dyn Backend, secret: &[u8], label: &[u8], seed: &[u8], out_len: usize) -> Result<Vec<u8>> {
    let half = secret.len().div_ceil(2);
    let s1 = &secret[..half];
    let s2 = &secret[secret.len() - half..];

    let mut label_seed = label.to_vec();
    label_seed.extend_from_slice(seed);

    let md5_out = p_hash(backend, HashAlgorithm::Md5, s1, &label_seed, out_len)?;
    let sha1_out = p_hash(backend, HashAlgorithm::Sha1, s2, &label_seed, out_len)?;
    Ok(md5_out.iter().zip(sha1_out.iter()).map(|(a, b)| a ^ b).collect())
}

/// The SSL 3.0 key-material expansion function shared by master-secret and
/// key-block derivation: repeated rounds of `MD5(secret || SHA1(const_N ||
/// secret || seed))`, where `const_N` is `N` repetitions of the `N`th
/// letter of the alphabet (`"A"`, `"BB"`, `"CCC"`, ...), for as many rounds
/// as needed to fill `out_len` bytes.
fn ssl3_expand(backend: &dyn Backend, secret: &[u8], seed: &[u8], out_len: usize) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(out_len + HashAlgorithm::Md5.digest_size());
    let mut round: u8 = 1;
    while result.len() < out_len {
        let prefix = vec![b'A' + round - 1; round as usize];

        let mut sha1 = backend.hash(HashAlgorithm::Sha1)?;
        sha1.update(&prefix);
        sha1.update(secret);
        sha1.update(seed);
        let sha1_digest = sha1.finalize();

        let mut md5 = backend.hash(HashAlgorithm::Md5)?;
        md5.update(secret);
        md5.update(&sha1_digest);
        result.extend_from_slice(&md5.finalize());

        round += 1;
    }
    result.truncate(out_len);
    Ok(result)
}

/// SSL 3.0 master-secret derivation (spec §4.H): three-round `ssl3_expand`
/// over the premaster secret, seeded with `client_random || server_random`,
/// producing exactly 48 bytes.
pub fn ssl3_master_secret(
    backend: &dyn Backend,
    premaster: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<Vec<u8>> {
    let mut seed = client_random.to_vec();
    seed.extend_from_slice(server_random);
    ssl3_expand(backend, premaster, &seed, 48)
}

/// TLS master-secret derivation (spec §4.H): `PRF(premaster, "master
/// secret", client_random || server_random)`, truncated to 48 bytes.
pub fn tls_master_secret(
    backend: &dyn Backend,
    premaster: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<Vec<u8>> {
    let mut seed = client_random.to_vec();
    seed.extend_from_slice(server_random);
    tls_prf(backend, premaster, b"master secret", &seed, 48)
}

/// Key-block derivation, format-agnostic over SSL3/TLS (spec §4.H "Key
/// block derivation"): same construction as the master secret, but keyed
/// by the master secret, labelled `"key expansion"` (TLS) or unlabelled
/// (SSL3), and seeded with the randoms in *reversed* order (server then
/// client).
pub fn key_block(
    backend: &dyn Backend,
    is_ssl3: bool,
    master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    out_len: usize,
) -> Result<Vec<u8>> {
    let mut seed = server_random.to_vec();
    seed.extend_from_slice(client_random);
    if is_ssl3 {
        ssl3_expand(backend, master_secret, &seed, out_len)
    } else {
        tls_prf(backend, master_secret, b"key expansion", &seed, out_len)
    }
}

/// The SSL 3.0 sender label used in the dual-hash Finished computation.
pub const SENDER_CLIENT: &[u8; 4] = b"CLNT";
pub const SENDER_SERVER: &[u8; 4] = b"SRVR";

/// SSL 3.0's dual MD5/SHA-1 Finished value (spec §4.H): for each hash,
/// `H(master || pad2 || H(transcript || sender || master || pad1))`,
/// concatenated MD5-then-SHA1 for 36 bytes total. `md5_transcript`/
/// `sha1_transcript` are the running handshake-message hashes, cloned
/// (not consumed) so both client and server Finished values can be
/// computed from the same point in the transcript.
pub fn ssl3_finished(
    backend: &dyn Backend,
    master_secret: &[u8],
    sender: &[u8; 4],
    md5_transcript: &dyn HashContext,
    sha1_transcript: &dyn HashContext,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(36);
    for (algo, transcript, pad_len) in [
        (HashAlgorithm::Md5, md5_transcript, 48usize),
        (HashAlgorithm::Sha1, sha1_transcript, 40usize),
    ] {
        let mut inner = transcript.try_clone();
        inner.update(sender);
        inner.update(master_secret);
        inner.update(&vec![0x36u8; pad_len]);
        let inner_digest = inner.finalize();

        let mut outer = backend.hash(algo)?;
        outer.update(master_secret);
        outer.update(&vec![0x5cu8; pad_len]);
        outer.update(&inner_digest);
        out.extend(outer.finalize());
    }
    Ok(out)
}

/// TLS's single Finished value (spec §4.H): `PRF(master_secret, label,
/// MD5(transcript) || SHA1(transcript))[:12]`.
pub fn tls_finished(
    backend: &dyn Backend,
    master_secret: &[u8],
    label: &[u8],
    md5_transcript: &dyn HashContext,
    sha1_transcript: &dyn HashContext,
) -> Result<Vec<u8>> {
    let mut seed = md5_transcript.peek_digest();
    seed.extend(sha1_transcript.peek_digest());
    tls_prf(backend, master_secret, label, &seed, 12)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_core::SoftwareBackend;

    #[test]
    fn tls_prf_is_deterministic_and_sized() {
        let backend = SoftwareBackend;
        let secret = [0x11u8; 48];
        let out1 = tls_prf(&backend, &secret, b"master secret", b"seedseed", 48).unwrap();
        let out2 = tls_prf(&backend, &secret, b"master secret", b"seedseed", 48).unwrap();
        assert_eq!(out1, out2);
        assert_eq!(out1.len(), 48);
    }

    #[test]
    fn ssl3_master_secret_is_48_bytes_and_deterministic() {
        let backend = SoftwareBackend;
        let premaster = [0x22u8; 48];
        let cr = [0xaau8; 32];
        let sr = [0xbbu8; 32];
        let out1 = ssl3_master_secret(&backend, &premaster, &cr, &sr).unwrap();
        let out2 = ssl3_master_secret(&backend, &premaster, &cr, &sr).unwrap();
        assert_eq!(out1, out2);
        assert_eq!(out1.len(), 48);
    }

    #[test]
    fn key_block_changes_with_role_order() {
        let backend = SoftwareBackend;
        let master = [0x33u8; 48];
        let cr = [0x01u8; 32];
        let sr = [0x02u8; 32];
        let kb1 = key_block(&backend, false, &master, &cr, &sr, 64).unwrap();
        let kb2 = key_block(&backend, false, &master, &sr, &cr, 64).unwrap();
        assert_ne!(kb1, kb2);
    }
}
