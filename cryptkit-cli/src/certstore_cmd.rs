//! `certstore-serve` subcommand: a sequential, blocking accept loop over
//! [`certstore::handle_request`], since the protocol carries no state
//! between connections (spec §4.J "no caching, no state between
//! requests").

use std::fs;
use std::net::TcpListener;
use std::path::Path;

use anyhow::{Context, Result};
use certstore::MemoryCertStore;

pub fn run(addr: &str, cert_dir: &Path) -> Result<()> {
    let store = load_certs(cert_dir)?;
    let listener = TcpListener::bind(addr).with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "cert-store server listening");

    for incoming in listener.incoming() {
        let mut stream = match incoming {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept connection");
                continue;
            }
        };
        if let Err(e) = certstore::handle_request(&mut stream, &store) {
            tracing::warn!(error = %e, "request handling failed");
        }
    }
    Ok(())
}

/// Loads every `*.der` file in `dir`, indexing each under the `name`
/// attribute by its file stem.
fn load_certs(dir: &Path) -> Result<MemoryCertStore> {
    let mut store = MemoryCertStore::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("der") {
            continue;
        }
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
        let der = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        tracing::debug!(%name, bytes = der.len(), "indexed certificate");
        store.insert_name(name, der);
    }
    Ok(store)
}
