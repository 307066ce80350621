//! HTTP GET-only certificate lookup server (spec §4.J), grounded on
//! cryptlib's `certstore.c`. Unlike the TLS and envelope layers this
//! protocol carries no session state between requests: each connection
//! is read, answered, and forgotten, so the crate exposes a single
//! blocking `handle_request` rather than anything resembling a state
//! machine.

pub mod attribute;
pub mod error;
pub mod request;
pub mod response;
pub mod store;

use std::io::{BufRead, BufReader, Read, Write};

pub use attribute::KeyId;
pub use error::{Error, Result};
pub use store::{CertStore, MemoryCertStore};

/// Reads one HTTP GET request off `transport`, resolves its query
/// attribute, looks the certificate up in `store`, and writes the
/// response back. Never propagates a query-level failure (bad
/// attribute, not found) as a transport error: those are reported to
/// the client as a status code, mirroring `sendErrorResponse`'s "the
/// caller already has an error status available" contract. Only
/// transport I/O failures surface as `Err`.
pub fn handle_request<T: Read + Write>(transport: &mut T, store: &dyn CertStore) -> Result<()> {
    let mut reader = BufReader::new(&mut *transport);
    let outcome = read_and_resolve(&mut reader, store);

    let (status, der) = match &outcome {
        Ok(der) => (0u16, Some(der.as_slice())),
        Err(e) => {
            tracing::debug!(error = %e, "cert-store request failed");
            (e.status_code(), None)
        }
    };
    let body = response::encode_body(status, der);
    response::write_http_response(transport, &body)?;

    match outcome {
        Err(Error::Io(msg)) => Err(Error::Io(msg)),
        _ => Ok(()),
    }
}

fn read_and_resolve(reader: &mut dyn BufRead, store: &dyn CertStore) -> Result<Vec<u8>> {
    let line = request::read_request_line(reader)?;
    let query = request::parse_request_line(&line)?;
    store.lookup(&query.key_id)?.ok_or(Error::NotFound)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// A `Read + Write` double that serves request bytes from one
    /// buffer and captures the response into another, since
    /// `handle_request` needs a single type implementing both.
    struct MockTransport {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for MockTransport {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockTransport {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn body_of(response: &[u8]) -> &[u8] {
        let marker = b"\r\n\r\n";
        let pos = response.windows(4).position(|w| w == marker).unwrap() + 4;
        &response[pos..]
    }

    #[test]
    fn successful_lookup_returns_status_ok_and_der() {
        let mut mem = MemoryCertStore::new();
        mem.insert_name("alice".into(), vec![0x30, 0x82, 0x01, 0x00]);

        let mut transport =
            MockTransport { input: Cursor::new(b"GET /?name=alice HTTP/1.1\r\n\r\n".to_vec()), output: Vec::new() };
        handle_request(&mut transport, &mem).unwrap();

        let body = body_of(&transport.output);
        assert_eq!(&body[..2], &[0x00, 0x00]);
        assert_eq!(&body[2..], &[0x30, 0x82, 0x01, 0x00]);
        assert!(transport.output.starts_with(b"HTTP/1.1 200 OK"));
    }

    #[test]
    fn missing_certificate_returns_not_found_status() {
        let mem = MemoryCertStore::new();
        let mut transport =
            MockTransport { input: Cursor::new(b"GET /?name=nobody HTTP/1.1\r\n\r\n".to_vec()), output: Vec::new() };
        handle_request(&mut transport, &mem).unwrap();

        let body = body_of(&transport.output);
        assert_eq!(body.len(), 2);
        assert_eq!(u16::from_be_bytes([body[0], body[1]]), Error::NotFound.status_code());
        assert!(transport.output.starts_with(b"HTTP/1.1 404 Not Found"));
    }

    #[test]
    fn unsupported_method_reports_error_status_without_io_error() {
        let mem = MemoryCertStore::new();
        let mut transport =
            MockTransport { input: Cursor::new(b"POST /?name=alice HTTP/1.1\r\n\r\n".to_vec()), output: Vec::new() };
        assert!(handle_request(&mut transport, &mem).is_ok());
        assert!(transport.output.starts_with(b"HTTP/1.1 404 Not Found"));
    }
}
