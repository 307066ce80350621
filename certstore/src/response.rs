//! Response construction (spec §4.J): the wire body is always `uint16
//! status` followed, on success, by the DER-encoded certificate;
//! grounded on `certstore.c`'s `sendErrorResponse` (status only) and
//! the success path of `serverTransact` (status then
//! `exportCertToStream`). The HTTP envelope around that body uses the
//! fixed `application/pkix-cert` content type from `setAccessMethodCertstore`.

const STATUS_OK: u16 = 0;

/// Builds the `uint16 status || [DER cert]` body.
pub fn encode_body(status: u16, der: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + der.map_or(0, |d| d.len()));
    body.extend_from_slice(&status.to_be_bytes());
    if let Some(der) = der {
        body.extend_from_slice(der);
    }
    body
}

/// Wraps a body in a minimal HTTP/1.1 response with the fixed content
/// type both client and server sides of the original protocol agree
/// on, and writes it to `transport`.
pub fn write_http_response(transport: &mut dyn std::io::Write, body: &[u8]) -> crate::error::Result<()> {
    let status_line = if body.len() >= 2 && u16::from_be_bytes([body[0], body[1]]) == STATUS_OK {
        "HTTP/1.1 200 OK"
    } else {
        "HTTP/1.1 404 Not Found"
    };
    let header = format!(
        "{status_line}\r\nContent-Type: application/pkix-cert\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    transport.write_all(header.as_bytes()).map_err(|e| crate::error::Error::Io(e.to_string()))?;
    transport.write_all(body).map_err(|e| crate::error::Error::Io(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_body_is_status_then_der() {
        let body = encode_body(0, Some(&[0xDE, 0xAD]));
        assert_eq!(body, vec![0x00, 0x00, 0xDE, 0xAD]);
    }

    #[test]
    fn error_body_is_status_only() {
        let body = encode_body(3, None);
        assert_eq!(body, vec![0x00, 0x03]);
    }
}
