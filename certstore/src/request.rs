//! Parsing of the one HTTP request shape this server accepts: a GET
//! with a single query attribute, e.g. `GET /?certHash=AQIDBA%3D%3D
//! HTTP/1.1`. Grounded on `certstore.c`'s `serverTransact`, which reads
//! the request as an idempotent GET (`STREAM_IOCTL_IDEMPOTENT`) rather
//! than the POST-of-a-PKI-datagram shape the other cryptlib sessions
//! use.

use url::Url;

use crate::attribute::{resolve, KeyId};
use crate::error::{Error, Result};

/// A parsed, resolved query: the key ID to look up, kept alongside the
/// original `name=value` text for error reporting.
pub struct Query {
    pub key_id: KeyId,
    pub raw: String,
}

/// Parses the request line (the first line of the request, without the
/// trailing CRLF) and resolves its query string against the fixed
/// attribute table.
pub fn parse_request_line(line: &str) -> Result<Query> {
    let mut parts = line.split_whitespace();
    let method = parts.next().ok_or_else(|| Error::BadRequest("empty request line".into()))?;
    let target = parts.next().ok_or_else(|| Error::BadRequest("missing request target".into()))?;
    let version = parts.next().ok_or_else(|| Error::BadRequest("missing HTTP version".into()))?;
    if !version.starts_with("HTTP/") {
        return Err(Error::BadRequest(format!("not an HTTP request: '{version}'")));
    }
    if !method.eq_ignore_ascii_case("GET") {
        return Err(Error::UnsupportedMethod(method.to_string()));
    }

    let url = Url::parse(&format!("http://certstore.local{target}"))
        .map_err(|e| Error::BadRequest(format!("malformed request target: {e}")))?;
    let (name, value) = url
        .query_pairs()
        .next()
        .ok_or_else(|| Error::BadRequest("query string carries no attribute".into()))?;
    let raw = format!("{name}={value}");
    let key_id = resolve(&name, &value)?;
    Ok(Query { key_id, raw })
}

/// Reads a `\r\n`-terminated request line (and discards any following
/// header lines up to the blank line) from `transport`, since the
/// protocol carries nothing in the headers or body this server reads.
pub fn read_request_line(transport: &mut dyn std::io::BufRead) -> Result<String> {
    let mut line = String::new();
    transport.read_line(&mut line).map_err(|e| Error::Io(e.to_string()))?;
    let line = line.trim_end_matches(['\r', '\n']).to_string();
    if line.is_empty() {
        return Err(Error::BadRequest("empty request".into()));
    }

    // Drain headers up to the blank line; none of them are used.
    loop {
        let mut header = String::new();
        let n = transport.read_line(&mut header).map_err(|e| Error::Io(e.to_string()))?;
        if n == 0 || header == "\r\n" || header == "\n" {
            break;
        }
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_attribute_query() {
        let query = parse_request_line("GET /?name=alice HTTP/1.1").unwrap();
        assert_eq!(query.key_id, KeyId::Name("alice".into()));
    }

    #[test]
    fn rejects_non_get_methods() {
        assert!(matches!(parse_request_line("POST /?name=alice HTTP/1.1"), Err(Error::UnsupportedMethod(_))));
    }

    #[test]
    fn rejects_query_with_no_attribute() {
        assert!(matches!(parse_request_line("GET / HTTP/1.1"), Err(Error::BadRequest(_))));
    }

    #[test]
    fn percent_decodes_query_values() {
        let query = parse_request_line("GET /?uri=http%3A%2F%2Fa.example HTTP/1.1").unwrap();
        assert_eq!(query.key_id, KeyId::Uri("http://a.example".into()));
    }
}
