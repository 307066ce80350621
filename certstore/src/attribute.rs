//! The fixed query-attribute table (spec §4.J), grounded on
//! `certstore.c`'s `certstoreReadInfo[]`: each HTTP GET query attribute
//! name maps to a cryptlib-style key ID kind, with a flag marking
//! whether the value arrives base64-encoded or as plain text.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{Error, Result};

/// Whether a query attribute's value must be base64-decoded before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Base64,
}

/// The kind of key ID a query resolves to, mirroring cryptlib's
/// `CRYPT_KEYID_*` / `CRYPT_IKEYID_*` distinction between attributes
/// that name a certificate directly (by hash) and those that name it
/// indirectly (by a human-readable identifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyId {
    /// `certHash`: a hash of the whole certificate.
    CertId(Vec<u8>),
    /// `name`: a human-readable owner name.
    Name(String),
    /// `uri` / `email`: a URI-shaped identifier (the original treats
    /// `email` as a second spelling of the same attribute).
    Uri(String),
    /// `sHash` / `iHash`: a hash of the subject or issuer DN (both map
    /// to the same underlying issuer-ID lookup in the original).
    IssuerId(Vec<u8>),
    /// `iAndSHash`: a hash of issuer-and-serial-number.
    IssuerAndSerialNumber(Vec<u8>),
    /// `sKIDHash`: a hash of the subject key identifier.
    KeyIdHash(Vec<u8>),
}

struct AttrInfo {
    name: &'static str,
    encoding: Encoding,
    build: fn(Vec<u8>, String) -> KeyId,
}

const ATTR_TABLE: &[AttrInfo] = &[
    AttrInfo { name: "certHash", encoding: Encoding::Base64, build: |bytes, _| KeyId::CertId(bytes) },
    AttrInfo { name: "name", encoding: Encoding::Plain, build: |_, text| KeyId::Name(text) },
    AttrInfo { name: "uri", encoding: Encoding::Plain, build: |_, text| KeyId::Uri(text) },
    AttrInfo { name: "email", encoding: Encoding::Plain, build: |_, text| KeyId::Uri(text) },
    AttrInfo { name: "sHash", encoding: Encoding::Base64, build: |bytes, _| KeyId::IssuerId(bytes) },
    AttrInfo { name: "iHash", encoding: Encoding::Base64, build: |bytes, _| KeyId::IssuerId(bytes) },
    AttrInfo { name: "iAndSHash", encoding: Encoding::Base64, build: |bytes, _| KeyId::IssuerAndSerialNumber(bytes) },
    AttrInfo { name: "sKIDHash", encoding: Encoding::Base64, build: |bytes, _| KeyId::KeyIdHash(bytes) },
];

/// Resolves one `name=value` query pair into a [`KeyId`], matching the
/// attribute name case-insensitively on its first letter the way
/// `certstoreReadInfo` does, decoding the value per the table's flag.
pub fn resolve(name: &str, value: &str) -> Result<KeyId> {
    let first = name.chars().next().map(|c| c.to_ascii_lowercase());
    let info = ATTR_TABLE
        .iter()
        .find(|a| a.name.len() == name.len() && first == a.name.chars().next() && a.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::BadAttribute(name.to_string()))?;

    match info.encoding {
        Encoding::Base64 => {
            let bytes = STANDARD.decode(value).map_err(|_| Error::BadEncoding(value.to_string()))?;
            Ok((info.build)(bytes, String::new()))
        }
        Encoding::Plain => Ok((info.build)(Vec::new(), value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_base64_attribute() {
        let value = STANDARD.encode(b"\x01\x02\x03\x04");
        let id = resolve("certHash", &value).unwrap();
        assert_eq!(id, KeyId::CertId(vec![1, 2, 3, 4]));
    }

    #[test]
    fn resolves_plain_attribute_case_insensitively() {
        let id = resolve("Name", "alice").unwrap();
        assert_eq!(id, KeyId::Name("alice".into()));
    }

    #[test]
    fn email_and_uri_both_produce_uri_key_id() {
        assert_eq!(resolve("uri", "http://example.com").unwrap(), KeyId::Uri("http://example.com".into()));
        assert_eq!(resolve("email", "a@example.com").unwrap(), KeyId::Uri("a@example.com".into()));
    }

    #[test]
    fn shash_and_ihash_both_produce_issuer_id() {
        let value = STANDARD.encode(b"issuer-hash");
        assert_eq!(resolve("sHash", &value).unwrap(), KeyId::IssuerId(b"issuer-hash".to_vec()));
        assert_eq!(resolve("iHash", &value).unwrap(), KeyId::IssuerId(b"issuer-hash".to_vec()));
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        assert!(matches!(resolve("bogus", "x"), Err(Error::BadAttribute(_))));
    }

    #[test]
    fn bad_base64_is_rejected() {
        assert!(matches!(resolve("certHash", "not base64!!"), Err(Error::BadEncoding(_))));
    }
}
