//! The abstract crypto-service interface (spec §4.C) and a software
//! reference implementation of it.
//!
//! Neither the envelope engine nor the TLS layer import an algorithm crate
//! directly; they go through [`Backend`] and the context traits in
//! [`backend`]. [`software::SoftwareBackend`] is the only `Backend`
//! implementation in this workspace, built from RustCrypto primitives.

pub mod algo;
pub mod backend;
pub mod error;
pub mod software;

pub use algo::{HashAlgorithm, PublicKeyAlgorithm, SignatureFormat, SymmetricAlgorithm};
pub use backend::{
    Backend, CipherContext, Direction, HashContext, KeyexContext, MacContext, MacKind, SignContext,
};
pub use error::{Error, Result};
pub use software::SoftwareBackend;
