//! SSL 3.0 / TLS 1.0 / TLS 1.1 record layer, handshake state machine, and
//! session cache (spec §4.G-4.I), built on the abstract crypto-service
//! interface in `crypto-core` the same way the envelope engine is: no
//! concrete algorithm is named here, only `Backend`/`CipherContext`/
//! `HashContext`/`SignContext`/`KeyexContext`.

pub mod dh;
pub mod error;
pub mod handshake;
pub mod policy;
pub mod prf;
pub mod record;
pub mod session;
pub mod suite;

pub use error::{Error, Result};
pub use handshake::client::{self, ClientParams, EstablishedSession};
pub use handshake::server::{self, ServerParams};
pub use policy::Policy;
pub use record::{ContentType, ProtocolVersion, RecordLayer};
pub use session::Scoreboard;
pub use suite::{CipherSuite, KeyExchange, SuiteId};
