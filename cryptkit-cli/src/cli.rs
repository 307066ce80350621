//! CLI argument definitions. Modernized from the teacher's clap v2
//! `App`/`Arg` builder style (`sq/src/sq_cli.rs`) to clap v4 derive
//! macros, mirroring the subcommand shape of `hambosto-sweetbyte-rs`'s
//! `Encrypt`/`Decrypt` commands.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "cryptkit")]
#[command(version)]
#[command(about = "Streaming CMS/PGP envelopes and an SSL/TLS record-layer reference implementation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encrypt a file into a CMS or PGP envelope.
    Encrypt {
        #[arg(value_enum, long, default_value_t = EnvelopeFormat::Cms)]
        format: EnvelopeFormat,

        #[arg(value_enum, long, default_value_t = CipherArg::Aes128)]
        cipher: CipherArg,

        /// Symmetric key, hex-encoded (length must match the cipher's key size).
        #[arg(long)]
        key: String,

        /// Initialization vector, hex-encoded (length must match the cipher's block size).
        #[arg(long)]
        iv: String,

        /// Attach a PGP Modification Detection Code packet (PGP format only).
        #[arg(long)]
        mdc: bool,

        input: PathBuf,
        output: PathBuf,
    },

    /// Decrypt a CMS or PGP envelope back to plaintext.
    Decrypt {
        #[arg(value_enum, long, default_value_t = EnvelopeFormat::Cms)]
        format: EnvelopeFormat,

        #[arg(value_enum, long, default_value_t = CipherArg::Aes128)]
        cipher: CipherArg,

        #[arg(long)]
        key: String,

        #[arg(long)]
        iv: String,

        #[arg(long)]
        mdc: bool,

        input: PathBuf,
        output: PathBuf,
    },

    /// Run the HTTP cert-store lookup server (spec §4.J).
    CertstoreServe {
        /// Address to listen on, e.g. 127.0.0.1:8080.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,

        /// Directory of `.der` certificates; each file's stem is indexed
        /// under the `name` query attribute.
        #[arg(long)]
        cert_dir: PathBuf,
    },

    /// Run a pre-shared-key TLS/SSL handshake as the client, then echo one
    /// line of application data (a connectivity smoke test, not a general
    /// TLS client).
    TlsPskClient {
        #[arg(long)]
        addr: String,

        #[arg(value_enum, long, default_value_t = TlsVersionArg::Tls10)]
        version: TlsVersionArg,

        #[arg(long)]
        psk_identity: String,

        /// Pre-shared secret, hex-encoded.
        #[arg(long)]
        psk_secret: String,

        /// Application-data line to send once the handshake completes.
        #[arg(long, default_value = "hello from cryptkit")]
        message: String,
    },

    /// Run a pre-shared-key TLS/SSL handshake as the server for one
    /// connection, then echo back whatever application data it receives.
    TlsPskServer {
        #[arg(long)]
        addr: String,

        #[arg(value_enum, long, default_value_t = TlsVersionArg::Tls10)]
        version: TlsVersionArg,

        #[arg(long)]
        psk_identity: String,

        #[arg(long)]
        psk_secret: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum EnvelopeFormat {
    Cms,
    Pgp,
}

impl std::fmt::Display for EnvelopeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            EnvelopeFormat::Cms => "cms",
            EnvelopeFormat::Pgp => "pgp",
        })
    }
}

impl EnvelopeFormat {
    pub fn to_format(self) -> envelope::Format {
        match self {
            EnvelopeFormat::Cms => envelope::Format::Cms,
            EnvelopeFormat::Pgp => envelope::Format::Pgp,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CipherArg {
    Aes128,
    Aes256,
    Cast5,
    #[value(name = "3des")]
    TripleDes,
}

impl std::fmt::Display for CipherArg {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            CipherArg::Aes128 => "aes128",
            CipherArg::Aes256 => "aes256",
            CipherArg::Cast5 => "cast5",
            CipherArg::TripleDes => "3des",
        })
    }
}

impl CipherArg {
    pub fn to_algorithm(self) -> crypto_core::SymmetricAlgorithm {
        match self {
            CipherArg::Aes128 => crypto_core::SymmetricAlgorithm::Aes128,
            CipherArg::Aes256 => crypto_core::SymmetricAlgorithm::Aes256,
            CipherArg::Cast5 => crypto_core::SymmetricAlgorithm::Cast5,
            CipherArg::TripleDes => crypto_core::SymmetricAlgorithm::TripleDes,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum TlsVersionArg {
    Ssl3,
    Tls10,
    Tls11,
}

impl std::fmt::Display for TlsVersionArg {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            TlsVersionArg::Ssl3 => "ssl3",
            TlsVersionArg::Tls10 => "tls10",
            TlsVersionArg::Tls11 => "tls11",
        })
    }
}

impl TlsVersionArg {
    pub fn to_protocol_version(self) -> tls::ProtocolVersion {
        match self {
            TlsVersionArg::Ssl3 => tls::ProtocolVersion::Ssl3,
            TlsVersionArg::Tls10 => tls::ProtocolVersion::Tls10,
            TlsVersionArg::Tls11 => tls::ProtocolVersion::Tls11,
        }
    }
}
