//! Command-line frontend for the envelope engine, the TLS record/handshake
//! layer, and the cert-store server, in the manner of the teacher's
//! `sq`/`sqv`/`tool` binaries: a `clap` derive parser dispatching to one
//! function per subcommand, with `anyhow::Context` attaching file/address
//! context to errors right at this boundary.

mod certstore_cmd;
mod cli;
mod envelope_cmd;
mod tls_cmd;

use anyhow::Result;
use clap::Parser;
use envelope::Mode;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let subscriber = tracing_subscriber::fmt().with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Encrypt { format, cipher, key, iv, mdc, input, output } => {
            envelope_cmd::run(Mode::Encode, format, cipher, &key, &iv, mdc, &input, &output)
        }
        Commands::Decrypt { format, cipher, key, iv, mdc, input, output } => {
            envelope_cmd::run(Mode::Decode, format, cipher, &key, &iv, mdc, &input, &output)
        }
        Commands::CertstoreServe { addr, cert_dir } => certstore_cmd::run(&addr, &cert_dir),
        Commands::TlsPskClient { addr, version, psk_identity, psk_secret, message } => {
            tls_cmd::run_client(&addr, version.to_protocol_version(), &psk_identity, &psk_secret, &message)
        }
        Commands::TlsPskServer { addr, version, psk_identity, psk_secret } => {
            tls_cmd::run_server(&addr, version.to_protocol_version(), &psk_identity, &psk_secret)
        }
    }
}
