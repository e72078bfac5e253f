//! Generates an RSA key pair for token signing.
//!
//! ```text
//! cargo run -p asperitas-keystore --features cli --bin genkey -- \
//!     --out deploy/keys --kid 54bb2165-71e1-41a6-af3e-7da4a0e1e2c1
//! ```
//!
//! With `--kid`, the private key lands in `<kid>.pem` (the layout expected by
//! `MemoryKeyStore::from_dir`) and the public key in `<kid>.pub`. Without it,
//! `private.pem` and `public.pem` are written.

use std::{path::PathBuf, process::ExitCode};

use asperitas_keystore::{DEFAULT_KEY_BITS, KeyPair, KeyResult};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "genkey", about = "Generate an RSA key pair for token signing")]
struct Args {
    /// Modulus size in bits.
    #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
    bits: usize,

    /// Directory the PEM files are written to.
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Key id used to name the files.
    #[arg(long)]
    kid: Option<String>,
}

fn run(args: &Args) -> KeyResult<()> {
    let (private_name, public_name) = match &args.kid {
        Some(kid) => (format!("{kid}.pem"), format!("{kid}.pub")),
        None => ("private.pem".to_owned(), "public.pem".to_owned()),
    };

    let pair = KeyPair::generate(args.bits)?;
    let (private_path, public_path) = pair.write_to(&args.out, &private_name, &public_name)?;

    tracing::info!(
        bits = args.bits,
        private = %private_path.display(),
        public = %public_path.display(),
        "private and public key files generated"
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "key generation failed");
            ExitCode::FAILURE
        },
    }
}
