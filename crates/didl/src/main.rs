//! didl: inspect Candid messages and interface descriptions.
//!
//! # Usage
//!
//! ```bash
//! # Decode a message by its own wire types
//! didl decode 4449444c00017d00
//!
//! # Decode the arguments (or, with --reply, the results) of a method
//! didl decode --did ledger.did --method icrc1_balance_of <hex>
//!
//! # Encode value text, inferring types or checking them against a method
//! didl encode '(record { foo = "baz"; bar = 42 })'
//! didl encode --did ledger.did --method icrc1_balance_of '(record { owner = principal "aaaaa-aa" })'
//!
//! # Validate a .did file and print it normalised
//! didl check ledger.did
//!
//! # Log the codec internals
//! RUST_LOG=didlpack=trace didl decode <hex>
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use didlpack::DecoderConfig;
use tracing_subscriber::EnvFilter;

use crate::commands::Signature;

#[derive(Parser)]
#[command(name = "didl", version, about = "Inspect, encode and check Candid messages")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a hex-encoded DIDL message
    Decode {
        /// The message as hex; `-` reads it from stdin
        message: String,

        #[command(flatten)]
        signature: SignatureArgs,

        /// Decode against the method's results instead of its arguments
        #[arg(long, requires = "method")]
        reply: bool,

        /// Also print the wire type table and argument types
        #[arg(long, conflicts_with = "method")]
        types: bool,

        /// Maximum value nesting depth
        #[arg(long, value_name = "DEPTH", default_value_t = didlpack::DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Maximum number of values the message may decode to
        #[arg(long, value_name = "COUNT", default_value_t = didlpack::DEFAULT_MAX_VALUES)]
        max_values: usize,

        /// Ignore bytes after the last value instead of failing
        #[arg(long)]
        allow_trailing: bool,
    },

    /// Encode Candid value text as a hex DIDL message
    Encode {
        /// Arguments, e.g. '(42, "text")'
        args: String,

        #[command(flatten)]
        signature: SignatureArgs,
    },

    /// Parse and validate a .did file, printing it normalised
    Check {
        /// The interface description
        file: PathBuf,
    },
}

#[derive(clap::Args)]
struct SignatureArgs {
    /// Interface description to take types from
    #[arg(long, value_name = "FILE", requires = "method")]
    did: Option<PathBuf>,

    /// Method whose signature types the message
    #[arg(long, value_name = "NAME", requires = "did")]
    method: Option<String>,
}

impl SignatureArgs {
    fn load(&self, reply: bool) -> Result<Option<Signature>> {
        match (&self.did, &self.method) {
            (Some(path), Some(method)) => Signature::load(path, method, reply).map(Some),
            _ => Ok(None),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let fallback = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let output = match cli.command {
        Commands::Decode { message, signature, reply, types, max_depth, max_values, allow_trailing } => {
            let bytes = commands::read_hex(&message)?;
            let config = DecoderConfig::default()
                .max_depth(max_depth)
                .max_values(max_values)
                .allow_trailing_bytes(allow_trailing);
            match signature.load(reply)? {
                Some(signature) => commands::decode_typed(&bytes, &signature, config)?,
                None => commands::decode(&bytes, config, types)?,
            }
        }
        Commands::Encode { args, signature } => match signature.load(false)? {
            Some(signature) => commands::encode_typed(&args, &signature)?,
            None => commands::encode(&args)?,
        },
        Commands::Check { file } => commands::check(&file)?,
    };
    println!("{}", output);
    Ok(())
}
