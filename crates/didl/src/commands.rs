//! Subcommand implementations. Each returns the text to print.

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use didlpack::render_args;
use didlpack::Decoder;
use didlpack::DecoderConfig;
use didlpack::Type;
use didlparse::Did;
use tracing::debug;

/// The types a message is read or written under: one side of a method signature.
pub struct Signature {
    pub did: Did,
    pub types: Vec<Type>,
}

impl Signature {
    pub fn load(path: &Path, method: &str, reply: bool) -> Result<Self> {
        let did = load_did(path)?;
        Self::from_did(did, method, reply)
    }

    pub fn from_did(did: Did, method: &str, reply: bool) -> Result<Self> {
        let func = did.method(method).with_context(|| format!("no method {} in the interface", method))?;
        let types = if reply { func.rets.clone() } else { func.args.clone() };
        Ok(Self { did, types })
    }
}

fn load_did(path: &Path) -> Result<Did> {
    let source = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    didlparse::parse_did(&source).with_context(|| format!("parsing {}", path.display()))
}

/// Reads a hex message; `-` reads it from stdin. Whitespace and a `0x` prefix are ignored.
pub fn read_hex(input: &str) -> Result<Vec<u8>> {
    let mut text = input.to_string();
    if input == "-" {
        text.clear();
        std::io::stdin().read_to_string(&mut text).context("reading stdin")?;
    }
    parse_hex(&text)
}

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = cleaned.strip_prefix("0x").unwrap_or(&cleaned);
    hex::decode(digits).context("message is not valid hex")
}

pub fn decode(bytes: &[u8], config: DecoderConfig, show_types: bool) -> Result<String> {
    let message = Decoder::with_config(bytes, config).decode_message().context("decoding message")?;
    debug!(table = message.env.len(), args = message.values.len(), "decoded message");
    let mut out = String::new();
    if show_types {
        out.push_str(&message.env.to_string());
        let types: Vec<String> = message.types.iter().map(ToString::to_string).collect();
        out.push_str(&format!("({})\n", types.join(", ")));
    }
    out.push_str(&render_args(&message.values));
    Ok(out)
}

pub fn decode_typed(bytes: &[u8], signature: &Signature, config: DecoderConfig) -> Result<String> {
    let values = Decoder::with_config(bytes, config)
        .decode_args(&signature.did.env, &signature.types)
        .context("decoding message")?;
    Ok(render_args(&values))
}

pub fn encode(args: &str) -> Result<String> {
    let args = didlparse::parse_args(args).context("parsing arguments")?;
    let bytes = args.encode().context("encoding arguments")?;
    Ok(hex::encode(bytes))
}

pub fn encode_typed(args: &str, signature: &Signature) -> Result<String> {
    let env = &signature.did.env;
    let values = didlparse::parse_args_typed(args, env, &signature.types).context("parsing arguments")?;
    let bytes = didlpack::encode_with_env(env, &values, &signature.types).context("encoding arguments")?;
    Ok(hex::encode(bytes))
}

pub fn check(path: &Path) -> Result<String> {
    let did = load_did(path)?;
    Ok(did.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LEDGER: &str = r#"
        type Account = record { owner : principal; subaccount : opt blob };
        service : {
          icrc1_balance_of : (Account) -> (nat) query;
        }
    "#;

    fn balance_of(reply: bool) -> Signature {
        let did = didlparse::parse_did(LEDGER).unwrap();
        Signature::from_did(did, "icrc1_balance_of", reply).unwrap()
    }

    #[test]
    fn decodes_by_wire_types() -> Result<()> {
        let bytes = parse_hex("4449444c016c02d3e3aa027c868eb7027101002a0362617a")?;
        assert_eq!(decode(&bytes, DecoderConfig::default(), false)?, "(record { 4895187 = 42; 5097222 = \"baz\" })");
        assert_eq!(
            decode(&bytes, DecoderConfig::default(), true)?,
            "type table0 = record { 4895187 : int; 5097222 : text };\n(table0)\n(record { 4895187 = 42; 5097222 = \"baz\" })"
        );
        Ok(())
    }

    #[test]
    fn encodes_inferred_and_typed() -> Result<()> {
        assert_eq!(encode("(0 : nat)")?, "4449444c00017d00");
        let signature = balance_of(false);
        let hex = encode_typed(r#"(record { owner = principal "aaaaa-aa" })"#, &signature)?;
        let bytes = parse_hex(&hex)?;
        assert_eq!(
            decode_typed(&bytes, &signature, DecoderConfig::default())?,
            "(record { owner = principal \"aaaaa-aa\"; subaccount = opt null })"
        );
        Ok(())
    }

    #[test]
    fn decodes_replies() -> Result<()> {
        let signature = balance_of(true);
        assert_eq!(decode_typed(&parse_hex("4449444c00017d2a")?, &signature, DecoderConfig::default())?, "(42 : nat)");
        Ok(())
    }

    #[test]
    fn hex_input_is_forgiving() -> Result<()> {
        assert_eq!(parse_hex("0x4449 444c\n")?, b"DIDL".to_vec());
        assert!(parse_hex("zz").is_err());
        Ok(())
    }

    #[test]
    fn trailing_bytes_follow_config() -> Result<()> {
        let bytes = parse_hex("4449444c00017d0000")?;
        assert!(decode(&bytes, DecoderConfig::default(), false).is_err());
        assert_eq!(decode(&bytes, DecoderConfig::default().allow_trailing_bytes(true), false)?, "(0 : nat)");
        Ok(())
    }

    #[test]
    fn unknown_methods_are_reported() {
        let did = didlparse::parse_did(LEDGER).unwrap();
        let err = Signature::from_did(did, "transfer", false).err().unwrap();
        assert_eq!(err.to_string(), "no method transfer in the interface");
    }
}
