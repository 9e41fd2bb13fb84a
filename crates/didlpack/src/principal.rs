//! # Principal
//!
//! An opaque, length-bounded identifier for canisters and users. The binary
//! engine only reads and writes the raw bytes; the textual form lives here so
//! that presentation stays out of the codec.
//!
//! ## Text Format
//! `base32(crc32_be(bytes) ++ bytes)`, lowercase, without padding, grouped in
//! runs of five characters separated by `-`. The empty principal (the
//! management canister) is `aaaaa-aa`.

use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;

use crate::error::Error;
use crate::error::Result;

/// Principals are never longer than this many bytes.
pub const MAX_PRINCIPAL_LEN: usize = 29;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Principal(Vec<u8>);

impl Principal {
    /// The management canister, `aaaaa-aa`.
    pub fn management() -> Self {
        Self(Vec::new())
    }

    /// The anonymous caller, `2vxsx-fae`.
    pub fn anonymous() -> Self {
        Self(vec![0x04])
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_PRINCIPAL_LEN {
            return Err(Error::Malformed(format!(
                "principal is {} bytes, at most {} allowed",
                bytes.len(),
                MAX_PRINCIPAL_LEN
            )));
        }
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn to_text(&self) -> String {
        let mut payload = crc32fast::hash(&self.0).to_be_bytes().to_vec();
        payload.extend_from_slice(&self.0);
        let encoded = BASE32_NOPAD.encode(&payload).to_ascii_lowercase();

        let mut out = String::with_capacity(encoded.len() + encoded.len() / 5);
        for (i, c) in encoded.chars().enumerate() {
            if i > 0 && i % 5 == 0 {
                out.push('-');
            }
            out.push(c);
        }
        out
    }

    /// Parses the dashed base32 text form, verifying the checksum.
    pub fn from_text(text: &str) -> Result<Self> {
        let invalid = |why: &str| Error::Malformed(format!("invalid principal {:?}: {}", text, why));

        let compact: String = text.chars().filter(|c| *c != '-').collect::<String>().to_ascii_uppercase();
        let decoded = BASE32_NOPAD
            .decode(compact.as_bytes())
            .map_err(|_| invalid("not base32"))?;
        if decoded.len() < 4 {
            return Err(invalid("missing checksum"));
        }
        let (checksum, bytes) = decoded.split_at(4);
        if crc32fast::hash(bytes).to_be_bytes() != checksum {
            return Err(invalid("checksum mismatch"));
        }
        let principal = Self::from_slice(bytes)?;
        // Reject alternative groupings and casing.
        if principal.to_text() != text {
            return Err(invalid("not in canonical form"));
        }
        Ok(principal)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl FromStr for Principal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn management_canister_text() {
        assert_eq!(Principal::management().to_text(), "aaaaa-aa");
        assert_eq!(Principal::from_text("aaaaa-aa").unwrap(), Principal::management());
    }

    #[test]
    fn anonymous_text() {
        assert_eq!(Principal::anonymous().to_text(), "2vxsx-fae");
        assert_eq!("2vxsx-fae".parse::<Principal>().unwrap(), Principal::anonymous());
    }

    #[test]
    fn ledger_canister_roundtrip() {
        let ledger: Principal = "ryjl3-tyaaa-aaaaa-aaaba-cai".parse().unwrap();
        assert_eq!(ledger.as_slice(), &[0, 0, 0, 0, 0, 0, 0, 2, 1, 1]);
        assert_eq!(ledger.to_string(), "ryjl3-tyaaa-aaaaa-aaaba-cai");
    }

    #[test]
    fn rejects_bad_checksum_and_length() {
        assert!(Principal::from_text("aaaaa-ab").is_err());
        assert!(Principal::from_text("not a principal").is_err());
        assert!(Principal::from_slice(&[0u8; 30]).is_err());
    }
}
