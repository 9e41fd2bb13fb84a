//! # LEB128
//!
//! Little-endian base-128 variable length integers, unsigned and signed
//! (two's complement), over arbitrary precision values.
//!
//! Every encoder emits the shortest form. The `u64`/`i64` variants are the
//! fast paths used for lengths, counts and type references.

use num_bigint::BigInt;
use num_bigint::BigUint;
use num_bigint::Sign;
use num_traits::One;
use num_traits::ToPrimitive;
use num_traits::Zero;

use crate::cursor::Cursor;
use crate::error::Error;
use crate::error::Result;

/// Appends the unsigned LEB128 form of `v`.
pub fn encode_u64(buf: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Appends the signed LEB128 form of `v`.
pub fn encode_i64(buf: &mut Vec<u8>, mut v: i64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        let done = (v == 0 && byte & 0x40 == 0) || (v == -1 && byte & 0x40 != 0);
        if done {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Appends the unsigned LEB128 form of `n`.
pub fn encode_unsigned(buf: &mut Vec<u8>, n: &BigUint) {
    if let Some(small) = n.to_u64() {
        return encode_u64(buf, small);
    }
    let mut v = n.clone();
    loop {
        let byte = low_bits(&v);
        v >>= 7u32;
        if v.is_zero() {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Appends the signed LEB128 form of `n`.
///
/// Negative values are walked on the magnitude of `-n - 1`, inverting each
/// 7-bit group, so no two's complement bignum is ever materialized.
pub fn encode_signed(buf: &mut Vec<u8>, n: &BigInt) {
    if let Some(small) = n.to_i64() {
        return encode_i64(buf, small);
    }
    let negative = n.sign() == Sign::Minus;
    let mut v = if negative {
        n.magnitude().clone() - 1u32
    } else {
        n.magnitude().clone()
    };
    loop {
        let mut byte = low_bits(&v);
        v >>= 7u32;
        if negative {
            byte = 0x7f - byte;
        }
        // The sign bit of the last group must agree with the sign of `n`.
        if v.is_zero() && (byte & 0x40 != 0) == negative {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

fn low_bits(v: &BigUint) -> u8 {
    (v.iter_u32_digits().next().unwrap_or(0) & 0x7f) as u8
}

/// Reads an unsigned LEB128 value that must fit in a `u64`.
pub fn decode_u64(cursor: &mut Cursor<'_>) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = cursor.read_byte()?;
        let low = (byte & 0x7f) as u64;
        if low != 0 {
            if shift >= 64 || (low << shift) >> shift != low {
                return Err(Error::Malformed("leb128 value overflows u64".into()));
            }
            result |= low << shift;
        }
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Reads an unsigned LEB128 length or count.
pub fn decode_len(cursor: &mut Cursor<'_>) -> Result<usize> {
    let len = decode_u64(cursor)?;
    usize::try_from(len).map_err(|_| Error::Malformed(format!("length {} overflows usize", len)))
}

/// Reads a signed LEB128 value that must fit in an `i64`.
pub fn decode_i64(cursor: &mut Cursor<'_>) -> Result<i64> {
    let n = decode_signed(cursor)?;
    n.to_i64().ok_or_else(|| Error::Malformed(format!("leb128 value {} overflows i64", n)))
}

/// Reads an unsigned LEB128 value of any size.
///
/// # Errors
/// Returns `Error::TruncatedInput` if the buffer ends mid-sequence.
pub fn decode_unsigned(cursor: &mut Cursor<'_>) -> Result<BigUint> {
    let mut groups = Vec::new();
    loop {
        let byte = cursor.read_byte()?;
        groups.push(byte & 0x7f);
        if byte & 0x80 == 0 {
            return from_groups(&groups);
        }
    }
}

/// Reads a signed LEB128 value of any size.
///
/// The terminating byte's `0x40` bit selects the sign.
///
/// # Errors
/// Returns `Error::TooShort` if no terminating byte is found.
pub fn decode_signed(cursor: &mut Cursor<'_>) -> Result<BigInt> {
    let mut groups = Vec::new();
    loop {
        let byte = cursor.read_byte().map_err(|_| Error::TooShort)?;
        groups.push(byte & 0x7f);
        if byte & 0x80 == 0 {
            let value = BigInt::from(from_groups(&groups)?);
            if byte & 0x40 != 0 {
                return Ok(value - (BigInt::one() << (7 * groups.len())));
            }
            return Ok(value);
        }
    }
}

/// Assembles little-endian 7-bit groups in one pass.
fn from_groups(groups: &[u8]) -> Result<BigUint> {
    BigUint::from_radix_le(groups, 128).ok_or_else(|| Error::Malformed("invalid leb128 digits".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned_hex(n: &BigUint) -> String {
        let mut buf = Vec::new();
        encode_unsigned(&mut buf, n);
        hex::encode_upper(buf)
    }

    fn signed_hex(n: &BigInt) -> String {
        let mut buf = Vec::new();
        encode_signed(&mut buf, n);
        hex::encode_upper(buf)
    }

    #[test]
    fn unsigned_vectors() {
        let cases: &[(&str, &str)] = &[
            ("00", "0"),
            ("07", "7"),
            ("7F", "127"),
            ("E58E26", "624485"),
            ("80897A", "2000000"),
            ("808098F4E9B5CA6A", "60000000000000000"),
            ("EF9BAF8589CF959A92DEB7DE8A929EABB424", "24197857200151252728969465429440056815"),
        ];
        for (expected, value) in cases {
            let n: BigUint = value.parse().unwrap();
            assert_eq!(&unsigned_hex(&n), expected, "encoding {}", value);

            let bytes = hex::decode(expected).unwrap();
            let mut cursor = Cursor::new(&bytes);
            assert_eq!(decode_unsigned(&mut cursor).unwrap(), n);
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn signed_vectors() {
        let cases: &[(&str, &str)] = &[
            ("2A", "42"),
            ("7F", "-1"),
            ("C0BB78", "-123456"),
            ("8089FA00", "2000000"),
            ("808098F4E9B5CAEA00", "60000000000000000"),
            ("EF9BAF8589CF959A92DEB7DE8A929EABB424", "24197857200151252728969465429440056815"),
            ("91E4D0FAF6B0EAE5EDA1C8A1F5EDE1D4CB5B", "-24197857200151252728969465429440056815"),
        ];
        for (expected, value) in cases {
            let n: BigInt = value.parse().unwrap();
            assert_eq!(&signed_hex(&n), expected, "encoding {}", value);

            let bytes = hex::decode(expected).unwrap();
            let mut cursor = Cursor::new(&bytes);
            assert_eq!(decode_signed(&mut cursor).unwrap(), n);
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn repeated_values_consume_exactly() {
        let mut buf = Vec::new();
        for _ in 0..10 {
            encode_i64(&mut buf, -1);
            encode_u64(&mut buf, 127);
        }
        let mut cursor = Cursor::new(&buf);
        for _ in 0..10 {
            assert_eq!(decode_i64(&mut cursor).unwrap(), -1);
            assert_eq!(decode_u64(&mut cursor).unwrap(), 127);
        }
        assert!(cursor.is_empty());
    }

    #[test]
    fn signed_too_short() {
        let mut buf = Vec::new();
        encode_i64(&mut buf, 128);
        assert_eq!(buf, [0x80, 0x01]);

        let mut cursor = Cursor::new(&buf[..1]);
        assert_eq!(decode_signed(&mut cursor), Err(Error::TooShort));
        let mut cursor = Cursor::new(&[]);
        assert_eq!(decode_signed(&mut cursor), Err(Error::TooShort));
    }

    #[test]
    fn unsigned_truncated() {
        let mut cursor = Cursor::new(&[0xff, 0xff]);
        assert_eq!(decode_unsigned(&mut cursor), Err(Error::TruncatedInput));
    }

    #[test]
    fn u64_overflow_is_rejected() {
        let bytes = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f];
        let mut cursor = Cursor::new(&bytes);
        assert!(matches!(decode_u64(&mut cursor), Err(Error::Malformed(_))));

        let max = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        let mut cursor = Cursor::new(&max);
        assert_eq!(decode_u64(&mut cursor).unwrap(), u64::MAX);
    }

    #[test]
    fn i64_boundaries() {
        for v in [0i64, 1, -1, 63, 64, -64, -65, i64::MAX, i64::MIN, 1 << 40] {
            let mut buf = Vec::new();
            encode_i64(&mut buf, v);
            assert_eq!(decode_i64(&mut Cursor::new(&buf)).unwrap(), v);
        }
        let mut buf = Vec::new();
        encode_i64(&mut buf, -64);
        assert_eq!(buf, [0x40]);
        buf.clear();
        encode_i64(&mut buf, 64);
        assert_eq!(buf, [0xc0, 0x00]);
    }

    #[test]
    fn magnitude_walk_past_i64() {
        let beyond = BigInt::from(i64::MAX) + 1;
        let mut buf = Vec::new();
        encode_signed(&mut buf, &beyond);
        assert_eq!(decode_signed(&mut Cursor::new(&buf)).unwrap(), beyond);
        let below = BigInt::from(i64::MIN) - 1;
        let mut buf = Vec::new();
        encode_signed(&mut buf, &below);
        assert_eq!(decode_signed(&mut Cursor::new(&buf)).unwrap(), below);
    }

    #[test]
    fn long_numbers_decode() {
        let big = BigUint::one() << 70_000usize;
        let mut buf = Vec::new();
        encode_unsigned(&mut buf, &big);
        assert_eq!(buf.len(), 10_001);
        assert_eq!(decode_unsigned(&mut Cursor::new(&buf)).unwrap(), big);

        let negative = -(BigInt::one() << 70_000usize) + 3;
        let mut buf = Vec::new();
        encode_signed(&mut buf, &negative);
        let mut cursor = Cursor::new(&buf);
        assert_eq!(decode_signed(&mut cursor).unwrap(), negative);
        assert!(cursor.is_empty());
    }
}
