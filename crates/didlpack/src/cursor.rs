use crate::error::Error;
use crate::error::Result;

/// A cursor tracks position within a borrowed buffer slice.
///
/// All reads are bounds-checked and fail with `Error::TruncatedInput`.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    slice: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(slice: &'a [u8]) -> Self {
        Self { slice, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.slice.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    #[inline]
    fn need(&self, n: usize) -> Result<()> {
        if n > self.remaining() {
            Err(Error::TruncatedInput)
        } else {
            Ok(())
        }
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        self.need(1)?;
        let byte = self.slice[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.need(len)?;
        let slice = &self.slice[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn as_slice(&self) -> &'a [u8] {
        &self.slice[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_basic() {
        let data = b"hello world";
        let mut cursor = Cursor::new(data);

        assert_eq!(cursor.pos(), 0);
        assert_eq!(cursor.remaining(), 11);

        let bytes = cursor.read_bytes(5).unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(cursor.pos(), 5);
        assert_eq!(cursor.read_byte().unwrap(), b' ');
        assert_eq!(cursor.as_slice(), b"world");
    }

    #[test]
    fn cursor_array() {
        let mut cursor = Cursor::new(&[1, 0, 0, 0, 9]);
        let word: [u8; 4] = cursor.read_array().unwrap();
        assert_eq!(u32::from_le_bytes(word), 1);
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn cursor_truncated() {
        let mut cursor = Cursor::new(b"short");
        assert_eq!(cursor.read_bytes(10), Err(Error::TruncatedInput));
        // A failed read does not move the cursor.
        assert_eq!(cursor.pos(), 0);
        cursor.read_bytes(5).unwrap();
        assert!(cursor.is_empty());
        assert_eq!(cursor.read_byte(), Err(Error::TruncatedInput));
    }
}
