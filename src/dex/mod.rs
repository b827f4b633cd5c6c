#[macro_use]
pub mod error;

pub mod dex_file;

use crate::dex::error::DexError;

/// Bounds-checked little-endian cursor over a dex byte buffer.
pub(crate) struct Reader<'a>
{
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a>
{
    pub fn new(bytes: &'a [u8]) -> Reader<'a>
    {
        Reader { bytes, pos: 0 }
    }

    pub fn seek(&mut self, pos: usize)
    {
        self.pos = pos;
    }

    fn need(&self, count: usize) -> Result<(), DexError>
    {
        if self.bytes.len() < self.pos + count
        {
            fail!("unexpected end of stream reading {} bytes at index {}", count, self.pos);
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8, DexError>
    {
        self.need(1)?;
        let result = self.bytes[self.pos];
        self.pos += 1;
        Ok(result)
    }

    pub fn u16(&mut self) -> Result<u16, DexError>
    {
        self.need(2)?;
        let result = u16::from_le_bytes([self.bytes[self.pos], self.bytes[self.pos + 1]]);
        self.pos += 2;
        Ok(result)
    }

    pub fn u32(&mut self) -> Result<u32, DexError>
    {
        self.need(4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_le_bytes(word))
    }

    pub fn take(&mut self, count: usize) -> Result<&'a [u8], DexError>
    {
        self.need(count)?;
        let result = &self.bytes[self.pos..self.pos + count];
        self.pos += count;
        Ok(result)
    }

    /// Unsigned LEB128, at most five bytes in a dex file.
    pub fn uleb128(&mut self) -> Result<u32, DexError>
    {
        let mut result: u32 = 0;
        for shift in 0..5
        {
            let byte = self.u8()?;
            result |= ((byte & 0x7f) as u32) << (shift * 7);
            if byte & 0x80 == 0
            {
                return Ok(result);
            }
        }
        fail!("uleb128 value runs past five bytes at index {}", self.pos);
    }

    /// Bytes up to (excluding) the next NUL terminator.
    pub fn cstr(&mut self) -> Result<&'a [u8], DexError>
    {
        let start = self.pos;
        while self.pos < self.bytes.len()
        {
            if self.bytes[self.pos] == 0
            {
                let result = &self.bytes[start..self.pos];
                self.pos += 1;
                return Ok(result);
            }
            self.pos += 1;
        }
        fail!("unterminated string data at index {}", start);
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn reads_little_endian_words()
    {
        let mut r = Reader::new(&[0x01, 0x02, 0x03, 0x04, 0x05, 0xaa]);
        assert_eq!(r.u16().unwrap(), 0x0201);
        assert_eq!(r.u32().unwrap(), 0xaa050403);
        assert!(r.u8().is_err());
    }

    #[test]
    fn decodes_uleb128()
    {
        let mut r = Reader::new(&[0x00, 0x7f, 0x80, 0x7f, 0xe5, 0x8e, 0x26]);
        assert_eq!(r.uleb128().unwrap(), 0);
        assert_eq!(r.uleb128().unwrap(), 127);
        assert_eq!(r.uleb128().unwrap(), 16256);
        assert_eq!(r.uleb128().unwrap(), 624485);
    }

    #[test]
    fn rejects_overlong_uleb128()
    {
        let mut r = Reader::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
        assert!(r.uleb128().is_err());
    }

    #[test]
    fn reads_nul_terminated_strings()
    {
        let mut r = Reader::new(b"abc\0def");
        assert_eq!(r.cstr().unwrap(), b"abc");
        assert!(r.cstr().is_err());
    }
}
