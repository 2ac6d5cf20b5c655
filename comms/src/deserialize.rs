use std::io;

use crate::{WIRE_INT_SIZE, WireInt};

/// Types that can be decoded back from the artifact wire format.
pub trait Deserialize<'a>: Sized {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self>;
}

/// A forward only cursor over a received buffer.
///
/// Every read checks the remaining length, a truncated buffer yields
/// `io::ErrorKind::UnexpectedEof` instead of panicking.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new `Reader` positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// The amount of bytes already consumed.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Takes the next `n` raw bytes.
    pub fn bytes(&mut self, n: usize) -> io::Result<&'a [u8]> {
        let remaining = self.buf.len() - self.pos;
        if n > remaining {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "truncated artifact: needed {n} bytes at offset {}, only {remaining} left",
                    self.pos
                ),
            ));
        }

        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads one little endian wire integer.
    pub fn int(&mut self) -> io::Result<usize> {
        let mut raw = [0; WIRE_INT_SIZE];
        raw.copy_from_slice(self.bytes(WIRE_INT_SIZE)?);
        Ok(WireInt::from_le_bytes(raw) as usize)
    }

    /// Reads a length prefixed UTF-8 string, borrowing from the buffer.
    pub fn str(&mut self) -> io::Result<&'a str> {
        let len = self.int()?;
        let bytes = self.bytes(len)?;
        std::str::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Reads a count prefixed sequence of integers.
    pub fn ints(&mut self) -> io::Result<Vec<usize>> {
        let count = self.int()?;

        // Each entry takes at least one wire integer, a count beyond that is garbage.
        if count > (self.buf.len() - self.pos) / WIRE_INT_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("truncated artifact: sequence of {count} integers at offset {}", self.pos),
            ));
        }

        (0..count).map(|_| self.int()).collect()
    }

    /// Reads a byte length prefixed payload of little endian `f32`s.
    pub fn f32s(&mut self) -> io::Result<Vec<f32>> {
        let byte_len = self.int()?;
        if byte_len % size_of::<f32>() != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("payload length {byte_len} is not a multiple of {}", size_of::<f32>()),
            ));
        }

        let raw = self.bytes(byte_len)?;
        if cfg!(target_endian = "little") {
            return Ok(bytemuck::pod_collect_to_vec(raw));
        }

        let values = raw
            .chunks_exact(size_of::<f32>())
            .map(|chunk| f32::from_le_bytes(bytemuck::pod_read_unaligned(chunk)))
            .collect();

        Ok(values)
    }

    /// Fails if there are unread bytes left.
    pub fn finish(self) -> io::Result<()> {
        let trailing = self.buf.len() - self.pos;
        if trailing != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{trailing} trailing bytes after the last record"),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_ints_and_strings() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&5u32.to_le_bytes());
        buf.extend_from_slice(b"conv0");

        let mut reader = Reader::new(&buf);
        assert_eq!(reader.int().unwrap(), 7);
        assert_eq!(reader.str().unwrap(), "conv0");
        reader.finish().unwrap();
    }

    #[test]
    fn truncated_int() {
        let buf = [1, 0];
        let mut reader = Reader::new(&buf);
        let err = reader.int().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn huge_sequence_count_is_rejected() {
        let buf = u32::MAX.to_le_bytes();
        let mut reader = Reader::new(&buf);
        assert!(reader.ints().is_err());
    }

    #[test]
    fn trailing_bytes() {
        let buf = [0; 5];
        let mut reader = Reader::new(&buf);
        reader.int().unwrap();
        assert_eq!(
            reader.finish().unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
    }

    #[test]
    fn reads_unaligned_floats() {
        let values = [1.5f32, -0.25, f32::MIN_POSITIVE];
        let mut buf = vec![0xAA];
        buf.extend_from_slice(&12u32.to_le_bytes());
        for v in values {
            buf.extend_from_slice(&v.to_le_bytes());
        }

        let mut reader = Reader::new(&buf);
        reader.bytes(1).unwrap();
        assert_eq!(reader.f32s().unwrap(), values);
        reader.finish().unwrap();
    }

    #[test]
    fn payload_must_be_whole_floats() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(&[0, 0, 0]);

        let mut reader = Reader::new(&buf);
        assert_eq!(
            reader.f32s().unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
    }
}
