//! Big-endian field reader and writer helpers for handshake structures.
//!
//! Every decoding failure is a malformed handshake message.

use crate::error::{Error, HandshakeFailureReason};

fn malformed() -> Error {
    Error::HandshakeFailure(HandshakeFailureReason::Malformed)
}

/// Cursor over a handshake message body.
pub struct Reader<'a> {
    data: &'a [u8],
    off: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, off: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.off
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < n {
            return Err(malformed());
        }
        let out = &self.data[self.off..self.off + n];
        self.off += n;
        Ok(out)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, Error> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u24(&mut self) -> Result<usize, Error> {
        let b = self.bytes(3)?;
        Ok((b[0] as usize) << 16 | (b[1] as usize) << 8 | b[2] as usize)
    }

    /// `opaque data<0..2^8-1>`
    pub fn vec8(&mut self) -> Result<&'a [u8], Error> {
        let len = self.u8()? as usize;
        self.bytes(len)
    }

    /// `opaque data<0..2^16-1>`
    pub fn vec16(&mut self) -> Result<&'a [u8], Error> {
        let len = self.u16()? as usize;
        self.bytes(len)
    }

    /// `opaque data<0..2^24-1>`
    pub fn vec24(&mut self) -> Result<&'a [u8], Error> {
        let len = self.u24()?;
        self.bytes(len)
    }

    /// Read a `uint16` list with a two-byte length prefix.
    pub fn u16_list(&mut self) -> Result<Vec<u16>, Error> {
        let raw = self.vec16()?;
        if raw.len() % 2 != 0 {
            return Err(malformed());
        }
        Ok(raw.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect())
    }

    /// Fail unless the whole input was consumed.
    pub fn finish(&self) -> Result<(), Error> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(malformed())
        }
    }
}

pub fn put_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

pub fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_u24(out: &mut Vec<u8>, v: usize) {
    debug_assert!(v < 1 << 24);
    out.extend_from_slice(&[(v >> 16) as u8, (v >> 8) as u8, v as u8]);
}

pub fn put_vec8(out: &mut Vec<u8>, data: &[u8]) {
    debug_assert!(data.len() <= u8::MAX as usize);
    put_u8(out, data.len() as u8);
    out.extend_from_slice(data);
}

pub fn put_vec16(out: &mut Vec<u8>, data: &[u8]) {
    debug_assert!(data.len() <= u16::MAX as usize);
    put_u16(out, data.len() as u16);
    out.extend_from_slice(data);
}

pub fn put_vec24(out: &mut Vec<u8>, data: &[u8]) {
    put_u24(out, data.len());
    out.extend_from_slice(data);
}

/// Write a two-byte length placeholder, run `body`, then patch the length.
pub fn nested16(out: &mut Vec<u8>, body: impl FnOnce(&mut Vec<u8>)) {
    let at = out.len();
    out.extend_from_slice(&[0, 0]);
    body(out);
    let len = out.len() - at - 2;
    debug_assert!(len <= u16::MAX as usize);
    out[at..at + 2].copy_from_slice(&(len as u16).to_be_bytes());
}

/// Three-byte variant of [`nested16`].
pub fn nested24(out: &mut Vec<u8>, body: impl FnOnce(&mut Vec<u8>)) {
    let at = out.len();
    out.extend_from_slice(&[0, 0, 0]);
    body(out);
    let len = out.len() - at - 3;
    out[at] = (len >> 16) as u8;
    out[at + 1] = (len >> 8) as u8;
    out[at + 2] = len as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_fields() {
        let data = [0x01, 0x02, 0x03, 0x00, 0x00, 0x02, 0xaa, 0xbb, 0x07];
        let mut r = Reader::new(&data);
        assert_eq!(r.u16().unwrap(), 0x0102);
        assert_eq!(r.u8().unwrap(), 0x03);
        assert_eq!(r.vec24().unwrap(), &[0xaa, 0xbb]);
        assert_eq!(r.remaining(), 1);
        assert!(r.finish().is_err());
        r.u8().unwrap();
        r.finish().unwrap();
    }

    #[test]
    fn short_input_is_malformed() {
        let mut r = Reader::new(&[0x00, 0x05, 0x01]);
        assert_eq!(
            r.vec16(),
            Err(Error::HandshakeFailure(HandshakeFailureReason::Malformed))
        );
    }

    #[test]
    fn odd_u16_list_is_malformed() {
        let mut r = Reader::new(&[0x00, 0x03, 0x00, 0x1d, 0x00]);
        assert!(r.u16_list().is_err());
    }

    #[test]
    fn nested_lengths_are_patched() {
        let mut out = Vec::new();
        nested16(&mut out, |out| {
            put_u16(out, 0x1234);
            nested24(out, |out| out.extend_from_slice(b"abc"));
        });
        assert_eq!(out, [0x00, 0x08, 0x12, 0x34, 0x00, 0x00, 0x03, b'a', b'b', b'c']);
    }
}
