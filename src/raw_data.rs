//! A sequential-read cursor over a byte slice, generalized from the
//! upstream `RawData` abstraction used to walk perf-event record bodies.
//! DATE containers never hand us non-contiguous buffers the way an mmap'd
//! ring buffer does, so this version drops the `Split` variant and the
//! string-scanning helpers that existed only for that case, keeping the
//! typed sequential-read API.

use byteorder::ByteOrder;
use std::fmt;

/// A cursor over a borrowed byte slice that advances as fields are read off
/// the front. Mirrors the field-at-a-time parsing style used throughout
/// this crate's decoders (`EventHeader::parse`, `EventFormat::parse`, ...).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawData<'a>(&'a [u8]);

impl<'a> From<&'a [u8]> for RawData<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        RawData(bytes)
    }
}

impl<'a> fmt::Debug for RawData<'a> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(fmt, "RawData({} bytes)", self.0.len())
    }
}

impl<'a> RawData<'a> {
    #[inline]
    pub fn empty() -> Self {
        RawData(&[])
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), std::io::Error> {
        let n = buf.len();
        if self.0.len() < n {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf.copy_from_slice(&self.0[..n]);
        self.0 = &self.0[n..];
        Ok(())
    }

    pub fn read_u64<T: ByteOrder>(&mut self) -> Result<u64, std::io::Error> {
        let mut b = [0; 8];
        self.read_exact(&mut b)?;
        Ok(T::read_u64(&b))
    }

    pub fn read_u32<T: ByteOrder>(&mut self) -> Result<u32, std::io::Error> {
        let mut b = [0; 4];
        self.read_exact(&mut b)?;
        Ok(T::read_u32(&b))
    }

    pub fn read_i32<T: ByteOrder>(&mut self) -> Result<i32, std::io::Error> {
        let mut b = [0; 4];
        self.read_exact(&mut b)?;
        Ok(T::read_i32(&b))
    }

    pub fn read_u16<T: ByteOrder>(&mut self) -> Result<u16, std::io::Error> {
        let mut b = [0; 2];
        self.read_exact(&mut b)?;
        Ok(T::read_u16(&b))
    }

    pub fn read_u8(&mut self) -> Result<u8, std::io::Error> {
        let mut b = [0; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    /// Returns the first `n` bytes, and sets self to the remainder.
    pub fn split_off_prefix(&mut self, n: usize) -> Result<Self, std::io::Error> {
        if self.0.len() < n {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        Ok(RawData(head))
    }

    pub fn skip(&mut self, n: usize) -> Result<(), std::io::Error> {
        if self.0.len() < n {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        self.0 = &self.0[n..];
        Ok(())
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod test {
    use super::RawData;
    use byteorder::LittleEndian;

    #[test]
    fn reads_advance_the_cursor() {
        let bytes = [1, 0, 0, 0, 2, 0, 0, 0];
        let mut data = RawData::from(&bytes[..]);
        assert_eq!(data.read_u32::<LittleEndian>().unwrap(), 1);
        assert_eq!(data.read_u32::<LittleEndian>().unwrap(), 2);
        assert!(data.is_empty());
    }

    #[test]
    fn read_past_end_is_an_error() {
        let bytes = [1, 2, 3];
        let mut data = RawData::from(&bytes[..]);
        assert!(data.read_u32::<LittleEndian>().is_err());
    }

    #[test]
    fn split_off_prefix_yields_independent_cursor() {
        let bytes = [1, 2, 3, 4, 5];
        let mut data = RawData::from(&bytes[..]);
        let prefix = data.split_off_prefix(2).unwrap();
        assert_eq!(prefix.as_slice(), &[1, 2]);
        assert_eq!(data.as_slice(), &[3, 4, 5]);
    }
}
