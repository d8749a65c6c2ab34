//! Bounds-checked Big Endian reader over a byte slice.
//!
//! Every read either succeeds completely or returns
//! [`RlogError::TruncatedStream`] without moving the position, so callers can
//! treat a failed record as "not consumed yet".

use crate::error::{RlogError, Result};

pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(RlogError::TruncatedStream {
                needed: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub(crate) fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub(crate) fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    /// `u16` length-prefixed UTF-8 string; invalid sequences are replaced.
    pub(crate) fn string(&mut self) -> Result<String> {
        let start = self.pos;
        let len = self.u16()? as usize;
        match self.take(len) {
            Ok(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            Err(e) => {
                self.pos = start;
                Err(e)
            }
        }
    }
}
