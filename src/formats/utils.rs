//! Bounds-checked primitive reads over byte slices.

use crate::formats::error::{ParseError, ParseResult};

/// Extension trait for reading little-endian primitives from byte slices.
///
/// All reads return `None` instead of panicking when the requested range
/// falls outside the slice, including on offset overflow.
pub trait ReadExt {
    fn read_u16_le_at(&self, offset: usize) -> Option<u16>;
    fn read_u32_le_at(&self, offset: usize) -> Option<u32>;
    fn read_array_at<const N: usize>(&self, offset: usize) -> Option<[u8; N]>;
    fn read_slice_at(&self, offset: usize, len: usize) -> Option<&[u8]>;
    fn read_cstring_at(&self, offset: usize, max_len: usize) -> Option<&[u8]>;
}

impl ReadExt for [u8] {
    #[inline(always)]
    fn read_u16_le_at(&self, offset: usize) -> Option<u16> {
        self.read_array_at::<2>(offset).map(u16::from_le_bytes)
    }

    #[inline(always)]
    fn read_u32_le_at(&self, offset: usize) -> Option<u32> {
        self.read_array_at::<4>(offset).map(u32::from_le_bytes)
    }

    #[inline(always)]
    fn read_array_at<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        self.read_slice_at(offset, N).and_then(|b| b.try_into().ok())
    }

    #[inline(always)]
    fn read_slice_at(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.get(offset..end)
    }

    /// Bytes up to (not including) the first NUL, scanning at most `max_len`
    /// bytes. A missing terminator yields the whole scanned window.
    fn read_cstring_at(&self, offset: usize, max_len: usize) -> Option<&[u8]> {
        let end = offset.saturating_add(max_len).min(self.len());
        let slice = self.get(offset..end)?;
        let len = memchr::memchr(0, slice).unwrap_or(slice.len());
        Some(&slice[..len])
    }
}

/// Read a `u16` or report which structure was cut short.
pub fn u16_at(data: &[u8], offset: usize, what: &'static str) -> ParseResult<u16> {
    data.read_u16_le_at(offset)
        .ok_or_else(|| truncated(what, offset.saturating_add(2), data.len()))
}

/// Read a `u32` or report which structure was cut short.
pub fn u32_at(data: &[u8], offset: usize, what: &'static str) -> ParseResult<u32> {
    data.read_u32_le_at(offset)
        .ok_or_else(|| truncated(what, offset.saturating_add(4), data.len()))
}

/// Borrow `len` bytes at `offset` or report which structure was cut short.
pub fn slice_at<'a>(
    data: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> ParseResult<&'a [u8]> {
    data.read_slice_at(offset, len)
        .ok_or_else(|| truncated(what, offset.saturating_add(len), data.len()))
}

fn truncated(what: &'static str, expected: usize, actual: usize) -> ParseError {
    ParseError::Truncated {
        what,
        expected,
        actual,
    }
}

/// Align a value up to the specified power-of-two alignment
#[inline(always)]
pub fn align_up(value: usize, alignment: usize) -> Option<usize> {
    if alignment == 0 {
        return Some(value);
    }
    Some(value.checked_add(alignment - 1)? & !(alignment - 1))
}

/// Number of `block_size` blocks needed to hold `len` bytes.
#[inline(always)]
pub fn block_count(len: usize, block_size: usize) -> usize {
    if block_size == 0 {
        0
    } else {
        len.div_ceil(block_size)
    }
}
