//! Fixed-width big-endian field extraction
//!
//! The decoder validates the report length once up front; these helpers
//! still check bounds so a bad offset fails fast instead of panicking.

use crate::error::{QuadroError, Result};

/// Read the big-endian `u16` at `offset`
#[inline]
pub fn read_u16(buf: &[u8], offset: usize) -> Result<u16> {
    let bytes: [u8; 2] = field(buf, offset)?;
    Ok(u16::from_be_bytes(bytes))
}

/// Read the big-endian `u32` at `offset`
#[inline]
pub fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    let bytes: [u8; 4] = field(buf, offset)?;
    Ok(u32::from_be_bytes(bytes))
}

fn field<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N]> {
    let end = offset.checked_add(N).ok_or(QuadroError::ReportTooShort {
        len: buf.len(),
        required: usize::MAX,
    })?;

    buf.get(offset..end)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(QuadroError::ReportTooShort {
            len: buf.len(),
            required: end,
        })
}
