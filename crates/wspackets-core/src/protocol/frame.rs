//! Length-prefixed field primitives (panic-free).
//!
//! Parsing rules:
//! - Never index (`buf[0]`), always check `remaining()` through `Buf`.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use bytes::{Buf, BufMut, Bytes};

use crate::error::{Result, WspError};

/// Width of every length prefix.
pub const LEN_PREFIX: usize = 4;

/// Read one `u32`-prefixed byte field.
pub fn read_bytes(buf: &mut impl Buf) -> Result<Bytes> {
    if buf.remaining() < LEN_PREFIX {
        return Err(WspError::Truncated {
            needed: LEN_PREFIX,
            remaining: buf.remaining(),
        });
    }
    let len = buf.get_u32_le() as usize;
    if buf.remaining() < len {
        return Err(WspError::Truncated {
            needed: len,
            remaining: buf.remaining(),
        });
    }
    Ok(buf.copy_to_bytes(len))
}

/// Read one `u32`-prefixed UTF-8 field.
pub fn read_string(buf: &mut impl Buf) -> Result<String> {
    let raw = read_bytes(buf)?;
    String::from_utf8(raw.to_vec()).map_err(|_| WspError::InvalidUtf8)
}

/// Write `data` behind its `u32` length.
pub fn write_bytes(buf: &mut impl BufMut, data: &[u8]) -> Result<()> {
    let len = u32::try_from(data.len()).map_err(|_| WspError::FrameTooLarge {
        len: data.len(),
        max: u32::MAX as usize,
    })?;
    buf.put_u32_le(len);
    buf.put_slice(data);
    Ok(())
}

pub fn write_string(buf: &mut impl BufMut, s: &str) -> Result<()> {
    write_bytes(buf, s.as_bytes())
}
