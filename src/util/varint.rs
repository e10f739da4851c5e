//! Variable-length integer encoding utilities.
//!
//! Integers in the index file are stored big-endian in base 128: every byte
//! except the last has its high bit set, and the value is accumulated most
//! significant group first. A minimal encoding never begins with `0x80`, which
//! is what lets the postings stop marker share the byte space with numbers.

use std::io::Write;

use crate::error::{FerretError, Result};

/// Maximum number of bytes in an encoded u64.
pub const MAX_ENCODED_LEN: usize = 10;

/// Encode a u64 value using variable-length encoding.
pub fn encode_u64(value: u64) -> Vec<u8> {
    let mut groups = [0u8; MAX_ENCODED_LEN];
    let mut len = 0;
    let mut val = value;

    loop {
        groups[len] = (val & 0x7F) as u8;
        len += 1;
        val >>= 7;
        if val == 0 {
            break;
        }
    }

    let mut bytes = Vec::with_capacity(len);
    for i in (0..len).rev() {
        let byte = if i > 0 { groups[i] | 0x80 } else { groups[i] };
        bytes.push(byte);
    }
    bytes
}

/// Decode a u64 value from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed. Running off the end of
/// the slice before the final byte, or a value that does not fit in 64 bits,
/// is an [`FerretError::IndexCorrupt`] error.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;

    for (i, &byte) in bytes.iter().enumerate() {
        // Another group would shift set bits out of the top.
        if i >= MAX_ENCODED_LEN || result > u64::MAX >> 7 {
            return Err(FerretError::corrupt("varint overflow"));
        }

        result = (result << 7) | u64::from(byte & 0x7F);

        if (byte & 0x80) == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(FerretError::corrupt("incomplete varint"))
}

/// Decode a u32 value from the front of `bytes`.
pub fn decode_u32(bytes: &[u8]) -> Result<(u32, usize)> {
    let (value, len) = decode_u64(bytes)?;
    let value =
        u32::try_from(value).map_err(|_| FerretError::corrupt("varint exceeds 32 bits"))?;
    Ok((value, len))
}

/// Write a variable-length encoded u64 to a writer.
pub fn write_u64<W: Write>(writer: &mut W, value: u64) -> Result<usize> {
    let bytes = encode_u64(value);
    writer.write_all(&bytes)?;
    Ok(bytes.len())
}
