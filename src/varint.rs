//! varint reads and writes SQLite's variable-length big-endian integer format.
//!
//! A varint is 1 to 9 bytes. Each of the first 8 bytes contributes 7 bits of data in
//! its low bits, with the high bit set if another byte follows. If all 8 bytes set
//! their continuation bit, a 9th byte contributes all 8 of its bits, extending the
//! representable range from 56 to 64 bits.
//! See: <https://www.sqlite.org/fileformat.html#varint>.

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("varint decode needed byte {need} but buffer only has {have} bytes")]
    ShortBuffer { need: usize, have: usize },
}

/// Reads a varint starting at `cursor` in `buf`.
///
/// Returns the decoded value and the cursor position immediately following the
/// varint. Accepts non-canonical encodings (more bytes than strictly necessary),
/// per the format's requirement that decoders tolerate them.
///
/// # Panics
///
/// Does not panic.
pub fn decode(buf: &[u8], cursor: usize) -> Result<(u64, usize), Error> {
    let mut result: u64 = 0;
    for i in 0..8 {
        let byte = *buf
            .get(cursor + i)
            .ok_or(Error::ShortBuffer { need: cursor + i + 1, have: buf.len() })?;
        result = (result << 7) | (byte & 0x7f) as u64;
        if byte & 0x80 == 0 {
            return Ok((result, cursor + i + 1));
        }
    }
    // Eighth byte still had its continuation bit set: read a ninth byte and fold
    // in all 8 of its bits, not just the low 7.
    let byte = *buf
        .get(cursor + 8)
        .ok_or(Error::ShortBuffer { need: cursor + 9, have: buf.len() })?;
    result = (result << 8) | byte as u64;
    Ok((result, cursor + 9))
}

/// Encodes `value` as a canonical 1-to-9 byte varint.
///
/// # Panics
///
/// Does not panic.
pub fn encode(value: u64) -> Vec<u8> {
    const TOP_SEVEN_BITS: u64 = 0xfe00_0000_0000_0000;
    if value & TOP_SEVEN_BITS != 0 {
        // 9-byte form: the last byte holds the low 8 bits verbatim; the remaining
        // 56 bits are distributed 7-per-byte across the first 8 bytes, MSB-first.
        let mut out = Vec::with_capacity(9);
        let mut rest = value >> 8;
        let mut head = [0u8; 8];
        for slot in head.iter_mut().rev() {
            *slot = ((rest & 0x7f) as u8) | 0x80;
            rest >>= 7;
        }
        out.extend_from_slice(&head);
        out.push((value & 0xff) as u8);
        return out;
    }
    let mut out = Vec::with_capacity(1);
    out.push((value & 0x7f) as u8);
    let mut rest = value >> 7;
    while rest > 0 {
        out.insert(0, ((rest & 0x7f) as u8) | 0x80);
        rest >>= 7;
    }
    out
}

/// Returns the number of bytes `encode(value)` would produce, without allocating.
pub fn encoded_len(value: u64) -> usize {
    const TOP_SEVEN_BITS: u64 = 0xfe00_0000_0000_0000;
    if value & TOP_SEVEN_BITS != 0 {
        return 9;
    }
    let mut rest = value >> 7;
    let mut len = 1;
    while rest > 0 {
        len += 1;
        rest >>= 7;
    }
    len
}
