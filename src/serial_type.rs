//! serial_type maps between SQLite's integer "serial type" codes and the
//! `(ColumnKind, byte-length)` pairs and values they describe.
//!
//! Serial Type   Content Size   Meaning
//! 0             0              NULL
//! 1             1              big-endian signed 8-bit integer
//! 2             2              big-endian signed 16-bit integer
//! 3             3              big-endian signed 24-bit integer
//! 4             4              big-endian signed 32-bit integer
//! 5             6              big-endian signed 48-bit integer
//! 6             8              big-endian signed 64-bit integer
//! 7             8              big-endian IEEE 754-2008 64-bit float
//! 8             0              integer 0
//! 9             0              integer 1
//! 10, 11        -              reserved, never valid in a well-formed record
//! N>=12, even   (N-12)/2       BLOB of that length
//! N>=13, odd    (N-13)/2       TEXT of that length, in the database's text encoding
//! See: <https://www.sqlite.org/fileformat.html#record_format>.

use crate::dbinfo::TextEncoding;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("serial type {value} is reserved for internal use and may not appear in a record")]
    ReservedSerialType { value: u64 },
    #[error("needed {need} bytes to decode a value but buffer only has {have}")]
    ShortBuffer { need: usize, have: usize },
    #[error("text value was not valid {encoding:?}")]
    InvalidText { encoding: TextEncoding },
}

/// The closed set of column kinds a serial type can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Null,
    I8,
    I16,
    I24,
    I32,
    I48,
    I64,
    F64,
    ConstZero,
    ConstOne,
    Blob { length: u64 },
    Text { length: u64 },
}

impl ColumnKind {
    /// The number of payload bytes this kind's value occupies in a record body.
    pub fn value_len(&self) -> u64 {
        match self {
            ColumnKind::Null | ColumnKind::ConstZero | ColumnKind::ConstOne => 0,
            ColumnKind::I8 => 1,
            ColumnKind::I16 => 2,
            ColumnKind::I24 => 3,
            ColumnKind::I32 => 4,
            ColumnKind::I48 => 6,
            ColumnKind::I64 | ColumnKind::F64 => 8,
            ColumnKind::Blob { length } | ColumnKind::Text { length } => *length,
        }
    }
}

/// Converts a serial type code into the `ColumnKind` it describes.
///
/// Rejects 10 and 11, which the format reserves for SQLite's internal use and which
/// must never appear in a well-formed record. Unlike some SQLite-derived
/// implementations, this does not coerce unrecognized codes into BLOB or TEXT.
pub fn decode_serial_type(s: u64) -> Result<ColumnKind, Error> {
    match s {
        0 => Ok(ColumnKind::Null),
        1 => Ok(ColumnKind::I8),
        2 => Ok(ColumnKind::I16),
        3 => Ok(ColumnKind::I24),
        4 => Ok(ColumnKind::I32),
        5 => Ok(ColumnKind::I48),
        6 => Ok(ColumnKind::I64),
        7 => Ok(ColumnKind::F64),
        8 => Ok(ColumnKind::ConstZero),
        9 => Ok(ColumnKind::ConstOne),
        10 | 11 => Err(Error::ReservedSerialType { value: s }),
        n if n % 2 == 0 => Ok(ColumnKind::Blob { length: (n - 12) / 2 }),
        n => Ok(ColumnKind::Text { length: (n - 13) / 2 }),
    }
}

/// Converts a `ColumnKind` back into its serial type code.
pub fn encode_serial_type(kind: ColumnKind) -> u64 {
    match kind {
        ColumnKind::Null => 0,
        ColumnKind::I8 => 1,
        ColumnKind::I16 => 2,
        ColumnKind::I24 => 3,
        ColumnKind::I32 => 4,
        ColumnKind::I48 => 5,
        ColumnKind::I64 => 6,
        ColumnKind::F64 => 7,
        ColumnKind::ConstZero => 8,
        ColumnKind::ConstOne => 9,
        ColumnKind::Blob { length } => 12 + 2 * length,
        ColumnKind::Text { length } => 13 + 2 * length,
    }
}

/// A decoded column value. Holds an owned copy so a `Record` can outlive the buffer
/// it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Real(f64),
    Blob(Vec<u8>),
    Text(String),
}

/// Sign-extends a big-endian two's-complement integer of `width` bytes (1-8) into
/// an `i64`.
fn read_signed_be(bytes: &[u8]) -> i64 {
    let width = bytes.len();
    debug_assert!((1..=8).contains(&width));
    let negative = bytes[0] & 0x80 != 0;
    let mut buf = [if negative { 0xff } else { 0x00 }; 8];
    buf[8 - width..].copy_from_slice(bytes);
    i64::from_be_bytes(buf)
}

/// Writes the low `width` bytes of `value`'s big-endian two's-complement
/// representation.
fn write_signed_be(value: i64, width: usize) -> Vec<u8> {
    let full = value.to_be_bytes();
    full[8 - width..].to_vec()
}

/// Decodes a single column value of kind `kind` starting at `cursor` in `buf`.
///
/// Returns the decoded value and the cursor position immediately past it.
pub fn decode_value(
    kind: ColumnKind,
    buf: &[u8],
    cursor: usize,
    text_encoding: TextEncoding,
) -> Result<(Value, usize), Error> {
    let len = kind.value_len() as usize;
    let end = cursor + len;
    let slice = buf
        .get(cursor..end)
        .ok_or(Error::ShortBuffer { need: end, have: buf.len() })?;

    let value = match kind {
        ColumnKind::Null => Value::Null,
        ColumnKind::I8 | ColumnKind::I16 | ColumnKind::I24 | ColumnKind::I32 | ColumnKind::I48
        | ColumnKind::I64 => Value::Int(read_signed_be(slice)),
        ColumnKind::F64 => {
            let mut c = Cursor::new(slice);
            Value::Real(c.read_f64::<BigEndian>().expect("slice length checked above"))
        }
        ColumnKind::ConstZero => Value::Int(0),
        ColumnKind::ConstOne => Value::Int(1),
        ColumnKind::Blob { .. } => Value::Blob(slice.to_vec()),
        ColumnKind::Text { .. } => Value::Text(decode_text(slice, text_encoding)?),
    };
    Ok((value, end))
}

/// Encodes a column value of kind `kind` to its on-disk byte representation.
///
/// The caller must supply a value consistent with `kind` (e.g. `Value::Int` for an
/// integer kind); mismatches panic, since this is an internal invariant between a
/// `Record`'s column descriptors and its values, not a user input boundary.
pub fn encode_value(kind: ColumnKind, value: &Value, text_encoding: TextEncoding) -> Vec<u8> {
    match (kind, value) {
        (ColumnKind::Null, Value::Null) => Vec::new(),
        (ColumnKind::ConstZero, Value::Int(0)) => Vec::new(),
        (ColumnKind::ConstOne, Value::Int(1)) => Vec::new(),
        (ColumnKind::I8, Value::Int(v)) => write_signed_be(*v, 1),
        (ColumnKind::I16, Value::Int(v)) => write_signed_be(*v, 2),
        (ColumnKind::I24, Value::Int(v)) => write_signed_be(*v, 3),
        (ColumnKind::I32, Value::Int(v)) => write_signed_be(*v, 4),
        (ColumnKind::I48, Value::Int(v)) => write_signed_be(*v, 6),
        (ColumnKind::I64, Value::Int(v)) => write_signed_be(*v, 8),
        (ColumnKind::F64, Value::Real(f)) => {
            let mut out = Vec::with_capacity(8);
            out.write_f64::<BigEndian>(*f).expect("writing to a Vec cannot fail");
            out
        }
        (ColumnKind::Blob { .. }, Value::Blob(b)) => b.clone(),
        (ColumnKind::Text { .. }, Value::Text(s)) => encode_text(s, text_encoding),
        (k, v) => panic!("value {v:?} does not match column kind {k:?}"),
    }
}

fn decode_text(bytes: &[u8], encoding: TextEncoding) -> Result<String, Error> {
    match encoding {
        TextEncoding::Utf8 => std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| Error::InvalidText { encoding }),
        TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
            if bytes.len() % 2 != 0 {
                return Err(Error::InvalidText { encoding });
            }
            let units = bytes.chunks_exact(2).map(|pair| {
                if encoding == TextEncoding::Utf16Le {
                    u16::from_le_bytes([pair[0], pair[1]])
                } else {
                    u16::from_be_bytes([pair[0], pair[1]])
                }
            });
            char::decode_utf16(units)
                .collect::<Result<String, _>>()
                .map_err(|_| Error::InvalidText { encoding })
        }
    }
}

fn encode_text(s: &str, encoding: TextEncoding) -> Vec<u8> {
    match encoding {
        TextEncoding::Utf8 => s.as_bytes().to_vec(),
        TextEncoding::Utf16Le => s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
        TextEncoding::Utf16Be => s.encode_utf16().flat_map(|u| u.to_be_bytes()).collect(),
    }
}
