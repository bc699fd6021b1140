//! Btree cells hold records, which carry the column values of a SQL row.
//!
//! A record begins with a header whose first varint is the byte-length of the
//! header including that varint itself, followed by one serial-type varint per
//! column. The header is immediately followed by the concatenated column values, in
//! the same order.
//! See: <https://www.sqlite.org/fileformat.html#record_format>.

use crate::dbinfo::TextEncoding;
use crate::serial_type::{self, ColumnKind, Value};
use crate::varint;

/// A record header may not declare more than this many bytes of serial-type body;
/// beyond this the self-referential header-size varint would need a third byte,
/// which this format never produces.
const MAX_HEADER_BODY_LEN: usize = 32765;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Varint(#[from] varint::Error),
    #[error(transparent)]
    SerialType(#[from] serial_type::Error),
    #[error("record header body of {size} bytes exceeds the supported maximum of {MAX_HEADER_BODY_LEN}")]
    OversizeRecordHeader { size: usize },
}

/// A single column's descriptor alongside its decoded value.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub kind: ColumnKind,
    pub value: Value,
}

/// A decoded SQLite record: an ordered sequence of (kind, value) columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub columns: Vec<Column>,
}

impl Record {
    /// Decodes a record starting at `cursor` in `buf`.
    ///
    /// Returns the decoded record and the cursor position immediately past its last
    /// value byte.
    pub fn decode(
        buf: &[u8],
        cursor: usize,
        text_encoding: TextEncoding,
    ) -> Result<(Record, usize), Error> {
        let header_start = cursor;
        let (header_size, mut c) = varint::decode(buf, cursor)?;
        let header_end = header_start + header_size as usize;

        let mut kinds = Vec::new();
        while c < header_end {
            let (serial_type, next) = varint::decode(buf, c)?;
            kinds.push(serial_type::decode_serial_type(serial_type)?);
            c = next;
        }

        let mut columns = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let (value, next) = serial_type::decode_value(kind, buf, c, text_encoding)?;
            columns.push(Column { kind, value });
            c = next;
        }

        Ok((Record { columns }, c))
    }

    /// Encodes this record to its on-disk bytes: the self-referential header,
    /// followed by the concatenated value bodies.
    pub fn encode(&self, text_encoding: TextEncoding) -> Result<Vec<u8>, Error> {
        let mut body = Vec::new();
        for column in &self.columns {
            body.extend(varint::encode(serial_type::encode_serial_type(column.kind)));
        }
        if body.len() >= MAX_HEADER_BODY_LEN {
            return Err(Error::OversizeRecordHeader { size: body.len() });
        }

        // The header-size varint includes its own length, so pick the varint width
        // the way the total will actually encode: 1 byte if body.len() + 1 fits in 7
        // bits, else 2 bytes. Both cases are well within u64 range, so encoding
        // `header_size` can never itself need a 9-byte varint here.
        let header_size_varint_len = if body.len() + 1 < 128 { 1 } else { 2 };
        let header_size = body.len() + header_size_varint_len;

        let mut out = varint::encode(header_size as u64);
        out.extend(body);
        for column in &self.columns {
            out.extend(serial_type::encode_value(column.kind, &column.value, text_encoding));
        }
        Ok(out)
    }
}
