//! Table-leaf cells hold one row each: a payload length, a row id, and the row's
//! record, packed back-to-back with no padding.
//! See: <https://www.sqlite.org/fileformat.html#b_tree_pages>.

use crate::dbinfo::TextEncoding;
use crate::record::{self, Record};
use crate::varint;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Varint(#[from] varint::Error),
    #[error(transparent)]
    Record(#[from] record::Error),
    #[error("needed {need} bytes to decode a cell but buffer only has {have}")]
    ShortBuffer { need: usize, have: usize },
}

/// A decoded table-leaf cell: `varint(payload_size) || varint(row_id) || record`.
///
/// This core does not support overflow pages, so a cell's record is assumed to fit
/// entirely within the page that references it.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLeafCell {
    pub row_id: i64,
    pub record: Record,
}

impl TableLeafCell {
    pub fn new(row_id: i64, record: Record) -> TableLeafCell {
        TableLeafCell { row_id, record }
    }

    /// Decodes a cell starting at `cursor` in `buf`.
    pub fn decode(
        buf: &[u8],
        cursor: usize,
        text_encoding: TextEncoding,
    ) -> Result<TableLeafCell, Error> {
        let (payload_size, c) = varint::decode(buf, cursor)?;
        let (row_id, c) = varint::decode(buf, c)?;
        if buf.len() < c + payload_size as usize {
            return Err(Error::ShortBuffer { need: c + payload_size as usize, have: buf.len() });
        }
        let (record, _) = Record::decode(buf, c, text_encoding)?;
        Ok(TableLeafCell { row_id: row_id as i64, record })
    }

    /// Encodes this cell to its on-disk bytes. The payload-size varint is always
    /// recomputed from the freshly-encoded record, not carried over from whatever
    /// length the cell was originally decoded with.
    pub fn encode(&self, text_encoding: TextEncoding) -> Result<Vec<u8>, Error> {
        let record_bytes = self.record.encode(text_encoding)?;
        let mut out = varint::encode(record_bytes.len() as u64);
        out.extend(varint::encode(self.row_id as u64));
        out.extend(record_bytes);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Column;
    use crate::serial_type::{ColumnKind, Value};

    fn sample_record() -> Record {
        Record { columns: vec![Column { kind: ColumnKind::I8, value: Value::Int(5) }] }
    }

    #[test]
    fn decode_simple_cell() {
        // payload_size=3, row_id=1, record=[header_size=2, serial_type=1, value=5]
        let data: &[u8] = &[0x03, 0x01, 0x02, 0x01, 0x05];
        let cell = TableLeafCell::decode(data, 0, TextEncoding::Utf8).unwrap();
        assert_eq!(cell.row_id, 1);
        assert_eq!(cell.record, sample_record());
    }

    #[test]
    fn encode_decode_round_trip() {
        let cell = TableLeafCell::new(42, sample_record());
        let bytes = cell.encode(TextEncoding::Utf8).unwrap();
        let decoded = TableLeafCell::decode(&bytes, 0, TextEncoding::Utf8).unwrap();
        assert_eq!(decoded, cell);
    }

    #[test]
    fn encode_recomputes_payload_size() {
        let cell = TableLeafCell::new(1, sample_record());
        let bytes = cell.encode(TextEncoding::Utf8).unwrap();
        let (payload_size, c) = varint::decode(&bytes, 0).unwrap();
        let record_bytes = cell.record.encode(TextEncoding::Utf8).unwrap();
        assert_eq!(payload_size, record_bytes.len() as u64);
        let (_row_id, c2) = varint::decode(&bytes, c).unwrap();
        assert_eq!(bytes.len() - c2, record_bytes.len());
    }

    #[test]
    fn decode_reports_short_buffer_for_truncated_payload() {
        let data: &[u8] = &[0x05, 0x01, 0x02, 0x01];
        assert_eq!(
            TableLeafCell::decode(data, 0, TextEncoding::Utf8).unwrap_err(),
            Error::ShortBuffer { need: 7, have: 4 }
        );
    }
}
