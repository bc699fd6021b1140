//! btree decodes and encodes a single SQLite B-tree page: the page header, the cell
//! pointer array, the free middle region, and the cell content region (which grows
//! leftward from the end of the page as cells are added).
//!
//! A page is divided into regions in the following order:
//! 1. The 100-byte database file header (page 1 only).
//! 2. The 8 or 12 byte b-tree page header.
//! 3. The cell pointer array.
//! 4. Unallocated space.
//! 5. The cell content area, packed right-to-left.
//! 6. The reserved region (assumed empty; this core does not support it).
//! See: <https://www.sqlite.org/fileformat.html#b_tree_pages>.

pub mod cell;

use crate::dbinfo::TextEncoding;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use cell::TableLeafCell;
use std::io::Cursor;

/// Length, in bytes, of the database header prefix on page 1.
pub const DB_HEADER_LEN: usize = 100;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("byte {value:#04x} is not a known b-tree page type")]
    UnknownNodeType { value: u8 },
    #[error("needed {need} bytes to decode a page field but buffer only has {have}")]
    ShortBuffer { need: usize, have: usize },
    #[error("page overflowed by {by} bytes while encoding")]
    PageOverflow { by: usize },
    #[error("cell decoding is only supported for table-leaf pages, found {node_type:?}")]
    UnsupportedNodeTypeForCellDecoding { node_type: NodeType },
    #[error(transparent)]
    Cell(#[from] cell::Error),
}

/// The four kinds of B-tree page this format defines. Only `TableLeaf` cells are
/// decoded by this core; the other three are recognized by their header byte but
/// their cell content is left unparsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    IndexInterior = 2,
    TableInterior = 5,
    IndexLeaf = 10,
    TableLeaf = 13,
}

impl NodeType {
    fn from_byte(b: u8) -> Result<NodeType, Error> {
        match b {
            2 => Ok(NodeType::IndexInterior),
            5 => Ok(NodeType::TableInterior),
            10 => Ok(NodeType::IndexLeaf),
            13 => Ok(NodeType::TableLeaf),
            value => Err(Error::UnknownNodeType { value }),
        }
    }

    fn is_leaf(self) -> bool {
        matches!(self, NodeType::IndexLeaf | NodeType::TableLeaf)
    }

    /// Length, in bytes, of this node type's page header.
    fn header_len(self) -> usize {
        if self.is_leaf() { 8 } else { 12 }
    }
}

/// A decoded B-tree page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub node_type: NodeType,
    pub first_freeblock: u16,
    pub cell_content_start: u16,
    pub num_fragmented_free_bytes: u8,
    pub right_pointer: Option<u32>,
    pub cells: Vec<TableLeafCell>,
    pub page_size: usize,
    pub has_db_header: bool,
}

impl Page {
    /// Decodes a page from `buf`, whose length is the page size.
    ///
    /// `has_db_header` must be `true` for page 1, which carries the 100-byte
    /// database header ahead of the b-tree page header, and `false` for every other
    /// page. Cells are only decoded for table-leaf pages; other node types decode
    /// their header with an empty cell list.
    pub fn decode(buf: &[u8], has_db_header: bool, text_encoding: TextEncoding) -> Result<Page, Error> {
        let h = if has_db_header { DB_HEADER_LEN } else { 0 };
        if buf.len() < h + 8 {
            return Err(Error::ShortBuffer { need: h + 8, have: buf.len() });
        }

        let mut c = Cursor::new(&buf[h..]);
        let node_type = NodeType::from_byte(c.read_u8().expect("length checked above"))?;
        let first_freeblock = c.read_u16::<BigEndian>().expect("length checked above");
        let num_cells = c.read_u16::<BigEndian>().expect("length checked above");
        let cell_content_start = c.read_u16::<BigEndian>().expect("length checked above");
        let num_fragmented_free_bytes = c.read_u8().expect("length checked above");

        let header_len = node_type.header_len();
        if buf.len() < h + header_len {
            return Err(Error::ShortBuffer { need: h + header_len, have: buf.len() });
        }
        let right_pointer = if node_type.is_leaf() {
            None
        } else {
            Some(
                Cursor::new(&buf[h + 8..])
                    .read_u32::<BigEndian>()
                    .map_err(|_| Error::ShortBuffer { need: h + 12, have: buf.len() })?,
            )
        };

        let pointer_array_start = h + header_len;
        let pointer_array_end = pointer_array_start + 2 * num_cells as usize;
        if buf.len() < pointer_array_end {
            return Err(Error::ShortBuffer { need: pointer_array_end, have: buf.len() });
        }

        let mut cells = Vec::new();
        if node_type == NodeType::TableLeaf {
            for i in 0..num_cells as usize {
                let offset = pointer_array_start + 2 * i;
                let pointer = (&buf[offset..offset + 2])
                    .read_u16::<BigEndian>()
                    .expect("bounds checked above") as usize;
                cells.push(TableLeafCell::decode(buf, pointer, text_encoding)?);
            }
        }

        Ok(Page {
            node_type,
            first_freeblock,
            cell_content_start,
            num_fragmented_free_bytes,
            right_pointer,
            cells,
            page_size: buf.len(),
            has_db_header,
        })
    }

    /// Encodes a table-leaf page back to a buffer of exactly `self.page_size` bytes.
    ///
    /// Cells are packed right-to-left starting at the end of the page, in
    /// `self.cells` order: the first cell in the list becomes the rightmost cell on
    /// the page, and the first entry in the cell pointer array. The page is always
    /// emitted freshly defragmented: `first_freeblock` and
    /// `num_fragmented_free_bytes` are both written as zero regardless of what this
    /// `Page` carries, and the database-header prefix (if any) is not included --
    /// callers that need it prepend `DbInfo::encode()` themselves.
    pub fn encode_table_leaf(&self, text_encoding: TextEncoding) -> Result<Vec<u8>, Error> {
        if self.node_type != NodeType::TableLeaf {
            return Err(Error::UnsupportedNodeTypeForCellDecoding { node_type: self.node_type });
        }
        let h = if self.has_db_header { DB_HEADER_LEN } else { 0 };
        let header_len = self.node_type.header_len();

        let encoded_cells = self
            .cells
            .iter()
            .map(|cell| cell.encode(text_encoding))
            .collect::<Result<Vec<_>, _>>()?;
        let total_cell_len: usize = encoded_cells.iter().map(Vec::len).sum();

        // Checked before any cursor arithmetic: without this, a cell payload larger
        // than the page would underflow the `cursor -= bytes.len()` subtraction
        // below instead of producing `PageOverflow`.
        let occupied = h + header_len + 2 * self.cells.len() + total_cell_len;
        if occupied > self.page_size {
            return Err(Error::PageOverflow { by: occupied - self.page_size });
        }

        let mut cell_content = Vec::with_capacity(total_cell_len);
        let mut pointers = Vec::with_capacity(self.cells.len());
        let mut cursor = self.page_size;
        for bytes in &encoded_cells {
            cursor -= bytes.len();
            pointers.push(cursor as u16);
            // Content grows leftward: each new cell is prepended to what's already there.
            let mut prefixed = bytes.clone();
            prefixed.extend_from_slice(&cell_content);
            cell_content = prefixed;
        }
        let cell_content_start = cursor;

        let mut out = Vec::with_capacity(self.page_size);
        out.write_u8(self.node_type as u8).unwrap();
        out.write_u16::<BigEndian>(0).unwrap(); // first_freeblock, freshly defragmented
        out.write_u16::<BigEndian>(self.cells.len() as u16).unwrap();
        out.write_u16::<BigEndian>(cell_content_start as u16).unwrap();
        out.write_u8(0).unwrap(); // num_fragmented_free_bytes, freshly defragmented
        debug_assert_eq!(out.len(), header_len);

        for p in &pointers {
            out.write_u16::<BigEndian>(*p).unwrap();
        }

        let zero_fill_len = self.page_size - h - header_len - 2 * self.cells.len() - cell_content.len();
        out.resize(out.len() + zero_fill_len, 0);
        out.extend_from_slice(&cell_content);

        debug_assert_eq!(out.len() + h, self.page_size);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Column, Record};
    use crate::serial_type::{ColumnKind, Value};
    use hex::FromHex;

    // Scenario S1 from the format specification: a table-leaf page with two rows,
    // each a (TEXT, small-int) pair, on a 32-byte page.
    fn s1_bytes() -> Vec<u8> {
        Vec::from_hex("0d000000020011000019001100000000000602031101796f0205010311096869").unwrap()
    }

    #[test]
    fn decode_s1_single_cell_table_leaf() {
        let data = s1_bytes();
        assert_eq!(data.len(), 32);
        let page = Page::decode(&data, false, TextEncoding::Utf8).unwrap();
        assert_eq!(page.node_type, NodeType::TableLeaf);
        assert_eq!(page.cells.len(), 2);
        assert_eq!(page.cell_content_start, 17);
        assert_eq!(page.cells[0].row_id, 1);
        assert_eq!(page.cells[0].record.columns[0].value, Value::Text("hi".to_string()));
        assert_eq!(page.cells[1].row_id, 2);
        assert_eq!(page.cells[1].record.columns[0].value, Value::Text("yo".to_string()));
    }

    #[test]
    fn encode_round_trips_s1() {
        let data = s1_bytes();
        let page = Page::decode(&data, false, TextEncoding::Utf8).unwrap();
        let encoded = page.encode_table_leaf(TextEncoding::Utf8).unwrap();
        assert_eq!(encoded, data);
    }

    #[test]
    fn encode_reports_overflow_on_shrunk_page() {
        let data = s1_bytes();
        let mut page = Page::decode(&data, false, TextEncoding::Utf8).unwrap();
        page.page_size = 16;
        let err = page.encode_table_leaf(TextEncoding::Utf8).unwrap_err();
        assert_eq!(err, Error::PageOverflow { by: 11 });
    }

    #[test]
    fn decode_rejects_unknown_node_type() {
        let mut data = s1_bytes();
        data[0] = 0xff;
        assert_eq!(
            Page::decode(&data, false, TextEncoding::Utf8).unwrap_err(),
            Error::UnknownNodeType { value: 0xff }
        );
    }

    #[test]
    fn encode_emits_defragmented_header_regardless_of_input() {
        let data = s1_bytes();
        let mut page = Page::decode(&data, false, TextEncoding::Utf8).unwrap();
        page.first_freeblock = 5;
        page.num_fragmented_free_bytes = 3;
        let encoded = page.encode_table_leaf(TextEncoding::Utf8).unwrap();
        assert_eq!(u16::from_be_bytes([encoded[1], encoded[2]]), 0);
        assert_eq!(encoded[7], 0);
    }

    #[test]
    fn encode_from_scratch_builds_minimal_page() {
        let rec = Record {
            columns: vec![Column { kind: ColumnKind::I8, value: Value::Int(5) }],
        };
        let cell = TableLeafCell::new(1, rec);
        let cell_bytes_len = cell.encode(TextEncoding::Utf8).unwrap().len();
        let page = Page {
            node_type: NodeType::TableLeaf,
            first_freeblock: 0,
            cell_content_start: 0,
            num_fragmented_free_bytes: 0,
            right_pointer: None,
            cells: vec![cell],
            page_size: 32,
            has_db_header: false,
        };
        let encoded = page.encode_table_leaf(TextEncoding::Utf8).unwrap();
        assert_eq!(encoded.len(), 32);
        let decoded = Page::decode(&encoded, false, TextEncoding::Utf8).unwrap();
        assert_eq!(decoded.cells.len(), 1);
        assert_eq!(decoded.cells[0].row_id, 1);
        assert_eq!(decoded.cell_content_start as usize, 32 - cell_bytes_len);
    }

    #[test]
    fn encode_reports_overflow_instead_of_panicking_on_oversize_cell_content() {
        // A single cell whose blob payload alone is larger than the page: the
        // overflow must be caught before the cell-packing cursor ever goes
        // negative.
        let rec = Record {
            columns: vec![Column {
                kind: ColumnKind::Blob { length: 64 },
                value: Value::Blob(vec![0xAB; 64]),
            }],
        };
        let cell = TableLeafCell::new(1, rec);
        let page = Page {
            node_type: NodeType::TableLeaf,
            first_freeblock: 0,
            cell_content_start: 0,
            num_fragmented_free_bytes: 0,
            right_pointer: None,
            cells: vec![cell],
            page_size: 32,
            has_db_header: false,
        };
        let err = page.encode_table_leaf(TextEncoding::Utf8).unwrap_err();
        assert!(matches!(err, Error::PageOverflow { .. }));
    }
}
