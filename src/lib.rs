//! A read/rewrite codec for the SQLite 3 on-disk database file format.
//!
//! This crate parses the fixed 100-byte database header (`dbinfo`), B-tree page
//! headers and table-leaf cells (`btree`), per-row records (`record`), SQLite's
//! serial-type value encoding (`serial_type`), and the variable-length integer
//! format those all build on (`varint`). Each of `dbinfo::DbInfo::decode` and
//! `btree::Page::decode` can be paired with their `encode`/`encode_table_leaf`
//! counterpart to rewrite a page byte-for-byte. `pager` is a convenience
//! file-backed implementation of the page-read/page-write collaborator the codec
//! is built around; the codec modules themselves only ever see `&[u8]`.

pub mod btree;
pub mod dbinfo;
pub mod pager;
pub mod record;
pub mod serial_type;
pub mod varint;
