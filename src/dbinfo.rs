//! dbinfo reads and writes the 100-byte database file header that prefixes page 1 of
//! a SQLite database file.
//!
//! Offset and size   Description
//! 0      16         The header string: "SQLite format 3\000"
//! 16     2          The database page size in bytes.
//! 18     1          File format write version.
//! 19     1          File format read version.
//! 20     1          Bytes of unused "reserved" space at the end of each page.
//! 21     1          Maximum embedded payload fraction. Must be 64.
//! 22     1          Minimum embedded payload fraction. Must be 32.
//! 23     1          Leaf payload fraction. Must be 32.
//! 24     4          File change counter.
//! 28     4          Size of the database file in pages.
//! 32     4          Page number of the first freelist trunk page.
//! 36     4          Total number of freelist pages.
//! 40     4          The schema cookie.
//! 44     4          The schema format number. Supported schema formats are 1-4.
//! 48     4          Default page cache size.
//! 52     4          The page number of the largest root b-tree page (auto/incr vacuum).
//! 56     4          The database text encoding. 1=UTF-8, 2=UTF-16le, 3=UTF-16be.
//! 60     4          The "user version" as read and set by the user_version pragma.
//! 64     4          True (non-zero) for incremental-vacuum mode.
//! 68     4          The "Application ID" set by PRAGMA application_id.
//! 72     20         Reserved for expansion. Must be zero.
//! 92     4          The version-valid-for number.
//! 96     4          SQLITE_VERSION_NUMBER, packed as major*1000000+minor*1000+patch.
//! See: <https://www.sqlite.org/fileformat.html#the_database_header>.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

pub const HEADER_BYTES: usize = 100;
const MAGIC: &[u8; 16] = b"SQLite format 3\0";
const RESERVED_REGION_LEN: usize = 20;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("buffer too short for a database header: need {need} bytes, have {have}")]
    ShortBuffer { need: usize, have: usize },
    #[error("database header did not start with the SQLite magic string")]
    BadMagic,
    #[error("field `{field}` holds value {value}, which is outside its known domain")]
    UnknownEnumValue { field: &'static str, value: u32 },
}

impl From<std::io::Error> for Error {
    fn from(_: std::io::Error) -> Self {
        Error::ShortBuffer { need: HEADER_BYTES, have: 0 }
    }
}

/// File format write/read version, stored as a single byte (offsets 18, 19).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormatVersion {
    Legacy = 1,
    Wal = 2,
}

impl FileFormatVersion {
    fn from_u8(v: u8, field: &'static str) -> Result<Self, Error> {
        match v {
            1 => Ok(FileFormatVersion::Legacy),
            2 => Ok(FileFormatVersion::Wal),
            _ => Err(Error::UnknownEnumValue { field, value: v as u32 }),
        }
    }
}

/// The database text encoding (offset 56).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8 = 1,
    Utf16Le = 2,
    Utf16Be = 3,
}

impl TextEncoding {
    fn from_u32(v: u32) -> Result<Self, Error> {
        match v {
            1 => Ok(TextEncoding::Utf8),
            2 => Ok(TextEncoding::Utf16Le),
            3 => Ok(TextEncoding::Utf16Be),
            _ => Err(Error::UnknownEnumValue { field: "text_encoding", value: v }),
        }
    }
}

/// The SQLite schema format number (offset 44).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    Format1 = 1,
    Format2 = 2,
    Format3 = 3,
    Format4 = 4,
}

impl SchemaFormat {
    fn from_u32(v: u32) -> Result<Self, Error> {
        match v {
            1 => Ok(SchemaFormat::Format1),
            2 => Ok(SchemaFormat::Format2),
            3 => Ok(SchemaFormat::Format3),
            4 => Ok(SchemaFormat::Format4),
            _ => Err(Error::UnknownEnumValue { field: "schema_format", value: v }),
        }
    }
}

/// A packed decimal SQLite version number: `major*1_000_000 + minor*1_000 + patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    fn from_u32(v: u32) -> Self {
        Version { major: v / 1_000_000, minor: (v / 1_000) % 1_000, patch: v % 1_000 }
    }

    fn to_u32(self) -> u32 {
        self.major * 1_000_000 + self.minor * 1_000 + self.patch
    }
}

/// The decoded 100-byte SQLite database header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbInfo {
    pub page_size: u32,
    pub file_format_write_version: FileFormatVersion,
    pub file_format_read_version: FileFormatVersion,
    pub page_end_reserved_space: u8,
    pub max_embedded_payload_fraction: u8,
    pub min_embedded_payload_fraction: u8,
    pub leaf_payload_fraction: u8,
    pub file_change_counter: u32,
    pub db_size_in_pages: u32,
    pub first_freelist_trunk_page: u32,
    pub num_freelist_pages: u32,
    pub schema_cookie: u32,
    pub schema_format: SchemaFormat,
    pub default_page_cache_size: u32,
    pub largest_btree_root_page: u32,
    pub text_encoding: TextEncoding,
    pub user_version: u32,
    pub incremental_vacuum_mode: u32,
    pub application_id: u32,
    pub version_valid_for: u32,
    pub sqlite_version: Version,
}

impl DbInfo {
    /// Decodes the 100-byte database header from the start of `buf`.
    ///
    /// `buf` must be at least 100 bytes long; only the first 100 are consulted.
    pub fn decode(buf: &[u8]) -> Result<DbInfo, Error> {
        if buf.len() < HEADER_BYTES {
            return Err(Error::ShortBuffer { need: HEADER_BYTES, have: buf.len() });
        }
        let mut c = Cursor::new(buf);

        let mut magic = [0u8; 16];
        c.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::BadMagic);
        }

        let page_size = match c.read_u16::<BigEndian>()? {
            1 => 65536,
            n => n as u32,
        };
        let file_format_write_version =
            FileFormatVersion::from_u8(c.read_u8()?, "file_format_write_version")?;
        let file_format_read_version =
            FileFormatVersion::from_u8(c.read_u8()?, "file_format_read_version")?;
        let page_end_reserved_space = c.read_u8()?;
        let max_embedded_payload_fraction = c.read_u8()?;
        let min_embedded_payload_fraction = c.read_u8()?;
        let leaf_payload_fraction = c.read_u8()?;
        let file_change_counter = c.read_u32::<BigEndian>()?;
        let db_size_in_pages = c.read_u32::<BigEndian>()?;
        let first_freelist_trunk_page = c.read_u32::<BigEndian>()?;
        let num_freelist_pages = c.read_u32::<BigEndian>()?;
        let schema_cookie = c.read_u32::<BigEndian>()?;
        let schema_format = SchemaFormat::from_u32(c.read_u32::<BigEndian>()?)?;
        let default_page_cache_size = c.read_u32::<BigEndian>()?;
        let largest_btree_root_page = c.read_u32::<BigEndian>()?;
        let text_encoding = TextEncoding::from_u32(c.read_u32::<BigEndian>()?)?;
        let user_version = c.read_u32::<BigEndian>()?;
        let incremental_vacuum_mode = c.read_u32::<BigEndian>()?;
        let application_id = c.read_u32::<BigEndian>()?;

        let mut reserved = [0u8; RESERVED_REGION_LEN];
        c.read_exact(&mut reserved)?;

        let version_valid_for = c.read_u32::<BigEndian>()?;
        let sqlite_version = Version::from_u32(c.read_u32::<BigEndian>()?);

        Ok(DbInfo {
            page_size,
            file_format_write_version,
            file_format_read_version,
            page_end_reserved_space,
            max_embedded_payload_fraction,
            min_embedded_payload_fraction,
            leaf_payload_fraction,
            file_change_counter,
            db_size_in_pages,
            first_freelist_trunk_page,
            num_freelist_pages,
            schema_cookie,
            schema_format,
            default_page_cache_size,
            largest_btree_root_page,
            text_encoding,
            user_version,
            incremental_vacuum_mode,
            application_id,
            version_valid_for,
            sqlite_version,
        })
    }

    /// Encodes this header back to its fixed 100-byte on-disk form.
    ///
    /// The 20-byte reserved region at offset [72, 92) is always zero-filled,
    /// regardless of what was present in any buffer this value was decoded from.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_BYTES);
        out.write_all(MAGIC).expect("writing to a Vec cannot fail");

        let page_size_on_disk: u16 = if self.page_size == 65536 { 1 } else { self.page_size as u16 };
        out.write_u16::<BigEndian>(page_size_on_disk).unwrap();
        out.write_u8(self.file_format_write_version as u8).unwrap();
        out.write_u8(self.file_format_read_version as u8).unwrap();
        out.write_u8(self.page_end_reserved_space).unwrap();
        out.write_u8(self.max_embedded_payload_fraction).unwrap();
        out.write_u8(self.min_embedded_payload_fraction).unwrap();
        out.write_u8(self.leaf_payload_fraction).unwrap();
        out.write_u32::<BigEndian>(self.file_change_counter).unwrap();
        out.write_u32::<BigEndian>(self.db_size_in_pages).unwrap();
        out.write_u32::<BigEndian>(self.first_freelist_trunk_page).unwrap();
        out.write_u32::<BigEndian>(self.num_freelist_pages).unwrap();
        out.write_u32::<BigEndian>(self.schema_cookie).unwrap();
        out.write_u32::<BigEndian>(self.schema_format as u32).unwrap();
        out.write_u32::<BigEndian>(self.default_page_cache_size).unwrap();
        out.write_u32::<BigEndian>(self.largest_btree_root_page).unwrap();
        out.write_u32::<BigEndian>(self.text_encoding as u32).unwrap();
        out.write_u32::<BigEndian>(self.user_version).unwrap();
        out.write_u32::<BigEndian>(self.incremental_vacuum_mode).unwrap();
        out.write_u32::<BigEndian>(self.application_id).unwrap();
        out.extend_from_slice(&[0u8; RESERVED_REGION_LEN]);
        out.write_u32::<BigEndian>(self.version_valid_for).unwrap();
        out.write_u32::<BigEndian>(self.sqlite_version.to_u32()).unwrap();

        debug_assert_eq!(out.len(), HEADER_BYTES);
        out
    }
}
