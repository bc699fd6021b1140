// Manages pages from a sqlite3 file as defined at https://www.sqlite.org/fileformat.html
// Supports very simplified subset of file format.
//
// Excepts from above docs:
// - The complete state of an SQLite database is usually contained in a single file on disk called the "main database file".
// - The main database file consists of one or more pages.
// - Every page in the main database has a single use which is one of the following:
//   - The lock-byte page
//   - A freelist page
//   - A freelist trunk page
//   - A freelist leaf page
//   - A b-tree page
//     - A table b-tree interior page
//     - A table b-tree leaf page
//     - An index b-tree interior page
//     - An index b-tree leaf page
//   - A payload overflow page
//   - A pointer map page
//
//  [ I aspire just to implement btree-pages, as the others don't seem to be required for simple databases that haven't been modified. ]
//
// The pager owns the data in each page, and allows callers to access it for reading or writing.
// Goal is to avoid copying pages.
// Pages are loaded on demand.
// All pages have the same size, learned from the database header on first access.

use crate::dbinfo::DbInfo;
use std::io::{Read, Seek, SeekFrom, Write};

/// A pager manages the file locking and the memory use for one open database file.
// TODO: When several files are open, coordinate between different pagers to maintain an overall memory limit.
// TODO: rw locking for concurrent accesses by multiple cursors to one file.
pub struct Pager {
    f: std::fs::File,
    pages: Vec<Option<Vec<u8>>>,
    page_size: Option<usize>,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("the page number is higher than the file contains or this pager supports")]
    PageNumberBeyondLimits,
    #[error("write_page was given a {given}-byte buffer but the page size is {page_size}")]
    WrongPageLength { given: usize, page_size: usize },
    #[error("pager used before Pager::initialize was called")]
    NotInitialized,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    DbInfo(#[from] crate::dbinfo::Error),
}

// Page numbers are 1-based, to match how Sqlite numbers pages.  PageNum ensures people pass something that is meant to be a page number
// to a function that expects a page number.
pub type PageNum = usize;

// TODO: support databases with more on-disk pages, limiting memory usage by paging out unused pages.
const MAX_PAGE_NUM: PageNum = 10_000_000;

impl Pager {
    /// Opens `path` for reading and writing, creating it if it does not already
    /// exist. An existing file is neither truncated nor otherwise modified.
    ///
    /// `initialize` must be called before any other method; it is kept separate from
    /// `open` so the page size (learned from page 1's database header) need not be
    /// known up front.
    pub fn open(path: &str) -> Result<Self, Error> {
        // TODO: Lock file when opening so that other processes do not also
        // open and modify it, and so that is not modified while reading.
        // See https://docs.rs/file-lock/latest/file_lock/
        let f = std::fs::OpenOptions::new().read(true).write(true).create(true).open(path)?;
        Ok(Pager { f, pages: vec![], page_size: None })
    }

    /// Reads the database header from page 1 to learn the page size.
    ///
    /// Must be called once before `get_page` or `write_page`. Idempotent.
    pub fn initialize(&mut self) -> Result<(), Error> {
        if self.page_size.is_some() {
            return Ok(());
        }
        let mut header = [0u8; crate::dbinfo::HEADER_BYTES];
        self.f.seek(SeekFrom::Start(0))?;
        self.f.read_exact(&mut header)?;
        self.f.seek(SeekFrom::Start(0))?;
        let info = DbInfo::decode(&header)?;
        self.page_size = Some(info.page_size as usize);
        Ok(())
    }

    fn page_size(&self) -> Result<usize, Error> {
        self.page_size.ok_or(Error::NotInitialized)
    }

    fn read_page_from_file(&mut self, pn: PageNum) -> Result<Vec<u8>, Error> {
        let page_size = self.page_size()?;
        let mut v = vec![0_u8; page_size];
        self.f.seek(SeekFrom::Start((pn - 1) as u64 * page_size as u64))?;
        self.f.read_exact(&mut v[..])?;
        Ok(v)
    }

    fn ensure_present(&mut self, pn: PageNum) -> Result<(), Error> {
        // We are increasing the capacity of what pages we cache in memory, not changing the on-disk database file.
        if pn > self.pages.len() {
            self.pages.resize(pn, None);
        }
        if self.pages[pn - 1].is_none() {
            let v = self.read_page_from_file(pn)?;
            self.pages[pn - 1] = Some(v);
        }
        Ok(())
    }

    /// Returns page `pn`, reading and caching it from the file on first access.
    ///
    /// Page 1's returned slice includes the 100-byte database header prefix.
    pub fn get_page(&mut self, pn: PageNum) -> Result<&[u8], Error> {
        if pn == 0 || pn > MAX_PAGE_NUM {
            return Err(Error::PageNumberBeyondLimits);
        }
        self.ensure_present(pn)?;
        Ok(self.pages[pn - 1].as_deref().expect("just ensured present"))
    }

    /// Writes a full page-size buffer to page `pn`'s offset in the file and evicts
    /// it from the cache, so the next `get_page` re-reads what was just written.
    ///
    /// If the pager's page size is not yet known -- `initialize` has not been called
    /// and no page has been written yet -- it is established from `bytes.len()`,
    /// so a brand new, empty file (created by `open`) can be populated by writing
    /// its first page directly, without reading a header that does not exist yet.
    pub fn write_page(&mut self, pn: PageNum, bytes: &[u8]) -> Result<(), Error> {
        let page_size = match self.page_size {
            Some(page_size) => page_size,
            None => {
                self.page_size = Some(bytes.len());
                bytes.len()
            }
        };
        if bytes.len() != page_size {
            return Err(Error::WrongPageLength { given: bytes.len(), page_size });
        }
        if pn == 0 || pn > MAX_PAGE_NUM {
            return Err(Error::PageNumberBeyondLimits);
        }
        self.f.seek(SeekFrom::Start((pn - 1) as u64 * page_size as u64))?;
        self.f.write_all(bytes)?;
        if pn <= self.pages.len() {
            self.pages[pn - 1] = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbinfo::{DbInfo, FileFormatVersion, SchemaFormat, TextEncoding, Version};

    /// A path in the system temp directory that does not exist yet.
    fn fresh_temp_path(label: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "diydb-pager-test-{}-{}-{}.db",
            std::process::id(),
            label,
            std::time::SystemTime::now()
                .duration_since(std::time::SystemTime::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    fn minimal_page_one(page_size: u32) -> Vec<u8> {
        let info = DbInfo {
            page_size,
            file_format_write_version: FileFormatVersion::Legacy,
            file_format_read_version: FileFormatVersion::Legacy,
            page_end_reserved_space: 0,
            max_embedded_payload_fraction: 64,
            min_embedded_payload_fraction: 32,
            leaf_payload_fraction: 32,
            file_change_counter: 1,
            db_size_in_pages: 2,
            first_freelist_trunk_page: 0,
            num_freelist_pages: 0,
            schema_cookie: 0,
            schema_format: SchemaFormat::Format4,
            default_page_cache_size: 0,
            largest_btree_root_page: 0,
            text_encoding: TextEncoding::Utf8,
            user_version: 0,
            incremental_vacuum_mode: 0,
            application_id: 0,
            version_valid_for: 1,
            sqlite_version: Version { major: 3, minor: 37, patch: 0 },
        };
        let mut page = info.encode();
        page.resize(page_size as usize, 0);
        page
    }

    #[test]
    fn open_creates_file_when_absent() {
        let path = fresh_temp_path("create-on-open");
        assert!(!path.exists());
        let pager = Pager::open(path.to_str().unwrap()).unwrap();
        assert!(path.exists());
        drop(pager);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn write_page_round_trips_on_a_freshly_created_file() {
        let path = fresh_temp_path("write-round-trip");
        let page_size: u32 = 512;
        let page_one = minimal_page_one(page_size);

        let mut pager = Pager::open(path.to_str().unwrap()).unwrap();
        pager.write_page(1, &page_one).unwrap();
        pager.initialize().unwrap();
        assert_eq!(pager.get_page(1).unwrap(), page_one.as_slice());

        let page_two = vec![0xab_u8; page_size as usize];
        pager.write_page(2, &page_two).unwrap();
        assert_eq!(pager.get_page(2).unwrap(), page_two.as_slice());

        // A second pager opening the same path sees what was written to disk.
        let mut reopened = Pager::open(path.to_str().unwrap()).unwrap();
        reopened.initialize().unwrap();
        assert_eq!(reopened.get_page(1).unwrap(), page_one.as_slice());
        assert_eq!(reopened.get_page(2).unwrap(), page_two.as_slice());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn write_page_rejects_wrong_length() {
        let path = fresh_temp_path("wrong-length");
        let page_size: u32 = 512;
        let page_one = minimal_page_one(page_size);

        let mut pager = Pager::open(path.to_str().unwrap()).unwrap();
        pager.write_page(1, &page_one).unwrap();
        pager.initialize().unwrap();

        let wrong = vec![0u8; page_size as usize - 1];
        match pager.write_page(2, &wrong).unwrap_err() {
            Error::WrongPageLength { given, page_size: reported } => {
                assert_eq!(given, wrong.len());
                assert_eq!(reported, page_size as usize);
            }
            other => panic!("expected WrongPageLength, got {other:?}"),
        }

        std::fs::remove_file(&path).unwrap();
    }
}
