//! The segment store: a memory-mapped, read-only index file.
//!
//! An index file begins with five segment headers laid end to end, each a
//! native-width entry count followed by that many native `off_t` offsets.
//! Every offset is relative to the start of the file and points at one
//! entry's bytes, which live after all of the headers. Segments can only be
//! found by walking the headers in order, so all five are resolved once when
//! the file is opened and every offset is validated there; accessors after
//! that are plain slice reads.

use std::fmt;
use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, NativeEndian};
use log::debug;
use memmap2::{Mmap, MmapOptions};

use crate::error::{FerretError, Result};

/// Width in bytes of a segment's entry count.
pub const COUNT_WIDTH: usize = std::mem::size_of::<usize>();

/// Width in bytes of one entry offset.
pub const OFFSET_WIDTH: usize = std::mem::size_of::<i64>();

/// The five segments of an index file, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Words,
    StopWords,
    Directories,
    Files,
    MetaNames,
}

impl SegmentKind {
    /// All segment kinds in the order they appear in the file.
    pub const ALL: [SegmentKind; 5] = [
        SegmentKind::Words,
        SegmentKind::StopWords,
        SegmentKind::Directories,
        SegmentKind::Files,
        SegmentKind::MetaNames,
    ];

    /// Position of this segment in the file.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            SegmentKind::Words => "words",
            SegmentKind::StopWords => "stop-words",
            SegmentKind::Directories => "directories",
            SegmentKind::Files => "files",
            SegmentKind::MetaNames => "meta-names",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved location of one segment's offset table.
#[derive(Debug, Clone, Default)]
struct SegmentTable {
    count: usize,
    /// Byte position of the first offset.
    table_start: usize,
    /// End of the last entry's byte region.
    limit: usize,
}

/// Backing bytes of an index file.
enum IndexBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl IndexBytes {
    fn as_slice(&self) -> &[u8] {
        match self {
            IndexBytes::Mapped(mmap) => mmap,
            IndexBytes::Owned(bytes) => bytes,
        }
    }
}

/// An opened index file with all five segments resolved.
///
/// The store is immutable after [`IndexFile::open`] returns and is shared by
/// reference (or `Arc`) between any number of threads without locking.
pub struct IndexFile {
    bytes: IndexBytes,
    tables: [SegmentTable; 5],
    path: Option<PathBuf>,
}

impl fmt::Debug for IndexFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexFile")
            .field("path", &self.path)
            .field("len", &self.bytes.as_slice().len())
            .field("tables", &self.tables)
            .finish()
    }
}

impl IndexFile {
    /// Memory-map the index file at `path` and resolve its segments.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if (len as usize) < COUNT_WIDTH * SegmentKind::ALL.len() {
            return Err(FerretError::corrupt(format!(
                "{}: file too short to hold segment headers",
                path.display()
            )));
        }

        // SAFETY: the index is never modified while it is being served; a file
        // replaced underneath us must be replaced by rename, not rewritten.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        #[cfg(unix)]
        {
            let _ = mmap.advise(memmap2::Advice::Random);
        }

        let mut index = Self::resolve(IndexBytes::Mapped(mmap))?;
        index.path = Some(path.to_path_buf());
        debug!(
            "opened index {} ({} words, {} files)",
            path.display(),
            index.segment(SegmentKind::Words).len(),
            index.segment(SegmentKind::Files).len()
        );
        Ok(index)
    }

    /// Build a store over bytes already in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::resolve(IndexBytes::Owned(bytes))
    }

    /// Path the index was opened from, if it came from a file.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Total size of the index in bytes.
    pub fn len(&self) -> usize {
        self.bytes.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A view of one segment.
    pub fn segment(&self, kind: SegmentKind) -> Segment<'_> {
        Segment {
            kind,
            data: self.bytes.as_slice(),
            table: &self.tables[kind.ordinal()],
        }
    }

    pub fn words(&self) -> Segment<'_> {
        self.segment(SegmentKind::Words)
    }

    pub fn stop_words(&self) -> Segment<'_> {
        self.segment(SegmentKind::StopWords)
    }

    pub fn directories(&self) -> Segment<'_> {
        self.segment(SegmentKind::Directories)
    }

    pub fn files(&self) -> Segment<'_> {
        self.segment(SegmentKind::Files)
    }

    pub fn meta_names(&self) -> Segment<'_> {
        self.segment(SegmentKind::MetaNames)
    }

    fn resolve(bytes: IndexBytes) -> Result<Self> {
        let data = bytes.as_slice();
        let mut tables: [SegmentTable; 5] = Default::default();

        // Walk the headers: each segment starts right after the previous table.
        let mut pos = 0usize;
        for kind in SegmentKind::ALL {
            let count_bytes = data.get(pos..pos + COUNT_WIDTH).ok_or_else(|| {
                FerretError::corrupt(format!("{kind} segment header past end of file"))
            })?;
            let count = NativeEndian::read_uint(count_bytes, COUNT_WIDTH) as usize;
            let table_start = pos + COUNT_WIDTH;
            let table_len = count
                .checked_mul(OFFSET_WIDTH)
                .ok_or_else(|| FerretError::corrupt(format!("{kind} segment count overflows")))?;
            let table_end = table_start
                .checked_add(table_len)
                .filter(|&end| end <= data.len())
                .ok_or_else(|| {
                    FerretError::corrupt(format!(
                        "{kind} segment claims {count} entries but the file is too short"
                    ))
                })?;
            tables[kind.ordinal()] = SegmentTable {
                count,
                table_start,
                limit: data.len(),
            };
            pos = table_end;
        }
        let headers_end = pos;

        // Every offset must land in the entry region and offsets within a
        // segment must not go backwards.
        let mut firsts: [Option<usize>; 5] = [None; 5];
        let mut lasts: [Option<usize>; 5] = [None; 5];
        for kind in SegmentKind::ALL {
            let table = &tables[kind.ordinal()];
            let mut previous = headers_end;
            for i in 0..table.count {
                let offset = read_offset(data, table.table_start + i * OFFSET_WIDTH);
                if offset < headers_end as i64 || offset >= data.len() as i64 {
                    return Err(FerretError::corrupt(format!(
                        "{kind} entry {i} has offset {offset} outside the entry region"
                    )));
                }
                let offset = offset as usize;
                if offset < previous {
                    return Err(FerretError::corrupt(format!(
                        "{kind} entry {i} offset {offset} goes backwards"
                    )));
                }
                previous = offset;
            }
            if table.count > 0 {
                firsts[kind.ordinal()] = Some(read_offset(data, table.table_start) as usize);
                lasts[kind.ordinal()] = Some(previous);
            }
        }

        // The last entry of a segment ends where the next segment's entries
        // begin (or at end of file).
        for kind in SegmentKind::ALL {
            let k = kind.ordinal();
            if let Some(last) = lasts[k] {
                tables[k].limit = firsts[k + 1..]
                    .iter()
                    .flatten()
                    .copied()
                    .filter(|&first| first >= last)
                    .min()
                    .unwrap_or(data.len());
            }
        }

        Ok(IndexFile {
            bytes,
            tables,
            path: None,
        })
    }
}

fn read_offset(data: &[u8], pos: usize) -> i64 {
    NativeEndian::read_i64(&data[pos..pos + OFFSET_WIDTH])
}

/// Borrowed view of one segment of an [`IndexFile`].
#[derive(Clone, Copy)]
pub struct Segment<'a> {
    kind: SegmentKind,
    data: &'a [u8],
    table: &'a SegmentTable,
}

impl fmt::Debug for Segment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("kind", &self.kind)
            .field("len", &self.table.count)
            .finish()
    }
}

impl<'a> Segment<'a> {
    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    /// Number of entries in the segment.
    pub fn len(&self) -> usize {
        self.table.count
    }

    pub fn is_empty(&self) -> bool {
        self.table.count == 0
    }

    fn offset(&self, i: usize) -> usize {
        read_offset(self.data, self.table.table_start + i * OFFSET_WIDTH) as usize
    }

    /// The bytes of entry `i`, from its offset up to the next entry's offset.
    pub fn entry_bytes(&self, i: usize) -> Result<&'a [u8]> {
        if i >= self.table.count {
            return Err(FerretError::corrupt(format!(
                "{} entry {i} out of range (segment has {})",
                self.kind, self.table.count
            )));
        }
        let start = self.offset(i);
        let end = if i + 1 < self.table.count {
            self.offset(i + 1)
        } else {
            self.table.limit
        };
        self.data
            .get(start..end)
            .ok_or_else(|| FerretError::corrupt(format!("{} entry {i} out of bounds", self.kind)))
    }

    /// The null-terminated string at the start of entry `i`, without its NUL.
    pub fn entry_str(&self, i: usize) -> Result<&'a [u8]> {
        let bytes = self.entry_bytes(i)?;
        c_str(bytes).map(|(s, _)| s)
    }

    /// Iterate over the entry strings in segment order.
    pub fn iter(&self) -> impl Iterator<Item = Result<&'a [u8]>> + '_ {
        (0..self.len()).map(move |i| self.entry_str(i))
    }

    /// Index of the first entry not less than `key`.
    pub fn lower_bound(&self, key: &[u8]) -> Result<usize> {
        self.partition_point(|entry| entry < key)
    }

    /// Binary search for an entry equal to `key`.
    pub fn find(&self, key: &[u8]) -> Result<Option<usize>> {
        let i = self.lower_bound(key)?;
        if i < self.len() && self.entry_str(i)? == key {
            Ok(Some(i))
        } else {
            Ok(None)
        }
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.find(key)?.is_some())
    }

    /// The range of entries that start with `prefix`.
    ///
    /// Entries are compared only up to the prefix length, so in a sorted
    /// segment the matches are contiguous.
    pub fn prefix_range(&self, prefix: &[u8]) -> Result<Range<usize>> {
        let n = prefix.len();
        let start = self.partition_point(|entry| &entry[..entry.len().min(n)] < prefix)?;
        let end = self.partition_point(|entry| &entry[..entry.len().min(n)] <= prefix)?;
        Ok(start..end.max(start))
    }

    fn partition_point<F>(&self, mut pred: F) -> Result<usize>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let (mut lo, mut hi) = (0usize, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if pred(self.entry_str(mid)?) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }
}

/// Split a null-terminated string off the front of `bytes`.
///
/// Returns the string (without the NUL) and the remaining bytes after it.
pub fn c_str(bytes: &[u8]) -> Result<(&[u8], &[u8])> {
    let nul = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| FerretError::corrupt("unterminated string"))?;
    Ok((&bytes[..nul], &bytes[nul + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::writer::IndexWriter;

    fn sample() -> IndexFile {
        let mut writer = IndexWriter::new();
        for word in ["apple", "apply", "banana", "band", "cat"] {
            writer.add_word(word, vec![]);
        }
        writer.add_stop_word("the");
        writer.add_stop_word("and");
        let dir = writer.add_directory("/docs");
        writer.add_file(dir, "a.txt", 10, "A");
        writer.add_meta_name("title");
        IndexFile::from_bytes(writer.to_bytes().unwrap()).unwrap()
    }

    #[test]
    fn test_segment_counts() {
        let index = sample();
        assert_eq!(index.words().len(), 5);
        assert_eq!(index.stop_words().len(), 2);
        assert_eq!(index.directories().len(), 1);
        assert_eq!(index.files().len(), 1);
        assert_eq!(index.meta_names().len(), 1);
    }

    #[test]
    fn test_find_and_contains() {
        let index = sample();
        let words = index.words();
        assert_eq!(words.find(b"banana").unwrap(), Some(2));
        assert_eq!(words.find(b"bananas").unwrap(), None);
        assert!(index.stop_words().contains(b"the").unwrap());
        assert!(!index.stop_words().contains(b"cat").unwrap());
    }

    #[test]
    fn test_prefix_range() {
        let index = sample();
        let words = index.words();
        assert_eq!(words.prefix_range(b"app").unwrap(), 0..2);
        assert_eq!(words.prefix_range(b"ban").unwrap(), 2..4);
        assert_eq!(words.prefix_range(b"cat").unwrap(), 4..5);
        assert!(words.prefix_range(b"dog").unwrap().is_empty());
    }

    #[test]
    fn test_entries_stay_inside_file() {
        let index = sample();
        for kind in SegmentKind::ALL {
            let segment = index.segment(kind);
            for i in 0..segment.len() {
                let bytes = segment.entry_bytes(i).unwrap();
                assert!(!bytes.is_empty());
                assert!(bytes.len() <= index.len());
            }
            assert!(segment.entry_bytes(segment.len()).is_err());
        }
    }

    #[test]
    fn test_truncated_file_is_corrupt() {
        let mut writer = IndexWriter::new();
        writer.add_word("cat", vec![]);
        let bytes = writer.to_bytes().unwrap();

        for cut in [0, COUNT_WIDTH, COUNT_WIDTH + 3] {
            let result = IndexFile::from_bytes(bytes[..cut].to_vec());
            assert!(matches!(result, Err(FerretError::IndexCorrupt(_))));
        }
    }

    #[test]
    fn test_out_of_range_offset_is_corrupt() {
        let mut writer = IndexWriter::new();
        writer.add_word("cat", vec![]);
        let mut bytes = writer.to_bytes().unwrap();

        let bogus = (bytes.len() as i64 + 100).to_ne_bytes();
        bytes[COUNT_WIDTH..COUNT_WIDTH + OFFSET_WIDTH].copy_from_slice(&bogus);
        assert!(matches!(
            IndexFile::from_bytes(bytes),
            Err(FerretError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn test_huge_count_is_corrupt() {
        let mut bytes = vec![0u8; COUNT_WIDTH * 5];
        bytes[..COUNT_WIDTH].copy_from_slice(&usize::MAX.to_ne_bytes());
        assert!(matches!(
            IndexFile::from_bytes(bytes),
            Err(FerretError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn test_open_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.index");
        let mut writer = IndexWriter::new();
        writer.add_word("cat", vec![]);
        writer.write_to_path(&path).unwrap();

        let index = IndexFile::open(&path).unwrap();
        assert_eq!(index.path(), Some(path.as_path()));
        assert_eq!(index.words().entry_str(0).unwrap(), b"cat");
    }
}
