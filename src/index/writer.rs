//! Serialization of a complete index file.
//!
//! The writer collects every table in memory and lays the file out in one
//! pass: the five segment headers first, then all entries in segment order.
//! Directories, stop words, meta names, and words are sorted before writing;
//! files keep the order they were added in, since postings refer to them by
//! position.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ahash::AHashMap;
use byteorder::{NativeEndian, WriteBytesExt};

use crate::error::{FerretError, Result};
use crate::index::postings::{
    META_NAME_LIST_MARKER, MetaId, Posting, STOP_MARKER, WORD_ENTRY_CONTINUES_MARKER,
    WORD_POS_LIST_MARKER,
};
use crate::index::segment::{COUNT_WIDTH, OFFSET_WIDTH};
use crate::util::varint;

#[derive(Debug, Clone)]
struct FileRecord {
    dir: u32,
    name: String,
    size: u64,
    title: String,
}

/// Builds an index file from in-memory tables.
#[derive(Debug, Default)]
pub struct IndexWriter {
    words: BTreeMap<String, Vec<Posting>>,
    stop_words: Vec<String>,
    directories: Vec<String>,
    directory_ids: AHashMap<String, u32>,
    files: Vec<FileRecord>,
    meta_names: Vec<String>,
    meta_ids: AHashMap<String, MetaId>,
}

impl IndexWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a word and the files it occurs in. Adding a word twice appends.
    pub fn add_word(&mut self, word: &str, postings: Vec<Posting>) -> &mut Self {
        self.words
            .entry(word.to_lowercase())
            .or_default()
            .extend(postings);
        self
    }

    pub fn add_stop_word(&mut self, word: &str) -> &mut Self {
        self.stop_words.push(word.to_lowercase());
        self
    }

    /// Add a directory, returning the id to pass to [`IndexWriter::add_file`].
    pub fn add_directory(&mut self, path: &str) -> u32 {
        if let Some(&id) = self.directory_ids.get(path) {
            return id;
        }
        let id = self.directories.len() as u32;
        self.directories.push(path.to_string());
        self.directory_ids.insert(path.to_string(), id);
        id
    }

    /// Add a file record, returning its file index.
    pub fn add_file(&mut self, dir: u32, name: &str, size: u64, title: &str) -> u32 {
        self.files.push(FileRecord {
            dir,
            name: name.to_string(),
            size,
            title: title.to_string(),
        });
        (self.files.len() - 1) as u32
    }

    /// Add a meta name, returning the id to use in postings' meta lists.
    pub fn add_meta_name(&mut self, name: &str) -> MetaId {
        let name = name.to_lowercase();
        if let Some(&id) = self.meta_ids.get(&name) {
            return id;
        }
        let id = self.meta_names.len() as MetaId;
        self.meta_names.push(name.clone());
        self.meta_ids.insert(name, id);
        id
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Serialize the index.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let (directories, dir_remap) = sorted_with_remap(&self.directories);
        let (meta_names, meta_remap) = sorted_with_remap(&self.meta_names);
        let mut stop_words = self.stop_words.clone();
        stop_words.sort();
        stop_words.dedup();

        let mut segments: Vec<Vec<Vec<u8>>> = Vec::with_capacity(5);

        let mut words = Vec::with_capacity(self.words.len());
        for (word, postings) in &self.words {
            words.push(self.encode_word(word, postings, &meta_remap)?);
        }
        segments.push(words);
        segments.push(stop_words.iter().map(|w| c_string(w)).collect());
        segments.push(directories.iter().map(|d| c_string(d)).collect());

        let mut files = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let dir = *dir_remap.get(file.dir as usize).ok_or_else(|| {
                FerretError::invalid_argument(format!("unknown directory id {}", file.dir))
            })?;
            let mut bytes = Vec::new();
            varint::write_u64(&mut bytes, u64::from(dir))?;
            bytes.extend(c_string(&file.name));
            varint::write_u64(&mut bytes, file.size)?;
            bytes.extend(c_string(&file.title));
            files.push(bytes);
        }
        segments.push(files);
        segments.push(meta_names.iter().map(|m| c_string(m)).collect());

        let headers_len: usize = segments
            .iter()
            .map(|entries| COUNT_WIDTH + entries.len() * OFFSET_WIDTH)
            .sum();
        let body_len: usize = segments.iter().flatten().map(Vec::len).sum();

        let mut out = Vec::with_capacity(headers_len + body_len);
        let mut offset = headers_len;
        for entries in &segments {
            out.write_uint::<NativeEndian>(entries.len() as u64, COUNT_WIDTH)?;
            for entry in entries {
                out.write_i64::<NativeEndian>(offset as i64)?;
                offset += entry.len();
            }
        }
        for entry in segments.iter().flatten() {
            out.extend_from_slice(entry);
        }
        Ok(out)
    }

    /// Serialize the index to a file.
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    fn encode_word(&self, word: &str, postings: &[Posting], meta_remap: &[u32]) -> Result<Vec<u8>> {
        let mut bytes = c_string(word);
        if postings.is_empty() {
            bytes.push(STOP_MARKER);
            return Ok(bytes);
        }

        for (i, posting) in postings.iter().enumerate() {
            if posting.file_index as usize >= self.files.len() {
                return Err(FerretError::invalid_argument(format!(
                    "word {word:?} refers to unknown file {}",
                    posting.file_index
                )));
            }
            varint::write_u64(&mut bytes, u64::from(posting.file_index))?;
            varint::write_u64(&mut bytes, u64::from(posting.occurrences))?;
            varint::write_u64(&mut bytes, u64::from(posting.rank))?;

            if !posting.meta_ids.is_empty() {
                bytes.push(META_NAME_LIST_MARKER);
                for &id in &posting.meta_ids {
                    let id = *meta_remap.get(id as usize).ok_or_else(|| {
                        FerretError::invalid_argument(format!("unknown meta id {id}"))
                    })?;
                    varint::write_u64(&mut bytes, u64::from(id))?;
                }
                bytes.push(STOP_MARKER);
            }

            if !posting.positions.is_empty() {
                bytes.push(WORD_POS_LIST_MARKER);
                let mut previous = 0u32;
                for &position in &posting.positions {
                    varint::write_u64(&mut bytes, u64::from(position.saturating_sub(previous)))?;
                    previous = position;
                }
                bytes.push(STOP_MARKER);
            }

            bytes.push(if i + 1 == postings.len() {
                STOP_MARKER
            } else {
                WORD_ENTRY_CONTINUES_MARKER
            });
        }
        Ok(bytes)
    }
}

fn c_string(s: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
    bytes
}

/// Sort `names`, returning the sorted list and a map from insertion id to
/// sorted position.
fn sorted_with_remap(names: &[String]) -> (Vec<String>, Vec<u32>) {
    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by(|&a, &b| names[a].cmp(&names[b]));

    let mut remap = vec![0u32; names.len()];
    let mut sorted = Vec::with_capacity(names.len());
    for (position, &id) in order.iter().enumerate() {
        remap[id] = position as u32;
        sorted.push(names[id].clone());
    }
    (sorted, remap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::file_info::FileInfo;
    use crate::index::postings::WordEntry;
    use crate::index::segment::IndexFile;

    #[test]
    fn test_directories_are_sorted_and_remapped() {
        let mut writer = IndexWriter::new();
        let zeta = writer.add_directory("/zeta");
        let alpha = writer.add_directory("/alpha");
        assert_eq!(writer.add_directory("/zeta"), zeta);
        writer.add_file(zeta, "z.txt", 1, "Z");
        writer.add_file(alpha, "a.txt", 2, "A");

        let index = IndexFile::from_bytes(writer.to_bytes().unwrap()).unwrap();
        assert_eq!(index.directories().entry_str(0).unwrap(), b"/alpha");

        let first = FileInfo::parse(index.files().entry_bytes(0).unwrap()).unwrap();
        assert_eq!(first.file_name, b"z.txt");
        assert_eq!(first.dir_index, 1);
    }

    #[test]
    fn test_meta_ids_are_remapped() {
        let mut writer = IndexWriter::new();
        let title = writer.add_meta_name("title");
        let author = writer.add_meta_name("author");
        let dir = writer.add_directory("/d");
        let file = writer.add_file(dir, "f", 1, "");
        writer.add_word(
            "cat",
            vec![Posting::new(file, 1, 10).with_meta_ids(vec![title, author])],
        );

        let index = IndexFile::from_bytes(writer.to_bytes().unwrap()).unwrap();
        let entry = WordEntry::parse(index.words().entry_bytes(0).unwrap()).unwrap();
        let posting = entry.postings().next().unwrap().unwrap();
        // "author" sorts first.
        assert_eq!(posting.meta_ids, vec![1, 0]);
    }

    #[test]
    fn test_unknown_file_is_rejected() {
        let mut writer = IndexWriter::new();
        writer.add_word("cat", vec![Posting::new(7, 1, 1)]);
        assert!(writer.to_bytes().is_err());
    }

    #[test]
    fn test_positions_round_trip() {
        let mut writer = IndexWriter::new();
        let dir = writer.add_directory("/d");
        let file = writer.add_file(dir, "f", 1, "");
        writer.add_word(
            "cat",
            vec![Posting::new(file, 3, 10).with_positions(vec![2, 9, 30])],
        );

        let index = IndexFile::from_bytes(writer.to_bytes().unwrap()).unwrap();
        let entry = WordEntry::parse(index.words().entry_bytes(0).unwrap()).unwrap();
        let posting = entry.postings().next().unwrap().unwrap();
        assert_eq!(posting.positions, vec![2, 9, 30]);
    }
}
