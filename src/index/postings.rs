//! Decoding of word entries and their postings streams.
//!
//! A word entry is a null-terminated word followed by one record per file the
//! word occurs in. Each record is three varints (file index, occurrence count,
//! rank) and then one or more marker bytes:
//!
//! | marker | meaning |
//! |--------|---------|
//! | `0x00` | another record follows |
//! | `0x80` | the stream ends here |
//! | `0x01` | a meta-name id list follows, itself ended by `0x80` |
//! | `0x02` | a word-position delta list follows, itself ended by `0x80` |

use crate::error::{FerretError, Result};
use crate::index::segment::c_str;
use crate::util::varint;

/// Another record follows in the same word entry.
pub const WORD_ENTRY_CONTINUES_MARKER: u8 = 0x00;
/// Ends a word entry, a meta-name list, or a word-position list.
pub const STOP_MARKER: u8 = 0x80;
/// Starts a meta-name id list.
pub const META_NAME_LIST_MARKER: u8 = 0x01;
/// Starts a word-position delta list.
pub const WORD_POS_LIST_MARKER: u8 = 0x02;

/// Identifies a meta name by its position in the meta-names segment.
pub type MetaId = u32;

/// One file a word occurs in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Posting {
    /// Index into the files segment.
    pub file_index: u32,
    pub occurrences: u32,
    pub rank: u32,
    /// Meta names the word appeared under in this file.
    pub meta_ids: Vec<MetaId>,
    /// Absolute word positions, when the index was built with them.
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn new(file_index: u32, occurrences: u32, rank: u32) -> Self {
        Posting {
            file_index,
            occurrences,
            rank,
            ..Default::default()
        }
    }

    pub fn with_meta_ids(mut self, meta_ids: Vec<MetaId>) -> Self {
        self.meta_ids = meta_ids;
        self
    }

    pub fn with_positions(mut self, positions: Vec<u32>) -> Self {
        self.positions = positions;
        self
    }

    /// Whether the word occurred under the given meta name in this file.
    pub fn has_meta(&self, meta_id: MetaId) -> bool {
        self.meta_ids.contains(&meta_id)
    }
}

/// A decoded view of one words-segment entry.
#[derive(Debug, Clone, Copy)]
pub struct WordEntry<'a> {
    word: &'a [u8],
    stream: &'a [u8],
}

impl<'a> WordEntry<'a> {
    /// Split an entry's bytes into its word and its postings stream.
    pub fn parse(entry: &'a [u8]) -> Result<Self> {
        let (word, stream) = c_str(entry)?;
        Ok(WordEntry { word, stream })
    }

    pub fn word(&self) -> &'a [u8] {
        self.word
    }

    /// A fresh iterator over the postings; call again to restart.
    pub fn postings(&self) -> Postings<'a> {
        Postings::new(self.stream)
    }

    /// Number of files the word occurs in, counted without keeping any records.
    pub fn file_count(&self) -> Result<usize> {
        let mut postings = self.postings();
        let mut count = 0;
        while postings.advance(false)?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}

/// Lazy iterator over the postings of one word.
///
/// Yields `Err` once and then stops if the stream is malformed, including a
/// stream that reaches the end of its slice without a stop marker.
#[derive(Debug, Clone)]
pub struct Postings<'a> {
    stream: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Postings<'a> {
    fn new(stream: &'a [u8]) -> Self {
        // An entry with no files is just the stop marker.
        let done = stream.first() == Some(&STOP_MARKER);
        Postings {
            stream,
            pos: 0,
            done,
        }
    }

    fn read_byte(&mut self) -> Result<u8> {
        let byte = *self
            .stream
            .get(self.pos)
            .ok_or_else(|| FerretError::corrupt("postings stream has no stop marker"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn peek_byte(&self) -> Result<u8> {
        self.stream
            .get(self.pos)
            .copied()
            .ok_or_else(|| FerretError::corrupt("postings stream has no stop marker"))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let (value, len) = varint::decode_u32(&self.stream[self.pos..])?;
        self.pos += len;
        Ok(value)
    }

    /// Read varints up to and including the next stop marker.
    fn read_list(&mut self, keep: bool) -> Result<Vec<u32>> {
        let mut list = Vec::new();
        while self.peek_byte()? != STOP_MARKER {
            let value = self.read_u32()?;
            if keep {
                list.push(value);
            }
        }
        self.pos += 1;
        Ok(list)
    }

    fn advance(&mut self, keep_lists: bool) -> Result<Option<Posting>> {
        if self.done {
            return Ok(None);
        }

        let mut posting = Posting::new(self.read_u32()?, self.read_u32()?, self.read_u32()?);
        loop {
            match self.read_byte()? {
                WORD_ENTRY_CONTINUES_MARKER => break,
                STOP_MARKER => {
                    self.done = true;
                    break;
                }
                META_NAME_LIST_MARKER => posting.meta_ids = self.read_list(keep_lists)?,
                WORD_POS_LIST_MARKER => {
                    let deltas = self.read_list(keep_lists)?;
                    let mut position = 0u32;
                    posting.positions = deltas
                        .into_iter()
                        .map(|delta| {
                            position = position.saturating_add(delta);
                            position
                        })
                        .collect();
                }
                other => {
                    return Err(FerretError::corrupt(format!(
                        "unknown postings marker {other:#04x}"
                    )));
                }
            }
        }
        Ok(Some(posting))
    }
}

impl Iterator for Postings<'_> {
    type Item = Result<Posting>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance(true) {
            Ok(posting) => posting.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::varint::encode_u64;

    fn entry(word: &str, body: &[&[u8]]) -> Vec<u8> {
        let mut bytes = word.as_bytes().to_vec();
        bytes.push(0);
        for part in body {
            bytes.extend_from_slice(part);
        }
        bytes
    }

    fn triple(file: u64, occurrences: u64, rank: u64) -> Vec<u8> {
        let mut bytes = encode_u64(file);
        bytes.extend(encode_u64(occurrences));
        bytes.extend(encode_u64(rank));
        bytes
    }

    #[test]
    fn test_decode_two_postings() {
        let bytes = entry(
            "cat",
            &[&triple(1, 3, 40), &[0x00], &triple(2, 1, 200), &[0x80]],
        );
        let word = WordEntry::parse(&bytes).unwrap();
        assert_eq!(word.word(), b"cat");

        let postings: Vec<Posting> = word.postings().collect::<Result<_>>().unwrap();
        assert_eq!(
            postings,
            vec![Posting::new(1, 3, 40), Posting::new(2, 1, 200)]
        );
        assert_eq!(word.file_count().unwrap(), 2);
    }

    #[test]
    fn test_meta_and_position_lists() {
        let bytes = entry(
            "cat",
            &[
                &triple(0, 2, 10),
                &[0x01],
                &encode_u64(0),
                &encode_u64(3),
                &[0x80],
                &[0x02],
                &encode_u64(4),
                &encode_u64(6),
                &[0x80],
                &[0x80],
            ],
        );
        let word = WordEntry::parse(&bytes).unwrap();
        let postings: Vec<Posting> = word.postings().collect::<Result<_>>().unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].meta_ids, vec![0, 3]);
        assert_eq!(postings[0].positions, vec![4, 10]);
        assert!(postings[0].has_meta(3));
        assert!(!postings[0].has_meta(1));
    }

    #[test]
    fn test_stops_at_marker_and_ignores_following_bytes() {
        let mut bytes = entry("cat", &[&triple(5, 1, 1), &[0x80]]);
        bytes.extend_from_slice(b"dog\0");
        let word = WordEntry::parse(&bytes).unwrap();
        assert_eq!(word.postings().count(), 1);
    }

    #[test]
    fn test_empty_postings() {
        let bytes = entry("cat", &[&[0x80]]);
        let word = WordEntry::parse(&bytes).unwrap();
        assert_eq!(word.postings().count(), 0);
        assert_eq!(word.file_count().unwrap(), 0);
    }

    #[test]
    fn test_missing_terminator_is_corrupt() {
        let bytes = entry("cat", &[&triple(1, 1, 1), &[0x00], &triple(2, 1, 1)]);
        let word = WordEntry::parse(&bytes).unwrap();
        let results: Vec<Result<Posting>> = word.postings().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(FerretError::IndexCorrupt(_))));
        assert!(word.file_count().is_err());
    }

    #[test]
    fn test_unknown_marker_is_corrupt() {
        let bytes = entry("cat", &[&triple(1, 1, 1), &[0x07], &[0x80]]);
        let word = WordEntry::parse(&bytes).unwrap();
        let first = word.postings().next().unwrap();
        assert!(first.is_err());
    }

    #[test]
    fn test_restartable() {
        let bytes = entry("cat", &[&triple(1, 1, 1), &[0x80]]);
        let word = WordEntry::parse(&bytes).unwrap();
        let mut postings = word.postings();
        assert!(postings.next().is_some());
        assert!(postings.next().is_none());
        assert_eq!(word.postings().count(), 1);
    }
}
