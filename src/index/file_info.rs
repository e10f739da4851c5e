//! Decoding of files-segment entries.

use std::borrow::Cow;

use crate::error::Result;
use crate::index::segment::c_str;
use crate::util::varint;

/// One indexed file, borrowed straight from the index bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo<'a> {
    /// Index into the directories segment.
    pub dir_index: u32,
    pub file_name: &'a [u8],
    /// Size of the file in bytes when it was indexed.
    pub size: u64,
    pub title: &'a [u8],
}

impl<'a> FileInfo<'a> {
    /// Decode a record laid out as: directory index, name, size, title.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let (dir_index, len) = varint::decode_u32(bytes)?;
        let (file_name, rest) = c_str(&bytes[len..])?;
        let (size, len) = varint::decode_u64(rest)?;
        let (title, _) = c_str(&rest[len..])?;
        Ok(FileInfo {
            dir_index,
            file_name,
            size,
            title,
        })
    }

    pub fn file_name_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.file_name)
    }

    pub fn title_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.title)
    }
}
