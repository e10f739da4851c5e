//! Rendering of ranked results.
//!
//! A [`ResultsFormatter`] is driven in three phases: `pre` once with the
//! ignored words and the total match count, `result` once per displayed file,
//! and `post` once at the end. Formatters only write; they never look at the
//! index themselves.

pub mod classic;
pub mod json;
pub mod xml;

use std::borrow::Cow;
use std::io::Write;

use serde::Serialize;

use crate::config::{ResultsFormat, SearchConfig};
use crate::error::Result;
use crate::index::{FileInfo, IndexFile};
use crate::query::SearchReport;

pub use self::classic::ClassicFormatter;
pub use self::json::JsonFormatter;
pub use self::xml::XmlFormatter;

/// A displayed result with its file record resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord<'a> {
    pub rank: u32,
    pub path: String,
    pub size: u64,
    pub title: Cow<'a, str>,
}

impl<'a> ResultRecord<'a> {
    /// Look up file `file_index` in `index`.
    pub fn resolve(index: &'a IndexFile, file_index: u32, rank: u32) -> Result<Self> {
        let info = FileInfo::parse(index.files().entry_bytes(file_index as usize)?)?;
        Ok(ResultRecord {
            rank,
            path: file_path(index, &info)?,
            size: info.size,
            title: info.title_lossy(),
        })
    }
}

/// The full path of a file: its directory joined with its name.
pub fn file_path(index: &IndexFile, info: &FileInfo<'_>) -> Result<String> {
    let dir = index.directories().entry_str(info.dir_index as usize)?;
    let mut path = String::from_utf8_lossy(dir).into_owned();
    if !path.is_empty() && !path.ends_with('/') {
        path.push('/');
    }
    path.push_str(&info.file_name_lossy());
    Ok(path)
}

/// Writes search results in one output format.
pub trait ResultsFormatter {
    /// Called once before any result.
    fn pre(&mut self, out: &mut dyn Write, ignored: &[String], total: usize) -> Result<()>;

    /// Called once per displayed result, best first.
    fn result(&mut self, out: &mut dyn Write, record: &ResultRecord<'_>) -> Result<()>;

    /// Called once after the last result.
    fn post(&mut self, out: &mut dyn Write) -> Result<()>;
}

/// The formatter for `format`.
pub fn formatter_for(format: ResultsFormat, separator: &str) -> Box<dyn ResultsFormatter> {
    match format {
        ResultsFormat::Classic => Box::new(ClassicFormatter::new(separator)),
        ResultsFormat::Xml => Box::new(XmlFormatter::new()),
        ResultsFormat::Json => Box::new(JsonFormatter::new()),
    }
}

/// Write `report` in the format chosen by `config`.
pub fn render_report(
    index: &IndexFile,
    report: &SearchReport,
    config: &SearchConfig,
    out: &mut dyn Write,
) -> Result<()> {
    let mut formatter = formatter_for(config.results_format, &config.result_separator);
    formatter.pre(out, &report.ignored, report.ranked.total)?;
    for result in &report.ranked.results {
        let record = ResultRecord::resolve(index, result.file_index, result.display_rank)?;
        formatter.result(out, &record)?;
    }
    formatter.post(out)?;
    out.flush()?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexWriter, Posting};
    use crate::query::search;

    #[test]
    fn test_render_report_resolves_paths() {
        let mut writer = IndexWriter::new();
        let dir = writer.add_directory("/home/docs");
        writer.add_file(dir, "a.txt", 120, "First");
        writer.add_file(dir, "b.txt", 80, "Second");
        writer.add_word("cat", vec![Posting::new(0, 1, 10), Posting::new(1, 3, 40)]);
        let index = IndexFile::from_bytes(writer.to_bytes().unwrap()).unwrap();

        let config = SearchConfig::default();
        let report = search(&index, "cat", &config).unwrap();
        let mut out = Vec::new();
        render_report(&index, &report, &config, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "# results: 2\n100 /home/docs/b.txt 80 Second\n25 /home/docs/a.txt 120 First\n"
        );
    }
}
