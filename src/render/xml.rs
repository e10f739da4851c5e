//! XML results document.

use std::io::Write;

use crate::error::Result;
use crate::render::{ResultRecord, ResultsFormatter};

#[derive(Debug, Default)]
pub struct XmlFormatter {
    opened_list: bool,
}

impl XmlFormatter {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Escape the five XML special characters.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl ResultsFormatter for XmlFormatter {
    fn pre(&mut self, out: &mut dyn Write, ignored: &[String], total: usize) -> Result<()> {
        writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(out, "<SearchResults>")?;
        if !ignored.is_empty() {
            writeln!(out, "  <IgnoredList>")?;
            for word in ignored {
                writeln!(out, "    <Ignored>{}</Ignored>", escape(word))?;
            }
            writeln!(out, "  </IgnoredList>")?;
        }
        writeln!(out, "  <ResultCount>{total}</ResultCount>")?;
        Ok(())
    }

    fn result(&mut self, out: &mut dyn Write, record: &ResultRecord<'_>) -> Result<()> {
        if !self.opened_list {
            writeln!(out, "  <ResultList>")?;
            self.opened_list = true;
        }
        writeln!(out, "    <File>")?;
        writeln!(out, "      <Rank>{}</Rank>", record.rank)?;
        writeln!(out, "      <Path>{}</Path>", escape(&record.path))?;
        writeln!(out, "      <Size>{}</Size>", record.size)?;
        writeln!(out, "      <Title>{}</Title>", escape(&record.title))?;
        writeln!(out, "    </File>")?;
        Ok(())
    }

    fn post(&mut self, out: &mut dyn Write) -> Result<()> {
        if self.opened_list {
            writeln!(out, "  </ResultList>")?;
        }
        writeln!(out, "</SearchResults>")?;
        Ok(())
    }
}
