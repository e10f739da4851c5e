//! Plain-text results: a comment header and one separated line per file.

use std::io::Write;

use crate::error::Result;
use crate::render::{ResultRecord, ResultsFormatter};

pub struct ClassicFormatter {
    separator: String,
}

impl ClassicFormatter {
    pub fn new(separator: &str) -> Self {
        ClassicFormatter {
            separator: separator.to_string(),
        }
    }
}

impl ResultsFormatter for ClassicFormatter {
    fn pre(&mut self, out: &mut dyn Write, ignored: &[String], total: usize) -> Result<()> {
        if !ignored.is_empty() {
            writeln!(out, "# ignored: {}", ignored.join(" "))?;
        }
        writeln!(out, "# results: {total}")?;
        Ok(())
    }

    fn result(&mut self, out: &mut dyn Write, record: &ResultRecord<'_>) -> Result<()> {
        let sep = &self.separator;
        writeln!(
            out,
            "{}{sep}{}{sep}{}{sep}{}",
            record.rank, record.path, record.size, record.title
        )?;
        Ok(())
    }

    fn post(&mut self, _out: &mut dyn Write) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_support::{record, render};

    #[test]
    fn test_classic_output() {
        let mut formatter = ClassicFormatter::new(" ");
        let text = render(
            &mut formatter,
            &["the".to_string(), "of".to_string()],
            7,
            &[record(100, "/a/b.html", 42, "A Title")],
        );
        assert_eq!(text, "# ignored: the of\n# results: 7\n100 /a/b.html 42 A Title\n");
    }

    #[test]
    fn test_custom_separator_and_no_ignored_line() {
        let mut formatter = ClassicFormatter::new("\t");
        let text = render(&mut formatter, &[], 1, &[record(3, "x", 0, "")]);
        assert_eq!(text, "# results: 1\n3\tx\t0\t\n");
    }
}
