//! JSON results object.

use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::render::{ResultRecord, ResultsFormatter};

#[derive(Debug, Serialize)]
struct JsonFile {
    rank: u32,
    path: String,
    size: u64,
    title: String,
}

#[derive(Debug, Default, Serialize)]
struct JsonResults {
    ignored: Vec<String>,
    results: usize,
    files: Vec<JsonFile>,
}

/// Buffers every result and writes one object in `post`.
#[derive(Debug, Default)]
pub struct JsonFormatter {
    document: JsonResults,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultsFormatter for JsonFormatter {
    fn pre(&mut self, _out: &mut dyn Write, ignored: &[String], total: usize) -> Result<()> {
        self.document.ignored = ignored.to_vec();
        self.document.results = total;
        Ok(())
    }

    fn result(&mut self, _out: &mut dyn Write, record: &ResultRecord<'_>) -> Result<()> {
        self.document.files.push(JsonFile {
            rank: record.rank,
            path: record.path.clone(),
            size: record.size,
            title: record.title.to_string(),
        });
        Ok(())
    }

    fn post(&mut self, out: &mut dyn Write) -> Result<()> {
        let document = std::mem::take(&mut self.document);
        serde_json::to_writer_pretty(&mut *out, &document)?;
        writeln!(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_support::{record, render};

    #[test]
    fn test_json_object() {
        let mut formatter = JsonFormatter::new();
        let text = render(
            &mut formatter,
            &["the".to_string()],
            2,
            &[record(100, "/a/one", 5, "One"), record(50, "/a/two", 6, "Two")],
        );

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["ignored"][0], "the");
        assert_eq!(value["results"], 2);
        assert_eq!(value["files"].as_array().unwrap().len(), 2);
        assert_eq!(value["files"][1]["rank"], 50);
        assert_eq!(value["files"][0]["path"], "/a/one");
    }
}
