//! Command implementations shared by the query tool and the daemon.
//!
//! Everything writes to a caller-supplied sink: standard output for the
//! command line, the client socket for the daemon.

use std::cmp::Ordering;
use std::io::Write;

use log::debug;

use crate::analysis::stemmer::{PorterStemmer, Stemmer};
use crate::cli::args::{Request, SearchArgs, Window};
use crate::config::SearchConfig;
use crate::error::Result;
use crate::index::{FileInfo, IndexFile, Segment, WordEntry};
use crate::query;
use crate::render::{file_path, render_report};

/// Carry out what `args` asks for against `index`.
///
/// `base` holds the options in force before `args`; the options in `args`
/// apply to this call only.
pub fn service_request(
    index: &IndexFile,
    args: &SearchArgs,
    base: &SearchConfig,
    out: &mut dyn Write,
) -> Result<()> {
    let config = args.search_config(base);
    match args.request()? {
        Request::Search(query) => {
            debug!("searching for '{query}'");
            let report = query::search(index, &query, &config)?;
            render_report(index, &report, &config, out)
        }
        Request::DumpWords(words) => dump_words(index, &words, &config, out),
        Request::DumpIndex => dump_index(index, &config, out),
        Request::DumpStopWords => dump_segment(index.stop_words(), out),
        Request::DumpMetaNames => dump_segment(index.meta_names(), out),
        Request::DumpWindow { window, words } => dump_window(index, window, &words, out),
    }
}

/// Write one line per file `entry` occurs in: `occurrences rank` then the file.
fn write_postings(
    index: &IndexFile,
    entry: &WordEntry<'_>,
    indent: &str,
    separator: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let files = index.files();
    for posting in entry.postings() {
        let posting = posting?;
        let info = FileInfo::parse(files.entry_bytes(posting.file_index as usize)?)?;
        writeln!(
            out,
            "{indent}{} {}{separator}{}{separator}{}{separator}{}",
            posting.occurrences,
            posting.rank,
            file_path(index, &info)?,
            info.size,
            info.title_lossy()
        )?;
    }
    Ok(())
}

fn dump_words(
    index: &IndexFile,
    words: &[String],
    config: &SearchConfig,
    out: &mut dyn Write,
) -> Result<()> {
    let stop_words = index.stop_words();
    let all_words = index.words();
    for word in words {
        let lower = word.to_lowercase();
        if stop_words.contains(lower.as_bytes())? {
            writeln!(out, "# ignored: {word}")?;
            continue;
        }
        let key = if config.stem_words {
            PorterStemmer.stem(&lower)
        } else {
            lower
        };
        match all_words.find(key.as_bytes())? {
            None => writeln!(out, "# not found: {word}")?,
            Some(i) => {
                let entry = WordEntry::parse(all_words.entry_bytes(i)?)?;
                write_postings(index, &entry, "", &config.result_separator, out)?;
                writeln!(out)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn dump_index(index: &IndexFile, config: &SearchConfig, out: &mut dyn Write) -> Result<()> {
    let words = index.words();
    for i in 0..words.len() {
        let entry = WordEntry::parse(words.entry_bytes(i)?)?;
        out.write_all(entry.word())?;
        writeln!(out)?;
        write_postings(index, &entry, "  ", &config.result_separator, out)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

fn dump_segment(segment: Segment<'_>, out: &mut dyn Write) -> Result<()> {
    for entry in segment.iter() {
        out.write_all(entry?)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

fn dump_window(
    index: &IndexFile,
    window: Window,
    words: &[String],
    out: &mut dyn Write,
) -> Result<()> {
    let stop_words = index.stop_words();
    let all_words = index.words();
    for word in words {
        let lower = word.to_lowercase();
        let key = lower.as_bytes();
        if stop_words.contains(key)? {
            writeln!(out, "# ignored: {word}")?;
            continue;
        }
        let Some(found) = all_words.find(key)? else {
            writeln!(out, "# not found: {word}")?;
            continue;
        };

        // Back up half a window, then print up to `size` words whose first
        // `match_len` bytes equal the word's.
        let wanted = &key[..key.len().min(window.match_len)];
        let mut shown = 0;
        for i in found.saturating_sub(window.size / 2)..all_words.len() {
            if shown == window.size {
                break;
            }
            let entry = all_words.entry_str(i)?;
            match entry[..entry.len().min(window.match_len)].cmp(wanted) {
                Ordering::Less => continue,
                Ordering::Greater => break,
                Ordering::Equal => {
                    out.write_all(entry)?;
                    writeln!(out)?;
                    shown += 1;
                }
            }
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
