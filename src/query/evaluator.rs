//! Evaluation of parsed queries against an index.
//!
//! Every node evaluates to a [`RankMap`] from file index to score. Maps are
//! combined by summing the ranks of files present on both sides.

use ahash::{AHashMap, AHashSet};
use log::debug;

use crate::analysis::stemmer::{PorterStemmer, Stemmer};
use crate::config::SearchConfig;
use crate::error::Result;
use crate::index::{IndexFile, MetaId, WordEntry};
use crate::query::parser::QueryNode;

/// Accumulated score of one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileScore {
    pub rank: u64,
    pub occurrences: u64,
}

impl FileScore {
    pub fn new(rank: u64, occurrences: u64) -> Self {
        FileScore { rank, occurrences }
    }

    fn add(&mut self, other: FileScore) {
        self.rank = self.rank.saturating_add(other.rank);
        self.occurrences = self.occurrences.saturating_add(other.occurrences);
    }
}

/// Scores of the files a query matched, keyed by file index.
pub type RankMap = AHashMap<u32, FileScore>;

/// The unranked result of evaluating one query.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub results: RankMap,
    /// Query words that were not searched for, in the order first seen.
    pub ignored: Vec<String>,
}

/// Evaluates [`QueryNode`] trees against one index.
pub struct Evaluator<'a> {
    index: &'a IndexFile,
    stemmer: Option<&'a dyn Stemmer>,
    word_files_max: Option<usize>,
    word_percent_max: Option<u8>,
    ignored: Vec<String>,
    ignored_set: AHashSet<String>,
}

impl<'a> Evaluator<'a> {
    pub fn new(index: &'a IndexFile) -> Self {
        Evaluator {
            index,
            stemmer: None,
            word_files_max: None,
            word_percent_max: None,
            ignored: Vec::new(),
            ignored_set: AHashSet::new(),
        }
    }

    /// An evaluator using the stemming and word-frequency limits of `config`.
    pub fn with_config(index: &'a IndexFile, config: &SearchConfig) -> Self {
        let mut evaluator = Self::new(index);
        if config.stem_words {
            evaluator = evaluator.with_stemmer(&PorterStemmer);
        }
        evaluator.word_files_max = config.word_files_max;
        evaluator.word_percent_max = config.word_percent_max;
        evaluator
    }

    pub fn with_stemmer(mut self, stemmer: &'a dyn Stemmer) -> Self {
        self.stemmer = Some(stemmer);
        self
    }

    pub fn with_word_files_max(mut self, max: usize) -> Self {
        self.word_files_max = Some(max);
        self
    }

    pub fn with_word_percent_max(mut self, percent: u8) -> Self {
        self.word_percent_max = Some(percent);
        self
    }

    /// Evaluate a whole query.
    pub fn search(mut self, query: &QueryNode) -> Result<SearchOutcome> {
        let results = self.evaluate(query, None)?;
        debug!(
            "query {query} matched {} files ({} words ignored)",
            results.len(),
            self.ignored.len()
        );
        Ok(SearchOutcome {
            results,
            ignored: self.ignored,
        })
    }

    fn evaluate(&mut self, node: &QueryNode, meta: Option<MetaId>) -> Result<RankMap> {
        match node {
            QueryNode::Word(word) => self.word(word, meta),
            QueryNode::Prefix(prefix) => self.prefix(prefix, meta),
            QueryNode::Meta { name, node } => {
                match self.index.meta_names().find(name.as_bytes())? {
                    Some(id) => self.evaluate(node, Some(id as MetaId)),
                    None => {
                        debug!("unknown meta name {name}");
                        Ok(RankMap::new())
                    }
                }
            }
            QueryNode::And(a, b) => {
                let a = self.evaluate(a, meta)?;
                let b = self.evaluate(b, meta)?;
                Ok(intersect(a, b))
            }
            QueryNode::Or(a, b) => {
                let a = self.evaluate(a, meta)?;
                let b = self.evaluate(b, meta)?;
                Ok(union(a, b))
            }
            QueryNode::AndNot(a, b) => {
                let mut a = self.evaluate(a, meta)?;
                let b = self.evaluate(b, meta)?;
                a.retain(|file, _| !b.contains_key(file));
                Ok(a)
            }
            QueryNode::Not(a) => {
                let excluded = self.evaluate(a, meta)?;
                let files = self.index.files().len() as u32;
                Ok((0..files)
                    .filter(|file| !excluded.contains_key(file))
                    .map(|file| (file, FileScore::new(1, 0)))
                    .collect())
            }
        }
    }

    fn word(&mut self, word: &str, meta: Option<MetaId>) -> Result<RankMap> {
        if self.index.stop_words().contains(word.as_bytes())? {
            self.ignore(word);
            return Ok(RankMap::new());
        }

        let stemmed;
        let key = match self.stemmer {
            Some(stemmer) => {
                stemmed = stemmer.stem(word);
                stemmed.as_str()
            }
            None => word,
        };

        let words = self.index.words();
        let Some(i) = words.find(key.as_bytes())? else {
            return Ok(RankMap::new());
        };
        let entry = WordEntry::parse(words.entry_bytes(i)?)?;

        if self.word_files_max.is_some() || self.word_percent_max.is_some() {
            let count = entry.file_count()?;
            if self.too_frequent(count) {
                debug!("ignoring {word}: occurs in {count} files");
                self.ignore(word);
                return Ok(RankMap::new());
            }
        }

        let mut results = RankMap::new();
        accumulate(&mut results, &entry, meta)?;
        Ok(results)
    }

    fn prefix(&mut self, prefix: &str, meta: Option<MetaId>) -> Result<RankMap> {
        let words = self.index.words();
        let mut results = RankMap::new();
        for i in words.prefix_range(prefix.as_bytes())? {
            let entry = WordEntry::parse(words.entry_bytes(i)?)?;
            accumulate(&mut results, &entry, meta)?;
        }
        Ok(results)
    }

    fn too_frequent(&self, count: usize) -> bool {
        if self.word_files_max.is_some_and(|max| count > max) {
            return true;
        }
        match self.word_percent_max {
            Some(percent) => {
                let total = self.index.files().len();
                total > 0 && count * 100 > usize::from(percent) * total
            }
            None => false,
        }
    }

    fn ignore(&mut self, word: &str) {
        if self.ignored_set.insert(word.to_string()) {
            self.ignored.push(word.to_string());
        }
    }
}

fn accumulate(results: &mut RankMap, entry: &WordEntry<'_>, meta: Option<MetaId>) -> Result<()> {
    for posting in entry.postings() {
        let posting = posting?;
        if meta.is_some_and(|id| !posting.has_meta(id)) {
            continue;
        }
        results
            .entry(posting.file_index)
            .or_default()
            .add(FileScore::new(
                u64::from(posting.rank),
                u64::from(posting.occurrences),
            ));
    }
    Ok(())
}

fn intersect(a: RankMap, b: RankMap) -> RankMap {
    let (small, mut large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .into_iter()
        .filter_map(|(file, mut score)| {
            large.remove(&file).map(|other| {
                score.add(other);
                (file, score)
            })
        })
        .collect()
}

fn union(a: RankMap, b: RankMap) -> RankMap {
    let (small, mut large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    for (file, score) in small {
        large.entry(file).or_default().add(score);
    }
    large
}
