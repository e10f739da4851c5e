//! Query language, evaluation, and ranking.

pub mod evaluator;
pub mod parser;
pub mod ranker;
pub mod token;

pub use self::evaluator::{Evaluator, FileScore, RankMap, SearchOutcome};
pub use self::parser::{QueryNode, QueryParser};
pub use self::ranker::{RankedResult, RankedResults, rank_results};
pub use self::token::{Token, TokenKind, TokenStream};

use crate::config::SearchConfig;
use crate::error::Result;
use crate::index::IndexFile;

/// Everything needed to render the answer to one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchReport {
    pub ignored: Vec<String>,
    pub ranked: RankedResults,
}

/// Parse, evaluate, and rank `query` with the options in `config`.
pub fn search(index: &IndexFile, query: &str, config: &SearchConfig) -> Result<SearchReport> {
    let node = QueryParser::new().parse(query)?;
    let outcome = Evaluator::with_config(index, config).search(&node)?;
    Ok(SearchReport {
        ignored: outcome.ignored,
        ranked: rank_results(outcome.results, config.skip_results, config.max_results),
    })
}
