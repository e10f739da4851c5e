//! Text analysis for query words.

pub mod stemmer;

pub use stemmer::{PorterStemmer, Stemmer};
