//! Unicode-aware find-in-document search.
//!
//! The pieces, bottom-up:
//!
//! - [`normalize`] folds text for matching and keeps a diff table that maps
//!   normalized offsets back to the original text.
//! - [`query`] turns a user query into a regex over normalized text.
//! - [`approx`] finds approximate matches with Myers' bit-parallel algorithm.
//! - [`find`] drives a multi-page search the way a document viewer's find
//!   bar does: debounced requests, concurrent page extraction, wrap-around
//!   navigation and match counts.

pub mod approx;
pub mod char_class;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod find;
pub mod logging;
pub mod normalize;
pub mod page;
pub mod query;
pub mod run;
pub mod snippet;

pub use approx::{approximate_match, ApproximateMatch};
pub use normalize::{NormalizedText, TextNormalizer};
pub use query::Query;
