use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Search paginated text documents
#[derive(Parser, Debug)]
#[command(name = "docfind", about = "Search paginated text documents")]
pub struct Cli {
    /// Write debug logs to stderr.
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Path to config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find every match of a query, page by page, in navigation order
    Search(SearchArgs),
    /// Find approximate matches of a pattern in the whole file
    Fuzzy(FuzzyArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Text file whose pages are separated by form feeds
    pub file: PathBuf,

    /// What to search for. Several values are alternatives: any may match.
    #[arg(required = true)]
    pub query: Vec<String>,

    /// Match upper and lower case exactly
    #[arg(long, default_value_t = false)]
    pub case_sensitive: bool,

    /// Only match whole words
    #[arg(long, default_value_t = false)]
    pub entire_word: bool,

    /// Accents in the query must match accents in the text
    #[arg(long, default_value_t = false)]
    pub match_diacritics: bool,

    /// Walk matches backward
    #[arg(long, default_value_t = false)]
    pub previous: bool,

    /// 1-based page to start searching from
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    /// Words of context around each match
    #[arg(long)]
    pub snippet_words: Option<usize>,

    /// Print results as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FuzzyArgs {
    /// Text file to search (form feeds are treated as line breaks)
    pub file: PathBuf,

    /// Pattern to match approximately
    pub pattern: String,

    /// Maximum edit distance of a match
    #[arg(long, default_value_t = 1)]
    pub max_errors: usize,

    /// Print results as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
