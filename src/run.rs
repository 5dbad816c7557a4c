//! Command runners for the `docfind` binary.
//!
//! `docfind search <file> <query>...` drives a [`FindController`] over a
//! form-feed paginated text file the way a viewer would: one `New` request
//! from the start page, then `find_again` until every match was visited
//! once. `docfind fuzzy <file> <pattern>` runs the approximate matcher over
//! the whole file.
//!
//! Output is plain text with ANSI colors on a terminal, no colors when
//! piped, or JSON with `--json`.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use crate::approx::{approximate_match, ApproximateMatch};
use crate::cli::{FuzzyArgs, SearchArgs};
use crate::config::AppConfig;
use crate::document::TextDocument;
use crate::find::event::{self, FindEventReceiver};
use crate::find::{FindController, FindOptions, FindState, FindStatus, RequestKind};
use crate::normalize::TextNormalizer;
use crate::page::{PageSource, StaticViewport};
use crate::query::Query;

pub type RunResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// ANSI color helpers
// ---------------------------------------------------------------------------

/// ANSI escape codes for terminal output. Empty when stdout is piped.
struct AnsiColors {
    page: &'static str,
    ordinal: &'static str,
    marker: &'static str,
    reset: &'static str,
}

impl AnsiColors {
    fn for_tty() -> Self {
        Self {
            page: "\x1b[36m",    // cyan
            ordinal: "\x1b[90m", // gray
            marker: "\x1b[33m",  // yellow
            reset: "\x1b[0m",
        }
    }

    fn for_pipe() -> Self {
        Self {
            page: "",
            ordinal: "",
            marker: "",
            reset: "",
        }
    }

    fn detect() -> Self {
        if io::stdout().is_terminal() {
            Self::for_tty()
        } else {
            Self::for_pipe()
        }
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// One visited match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hit {
    /// 1-based page number.
    pub page: usize,
    pub match_index: usize,
    /// 1-based ordinal across the document.
    pub ordinal: usize,
    /// Char offsets into the page text.
    pub start: usize,
    pub end: usize,
    pub snippet: String,
    /// Reaching this match crossed the end (or start) of the document.
    pub wrapped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    pub query: Query,
    pub pages: usize,
    pub total: usize,
    pub status: Option<FindStatus>,
    pub hits: Vec<Hit>,
}

/// Build the find request for the command line arguments.
pub fn find_state(args: &SearchArgs, config: &AppConfig) -> FindState {
    let query = match args.query.as_slice() {
        [single] => Query::Single(single.clone()),
        many => Query::Alternatives(many.to_vec()),
    };
    let mut state = FindState {
        query,
        find_previous: args.previous,
        ..FindState::default()
    }
    .with_request(RequestKind::New);
    config.apply_search_flags(&mut state);
    state
}

/// Search `source` and visit every match once, in navigation order.
pub async fn collect_hits(
    source: Arc<dyn PageSource>,
    state: FindState,
    start_page: usize,
    options: FindOptions,
) -> SearchReport {
    let pages = source.page_count();
    let viewport = StaticViewport {
        current_page_number: start_page.clamp(1, pages.max(1)),
    };
    let (tx, mut rx) = event::channel();
    let mut controller = FindController::new(
        Arc::new(viewport),
        tx,
        options,
        Arc::new(TextNormalizer::new()),
    );
    controller.set_document(Some(source));

    let query = state.query.clone();
    let previous = state.find_previous;
    controller.find(state);
    controller.settle().await;
    log_events(&mut rx);

    let total = controller.matches_count().total;
    let mut hits = Vec::with_capacity(total);
    while hits.len() < total {
        if !hits.is_empty() {
            controller.find_again(previous);
            log_events(&mut rx);
        }
        let Some(selected) = controller.selected() else {
            break;
        };
        let count = controller.matches_count();
        hits.push(Hit {
            page: selected.page_idx + 1,
            match_index: selected.match_idx,
            ordinal: count.current,
            start: count.current_offset_start.unwrap_or_default(),
            end: count.current_offset_end.unwrap_or_default(),
            snippet: count
                .snippets
                .get(count.current.saturating_sub(1))
                .cloned()
                .unwrap_or_default(),
            wrapped: controller.status() == Some(FindStatus::Wrapped),
        });
    }
    debug!(total, visited = hits.len(), "search finished");

    SearchReport {
        query,
        pages,
        total,
        status: controller.status(),
        hits,
    }
}

fn log_events(rx: &mut FindEventReceiver) {
    for event in event::drain(rx) {
        trace!(?event, "find event");
    }
}

/// Run `docfind search`.
pub async fn run_search(args: &SearchArgs, config: &AppConfig) -> RunResult {
    let document = TextDocument::load(&args.file).await?;
    let state = find_state(args, config);
    debug!(file = %args.file.display(), pages = document.page_count(), "document loaded");

    let search = collect_hits(Arc::new(document), state, args.page, config.find_options());
    let report = tokio::select! {
        report = search => report,
        _ = tokio::signal::ctrl_c() => return Ok(()),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = if args.json {
        write_json(&mut out, &report)
    } else {
        print_report(&mut out, &report, &AnsiColors::detect())
    };
    ignore_broken_pipe(result)
}

fn print_report<W: Write>(out: &mut W, report: &SearchReport, colors: &AnsiColors) -> io::Result<()> {
    if report.hits.is_empty() {
        writeln!(out, "no matches")?;
        return out.flush();
    }
    for hit in &report.hits {
        if hit.wrapped {
            writeln!(out, "{}-- wrapped --{}", colors.marker, colors.reset)?;
        }
        writeln!(
            out,
            "{}page {}{} {}[{}/{}]{} {}",
            colors.page,
            hit.page,
            colors.reset,
            colors.ordinal,
            hit.ordinal,
            report.total,
            colors.reset,
            hit.snippet,
        )?;
    }
    out.flush()
}

// ---------------------------------------------------------------------------
// Fuzzy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FuzzyHit {
    #[serde(flatten)]
    pub span: ApproximateMatch,
    pub text: String,
}

/// Approximate matches of `pattern` in `text`, with the matched text.
pub fn fuzzy_hits(text: &str, pattern: &str, max_errors: usize) -> Vec<FuzzyHit> {
    let chars: Vec<char> = text.chars().collect();
    approximate_match(text, pattern, max_errors)
        .into_iter()
        .map(|span| FuzzyHit {
            text: chars[span.start..span.end].iter().collect(),
            span,
        })
        .collect()
}

/// Run `docfind fuzzy`.
pub async fn run_fuzzy(args: &FuzzyArgs) -> RunResult {
    let document = TextDocument::load(&args.file).await?;
    let hits = fuzzy_hits(&document.full_text(), &args.pattern, args.max_errors);
    debug!(pattern = %args.pattern, found = hits.len(), "fuzzy search finished");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = if args.json {
        write_json(&mut out, &hits)
    } else {
        print_fuzzy(&mut out, &hits, &AnsiColors::detect())
    };
    ignore_broken_pipe(result)
}

fn print_fuzzy<W: Write>(out: &mut W, hits: &[FuzzyHit], colors: &AnsiColors) -> io::Result<()> {
    if hits.is_empty() {
        writeln!(out, "no matches")?;
        return out.flush();
    }
    for hit in hits {
        writeln!(
            out,
            "{}{}..{}{} {}errors={}{} {}",
            colors.page,
            hit.span.start,
            hit.span.end,
            colors.reset,
            colors.ordinal,
            hit.span.errors,
            colors.reset,
            hit.text.replace('\n', " "),
        )?;
    }
    out.flush()
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    out.flush()
}

/// A closed pipe (`docfind ... | head`) is a normal way to stop.
fn ignore_broken_pipe(result: io::Result<()>) -> RunResult {
    match result {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => Ok(other?),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(query: &[&str]) -> SearchArgs {
        SearchArgs {
            file: PathBuf::from("doc.txt"),
            query: query.iter().map(|q| q.to_string()).collect(),
            case_sensitive: false,
            entire_word: false,
            match_diacritics: false,
            previous: false,
            page: 1,
            snippet_words: None,
            json: false,
        }
    }

    fn options() -> FindOptions {
        FindOptions {
            snippet_words: 2,
            ..FindOptions::default()
        }
    }

    async fn report_for(text: &str, state: FindState, start_page: usize) -> SearchReport {
        let doc = TextDocument::parse(text);
        collect_hits(Arc::new(doc), state, start_page, options()).await
    }

    #[test]
    fn test_find_state_single_and_alternatives() {
        let config = AppConfig::default();
        let state = find_state(&args(&["cat"]), &config);
        assert_eq!(state.query, Query::Single("cat".into()));
        assert_eq!(state.request, Some(RequestKind::New));

        let state = find_state(&args(&["cat", "dog"]), &config);
        assert_eq!(
            state.query,
            Query::Alternatives(vec!["cat".into(), "dog".into()])
        );
    }

    #[test]
    fn test_find_state_uses_config_flags() {
        let mut config = AppConfig::default();
        config.search.entire_word = true;
        let state = find_state(&args(&["cat"]), &config);
        assert!(state.entire_word);
    }

    #[tokio::test]
    async fn test_collect_hits_visits_each_match_once() {
        let report = report_for(
            "a cat sat\x0cno felines\x0cthe cat ran",
            FindState::new("cat").with_request(RequestKind::New),
            1,
        )
        .await;
        assert_eq!(report.pages, 3);
        assert_eq!(report.total, 2);
        let pages: Vec<usize> = report.hits.iter().map(|h| h.page).collect();
        assert_eq!(pages, vec![1, 3]);
        assert_eq!(report.hits[0].ordinal, 1);
        assert_eq!(report.hits[0].snippet, "a cat sat");
        assert_eq!((report.hits[1].start, report.hits[1].end), (4, 7));
        assert!(report.hits.iter().all(|h| !h.wrapped));
    }

    #[tokio::test]
    async fn test_collect_hits_from_later_page_wraps() {
        let report = report_for(
            "a cat sat\x0cno felines\x0cthe cat ran",
            FindState::new("cat").with_request(RequestKind::New),
            2,
        )
        .await;
        let visited: Vec<(usize, bool)> = report.hits.iter().map(|h| (h.page, h.wrapped)).collect();
        assert_eq!(visited, vec![(3, false), (1, true)]);
        assert_eq!(report.hits[1].ordinal, 1);
    }

    #[tokio::test]
    async fn test_collect_hits_backward() {
        let state = FindState {
            find_previous: true,
            ..FindState::new("cat")
        }
        .with_request(RequestKind::New);
        let report = report_for("cat cat\x0ccat", state, 2).await;
        let order: Vec<(usize, usize)> = report.hits.iter().map(|h| (h.page, h.match_index)).collect();
        assert_eq!(order, vec![(2, 0), (1, 1), (1, 0)]);
    }

    #[tokio::test]
    async fn test_collect_hits_nothing_found() {
        let report = report_for(
            "a cat sat",
            FindState::new("zebra").with_request(RequestKind::New),
            1,
        )
        .await;
        assert_eq!(report.total, 0);
        assert!(report.hits.is_empty());
        assert_eq!(report.status, Some(FindStatus::NotFound));
    }

    #[test]
    fn test_print_report_pipe() {
        let report = SearchReport {
            query: Query::from("cat"),
            pages: 2,
            total: 2,
            status: Some(FindStatus::Wrapped),
            hits: vec![
                Hit {
                    page: 2,
                    match_index: 0,
                    ordinal: 2,
                    start: 0,
                    end: 3,
                    snippet: "cat".into(),
                    wrapped: false,
                },
                Hit {
                    page: 1,
                    match_index: 0,
                    ordinal: 1,
                    start: 2,
                    end: 5,
                    snippet: "a cat".into(),
                    wrapped: true,
                },
            ],
        };
        let mut buf = Vec::new();
        print_report(&mut buf, &report, &AnsiColors::for_pipe()).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "page 2 [2/2] cat\n-- wrapped --\npage 1 [1/2] a cat\n"
        );
    }

    #[test]
    fn test_print_report_without_hits() {
        let report = SearchReport {
            query: Query::from("x"),
            pages: 1,
            total: 0,
            status: Some(FindStatus::NotFound),
            hits: Vec::new(),
        };
        let mut buf = Vec::new();
        print_report(&mut buf, &report, &AnsiColors::for_tty()).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "no matches\n");
    }

    #[test]
    fn test_fuzzy_hits_carry_text() {
        let hits = fuzzy_hits("fox jumpz over", "jumps", 1);
        assert!(hits.iter().any(|h| h.text == "jumpz"));
        assert!(hits.iter().all(|h| h.span.errors == 1));
    }

    #[test]
    fn test_fuzzy_json_is_flat() {
        let hits = fuzzy_hits("fox jumps", "jumps", 0);
        let mut buf = Vec::new();
        write_json(&mut buf, &hits).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["start"], 4);
        assert_eq!(value[0]["end"], 9);
        assert_eq!(value[0]["errors"], 0);
        assert_eq!(value[0]["text"], "jumps");
    }

    #[test]
    fn test_print_fuzzy_pipe() {
        let hits = fuzzy_hits("a\nb jumps", "jumps", 0);
        let mut buf = Vec::new();
        print_fuzzy(&mut buf, &hits, &AnsiColors::for_pipe()).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "4..9 errors=0 jumps\n");
    }

    #[test]
    fn test_ignore_broken_pipe() {
        let broken = Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        assert!(ignore_broken_pipe(broken).is_ok());
        let other = Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert!(ignore_broken_pipe(other).is_err());
    }
}
