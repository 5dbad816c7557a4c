use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{Cli, Commands};
use crate::error::ConfigError;
use crate::find::{FindOptions, FindState};
use crate::find::state::{DEFAULT_DEBOUNCE, DEFAULT_SNIPPET_WORDS};

// ---------------------------------------------------------------------------
// TOML-deserializable config (intermediate representation)
// ---------------------------------------------------------------------------

/// Raw config as parsed from the TOML file.
/// All fields are optional so that missing keys fall through to defaults.
/// Unknown keys are silently ignored by serde.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    verbose: Option<bool>,
    search: FileSearchConfig,
    snippet: FileSnippetConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileSearchConfig {
    case_sensitive: Option<bool>,
    entire_word: Option<bool>,
    match_diacritics: Option<bool>,
    debounce_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileSnippetConfig {
    words: Option<usize>,
}

// ---------------------------------------------------------------------------
// Effective (merged) config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppConfig {
    pub verbose: bool,
    pub search: SearchConfig,
    pub snippet: SnippetConfig,
}

/// Default search flags, overridable per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub case_sensitive: bool,
    pub entire_word: bool,
    pub match_diacritics: bool,
    pub debounce: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnippetConfig {
    pub words: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            entire_word: false,
            match_diacritics: false,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            words: DEFAULT_SNIPPET_WORDS,
        }
    }
}

impl AppConfig {
    pub fn find_options(&self) -> FindOptions {
        FindOptions {
            debounce: self.search.debounce,
            snippet_words: self.snippet.words,
        }
    }

    /// Apply the configured flags to a find request.
    pub fn apply_search_flags(&self, state: &mut FindState) {
        state.case_sensitive = self.search.case_sensitive;
        state.entire_word = self.search.entire_word;
        state.match_diacritics = self.search.match_diacritics;
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Returns the default config file path: `~/.config/docfind/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("docfind").join("config.toml"))
}

/// Load the config file at `path`. A missing file is `Ok(None)`.
fn load_file_config(path: &Path) -> Result<Option<FileConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<FileConfig>(&contents)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Build the effective `AppConfig` by merging defaults, config file, and CLI args.
///
/// Precedence (highest wins):
/// 1. CLI flags (if explicitly provided)
/// 2. Config file values
/// 3. Hardcoded defaults
///
/// Problems with the config file never abort; they are returned alongside
/// the config so the caller can report them once logging is up.
pub fn build_config(cli: &Cli) -> (AppConfig, Vec<ConfigError>) {
    let mut config = AppConfig::default();
    let mut warnings = Vec::new();

    let config_path = cli.config.clone().or_else(default_config_path);

    if let Some(ref path) = config_path {
        match load_file_config(path) {
            Ok(Some(file_cfg)) => overlay_file_config(&mut config, file_cfg),
            Ok(None) => {
                // Only an explicit --config is expected to exist.
                if cli.config.is_some() {
                    warnings.push(ConfigError::NotFound(path.clone()));
                }
            }
            Err(e) => warnings.push(e),
        }
    }

    // CLI overrides. Flags only ever switch options on.
    if cli.verbose {
        config.verbose = true;
    }
    if let Commands::Search(ref args) = cli.command {
        if args.case_sensitive {
            config.search.case_sensitive = true;
        }
        if args.entire_word {
            config.search.entire_word = true;
        }
        if args.match_diacritics {
            config.search.match_diacritics = true;
        }
        if let Some(words) = args.snippet_words {
            config.snippet.words = words;
        }
    }

    (config, warnings)
}

fn overlay_file_config(config: &mut AppConfig, file_cfg: FileConfig) {
    if let Some(v) = file_cfg.verbose {
        config.verbose = v;
    }
    if let Some(v) = file_cfg.search.case_sensitive {
        config.search.case_sensitive = v;
    }
    if let Some(v) = file_cfg.search.entire_word {
        config.search.entire_word = v;
    }
    if let Some(v) = file_cfg.search.match_diacritics {
        config.search.match_diacritics = v;
    }
    if let Some(ms) = file_cfg.search.debounce_ms {
        config.search.debounce = Duration::from_millis(ms);
    }
    if let Some(words) = file_cfg.snippet.words {
        config.snippet.words = words;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{FuzzyArgs, SearchArgs};
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: parse a TOML string into a FileConfig
    fn parse_file_config(toml_str: &str) -> Option<FileConfig> {
        toml::from_str::<FileConfig>(toml_str).ok()
    }

    /// Helper: write TOML to a temp file and load it
    fn load_from_string(toml_str: &str) -> Result<Option<FileConfig>, ConfigError> {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(toml_str.as_bytes()).unwrap();
        load_file_config(f.path())
    }

    fn search_args() -> SearchArgs {
        SearchArgs {
            file: PathBuf::from("doc.txt"),
            query: vec!["cat".to_string()],
            case_sensitive: false,
            entire_word: false,
            match_diacritics: false,
            previous: false,
            page: 1,
            snippet_words: None,
            json: false,
        }
    }

    /// Helper: build a minimal Cli struct for testing
    fn cli_with_config(path: &Path) -> Cli {
        Cli {
            verbose: false,
            config: Some(path.to_path_buf()),
            command: Commands::Search(search_args()),
        }
    }

    fn temp_config(toml: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(toml.as_bytes()).unwrap();
        f
    }

    // -- Default config tests -------------------------------------------------

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(!config.verbose);
        assert!(!config.search.case_sensitive);
        assert!(!config.search.entire_word);
        assert!(!config.search.match_diacritics);
        assert_eq!(config.search.debounce, Duration::from_millis(250));
        assert_eq!(config.snippet.words, 8);
        assert_eq!(config.find_options(), FindOptions::default());
    }

    // -- TOML parsing tests ---------------------------------------------------

    #[test]
    fn test_parse_valid_full_config() {
        let toml = r#"
verbose = true

[search]
case_sensitive = true
entire_word = true
match_diacritics = true
debounce_ms = 100

[snippet]
words = 4
"#;
        let cfg = parse_file_config(toml).unwrap();
        assert_eq!(cfg.verbose, Some(true));
        assert_eq!(cfg.search.case_sensitive, Some(true));
        assert_eq!(cfg.search.entire_word, Some(true));
        assert_eq!(cfg.search.match_diacritics, Some(true));
        assert_eq!(cfg.search.debounce_ms, Some(100));
        assert_eq!(cfg.snippet.words, Some(4));
    }

    #[test]
    fn test_parse_empty_config() {
        let cfg = parse_file_config("").unwrap();
        assert_eq!(cfg.verbose, None);
        assert_eq!(cfg.search.case_sensitive, None);
        assert_eq!(cfg.search.debounce_ms, None);
        assert_eq!(cfg.snippet.words, None);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let toml = r#"
verbose = false
unknown_key = "should be ignored"

[search]
entire_word = true
fancy_mode = true

[unknown_section]
foo = "bar"
"#;
        let cfg = parse_file_config(toml).unwrap();
        assert_eq!(cfg.verbose, Some(false));
        assert_eq!(cfg.search.entire_word, Some(true));
    }

    #[test]
    fn test_load_missing_file() {
        let path = Path::new("/tmp/docfind-test-nonexistent-config-12345.toml");
        assert!(matches!(load_file_config(path), Ok(None)));
    }

    #[test]
    fn test_load_valid_file() {
        let cfg = load_from_string("[snippet]\nwords = 2\n").unwrap().unwrap();
        assert_eq!(cfg.snippet.words, Some(2));
    }

    #[test]
    fn test_load_malformed_file() {
        let result = load_from_string("not valid {{{{ toml");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    // -- build_config merge tests ---------------------------------------------

    #[test]
    fn test_build_config_missing_explicit_file_warns() {
        let cli = cli_with_config(Path::new("/tmp/docfind-nonexistent-54321.toml"));
        let (config, warnings) = build_config(&cli);
        assert_eq!(config, AppConfig::default());
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], ConfigError::NotFound(_)));
    }

    #[test]
    fn test_build_config_malformed_file_falls_back() {
        let f = temp_config("verbose = [[[");
        let (config, warnings) = build_config(&cli_with_config(f.path()));
        assert_eq!(config, AppConfig::default());
        assert!(matches!(warnings[0], ConfigError::Parse { .. }));
    }

    #[test]
    fn test_build_config_file_overrides_defaults() {
        let f = temp_config(
            r#"
verbose = true

[search]
entire_word = true
debounce_ms = 10

[snippet]
words = 3
"#,
        );
        let (config, warnings) = build_config(&cli_with_config(f.path()));
        assert!(warnings.is_empty());
        assert!(config.verbose);
        assert!(config.search.entire_word);
        assert!(!config.search.case_sensitive);
        assert_eq!(config.search.debounce, Duration::from_millis(10));
        assert_eq!(config.snippet.words, 3);
    }

    #[test]
    fn test_build_config_cli_overrides_file() {
        let f = temp_config("[snippet]\nwords = 3\n");
        let cli = Cli {
            verbose: true,
            config: Some(f.path().to_path_buf()),
            command: Commands::Search(SearchArgs {
                case_sensitive: true,
                match_diacritics: true,
                snippet_words: Some(6),
                ..search_args()
            }),
        };
        let (config, _) = build_config(&cli);
        assert!(config.verbose);
        assert!(config.search.case_sensitive);
        assert!(config.search.match_diacritics);
        assert_eq!(config.snippet.words, 6);
    }

    #[test]
    fn test_build_config_cli_false_does_not_override_file() {
        // Flags left off on the command line keep the file's value.
        let f = temp_config("verbose = true\n[search]\nentire_word = true\n");
        let (config, _) = build_config(&cli_with_config(f.path()));
        assert!(config.verbose);
        assert!(config.search.entire_word);
    }

    #[test]
    fn test_build_config_fuzzy_keeps_file_search_flags() {
        let f = temp_config("[search]\ncase_sensitive = true\n");
        let cli = Cli {
            verbose: false,
            config: Some(f.path().to_path_buf()),
            command: Commands::Fuzzy(FuzzyArgs {
                file: PathBuf::from("doc.txt"),
                pattern: "x".to_string(),
                max_errors: 1,
                json: false,
            }),
        };
        let (config, _) = build_config(&cli);
        assert!(config.search.case_sensitive);
    }

    #[test]
    fn test_apply_search_flags() {
        let config = AppConfig {
            search: SearchConfig {
                entire_word: true,
                ..SearchConfig::default()
            },
            ..AppConfig::default()
        };
        let mut state = FindState::new("cat");
        config.apply_search_flags(&mut state);
        assert!(state.entire_word);
        assert!(!state.case_sensitive);
    }
}
