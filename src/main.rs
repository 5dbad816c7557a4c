use clap::Parser;
use docfind::cli::{Cli, Commands};
use docfind::config::build_config;
use docfind::{logging, run};
use tracing::{debug, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let (app_config, warnings) = build_config(&cli);

    logging::init(app_config.verbose);
    for warning in &warnings {
        warn!("{warning}");
    }
    debug!(config = ?app_config, "effective config");

    let result = match cli.command {
        Commands::Search(ref args) => {
            debug!(file = %args.file.display(), query = ?args.query, "search mode");
            run::run_search(args, &app_config).await
        }
        Commands::Fuzzy(ref args) => {
            debug!(file = %args.file.display(), max_errors = args.max_errors, "fuzzy mode");
            run::run_fuzzy(args).await
        }
    };

    if let Err(e) = result {
        eprintln!("docfind: error: {}", e);
        std::process::exit(1);
    }
}
