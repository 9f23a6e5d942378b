use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use codesearch_protocol::{HintRequest, SearchRequest, DEFAULT_HINT_LIMIT, DEFAULT_SEARCH_LIMIT};
use config::AppConfig;
use std::path::PathBuf;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "codesearch")]
#[command(about = "Full-text code search over watched directories", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (overrides CODESEARCH_CONFIG; default ./codesearch.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync indexes with their folders once, then exit
    Index(IndexArgs),

    /// Keep indexes in sync with their folders until Ctrl-C
    Watch(WatchArgs),

    /// Search the committed content index
    Search(SearchArgs),

    /// Autocomplete words from the committed hint index
    Hints(HintsArgs),

    /// Show configured indexes and their committed sizes
    Status,
}

#[derive(Args)]
struct IndexArgs {
    /// Index names or ids (default: every configured index)
    names: Vec<String>,

    /// Clear the indexes and build them from scratch
    #[arg(long)]
    rebuild: bool,
}

#[derive(Args)]
struct WatchArgs {
    /// Index names or ids (default: every configured index)
    names: Vec<String>,
}

#[derive(Args)]
struct SearchArgs {
    /// Index name or id
    index: String,

    /// Content query (query syntax unless --phrase)
    content: Option<String>,

    #[arg(long)]
    file_name: Option<String>,

    #[arg(long = "ext")]
    file_extension: Option<String>,

    #[arg(long = "path")]
    file_path: Option<String>,

    /// Match content case-sensitively
    #[arg(short = 's', long)]
    case_sensitive: bool,

    /// Treat every value as an exact phrase
    #[arg(short, long)]
    phrase: bool,

    /// Look up one document by primary key
    #[arg(long)]
    pk: Option<String>,

    #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
    limit: usize,
}

#[derive(Args)]
struct HintsArgs {
    /// Index name or id
    index: String,

    prefix: String,

    #[arg(short = 's', long)]
    case_sensitive: bool,

    #[arg(short, long, default_value_t = DEFAULT_HINT_LIMIT)]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Index(args) => {
            let reports = commands::run_index(&config, &args.names, args.rebuild).await?;
            commands::print(&reports, cli.pretty)?;
        }
        Commands::Watch(args) => commands::run_watch(&config, &args.names).await?,
        Commands::Search(args) => {
            let request = SearchRequest {
                content: args.content,
                file_name: args.file_name,
                file_extension: args.file_extension,
                file_path: args.file_path,
                case_sensitive: args.case_sensitive,
                phrase_query: args.phrase,
                code_pk: args.pk,
                limit: args.limit,
            };
            let result = commands::run_search(&config, &args.index, &request)?;
            commands::finish(result, cli.pretty)?;
        }
        Commands::Hints(args) => {
            let request = HintRequest {
                prefix: args.prefix,
                case_sensitive: args.case_sensitive,
                limit: args.limit,
            };
            let result = commands::run_hints(&config, &args.index, &request)?;
            commands::finish(result, cli.pretty)?;
        }
        Commands::Status => commands::print(&commands::run_status(&config), cli.pretty)?,
    }

    Ok(())
}
