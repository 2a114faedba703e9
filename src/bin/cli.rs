//! signal2org CLI - turn a decrypted Signal Android backup into an Org outline
//!
//! Usage: signal2org [OPTIONS] <COMMAND>

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use signal2org_lib::db::SignalBackup;
use signal2org_lib::{load, summarize, Error, OrgExporter, Reconstruction, Settings};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "signal2org")]
#[command(version, about = "Export Signal conversations to Org-mode", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG wins if set.
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct every conversation and write an Org document
    Export {
        /// Decrypted backup database (SQLite)
        #[arg(long = "sql-file", short = 'i')]
        input: PathBuf,
        /// Output file, must end in .org
        #[arg(long = "output-file", short = 'o')]
        output: PathBuf,
        /// Settings file (default: <config dir>/signal2org/settings.json)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print reconstruction stats as JSON
        #[arg(long)]
        json: bool,
    },
    /// List resolved conversations, busiest first
    List {
        /// Decrypted backup database (SQLite)
        #[arg(long = "sql-file", short = 'i')]
        input: PathBuf,
        /// Settings file (default: <config dir>/signal2org/settings.json)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
    /// Write a settings file with the built-in defaults
    InitConfig {
        /// Where to write (default: <config dir>/signal2org/settings.json)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run_cli(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Commands::Export { input, output, config, json } => {
            handle_export(&input, &output, config.as_deref(), json)
        }
        Commands::List { input, config, json } => handle_list(&input, config.as_deref(), json),
        Commands::InitConfig { config, force } => {
            let path = Settings::init(config.as_deref(), force)?;
            println!("Wrote default settings to {}", path.display());
            Ok(())
        }
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "signal2org", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn read_backup(input: &Path, config: Option<&Path>) -> Result<(Reconstruction, Settings), Error> {
    let settings = Settings::resolve(config)?;
    let backup = SignalBackup::open(input)?;
    log::info!("[Signal] Reading {}", backup.get_path());
    let graph = load(&backup, &settings)?;
    Ok((graph, settings))
}

fn handle_export(input: &Path, output: &Path, config: Option<&Path>, json: bool) -> Result<(), Error> {
    let (graph, settings) = read_backup(input, config)?;
    OrgExporter::new(&settings).write_to(&graph, output)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&graph.stats)?);
        return Ok(());
    }

    let stats = &graph.stats;
    println!("Exported to {}", output.display());
    println!("  Conversations:  {}", stats.conversations_created);
    println!("  Messages:       {}", stats.messages_created);
    println!("  Replies linked: {}", stats.replies_linked);
    if stats.dangling_quotes > 0 {
        println!("  Dangling quotes: {}", stats.dangling_quotes);
    }
    if stats.dropped() > 0 {
        println!("  Dropped rows:   {} of {}", stats.dropped(), stats.rows_read);
    }
    Ok(())
}

fn handle_list(input: &Path, config: Option<&Path>, json: bool) -> Result<(), Error> {
    let (graph, _) = read_backup(input, config)?;
    let summaries = summarize(&graph);

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No conversations found");
        return Ok(());
    }
    for s in &summaries {
        println!("{:>6}  {:>6}  {}", s.thread_id, s.message_count, s.name);
    }
    Ok(())
}
