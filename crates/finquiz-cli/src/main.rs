//! finquiz CLI: browse the test catalog and take tests from the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::{Directive, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(
    name = "finquiz",
    version,
    about = "Adaptive financial-literacy tests with AI grading"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available tests
    Catalog {
        /// Only tests in this category
        #[arg(long)]
        category: Option<String>,

        /// Only tests of this difficulty: easy, medium, hard
        #[arg(long)]
        difficulty: Option<String>,

        /// Case-insensitive match on title or description
        #[arg(long)]
        search: Option<String>,

        /// Read tests from a local bank file or directory instead of the platform
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Take a test interactively
    Take {
        /// Test ID
        #[arg(long)]
        test: String,

        /// Read tests from a local bank file or directory instead of the platform
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Save a JSON session report here when the session ends
        #[arg(long)]
        report: Option<PathBuf>,

        /// Deadline policy: soft or enforce (overrides config)
        #[arg(long)]
        deadline: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate test bank TOML files
    Validate {
        /// Path to bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// Create starter config and example test bank
    Init,
}

#[tokio::main]
async fn main() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "finquiz=info".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Catalog {
            category,
            difficulty,
            search,
            bank,
            json,
            config,
        } => commands::catalog::execute(category, difficulty, search, bank, json, config).await,
        Commands::Take {
            test,
            bank,
            report,
            deadline,
            config,
        } => commands::take::execute(test, bank, report, deadline, config).await,
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
