use std::path::PathBuf;

use clap::{Parser, Subcommand};
use folio_cli::cli::{run, CliCommand, CliConfig};
use folio_core::models::{ContactStatus, Table};
use folio_core::tracing_setup::init_tracing;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Admin console for the portfolio backend")]
struct Cli {
    /// Path to JSON config file (url, anonKey, credentials, session)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Use an in-memory backend seeded with sample content
    #[arg(long)]
    offline: bool,

    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an admin session and log its events until Ctrl-C
    Watch,

    /// List the rows of a table
    List {
        /// projects, skills, blog_posts, contact_submissions or personal_info
        table: Table,
    },

    /// Show one row
    Get { table: Table, id: String },

    /// Flip the featured flag of a project, skill or blog post
    ToggleFeatured { table: Table, id: String },

    /// Delete a row
    Delete { table: Table, id: String },

    /// Set the status of a contact submission
    ContactStatus {
        id: String,
        /// new, read or replied
        status: ContactStatus,
    },

    /// Run one analytics refresh and print the snapshot
    Stats,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Warning: {:#}", e);
    }

    let config = match CliConfig::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let command = match cli.command {
        Commands::Watch => CliCommand::Watch,
        Commands::List { table } => CliCommand::List { table },
        Commands::Get { table, id } => CliCommand::Get { table, id },
        Commands::ToggleFeatured { table, id } => CliCommand::ToggleFeatured { table, id },
        Commands::Delete { table, id } => CliCommand::Delete { table, id },
        Commands::ContactStatus { id, status } => CliCommand::ContactStatus { id, status },
        Commands::Stats => CliCommand::Stats,
    };

    if let Err(e) = run(command, config, cli.offline, cli.pretty).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
