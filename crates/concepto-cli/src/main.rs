//! Concepto CLI
//!
//! Inspect document trees and manage incremental compilation caches

use clap::{Parser, Subcommand};
use concepto_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "concepto")]
#[command(about = "Concepto - command matching and incremental tree compilation", long_about = None)]
struct Cli {
    /// Emit debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print a document tree with levels and content hashes
    Tree(commands::tree::TreeArgs),
    /// Cache inspection and maintenance
    Cache(commands::cache::CacheArgs),
}

fn main() {
    let cli = Cli::parse();
    if cli.verbose {
        init(Profile::Development);
    }

    let result = match cli.command {
        Commands::Tree(args) => commands::tree::execute(args),
        Commands::Cache(args) => commands::cache::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
