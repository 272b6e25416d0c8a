//! Cache inspection and maintenance commands

use clap::{Args, Subcommand};
use concepto_engine::{
    apply_engine_command, cache_stats, show_bundle, EngineCommand, EngineCommandResult,
    StoreLocation,
};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct CacheArgs {
    /// Cache directory (sharded record files)
    #[arg(long, conflicts_with = "sqlite")]
    pub dir: Option<PathBuf>,

    /// Cache database (SQLite)
    #[arg(long)]
    pub sqlite: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Record counts and the stored command manifest
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop every cached record
    Clear,
    /// Purge bundles compiled with the given commands
    Invalidate {
        #[arg(long = "command", required = true)]
        commands: Vec<String>,
    },
    /// Print the cached bundle for a top-level node
    Show { identity: String },
}

pub fn execute(args: CacheArgs) -> Result<(), Box<dyn std::error::Error>> {
    let location = match (args.dir, args.sqlite) {
        (Some(dir), None) => StoreLocation::Directory(dir),
        (None, Some(path)) => StoreLocation::Sqlite(path),
        _ => return Err("Must specify either --dir or --sqlite".into()),
    };
    let mut store = location.open()?;

    match args.command {
        CacheCommand::Stats { json } => {
            let stats = cache_stats(store.as_ref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("records: {}", stats.records);
                println!("bundles: {}", stats.bundles);
                println!("orphans: {}", stats.orphans);
                if let Some(library) = &stats.library {
                    println!("library: {}", library);
                }
                let commands: Vec<&str> = stats.commands.iter().map(String::as_str).collect();
                println!("commands: {}", commands.join(", "));
            }
        }
        CacheCommand::Clear => {
            apply_engine_command(EngineCommand::ClearCache, &mut store, None, None)?;
            println!("cache cleared");
        }
        CacheCommand::Invalidate { commands } => {
            let command_ids: BTreeSet<String> = commands.into_iter().collect();
            let result = apply_engine_command(
                EngineCommand::InvalidateCommands { command_ids },
                &mut store,
                None,
                None,
            )?;
            if let EngineCommandResult::Invalidated { purged_bundles } = result {
                println!("purged {} bundle(s)", purged_bundles.len());
                for identity in purged_bundles {
                    println!("  {}", identity);
                }
            }
        }
        CacheCommand::Show { identity } => match show_bundle(store.as_ref(), &identity)? {
            Some(cached) => println!("{}", serde_json::to_string_pretty(&cached)?),
            None => return Err(format!("No cached bundle for {}", identity).into()),
        },
    }
    Ok(())
}
