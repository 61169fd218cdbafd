#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use pcomposer_core::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pcomposer")]
#[command(
    author,
    version,
    about = "PHP package manager with a machine-wide package store",
    long_about = None,
    arg_required_else_help = true
)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install dependencies from composer.json, using pcomposer.lock when it is up to date
    Install,

    /// Resolve every dependency again and rewrite pcomposer.lock
    Update,

    /// Add a package to composer.json and install it
    Require {
        /// Package name (vendor/name)
        package: String,

        /// Version constraint (defaults to "*")
        constraint: Option<String>,

        /// Add to require-dev instead of require
        #[arg(long)]
        dev: bool,
    },

    /// Remove a package from composer.json and vendor/
    Remove {
        /// Package name (vendor/name)
        package: String,
    },

    /// List dependencies and their installed versions
    List,

    /// Show a package from the global store
    Show {
        /// Package name (vendor/name)
        package: String,
    },

    /// Regenerate vendor/autoload.php
    DumpAutoload,

    /// Delete every package from the global store
    ClearCache,

    /// Show pcomposer.lock
    Lock,

    /// Delete pcomposer.lock so the next install resolves fresh versions
    Unlock,

    /// Show global store statistics
    Stats,

    /// Recreate broken links in vendor/
    Repair,

    /// Check composer.json for structural problems
    Validate,

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    if matches!(cli.command, Commands::Version) {
        return commands::version::run();
    }

    logging::init(cli.verbose, cli.json);

    let config = match Config::from_env(cwd) {
        Ok(config) => config.with_verbosity(cli.verbose).with_json_logs(cli.json),
        Err(e) => return commands::fail(cli.json, e.code(), &e.to_string()),
    };

    let json = cli.json;
    match cli.command {
        Commands::Install => commands::install::install(&config, json),
        Commands::Update => commands::install::update(&config, json),
        Commands::Require {
            package,
            constraint,
            dev,
        } => commands::install::require(&config, &package, constraint.as_deref(), dev, json),
        Commands::Remove { package } => commands::remove::run(&config, &package, json),
        Commands::List => commands::list::list(&config, json),
        Commands::Show { package } => commands::list::show(&config, &package, json),
        Commands::DumpAutoload => commands::autoload::run(&config, json),
        Commands::ClearCache => commands::store::clear_cache(&config, json),
        Commands::Lock => commands::lock::info(&config, json),
        Commands::Unlock => commands::lock::unlock(&config, json),
        Commands::Stats => commands::store::stats(&config, json),
        Commands::Repair => commands::repair::run(&config, json),
        Commands::Validate => commands::validate::run(&config, json),
        Commands::Version => commands::version::run(),
    }
}
