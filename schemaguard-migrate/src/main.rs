//! Schemaguard Migration CLI Tool
//!
//! Computes the schema hash for a registry manifest, compares it with the
//! accepted hash, and scaffolds migration stubs on drift. Exit codes: 0 when
//! the schema is accepted, 2 on drift, 1 on any other failure.

use clap::{Parser, Subcommand};
use schemaguard::config::DEFAULT_CONFIG_PATH;
use schemaguard::{GenerateOptions, SchemaDetector};
use schemaguard_migrate::commands::{
    handle_accept, handle_generate, handle_status, load_config, load_registry, Overrides,
};
use schemaguard_migrate::error::{CommandError, EXIT_CLEAN};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "schemaguard-migrate")]
#[command(about = "Schema snapshot and drift detection for schemaguard")]
#[command(version = "0.1.0")]
struct Cli {
    /// Project root (overrides `root_dir` from configuration)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Registry manifest (overrides `registry_path` from configuration)
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the schema hash and detect drift
    GenerateSchema {
        /// Record hashes accepted by migration files before comparing
        #[arg(long)]
        write_changelog: bool,

        /// Write accepted_schema.sql / schema_to_accept.sql
        #[arg(long)]
        write_snapshot: bool,

        /// Don't generate a migration stub on drift
        #[arg(long)]
        no_generate_migration: bool,

        /// Deployment flavor selecting per-flavor field defaults
        #[arg(long)]
        forum_flavor: Option<String>,
    },

    /// Append the current schema hash to the changelog
    AcceptSchema {
        /// Migration accepting the hash
        #[arg(long)]
        migration: Option<String>,

        /// Deployment flavor selecting per-flavor field defaults
        #[arg(long)]
        forum_flavor: Option<String>,
    },

    /// Show accepted vs current schema hash
    Status {
        /// Deployment flavor selecting per-flavor field defaults
        #[arg(long)]
        forum_flavor: Option<String>,
    },
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let code = match run(cli) {
        Ok(()) => EXIT_CLEAN,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            e.exit_code()
        }
    };
    process::exit(code);
}

fn run(cli: Cli) -> Result<(), CommandError> {
    let overrides = Overrides {
        root: cli.root,
        registry: cli.registry,
    };
    let config = load_config(&cli.config, &overrides)?;
    let registry = load_registry(&config)?;
    let detector = SchemaDetector::new(config);

    match cli.command {
        Commands::GenerateSchema {
            write_changelog,
            write_snapshot,
            no_generate_migration,
            forum_flavor,
        } => {
            let options = GenerateOptions {
                write_changelog,
                write_snapshot,
                generate_migration: !no_generate_migration,
                flavor: forum_flavor,
            };
            handle_generate(&detector, &registry, &options).map(|_| ())
        }
        Commands::AcceptSchema {
            migration,
            forum_flavor,
        } => handle_accept(
            &detector,
            &registry,
            forum_flavor.as_deref(),
            migration.as_deref(),
        )
        .map(|_| ()),
        Commands::Status { forum_flavor } => {
            handle_status(&detector, &registry, forum_flavor.as_deref()).map(|_| ())
        }
    }
}
