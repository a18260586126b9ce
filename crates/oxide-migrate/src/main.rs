//! oxide-migrate CLI
//!
//! Command-line tool that scripts migration operation files.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_migrate::dialect::{self, DIALECT_NAMES};
use oxide_migrate::file::load_operations;
use oxide_migrate::generator::MigrationsSqlGenerator;

/// Dialect-aware SQL scripts for migration operations.
#[derive(Parser)]
#[command(name = "oxide-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Target SQL dialect (ansi, sqlserver, postgresql, sqlite).
    #[arg(short, long, env = "OXIDE_DIALECT", default_value = "sqlserver")]
    dialect: String,

    /// Product version that authored the migration; older versions get the
    /// SQL their tooling generated.
    #[arg(long, env = "OXIDE_PRODUCT_VERSION")]
    product_version: Option<String>,

    /// JSON operation file.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Write the script here instead of standard output.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a migration script from the operation file.
    Script,

    /// List the handler generating each operation for the dialect.
    Handlers,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let Some(dialect) = dialect::by_name(&cli.dialect) else {
        bail!(
            "unknown dialect '{}', expected one of: {}",
            cli.dialect,
            DIALECT_NAMES.join(", ")
        );
    };
    let mut generator = MigrationsSqlGenerator::from_boxed(dialect);
    if let Some(version) = &cli.product_version {
        generator = generator.with_product_version(version);
    }

    match cli.command {
        Commands::Script => {
            let Some(input) = &cli.input else {
                bail!("the script command needs --input");
            };
            let operations = load_operations(input)
                .with_context(|| format!("loading {}", input.display()))?;
            for operation in &operations {
                info!("{}", operation.description());
            }
            let commands = generator.generate(&operations, None)?;
            let script = generator.script(&commands);
            match &cli.output {
                Some(path) => {
                    fs::write(path, script)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(
                        "Wrote {} command(s) to {}",
                        commands.len(),
                        path.display()
                    );
                }
                None => print!("{script}"),
            }
        }

        Commands::Handlers => {
            println!("Handlers of the {} dialect:", generator.dialect().name());
            for (operation, origin) in generator.handlers().entries() {
                println!("  {operation:<24} {origin}");
            }
        }
    }

    Ok(())
}
