//! ormsync CLI - print dialect DDL, synchronize and validate schemas.

use clap::{Parser, Subcommand};
use ormsync::core::Connector;
use ormsync::sync::PlannedStatement;
use ormsync::{Config, DialectCatalog, OrmError, SchemaSynchronizer, SqliteConnector, SyncReport};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "ormsync")]
#[command(about = "Keep a relational schema in line with its declared model")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full creation script of the declared model
    Ddl {
        /// Render for this dialect instead of the configured one
        #[arg(long)]
        dialect: Option<String>,
    },

    /// Synchronize the SQLite database named by database.url
    Sync {
        /// Print the plan without changing the database
        #[arg(long)]
        dry_run: bool,
    },

    /// Check the database against the model without changing it
    Validate,

    /// List registered dialects
    Dialects,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> Result<(), OrmError> {
    let cli = Cli::parse();
    let catalog = DialectCatalog::with_builtins();

    if let Commands::Dialects = cli.command {
        for name in catalog.dialect_names() {
            println!("{}", name);
        }
        return Ok(());
    }

    setup_logging(&cli.verbosity, &cli.log_format).map_err(OrmError::Config)?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Dialects => unreachable!(), // Handled above
        Commands::Ddl { dialect } => {
            if let Some(name) = dialect {
                config.database.dialect = name;
            }
            let dialect = config.create_dialect(&catalog)?;
            let sync = SchemaSynchronizer::new(
                Arc::new(config.to_model()?),
                Arc::clone(&dialect),
                config.params.clone(),
            );
            let script = sync.script()?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&script)?);
            } else {
                print_statements(&script);
            }
        }

        Commands::Sync { dry_run } => {
            let report = synchronize(&config, &catalog, dry_run)?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let status_msg = if dry_run { "Dry run completed!" } else { "Synchronization completed!" };
                print_report(status_msg, &report);
            }
        }

        Commands::Validate => {
            let report = synchronize(&config, &catalog, true)?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report("Validation completed!", &report);
            }
            if report.has_changes() {
                return Err(OrmError::SchemaValidation(format!(
                    "{} statements required",
                    report.statements.len() + report.skipped.len()
                )));
            }
        }
    }

    Ok(())
}

/// Run the synchronizer against the configured SQLite database.
fn synchronize(config: &Config, catalog: &DialectCatalog, dry_run: bool) -> Result<SyncReport, OrmError> {
    let dialect = config.create_dialect(catalog)?;
    if dialect.name() != "sqlite" {
        return Err(OrmError::Config(format!(
            "Only the sqlite dialect can be synchronized, not {}",
            dialect.name()
        )));
    }
    let url = config
        .database
        .url
        .clone()
        .unwrap_or_else(|| dialect.default_url().to_string());
    let connector = SqliteConnector::from_url(&url);
    let mut conn = connector.connect()?;

    let mut sync = SchemaSynchronizer::new(
        Arc::new(config.to_model()?),
        dialect,
        config.params.clone(),
    );
    if dry_run {
        sync.dry_run(conn.as_mut())
    } else {
        sync.create(conn.as_mut())
    }
}

fn print_statements(statements: &[PlannedStatement]) {
    for statement in statements {
        println!("{};\n", statement.sql);
    }
}

fn print_report(status_msg: &str, report: &SyncReport) {
    println!("{}", status_msg);
    println!("  First run: {}", report.first_run);
    println!("  Duration: {:.2}s", report.duration_seconds);
    println!(
        "  New: {} tables, {} columns, {} indexes",
        report.new_tables, report.new_columns, report.new_indexes
    );
    if !report.statements.is_empty() {
        println!("  Statements:");
        for statement in &report.statements {
            println!("    {}", statement.sql.replace('\n', " ").replace('\t', ""));
        }
    }
    if !report.skipped.is_empty() {
        println!("  Skipped by policy: {}", report.skipped.len());
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("Unknown verbosity: {}", other)),
    };

    // Logs go to stderr so that scripts printed on stdout stay clean.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
