pub mod cell;
pub mod cli;
pub mod data;
pub mod db;
pub mod delimited;
pub mod error;
pub mod import;
pub mod io_utils;
pub mod loader;
pub mod probe;
pub mod progress;
pub mod reader;
pub mod reconcile;
pub mod rows;
pub mod schema;
pub mod settings;
pub mod source;
pub mod spreadsheet;
pub mod sql;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    db::{ConnectionProvider, memory::MemoryDatabase},
    import::{ImportCoordinator, ImportStatus, ImportSummary},
    progress::LogSink,
    settings::ImportSettings,
};

pub use crate::error::{ImportError, ImportResult};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tabload", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Import(args) => handle_import(&args),
        Commands::Probe(args) => handle_probe(&args),
        Commands::Sheets(args) => handle_sheets(&args),
    }
}

fn handle_import(args: &cli::ImportArgs) -> Result<()> {
    let settings = args.resolve_settings()?;
    settings.validate()?;
    let provider: Box<dyn ConnectionProvider> = if args.dry_run {
        Box::new(MemoryDatabase::new())
    } else {
        server_provider(&args.connection)?
    };
    info!(
        "Importing '{}' into table {} on {} (mode {:?}, batch size {})",
        args.source.input.display(),
        settings.table_name,
        provider.describe(),
        settings.mode,
        settings.batch_size
    );
    let mut conn = provider
        .connect()
        .with_context(|| format!("Connecting to {}", provider.describe()))?;

    let sink = LogSink;
    let mut coordinator =
        ImportCoordinator::new(settings, &sink).with_source_options(args.source.options());
    let summary = coordinator
        .run(&args.source.input, conn.as_mut())
        .with_context(|| format!("Importing {:?}", args.source.input))?;
    debug!("Final import phase: {:?}", coordinator.phase());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

#[cfg(feature = "mysql")]
fn server_provider(args: &cli::ConnectionArgs) -> Result<Box<dyn ConnectionProvider>> {
    let provider = match &args.database_url {
        Some(url) => db::mysql::MySqlProvider::from_url(url)
            .with_context(|| format!("Parsing database URL {}", db::mysql::redact_url(url)))?,
        None => db::mysql::MySqlProvider::from_config(&args.config()?),
    };
    Ok(Box::new(provider))
}

#[cfg(not(feature = "mysql"))]
fn server_provider(_args: &cli::ConnectionArgs) -> Result<Box<dyn ConnectionProvider>> {
    anyhow::bail!("this build has no MySQL support; rebuild with the `mysql` feature or use --dry-run")
}

fn print_summary(summary: &ImportSummary) {
    let outcome = match summary.status {
        ImportStatus::Completed => "Import completed",
        ImportStatus::CompletedWithErrors => "Import completed with errors",
    };
    println!(
        "{outcome}: {} of {} row(s) imported into {}, {} failed ({} commit(s), table action: {:?})",
        summary.load.succeeded,
        summary.source_rows,
        summary.table,
        summary.load.failed,
        summary.load.commits,
        summary.action
    );
    for migration in &summary.migrations {
        println!(
            "  widened {}: {} -> {}",
            migration.column, migration.from_type, migration.to_type
        );
    }
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    info!("Probing '{}'", args.source.input.display());
    let settings = ImportSettings {
        trim_strings: !args.no_trim,
        skip_empty_rows: !args.keep_empty_rows,
        ..ImportSettings::for_table(args.table.clone())
    };
    let report = probe::probe_file(&args.source.input, &settings, &args.source.options(), &LogSink)
        .with_context(|| format!("Probing {:?}", args.source.input))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", probe::render_report(&report));
    }
    Ok(())
}

fn handle_sheets(args: &cli::SheetsArgs) -> Result<()> {
    let sheets = spreadsheet::list_sheets(&args.input)
        .with_context(|| format!("Listing sheets of {:?}", args.input))?;
    debug!("Found {} sheet(s)", sheets.len());
    for sheet in sheets {
        println!("{sheet}");
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
