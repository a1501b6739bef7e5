use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use bookshelf_app::modules::books::lookup::BookLookup;
use bookshelf_app::modules::books::models::Isbn;
use bookshelf_db::Database;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

#[derive(Parser)]
#[command(name = "bookshelf")]
#[command(about = "Personal bookshelf service: register books by ISBN")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run migrations and serve the HTTP API until Ctrl-C (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Resolve an ISBN against the configured catalogs and print the result
    Lookup {
        /// 10- or 13-digit ISBN
        isbn: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli.command.unwrap_or(Command::Serve)).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "bookshelf failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> anyhow::Result<ExitCode> {
    let settings = Settings::load().context("failed to load bookshelf settings")?;
    bookshelf_telemetry::init(&settings.telemetry)?;

    tracing::info!(env = ?settings.environment, "bookshelf starting");

    match command {
        Command::Serve => serve(&settings).await?,
        Command::Migrate => {
            let applied = migrate(&settings)?.1;
            println!("applied {applied} migration(s)");
        }
        Command::Lookup { isbn } => return lookup(&settings, &isbn).await,
    }

    Ok(ExitCode::SUCCESS)
}

/// Open the database and apply every registered module's migrations
fn migrate(settings: &Settings) -> anyhow::Result<(Database, usize, ModuleRegistry)> {
    let db = Database::open(&settings.database.path)
        .with_context(|| format!("failed to open database at {}", settings.database.path.display()))?;

    let mut registry = ModuleRegistry::new();
    bookshelf_app::register_all(&mut registry);

    let applied = db
        .run_migrations(&registry.collect_migrations())
        .context("failed to apply migrations")?;
    tracing::info!(applied, "migrations complete");

    Ok((db, applied, registry))
}

async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let (db, _, registry) = migrate(settings)?;
    let ctx = InitCtx { settings, db: &db };

    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    let served = bookshelf_http::start_server(&registry, settings).await;
    registry.stop_modules().await?;
    served
}

async fn lookup(settings: &Settings, raw: &str) -> anyhow::Result<ExitCode> {
    let isbn = Isbn::parse(raw).with_context(|| format!("invalid ISBN {raw:?}"))?;
    let lookup = BookLookup::from_settings(&settings.catalog)?;

    match lookup.lookup(&isbn).await? {
        Some(info) => {
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("no book found for ISBN {isbn}");
            Ok(ExitCode::FAILURE)
        }
    }
}
