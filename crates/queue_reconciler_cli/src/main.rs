//! Local host for the queue reconciler.
//!
//! # Responsibility
//! - Own a SQLite party store and drive the create-trigger contract on it.
//! - Print exactly one JSON object per command on stdout.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use queue_reconciler_core::db::migrations::latest_version;
use queue_reconciler_core::db::open_db;
use queue_reconciler_core::{
    core_version, default_log_level, init_logging, ActivityPartyRepository, QueueReconciler,
    SqlitePartyStore, StoreFixture, TargetEntity,
};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "queue-reconciler")]
#[command(about = "Prunes stale auto-added queue parties from outgoing emails")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "./queue_reconciler.sqlite3")]
    db: PathBuf,

    /// trace|debug|info|warn|error; only valid together with `--log-dir`.
    #[arg(long, requires = "log_dir")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files; logging is off when omitted.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or migrate the party store.
    Init,
    /// Load emails, parties and originating-queue rows from a JSON fixture.
    Import(ImportArgs),
    /// Run the create trigger on a JSON target payload.
    Handle(HandleArgs),
    /// Reconcile one stored email directly.
    Reconcile(EmailArgs),
    /// Print one stored email and its party list.
    Show(EmailArgs),
}

#[derive(Debug, Args)]
struct ImportArgs {
    #[arg(long)]
    fixture: PathBuf,
}

#[derive(Debug, Args)]
struct HandleArgs {
    #[arg(long)]
    payload: PathBuf,
}

#[derive(Debug, Args)]
struct EmailArgs {
    #[arg(long)]
    email: Uuid,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        let log_dir = log_dir
            .to_str()
            .ok_or_else(|| anyhow!("log dir is not valid UTF-8: {}", log_dir.display()))?;
        init_logging(level, log_dir).map_err(|err| anyhow!("failed to initialize logging: {err}"))?;
    }
    info!(
        "event=cli_start module=cli status=ok version={} db={}",
        core_version(),
        cli.db.display()
    );

    let conn = open_db(&cli.db)
        .with_context(|| format!("failed to open party store {}", cli.db.display()))?;
    match cli.command {
        Command::Init => print_json(&json!({
            "status": "ok",
            "db": cli.db.display().to_string(),
            "schema_version": latest_version(),
        })),
        Command::Import(args) => run_import(&conn, &args),
        Command::Handle(args) => run_handle(&conn, &args),
        Command::Reconcile(args) => run_reconcile(&conn, &args),
        Command::Show(args) => run_show(&conn, &args),
    }
}

fn run_import(conn: &Connection, args: &ImportArgs) -> Result<()> {
    let fixture: StoreFixture = read_json(&args.fixture)?;
    let store = SqlitePartyStore::try_new(conn)?;
    let summary = store
        .import_fixture(&fixture)
        .with_context(|| format!("failed to import {}", args.fixture.display()))?;
    print_json(&json!({ "status": "ok", "imported": summary }))
}

fn run_handle(conn: &Connection, args: &HandleArgs) -> Result<()> {
    let target: TargetEntity = read_json(&args.payload)?;
    let store = SqlitePartyStore::try_new(conn)?;
    if target.is_email() && !target.direction_code() && store.get_email(target.id)?.is_none() {
        return Err(anyhow!("email not found: {}", target.id));
    }
    let outcome = QueueReconciler::new(store).handle_create(&target)?;
    print_json(&outcome)
}

fn run_reconcile(conn: &Connection, args: &EmailArgs) -> Result<()> {
    let store = SqlitePartyStore::try_new(conn)?;
    if store.get_email(args.email)?.is_none() {
        return Err(anyhow!("email not found: {}", args.email));
    }
    let outcome = QueueReconciler::new(store).reconcile(args.email)?;
    print_json(&outcome)
}

fn run_show(conn: &Connection, args: &EmailArgs) -> Result<()> {
    let store = SqlitePartyStore::try_new(conn)?;
    let email = store
        .get_email(args.email)?
        .ok_or_else(|| anyhow!("email not found: {}", args.email))?;
    let parties = store.list_parties(args.email)?;
    print_json(&json!({ "email": email, "parties": parties }))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
