//! Maintenance entry point for registry databases.
//!
//! # Responsibility
//! - Drive index maintenance (drift listing, reconciliation, reindex and
//!   rebuild) against the databases named in a JSON config file.
//! - Keep output line-oriented for shell pipelines.

use clap::{Parser, Subcommand};
use georef_core::{
    init_from_config, open_index_db, open_store_db, EntityId, EntityKind, RegistryConfig,
    SqliteEntityStore, SqliteSearchIndex, SyncService,
};
use log::error;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

/// Geographic reference registry maintenance tool.
#[derive(Parser, Debug)]
#[command(name = "georef")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, short = 'c', value_name = "FILE", default_value = "georef.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Checks core linkage without opening any database
    Ping,
    /// Lists pending store/index reconciliation obligations
    Drift,
    /// Reindexes every entity with a pending obligation
    Reconcile,
    /// Re-projects one entity from the store into the index
    Reindex {
        #[arg(value_parser = parse_kind)]
        kind: EntityKind,
        id: EntityId,
    },
    /// Rebuilds the index of one kind, or of every kind when omitted
    RebuildIndex {
        #[arg(value_parser = parse_kind)]
        kind: Option<EntityKind>,
    },
}

fn parse_kind(value: &str) -> Result<EntityKind, String> {
    EntityKind::parse(value).ok_or_else(|| {
        let known = EntityKind::ALL
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!("unknown kind `{value}`; expected one of: {known}")
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if matches!(cli.command, Command::Ping) {
        println!("georef_core ping={}", georef_core::ping());
        println!("georef_core version={}", georef_core::core_version());
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let config = RegistryConfig::load(&cli.config)?;
    init_from_config(&config)?;

    let store_conn = open_store_db(&config.store_path)?;
    let index_conn = open_index_db(&config.index_path)?;
    let service = SyncService::new(
        SqliteEntityStore::try_new(&store_conn)?,
        SqliteSearchIndex::try_new(&index_conn)?,
    );

    match &cli.command {
        Command::Ping => {}
        Command::Drift => {
            let pending = service.pending_drift()?;
            for record in &pending {
                println!(
                    "{}\t{}\t{:?}\t{}\t{}",
                    record.kind, record.entity_id, record.operation, record.recorded_at, record.reason
                );
            }
            println!("pending={}", pending.len());
        }
        Command::Reconcile => {
            let report = service.reconcile()?;
            println!("repaired={} failed={}", report.repaired, report.failed);
        }
        Command::Reindex { kind, id } => {
            let outcome = service.reindex(*kind, *id)?;
            println!("{kind} {id} {outcome:?}");
        }
        Command::RebuildIndex { kind } => {
            let kinds = match kind {
                Some(kind) => vec![*kind],
                None => EntityKind::ALL.to_vec(),
            };
            for kind in kinds {
                let indexed = service.rebuild_index(kind)?;
                println!("{kind} indexed={indexed}");
            }
        }
    }
    Ok(())
}
