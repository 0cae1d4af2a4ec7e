//! CLI entry point for chapter ordering maintenance.
//!
//! # Responsibility
//! - Provide `ping`/`version` probes to verify `coursedesk_core` linkage.
//! - List and reorder a module's chapters in a SQLite database file.
//!
//! # Invariants
//! - Output is deterministic: one line per chapter, `rank<TAB>id<TAB>name`.
//! - File logging is enabled only when `COURSEDESK_LOG_DIR` is set.

use coursedesk_core::{
    core_version, default_log_level, init_logging, open_db, ping, Chapter, ReorderConfig,
    ReorderOutcome, ReorderService, SqliteChapterStore,
};
use log::info;
use rusqlite::Connection;
use std::env;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use uuid::Uuid;

const USAGE: &str = "usage:
  coursedesk_cli ping
  coursedesk_cli version
  coursedesk_cli chapters <db> <module>
  coursedesk_cli move-chapter <db> <module> <source> <target>
  coursedesk_cli remove-chapter <db> <module> <chapter>";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    if let Ok(log_dir) = env::var("COURSEDESK_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("warning: file logging disabled: {err}");
        }
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let command = args.first().map(String::as_str).unwrap_or("ping");
    let rest = args.get(1..).unwrap_or_default();
    match (command, rest) {
        ("ping", []) => {
            println!("coursedesk_core ping={}", ping());
            Ok(())
        }
        ("version", []) => {
            println!("coursedesk_core version={}", core_version());
            Ok(())
        }
        ("chapters", [db, module]) => {
            let runtime = local_runtime()?;
            let conn = open_db(db).map_err(|err| err.to_string())?;
            let service = load_chapters(&runtime, &conn, module)?;
            print_chapters(&service.items());
            Ok(())
        }
        ("move-chapter", [db, module, source, target]) => {
            let source = parse_id(source)?;
            let target = parse_id(target)?;
            let runtime = local_runtime()?;
            let conn = open_db(db).map_err(|err| err.to_string())?;
            let service = load_chapters(&runtime, &conn, module)?;
            let outcome = runtime
                .block_on(service.move_item(&source, &target))
                .map_err(|err| err.to_string())?;
            report(outcome, &service.items())
        }
        ("remove-chapter", [db, module, chapter]) => {
            let chapter = parse_id(chapter)?;
            let runtime = local_runtime()?;
            let conn = open_db(db).map_err(|err| err.to_string())?;
            let service = load_chapters(&runtime, &conn, module)?;
            let outcome = runtime
                .block_on(service.remove_and_reindex(&chapter))
                .map_err(|err| err.to_string())?;
            report(outcome, &service.items())
        }
        _ => Err(USAGE.to_string()),
    }
}

fn local_runtime() -> Result<Runtime, String> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|err| format!("failed to start runtime: {err}"))
}

fn load_chapters<'conn>(
    runtime: &Runtime,
    conn: &'conn Connection,
    module: &str,
) -> Result<ReorderService<SqliteChapterStore<'conn>>, String> {
    let module_id = parse_id(module)?;
    let store = SqliteChapterStore::try_new(conn, module_id).map_err(|err| err.to_string())?;
    let service = runtime
        .block_on(ReorderService::load(store, ReorderConfig::default()))
        .map_err(|err| err.to_string())?;
    info!("event=cli_chapters_load module=cli status=ok module_id={module_id}");
    Ok(service)
}

fn report(outcome: ReorderOutcome, chapters: &[Chapter]) -> Result<(), String> {
    match outcome {
        ReorderOutcome::Unchanged => println!("unchanged"),
        ReorderOutcome::Persisted => println!("persisted"),
        ReorderOutcome::RolledBack => {
            print_chapters(chapters);
            return Err("write failed; order reloaded from database".to_string());
        }
    }
    print_chapters(chapters);
    Ok(())
}

fn print_chapters(chapters: &[Chapter]) {
    for chapter in chapters {
        println!("{}\t{}\t{}", chapter.order_index, chapter.id, chapter.name);
    }
}

fn parse_id(raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw).map_err(|err| format!("invalid id `{raw}`: {err}"))
}
