//! CLI inspection entry point.
//!
//! # Responsibility
//! - Open a task database read-only, outside the Flutter runtime.
//! - Print tasks, pending reminders and validation findings.
//!
//! Inspection never writes: no migrations, no reminder pruning and no
//! notifications.
//!
//! Usage: `taskbell_cli [db_path]`; falls back to `TASKBELL_DB_PATH`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use taskbell_core::db::open_db_read_only;
use taskbell_core::{
    validate_collection, Clock, LoadStatus, SqliteKvRepository, SystemClock, TaskPersistence,
};

fn main() -> ExitCode {
    println!("taskbell_core ping={}", taskbell_core::ping());
    println!("taskbell_core version={}", taskbell_core::core_version());

    let Some(path) = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TASKBELL_DB_PATH").ok())
        .map(PathBuf::from)
    else {
        return ExitCode::SUCCESS;
    };

    match inspect(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("taskbell_cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn inspect(path: &Path) -> Result<(), String> {
    let conn =
        open_db_read_only(path).map_err(|err| format!("open {}: {err}", path.display()))?;
    let repo = SqliteKvRepository::try_new(conn).map_err(|err| err.to_string())?;
    let persistence = TaskPersistence::new(repo);
    let tasks = persistence.load();
    let reminders = persistence.load_reminders();

    match &tasks.status {
        LoadStatus::DecodeFailed(reason) | LoadStatus::ReadFailed(reason) => {
            println!("warning: saved tasks are unreadable ({reason})");
        }
        LoadStatus::Empty | LoadStatus::Loaded => {}
    }

    println!("tasks={}", tasks.value.len());
    for task in &tasks.value {
        println!("- {} [{}]", task.title, task.id);
        for subtask in &task.subtasks {
            let deadline = subtask
                .deadline
                .map_or_else(|| "none".to_string(), |ms| ms.to_string());
            println!("    * {} deadline={deadline}", subtask.title);
            for reminder in reminders.value.for_subtask(subtask.id) {
                println!(
                    "        reminder {} at={}",
                    reminder.lead.label(),
                    reminder.trigger_at
                );
            }
        }
    }

    let report = validate_collection(
        &tasks.value,
        reminders
            .value
            .iter()
            .map(|reminder| (reminder.subtask_id, reminder.subtask_title.as_str())),
        SystemClock.now_ms(),
    );
    println!("overdue={}", report.overdue.len());
    for issue in &report.issues {
        println!("issue {}: {issue}", issue.code());
    }
    Ok(())
}
