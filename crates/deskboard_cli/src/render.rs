//! Views over session state.
//!
//! Each function takes the current state and returns the full text to print;
//! nothing here mutates the session.

use deskboard_core::config::Palette;
use deskboard_core::error::AppError;
use deskboard_core::model::{Task, TicketEntry};
use deskboard_core::session::{TaskBoard, TicketDesk};
use deskboard_core::task_api::display_created_at;
use deskboard_core::ticket_api::{ModelDiscovery, format_timestamp, history_newest_first};
use serde_json::Value;
use std::fmt::Write;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Due Date")]
    due_date: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Created")]
    created: String,
}

pub fn task_board(board: &TaskBoard, palette: &Palette) -> Result<String, AppError> {
    let mut out = String::new();
    push_line(&mut out, &palette.accentize("All Tasks"));

    if board.tasks.is_empty() {
        push_line(&mut out, &palette.mutedize("No tasks added yet."));
        return Ok(out);
    }

    for (index, task) in board.tasks.iter().enumerate() {
        push_line(
            &mut out,
            &format!("{}. {} - {}", index + 1, task.project, task.description),
        );
        push_line(&mut out, &format!("   Due Date: {}", task.due_date));
        push_line(&mut out, &format!("   Status: {}", task.status));
        push_line(
            &mut out,
            &format!("   Created: {}", display_created_at(&task.created_at)?),
        );
    }

    push_line(&mut out, "");
    push_line(&mut out, &palette.accentize("Task Table"));
    push_line(&mut out, &task_table(&board.tasks)?);
    Ok(out)
}

pub fn task_table(tasks: &[Task]) -> Result<String, AppError> {
    let mut rows = Vec::with_capacity(tasks.len());
    for (index, task) in tasks.iter().enumerate() {
        rows.push(TaskRow {
            position: index + 1,
            project: task.project.clone(),
            description: task.description.clone(),
            due_date: task.due_date.clone(),
            status: task.status.to_string(),
            created: display_created_at(&task.created_at)?,
        });
    }

    let mut table = Table::new(rows);
    table.with(Style::sharp());
    Ok(table.to_string())
}

pub fn ticket_desk(desk: &TicketDesk, palette: &Palette) -> Result<String, AppError> {
    let mut out = String::new();
    push_line(
        &mut out,
        &format!(
            "{} {}",
            palette.accentize("Processed tickets:"),
            desk.processed_tickets
        ),
    );
    if let Some(model) = desk.selected_model.as_deref() {
        push_line(&mut out, &format!("Model: {model}"));
    }

    if desk.show_history {
        push_line(&mut out, "");
        push_line(&mut out, &palette.accentize("History"));
        if desk.history.is_empty() {
            push_line(&mut out, &palette.mutedize("No tickets processed yet."));
        }
        for entry in history_newest_first(desk) {
            push_line(&mut out, &history_entry(entry, palette)?);
        }
    }

    Ok(out)
}

fn history_entry(entry: &TicketEntry, palette: &Palette) -> Result<String, AppError> {
    Ok(format!(
        "[{}] {} | {} | {}\n   {}",
        format_timestamp(entry.timestamp)?,
        entry.result.ticket_type,
        entry.result.summary,
        palette.mutedize(&entry.model),
        entry.ticket
    ))
}

pub fn classification(entry: &TicketEntry, palette: &Palette) -> String {
    let mut out = String::new();
    push_line(&mut out, &palette.accentize("Analysis"));
    push_line(&mut out, &format!("Type: {}", entry.result.ticket_type));
    push_line(&mut out, &format!("Summary: {}", entry.result.summary));
    out
}

pub fn models(discovery: &ModelDiscovery, palette: &Palette) -> String {
    let mut out = String::new();
    push_line(&mut out, &palette.accentize("Available models"));
    if discovery.models.is_empty() {
        push_line(&mut out, &palette.mutedize("No models installed."));
    }
    for model in &discovery.models {
        push_line(&mut out, &format!("- {model}"));
    }
    out
}

pub fn task_json(task: &Task) -> Value {
    serde_json::json!({
        "project": task.project,
        "description": task.description,
        "due_date": task.due_date,
        "status": task.status,
        "created_at": task.created_at,
    })
}

pub fn tasks_json(tasks: &[Task]) -> Value {
    Value::Array(tasks.iter().map(task_json).collect())
}

pub fn entry_json(entry: &TicketEntry) -> Result<Value, AppError> {
    Ok(serde_json::json!({
        "timestamp": format_timestamp(entry.timestamp)?,
        "ticket": entry.ticket,
        "result": entry.result,
        "model": entry.model,
    }))
}

pub fn desk_json(desk: &TicketDesk) -> Result<Value, AppError> {
    let history = if desk.show_history {
        let mut entries = Vec::with_capacity(desk.history.len());
        for entry in history_newest_first(desk) {
            entries.push(entry_json(entry)?);
        }
        Some(entries)
    } else {
        None
    };

    Ok(serde_json::json!({
        "processed_tickets": desk.processed_tickets,
        "selected_model": desk.selected_model,
        "show_history": desk.show_history,
        "history": history,
    }))
}

fn push_line(out: &mut String, line: &str) {
    let _ = writeln!(out, "{line}");
}
