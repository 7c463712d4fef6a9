use crate::error::AppError;
use crate::model::{Task, TaskStatus};
use crate::session::TaskBoard;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    Unchanged(Task),
    Updated(Task),
}

impl StatusChange {
    pub fn task(&self) -> &Task {
        match self {
            Self::Unchanged(task) | Self::Updated(task) => task,
        }
    }
}

pub fn add_task(
    board: &mut TaskBoard,
    project: &str,
    description: &str,
    due_date: &str,
    status: TaskStatus,
) -> Result<Task, AppError> {
    add_task_at(
        board,
        project,
        description,
        due_date,
        status,
        OffsetDateTime::now_utc(),
    )
}

fn add_task_at(
    board: &mut TaskBoard,
    project: &str,
    description: &str,
    due_date: &str,
    status: TaskStatus,
    now: OffsetDateTime,
) -> Result<Task, AppError> {
    let due_date = parse_due_date(due_date)?;
    let created_at = now
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;

    let task = Task {
        project: project.to_string(),
        description: description.to_string(),
        due_date: format_due_date(due_date)?,
        status,
        created_at,
    };

    board.tasks.push(task.clone());
    tracing::debug!(count = board.tasks.len(), "task added");

    Ok(task)
}

/// Set the status of the task at `position` (1-based, as listed).
pub fn update_status(
    board: &mut TaskBoard,
    position: usize,
    status: TaskStatus,
) -> Result<StatusChange, AppError> {
    let task = position
        .checked_sub(1)
        .and_then(|index| board.tasks.get_mut(index))
        .ok_or_else(|| AppError::invalid_input("task not found"))?;

    if task.status == status {
        return Ok(StatusChange::Unchanged(task.clone()));
    }

    task.status = status;
    tracing::debug!(position, status = status.label(), "task status updated");
    Ok(StatusChange::Updated(task.clone()))
}

pub fn list_tasks(board: &TaskBoard) -> &[Task] {
    &board.tasks
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().to_offset(local_offset()).date()
}

pub fn parse_due_date(raw: &str) -> Result<Date, AppError> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::invalid_input("due date must be YYYY-MM-DD"))
}

fn format_due_date(date: Date) -> Result<String, AppError> {
    date.format(format_description!("[year]-[month]-[day]"))
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

/// Render a stored `created_at` as local `YYYY-MM-DD HH:MM`.
pub fn display_created_at(created_at: &str) -> Result<String, AppError> {
    let created = OffsetDateTime::parse(created_at, &Rfc3339)
        .map_err(|_| AppError::invalid_data("created_at must be RFC3339"))?;
    created
        .to_offset(local_offset())
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

pub(crate) fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}
