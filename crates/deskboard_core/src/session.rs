//! Per-session state.
//!
//! A `Session` is created empty when a run starts and dropped when it ends.
//! Nothing in here is written to disk.

use crate::model::{Task, TicketEntry};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskBoard {
    pub tasks: Vec<Task>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TicketDesk {
    /// Successful classifications, oldest first.
    pub history: Vec<TicketEntry>,
    pub processed_tickets: u64,
    pub show_history: bool,
    pub selected_model: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Session {
    pub board: TaskBoard,
    pub desk: TicketDesk,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }
}
