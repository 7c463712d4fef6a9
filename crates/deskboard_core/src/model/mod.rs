mod task;
mod ticket;

pub use task::{Task, TaskStatus};
pub use ticket::{
    Classification, ClassificationResult, ExportArtifact, ExportRecord, TicketEntry, TicketType,
};
