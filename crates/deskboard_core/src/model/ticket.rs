use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Category a ticket was sorted into.
///
/// The model is asked for one of the three known categories but nothing
/// forces it to comply; anything else is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketType {
    Bug,
    Feature,
    Billing,
    Other(String),
}

impl TicketType {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bug" => Self::Bug,
            "feature" => Self::Feature,
            "billing" => Self::Billing,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Billing => "billing",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TicketType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TicketType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_raw(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub summary: String,
    #[serde(rename = "type")]
    pub ticket_type: TicketType,
}

/// Outcome of one classification call, as handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationResult {
    Classified(Classification),
    Failed { error: String },
}

impl ClassificationResult {
    pub fn failed<M: Into<String>>(error: M) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Classified(classification) => serde_json::json!({
                "summary": classification.summary,
                "type": classification.ticket_type,
            }),
            Self::Failed { error } => serde_json::json!({ "error": error }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketEntry {
    pub timestamp: OffsetDateTime,
    pub ticket: String,
    pub result: Classification,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub ticket_type: String,
    pub summary: String,
    pub original_ticket: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub records: Vec<ExportRecord>,
}
