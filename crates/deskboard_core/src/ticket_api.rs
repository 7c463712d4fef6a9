use crate::classifier;
use crate::error::AppError;
use crate::model::{ClassificationResult, ExportArtifact, ExportRecord, TicketEntry};
use crate::ollama::ModelBackend;
use crate::session::TicketDesk;
use crate::task_api::local_offset;
use time::OffsetDateTime;
use time::macros::format_description;

pub const EXPORT_MIME_TYPE: &str = "application/json";
const TICKET_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDiscovery {
    pub models: Vec<String>,
    /// Set when listing failed and `models` holds only the fallback name.
    pub error: Option<AppError>,
}

impl ModelDiscovery {
    pub fn default_model(&self) -> Option<&str> {
        self.models.first().map(String::as_str)
    }
}

pub fn discover_models(backend: &dyn ModelBackend, fallback_model: &str) -> ModelDiscovery {
    match backend.list_models() {
        Ok(models) => ModelDiscovery {
            models,
            error: None,
        },
        Err(err) => {
            tracing::warn!(%err, fallback_model, "could not list models, using fallback");
            ModelDiscovery {
                models: vec![fallback_model.to_string()],
                error: Some(err),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub model: String,
    /// Present when the model list had to be fetched to pick a default.
    pub discovery: Option<ModelDiscovery>,
}

/// Pick the model for the next classification.
///
/// Order: `explicit`, the model selected in this session, `configured`, then
/// the first model the server reports (or the fallback when listing fails).
pub fn resolve_model(
    desk: &TicketDesk,
    backend: &dyn ModelBackend,
    explicit: Option<&str>,
    configured: Option<&str>,
    fallback_model: &str,
) -> Result<ModelChoice, AppError> {
    let preset = explicit
        .or(desk.selected_model.as_deref())
        .or(configured)
        .map(str::trim)
        .filter(|model| !model.is_empty());
    if let Some(model) = preset {
        return Ok(ModelChoice {
            model: model.to_string(),
            discovery: None,
        });
    }

    let discovery = discover_models(backend, fallback_model);
    let model = discovery
        .default_model()
        .map(str::to_string)
        .ok_or_else(|| AppError::invalid_input("no models available, pull one or pass --model"))?;
    Ok(ModelChoice {
        model,
        discovery: Some(discovery),
    })
}

/// Classify `ticket` and record it in the desk history on success.
///
/// Blank tickets are rejected before any call is made. A failed
/// classification leaves the desk untouched.
pub fn submit_ticket(
    desk: &mut TicketDesk,
    backend: &dyn ModelBackend,
    ticket: &str,
    model: &str,
) -> Result<TicketEntry, AppError> {
    submit_ticket_at(desk, backend, ticket, model, now_local())
}

fn submit_ticket_at(
    desk: &mut TicketDesk,
    backend: &dyn ModelBackend,
    ticket: &str,
    model: &str,
    now: OffsetDateTime,
) -> Result<TicketEntry, AppError> {
    require_ticket_text(ticket)?;

    let model = model.trim();
    if model.is_empty() {
        return Err(AppError::invalid_input("model is required"));
    }

    match classifier::classify(backend, ticket, model) {
        ClassificationResult::Classified(result) => {
            let entry = TicketEntry {
                timestamp: now,
                ticket: ticket.to_string(),
                result,
                model: model.to_string(),
            };
            desk.history.push(entry.clone());
            desk.processed_tickets += 1;
            tracing::debug!(
                processed = desk.processed_tickets,
                ticket_type = entry.result.ticket_type.as_str(),
                "ticket recorded"
            );
            Ok(entry)
        }
        ClassificationResult::Failed { error } => Err(AppError::classification(error)),
    }
}

pub fn require_ticket_text(ticket: &str) -> Result<(), AppError> {
    if ticket.trim().is_empty() {
        return Err(AppError::invalid_input("ticket text is required"));
    }
    Ok(())
}

pub fn select_model(desk: &mut TicketDesk, model: &str) -> Result<String, AppError> {
    let trimmed = model.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("model is required"));
    }
    desk.selected_model = Some(trimmed.to_string());
    Ok(trimmed.to_string())
}

/// Flip history visibility and return the new state.
pub fn toggle_history(desk: &mut TicketDesk) -> bool {
    desk.show_history = !desk.show_history;
    desk.show_history
}

pub fn reset_history(desk: &mut TicketDesk) {
    desk.history.clear();
    desk.processed_tickets = 0;
    tracing::debug!("ticket history cleared");
}

/// History newest first, as it is displayed.
pub fn history_newest_first(desk: &TicketDesk) -> impl Iterator<Item = &TicketEntry> {
    desk.history.iter().rev()
}

pub fn export_history(desk: &TicketDesk) -> Result<Option<ExportArtifact>, AppError> {
    export_history_at(desk, now_local())
}

fn export_history_at(
    desk: &TicketDesk,
    now: OffsetDateTime,
) -> Result<Option<ExportArtifact>, AppError> {
    if desk.history.is_empty() {
        return Ok(None);
    }

    let records = desk
        .history
        .iter()
        .map(export_record)
        .collect::<Result<Vec<_>, _>>()?;
    let stamp = now
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .map_err(|err| AppError::invalid_data(err.to_string()))?;

    Ok(Some(ExportArtifact {
        file_name: format!("ticket_analysis_{stamp}.json"),
        mime_type: EXPORT_MIME_TYPE,
        records,
    }))
}

fn export_record(entry: &TicketEntry) -> Result<ExportRecord, AppError> {
    Ok(ExportRecord {
        timestamp: format_timestamp(entry.timestamp)?,
        ticket_type: entry.result.ticket_type.as_str().to_string(),
        summary: entry.result.summary.clone(),
        original_ticket: truncate_ticket(&entry.ticket),
    })
}

pub fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, AppError> {
    timestamp
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

pub fn truncate_ticket(ticket: &str) -> String {
    match ticket.char_indices().nth(TICKET_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &ticket[..cut]),
        None => ticket.to_string(),
    }
}

fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(local_offset())
}

#[cfg(test)]
mod tests {
    use super::{
        discover_models, export_history_at, format_timestamp, history_newest_first,
        reset_history, resolve_model, select_model, submit_ticket_at, toggle_history,
        truncate_ticket,
    };
    use crate::error::AppError;
    use crate::model::TicketType;
    use crate::ollama::{ChatMessage, ModelBackend};
    use crate::session::TicketDesk;
    use std::cell::{Cell, RefCell};
    use time::format_description::well_known::Rfc3339;
    use time::{Duration, OffsetDateTime};

    struct StubBackend {
        models: Result<Vec<String>, AppError>,
        replies: RefCell<Vec<Result<String, AppError>>>,
        chat_calls: Cell<usize>,
    }

    impl StubBackend {
        fn new(replies: Vec<Result<&str, AppError>>) -> Self {
            Self {
                models: Ok(vec!["llama3.2".to_string()]),
                replies: RefCell::new(
                    replies
                        .into_iter()
                        .rev()
                        .map(|reply| reply.map(str::to_string))
                        .collect(),
                ),
                chat_calls: Cell::new(0),
            }
        }
    }

    impl ModelBackend for StubBackend {
        fn list_models(&self) -> Result<Vec<String>, AppError> {
            self.models.clone()
        }

        fn chat(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
            _format: Option<&str>,
        ) -> Result<String, AppError> {
            self.chat_calls.set(self.chat_calls.get() + 1);
            self.replies
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Err(AppError::transport("no scripted reply")))
        }
    }

    fn at(raw: &str) -> OffsetDateTime {
        OffsetDateTime::parse(raw, &Rfc3339).unwrap()
    }

    #[test]
    fn submit_ticket_records_successful_classification() {
        let backend = StubBackend::new(vec![Ok(r#"{"summary":"Login crash","type":"bug"}"#)]);
        let mut desk = TicketDesk::default();

        let entry = submit_ticket_at(
            &mut desk,
            &backend,
            "App crashes on login",
            "llama3.2",
            at("2024-03-01T10:00:00Z"),
        )
        .unwrap();

        assert_eq!(desk.history.len(), 1);
        assert_eq!(desk.processed_tickets, 1);
        assert_eq!(entry.result.ticket_type, TicketType::Bug);
        assert_eq!(entry.result.summary, "Login crash");
        assert_eq!(entry.model, "llama3.2");
        assert_eq!(desk.history[0], entry);
    }

    #[test]
    fn submit_ticket_failure_leaves_desk_unchanged() {
        let backend = StubBackend::new(vec![
            Err(AppError::transport("connection refused")),
            Ok("not json at all"),
            Ok(r#"{"error":"overloaded"}"#),
        ]);
        let mut desk = TicketDesk::default();
        let before = desk.clone();

        for _ in 0..3 {
            let err = submit_ticket_at(
                &mut desk,
                &backend,
                "ticket",
                "llama3.2",
                at("2024-03-01T10:00:00Z"),
            )
            .unwrap_err();
            assert_eq!(err.code(), "classification_error");
        }

        assert_eq!(desk, before);
        assert_eq!(backend.chat_calls.get(), 3);
    }

    #[test]
    fn submit_ticket_rejects_blank_text_without_calling_model() {
        let backend = StubBackend::new(vec![Ok(r#"{"summary":"x","type":"bug"}"#)]);
        let mut desk = TicketDesk::default();

        for text in ["", "   \n"] {
            let err = submit_ticket_at(
                &mut desk,
                &backend,
                text,
                "llama3.2",
                at("2024-03-01T10:00:00Z"),
            )
            .unwrap_err();
            assert_eq!(err.code(), "invalid_input");
        }

        assert_eq!(backend.chat_calls.get(), 0);
        assert!(desk.history.is_empty());
        assert_eq!(desk.processed_tickets, 0);
    }

    #[test]
    fn discover_models_returns_listed_names() {
        let backend = StubBackend::new(Vec::new());
        let discovery = discover_models(&backend, "fallback");

        assert_eq!(discovery.models, vec!["llama3.2"]);
        assert!(discovery.error.is_none());
        assert_eq!(discovery.default_model(), Some("llama3.2"));
    }

    #[test]
    fn discover_models_allows_empty_list() {
        let mut backend = StubBackend::new(Vec::new());
        backend.models = Ok(Vec::new());

        let discovery = discover_models(&backend, "fallback");

        assert!(discovery.models.is_empty());
        assert!(discovery.error.is_none());
        assert_eq!(discovery.default_model(), None);
    }

    #[test]
    fn discover_models_substitutes_fallback_on_error() {
        let mut backend = StubBackend::new(Vec::new());
        backend.models = Err(AppError::transport("connection refused"));

        let discovery = discover_models(&backend, "llama3.2");

        assert_eq!(discovery.models, vec!["llama3.2"]);
        assert_eq!(
            discovery.error.as_ref().map(AppError::code),
            Some("transport_error")
        );
    }

    #[test]
    fn toggle_and_reset_history() {
        let backend = StubBackend::new(vec![Ok(r#"{"summary":"x","type":"feature"}"#)]);
        let mut desk = TicketDesk::default();
        submit_ticket_at(
            &mut desk,
            &backend,
            "Add dark mode",
            "llama3.2",
            at("2024-03-01T10:00:00Z"),
        )
        .unwrap();

        assert!(toggle_history(&mut desk));
        assert!(!toggle_history(&mut desk));
        assert!(toggle_history(&mut desk));

        reset_history(&mut desk);
        assert!(desk.history.is_empty());
        assert_eq!(desk.processed_tickets, 0);
        assert!(desk.show_history);
    }

    #[test]
    fn history_is_listed_newest_first() {
        let backend = StubBackend::new(vec![
            Ok(r#"{"summary":"first","type":"bug"}"#),
            Ok(r#"{"summary":"second","type":"billing"}"#),
        ]);
        let mut desk = TicketDesk::default();
        let start = at("2024-03-01T10:00:00Z");
        submit_ticket_at(&mut desk, &backend, "one", "m", start).unwrap();
        submit_ticket_at(&mut desk, &backend, "two", "m", start + Duration::seconds(5)).unwrap();

        let summaries: Vec<&str> = history_newest_first(&desk)
            .map(|entry| entry.result.summary.as_str())
            .collect();
        assert_eq!(summaries, vec!["second", "first"]);
    }

    #[test]
    fn export_with_empty_history_produces_nothing() {
        let desk = TicketDesk::default();
        let artifact = export_history_at(&desk, at("2024-03-01T10:00:00Z")).unwrap();
        assert!(artifact.is_none());
    }

    #[test]
    fn export_flattens_history_records() {
        let long_ticket = "x".repeat(150);
        let backend = StubBackend::new(vec![
            Ok(r#"{"summary":"Login crash","type":"bug"}"#),
            Ok(r#"{"summary":"Long one","type":"other"}"#),
        ]);
        let mut desk = TicketDesk::default();
        submit_ticket_at(
            &mut desk,
            &backend,
            "App crashes on login",
            "m",
            at("2024-03-01T10:00:00Z"),
        )
        .unwrap();
        submit_ticket_at(&mut desk, &backend, &long_ticket, "m", at("2024-03-01T10:05:09Z"))
            .unwrap();

        let artifact = export_history_at(&desk, at("2024-03-02T08:09:10Z"))
            .unwrap()
            .expect("artifact");

        assert_eq!(artifact.file_name, "ticket_analysis_20240302_080910.json");
        assert_eq!(artifact.mime_type, "application/json");
        assert_eq!(artifact.records.len(), desk.history.len());
        assert_eq!(artifact.records[0].timestamp, "2024-03-01 10:00:00");
        assert_eq!(artifact.records[0].ticket_type, "bug");
        assert_eq!(artifact.records[0].original_ticket, "App crashes on login");
        assert_eq!(artifact.records[1].ticket_type, "other");
        assert_eq!(artifact.records[1].original_ticket.chars().count(), 103);
        assert!(artifact.records[1].original_ticket.ends_with("..."));
    }

    #[test]
    fn truncate_ticket_counts_characters() {
        let exact = "é".repeat(100);
        assert_eq!(truncate_ticket(&exact), exact);

        let longer = "é".repeat(101);
        let truncated = truncate_ticket(&longer);
        assert_eq!(truncated, format!("{}...", "é".repeat(100)));
    }

    #[test]
    fn format_timestamp_uses_fixed_pattern() {
        assert_eq!(
            format_timestamp(at("2024-12-31T23:59:58Z")).unwrap(),
            "2024-12-31 23:59:58"
        );
    }

    #[test]
    fn select_model_rejects_blank_name() {
        let mut desk = TicketDesk::default();
        assert_eq!(select_model(&mut desk, "  ").unwrap_err().code(), "invalid_input");
        assert_eq!(select_model(&mut desk, " mistral ").unwrap(), "mistral");
        assert_eq!(desk.selected_model.as_deref(), Some("mistral"));
    }

    #[test]
    fn resolve_model_prefers_explicit_then_session_then_config() {
        let backend = StubBackend::new(Vec::new());
        let mut desk = TicketDesk::default();

        let choice = resolve_model(&desk, &backend, Some("a"), Some("c"), "f").unwrap();
        assert_eq!(choice.model, "a");
        assert!(choice.discovery.is_none());

        desk.selected_model = Some("b".to_string());
        let choice = resolve_model(&desk, &backend, None, Some("c"), "f").unwrap();
        assert_eq!(choice.model, "b");

        desk.selected_model = None;
        let choice = resolve_model(&desk, &backend, None, Some("c"), "f").unwrap();
        assert_eq!(choice.model, "c");
    }

    #[test]
    fn resolve_model_discovers_default() {
        let backend = StubBackend::new(Vec::new());
        let desk = TicketDesk::default();

        let choice = resolve_model(&desk, &backend, None, None, "f").unwrap();

        assert_eq!(choice.model, "llama3.2");
        assert!(choice.discovery.is_some());
    }

    #[test]
    fn resolve_model_uses_fallback_when_listing_fails() {
        let mut backend = StubBackend::new(Vec::new());
        backend.models = Err(AppError::transport("connection refused"));
        let desk = TicketDesk::default();

        let choice = resolve_model(&desk, &backend, None, None, "phi3").unwrap();

        assert_eq!(choice.model, "phi3");
        let discovery = choice.discovery.expect("discovery");
        assert!(discovery.error.is_some());
    }

    #[test]
    fn resolve_model_rejects_empty_model_list() {
        let mut backend = StubBackend::new(Vec::new());
        backend.models = Ok(Vec::new());
        let desk = TicketDesk::default();

        let err = resolve_model(&desk, &backend, None, None, "phi3").unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }
}
