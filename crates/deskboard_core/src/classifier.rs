use crate::model::{Classification, ClassificationResult, TicketType};
use crate::ollama::{ChatMessage, ModelBackend};
use serde_json::{Map, Value};

const RESPONSE_FORMAT: &str = "json";

pub fn build_prompt(ticket: &str) -> String {
    format!(
        "You are a support assistant. Read the customer ticket below and reply with a JSON \
         object containing exactly two keys:\n\
         - \"summary\": one short sentence describing the problem or request\n\
         - \"type\": one of \"bug\", \"feature\" or \"billing\"\n\
         Reply with the JSON object only.\n\n\
         Ticket:\n{ticket}"
    )
}

/// Ask `model` to classify `ticket`.
///
/// Every failure (transport, server error, unusable reply) comes back as
/// `ClassificationResult::Failed`; nothing is retried.
pub fn classify(backend: &dyn ModelBackend, ticket: &str, model: &str) -> ClassificationResult {
    let messages = [ChatMessage::user(build_prompt(ticket))];
    tracing::debug!(model, chars = ticket.chars().count(), "classifying ticket");

    match backend.chat(model, &messages, Some(RESPONSE_FORMAT)) {
        Ok(content) => parse_reply(&content),
        Err(err) => {
            tracing::debug!(%err, "classification call failed");
            ClassificationResult::failed(err.message())
        }
    }
}

pub fn parse_reply(content: &str) -> ClassificationResult {
    let fields: Map<String, Value> = match serde_json::from_str(content) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return ClassificationResult::failed("model reply is not a JSON object"),
        Err(err) => return ClassificationResult::failed(format!("model reply is not JSON: {err}")),
    };

    from_fields(&fields)
}

fn from_fields(fields: &Map<String, Value>) -> ClassificationResult {
    if let Some(error) = fields.get("error") {
        let message = match error {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        };
        return ClassificationResult::failed(message);
    }

    let summary = match string_field(fields, "summary") {
        Ok(value) => value,
        Err(result) => return result,
    };
    let raw_type = match string_field(fields, "type") {
        Ok(value) => value,
        Err(result) => return result,
    };

    let ticket_type = TicketType::from_raw(raw_type);
    if !ticket_type.is_recognized() {
        tracing::warn!(ticket_type = raw_type, "model returned an unrecognized ticket type");
    }

    ClassificationResult::Classified(Classification {
        summary: summary.to_string(),
        ticket_type,
    })
}

fn string_field<'a>(
    fields: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ClassificationResult> {
    match fields.get(key) {
        Some(Value::String(value)) => Ok(value.as_str()),
        Some(_) => Err(ClassificationResult::failed(format!(
            "field '{key}' must be a string"
        ))),
        None => Err(ClassificationResult::failed(format!(
            "missing field '{key}'"
        ))),
    }
}
