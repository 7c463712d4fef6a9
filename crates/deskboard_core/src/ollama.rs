//! Blocking client for a local Ollama server.
//!
//! Only two endpoints are used: `GET /api/tags` to list installed models and
//! `POST /api/chat` for a single non-streaming completion.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Anything that can list models and answer one chat turn.
pub trait ModelBackend {
    fn list_models(&self) -> Result<Vec<String>, AppError>;

    /// Send `messages` to `model` and return the raw reply content.
    fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        format: Option<&str>,
    ) -> Result<String, AppError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user<C: Into<String>>(content: C) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

pub struct OllamaClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl OllamaClient {
    /// Requests wait as long as the server needs; a cold model load can
    /// take minutes.
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("deskboard/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| AppError::transport(err.to_string()))?;

        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl ModelBackend for OllamaClient {
    fn list_models(&self) -> Result<Vec<String>, AppError> {
        let url = self.endpoint("/api/tags");
        tracing::debug!(%url, "listing models");

        let resp = self.http.get(&url).send()?;
        let body = check_response(resp)?.text()?;
        parse_tags_response(&body)
    }

    fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        format: Option<&str>,
    ) -> Result<String, AppError> {
        let url = self.endpoint("/api/chat");
        tracing::debug!(%url, model, messages = messages.len(), "sending chat request");

        let request = ChatRequest {
            model,
            messages,
            stream: false,
            format,
        };
        let resp = self.http.post(&url).json(&request).send()?;
        let body = check_response(resp)?.text()?;
        parse_chat_response(&body)
    }
}

fn check_response(
    resp: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, AppError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().unwrap_or_default();
    let detail = serde_json::from_str::<ChatResponse>(&body)
        .ok()
        .and_then(|parsed| parsed.error)
        .unwrap_or(body);
    Err(AppError::transport(format!(
        "model server returned {}: {}",
        status.as_u16(),
        detail.trim()
    )))
}

fn parse_tags_response(body: &str) -> Result<Vec<String>, AppError> {
    let parsed: TagsResponse = serde_json::from_str(body)
        .map_err(|err| AppError::invalid_data(format!("invalid model list: {err}")))?;
    Ok(parsed.models.into_iter().map(|tag| tag.name).collect())
}

fn parse_chat_response(body: &str) -> Result<String, AppError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|err| AppError::invalid_data(format!("invalid chat response: {err}")))?;

    if let Some(error) = parsed.error {
        return Err(AppError::transport(error));
    }

    parsed
        .message
        .map(|message| message.content)
        .ok_or_else(|| AppError::invalid_data("chat response has no message"))
}
