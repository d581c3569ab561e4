use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{LlmMessage, LlmProvider, LlmRequest, LlmResponse};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Direct transport to an OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderErrorKind {
    RateLimit,
    ServerError,
    Timeout,
    AuthError,
    NotFound,
    InvalidRequest,
    Unknown,
}

impl ProviderErrorKind {
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            429 => Self::RateLimit,
            401 | 403 => Self::AuthError,
            404 => Self::NotFound,
            400 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::ServerError | Self::Timeout)
    }
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.api_base);
        let payload = to_api_request(request);

        let resp = match self
            .client
            .post(url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(anyhow!(
                    "openai api error (timeout) [retryable]: request timed out after 60s"
                ));
            }
            Err(e) if e.is_connect() => {
                return Err(anyhow!("openai api error (connect) [retryable]: {e}"));
            }
            Err(e) => return Err(e.into()),
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            let parsed = serde_json::from_str::<ApiErrorEnvelope>(&text).ok();
            return Err(format_api_error("openai", status, parsed));
        }

        let body: ApiResponse = resp
            .json()
            .await
            .map_err(|e| anyhow!("openai api error (malformed body): {e}"))?;
        to_llm_response("openai", body)
    }
}

pub(crate) fn to_api_request(request: LlmRequest) -> ApiRequest {
    ApiRequest {
        model: request.model,
        messages: to_api_messages(request.system, request.messages),
        temperature: request.temperature,
        max_tokens: Some(request.max_tokens),
    }
}

fn to_api_messages(system: Option<String>, messages: Vec<LlmMessage>) -> Vec<ApiMessage> {
    let mut result = Vec::with_capacity(messages.len() + 1);

    if let Some(system_text) = system {
        result.push(ApiMessage {
            role: "system".to_string(),
            content: system_text,
        });
    }

    result.extend(
        messages
            .into_iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| ApiMessage {
                role: m.role,
                content: m.content,
            }),
    );
    result
}

pub(crate) fn to_llm_response(label: &str, body: ApiResponse) -> Result<LlmResponse> {
    let choice = body
        .choices
        .first()
        .ok_or_else(|| anyhow!("{label} api error (malformed body): empty choices"))?;

    let text = choice.message.content.clone().unwrap_or_default();
    if text.trim().is_empty() {
        return Err(anyhow!("{label} api error (malformed body): empty message content"));
    }

    Ok(LlmResponse {
        text,
        input_tokens: body.usage.as_ref().map(|u| u.prompt_tokens),
        output_tokens: body.usage.as_ref().map(|u| u.completion_tokens),
        stop_reason: normalize_finish_reason(choice.finish_reason.clone()),
    })
}

fn normalize_finish_reason(reason: Option<String>) -> Option<String> {
    match reason.as_deref() {
        Some("stop") => Some("end_turn".to_string()),
        Some("length") => Some("max_tokens".to_string()),
        _ => reason,
    }
}

pub(crate) fn format_api_error(
    label: &str,
    status: StatusCode,
    parsed: Option<ApiErrorEnvelope>,
) -> anyhow::Error {
    let kind = ProviderErrorKind::from_status(status);
    let retryable = if kind.is_retryable() {
        " [retryable]"
    } else {
        ""
    };
    if let Some(api_error) = parsed {
        anyhow!(
            "{label} api error ({status}){retryable}: {} ({})",
            api_error.error.message,
            api_error.error.r#type
        )
    } else {
        anyhow!("{label} api error ({status}){retryable}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiResponse {
    pub choices: Vec<ApiChoice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiChoice {
    pub message: ApiAssistantMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiAssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(rename = "type", default)]
    pub r#type: String,
    pub message: String,
}
