//! Single boundary to the generative-text backend.
//!
//! Requests run through an ordered chain of transport strategies. The first
//! non-empty completion wins; every failure is classified, logged and
//! recorded, and exhausting the chain yields `UpstreamUnavailable`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use sparky_provider::{
    LlmProvider, LlmRequest, MockProvider, OpenAiProvider, ProxyProvider, UrlSummarizer,
};

use crate::config::{Environment, WorkshopConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::json_extract::parse_json;
use crate::prompts::{json_only, ChatPrompt, PromptSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Serverless function holding the credential.
    Proxy,
    /// OpenAI-compatible API called with a locally configured key.
    Direct,
    /// Deterministic responder, development and test only.
    Mock,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proxy => "proxy",
            Self::Direct => "direct",
            Self::Mock => "mock",
        }
    }
}

#[derive(Clone)]
pub struct TransportStrategy {
    pub name: String,
    pub kind: TransportKind,
    pub provider: Arc<dyn LlmProvider>,
}

impl TransportStrategy {
    pub fn new(
        name: impl Into<String>,
        kind: TransportKind,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            provider,
        }
    }
}

impl std::fmt::Debug for TransportStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportStrategy")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Why a transport attempt failed, for logs and the attempt list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    RateLimit,
    Timeout,
    ServerError,
    NotFound,
    AuthError,
    Malformed,
    EmptyCompletion,
    Connect,
    Unknown,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Timeout => "timeout",
            Self::ServerError => "server_error",
            Self::NotFound => "not_found",
            Self::AuthError => "auth_error",
            Self::Malformed => "malformed",
            Self::EmptyCompletion => "empty_completion",
            Self::Connect => "connect",
            Self::Unknown => "unknown",
        }
    }
}

/// Classifies a provider error message by the status markers providers embed.
pub fn classify_failure(err_str: &str) -> FailureReason {
    let lower = err_str.to_lowercase();

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit") {
        return FailureReason::RateLimit;
    }
    if lower.contains("timeout") || lower.contains("timed out") {
        return FailureReason::Timeout;
    }
    if lower.contains("malformed") {
        return FailureReason::Malformed;
    }
    if lower.contains("500")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
        || lower.contains("internal server error")
        || lower.contains("service unavailable")
        || lower.contains("bad gateway")
    {
        return FailureReason::ServerError;
    }
    if lower.contains("404") || lower.contains("not found") {
        return FailureReason::NotFound;
    }
    if lower.contains("401")
        || lower.contains("403")
        || lower.contains("unauthorized")
        || lower.contains("forbidden")
    {
        return FailureReason::AuthError;
    }
    if lower.contains("(connect)") || lower.contains("connection refused") {
        return FailureReason::Connect;
    }

    FailureReason::Unknown
}

pub struct ModelGateway {
    strategies: Vec<TransportStrategy>,
    environment: Environment,
    max_tokens: u32,
    summarizer: Option<UrlSummarizer>,
}

impl ModelGateway {
    pub fn new(
        environment: Environment,
        max_tokens: u32,
        strategies: Vec<TransportStrategy>,
    ) -> Self {
        Self {
            strategies,
            environment,
            max_tokens,
            summarizer: None,
        }
    }

    pub fn with_summarizer(mut self, summarizer: UrlSummarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Proxy first, then direct (only with a key), then mock (never in production).
    pub fn from_config(config: &WorkshopConfig) -> Self {
        let environment = config.environment();
        let transports = &config.transports;
        let mut strategies = Vec::new();

        if transports.proxy.enabled {
            strategies.push(TransportStrategy::new(
                TransportKind::Proxy.as_str(),
                TransportKind::Proxy,
                Arc::new(ProxyProvider::new(transports.proxy.url.clone())),
            ));
        }
        if !transports.direct.api_key.trim().is_empty() {
            strategies.push(TransportStrategy::new(
                TransportKind::Direct.as_str(),
                TransportKind::Direct,
                Arc::new(OpenAiProvider::new(
                    transports.direct.api_key.clone(),
                    transports.direct.base_url.clone(),
                )),
            ));
        }
        if transports.mock.enabled && environment.allows_mock() {
            strategies.push(TransportStrategy::new(
                TransportKind::Mock.as_str(),
                TransportKind::Mock,
                Arc::new(MockProvider::new()),
            ));
        }

        tracing::info!(
            environment = ?environment,
            transports = ?strategies.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            "model gateway configured"
        );

        let gateway = Self::new(environment, config.model.max_tokens, strategies);
        match config.summarizer.url.as_deref() {
            Some(url) => gateway.with_summarizer(UrlSummarizer::new(url)),
            None => gateway,
        }
    }

    pub fn transport_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name.as_str()).collect()
    }

    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        model: &str,
    ) -> PipelineResult<String> {
        let request = LlmRequest::simple(model.to_string(), non_empty(system), user.to_string())
            .with_temperature(temperature)
            .with_max_tokens(self.max_tokens);
        self.send(request).await
    }

    /// Completion with the JSON-only instruction appended, parsed into `T`.
    pub async fn complete_structured<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        model: &str,
    ) -> PipelineResult<T> {
        let raw = self.complete(&json_only(system), user, temperature, model).await?;
        parse_json(&raw)
    }

    pub async fn complete_spec(&self, spec: &PromptSpec) -> PipelineResult<String> {
        self.complete(&spec.system_prompt, &spec.user_prompt, spec.temperature, &spec.model)
            .await
    }

    pub async fn complete_spec_structured<T: DeserializeOwned>(
        &self,
        spec: &PromptSpec,
    ) -> PipelineResult<T> {
        self.complete_structured(
            &spec.system_prompt,
            &spec.user_prompt,
            spec.temperature,
            &spec.model,
        )
        .await
    }

    /// Multi-turn completion for chat answers.
    pub async fn converse(&self, prompt: &ChatPrompt) -> PipelineResult<String> {
        let request = LlmRequest {
            model: prompt.model.clone(),
            system: non_empty(&prompt.system_prompt),
            messages: prompt.messages.clone(),
            max_tokens: self.max_tokens,
            temperature: Some(prompt.temperature),
        };
        self.send(request).await
    }

    /// Website summary from the summarizer service.
    pub async fn summarize_url(&self, url: &str) -> PipelineResult<String> {
        let url = url.trim();
        if url.is_empty() {
            return Err(PipelineError::Validation("url must not be empty".into()));
        }
        let summarizer = self
            .summarizer
            .as_ref()
            .ok_or_else(|| PipelineError::Config("summarizer url is not configured".into()))?;

        match summarizer.summarize(url).await {
            Ok(summary) if !summary.trim().is_empty() => Ok(summary.trim().to_string()),
            Ok(_) => Err(PipelineError::Transport {
                transport: "summarizer".into(),
                reason: FailureReason::EmptyCompletion.as_str(),
                message: "empty summary".into(),
            }),
            Err(err) => {
                let message = err.to_string();
                let reason = classify_failure(&message);
                tracing::warn!(url, reason = reason.as_str(), "website summary failed: {message}");
                Err(PipelineError::Transport {
                    transport: "summarizer".into(),
                    reason: reason.as_str(),
                    message,
                })
            }
        }
    }

    async fn send(&self, request: LlmRequest) -> PipelineResult<String> {
        let mut attempts: Vec<String> = Vec::new();

        for (idx, strategy) in self.strategies.iter().enumerate() {
            if strategy.kind == TransportKind::Mock && !self.environment.allows_mock() {
                tracing::warn!(transport = %strategy.name, "skipping mock transport in production");
                attempts.push(format!("{}: skipped", strategy.name));
                continue;
            }

            let failure = match strategy.provider.chat(request.clone()).await {
                Ok(resp) if !resp.text.trim().is_empty() => {
                    if idx > 0 {
                        tracing::info!(
                            "fallback_triggered=true, to={}, attempt={}, model={}",
                            strategy.name,
                            idx + 1,
                            request.model
                        );
                    }
                    tracing::debug!(
                        transport = %strategy.name,
                        input_tokens = ?resp.input_tokens,
                        output_tokens = ?resp.output_tokens,
                        stop_reason = ?resp.stop_reason,
                        "completion received"
                    );
                    return Ok(resp.text);
                }
                Ok(_) => PipelineError::Transport {
                    transport: strategy.name.clone(),
                    reason: FailureReason::EmptyCompletion.as_str(),
                    message: "completion text is empty".into(),
                },
                Err(err) => {
                    let message = err.to_string();
                    PipelineError::Transport {
                        transport: strategy.name.clone(),
                        reason: classify_failure(&message).as_str(),
                        message,
                    }
                }
            };

            if let PipelineError::Transport { reason, .. } = &failure {
                attempts.push(format!("{}: {reason}", strategy.name));
            }
            tracing::warn!("{failure}");
        }

        Err(PipelineError::UpstreamUnavailable { attempts })
    }
}

fn non_empty(system: &str) -> Option<String> {
    if system.trim().is_empty() {
        None
    } else {
        Some(system.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use sparky_provider::LlmResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailProvider(&'static str);

    #[async_trait]
    impl LlmProvider for FailProvider {
        async fn chat(&self, _request: LlmRequest) -> anyhow::Result<LlmResponse> {
            Err(anyhow!(self.0))
        }
    }

    struct FixedProvider {
        text: &'static str,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                text,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for FixedProvider {
        async fn chat(&self, _request: LlmRequest) -> anyhow::Result<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LlmResponse::text(self.text))
        }
    }

    fn strategy(
        name: &str,
        kind: TransportKind,
        provider: Arc<dyn LlmProvider>,
    ) -> TransportStrategy {
        TransportStrategy::new(name, kind, provider)
    }

    fn not_found() -> Arc<dyn LlmProvider> {
        Arc::new(FailProvider("proxy api error (404 Not Found)"))
    }

    #[test]
    fn classify_known_messages() {
        let cases = [
            ("proxy api error (429 Too Many Requests) [retryable]", FailureReason::RateLimit),
            (
                "openai api error (timeout) [retryable]: request timed out after 60s",
                FailureReason::Timeout,
            ),
            ("proxy api error (503 Service Unavailable) [retryable]", FailureReason::ServerError),
            ("proxy api error (404 Not Found)", FailureReason::NotFound),
            (
                "openai api error (401 Unauthorized): bad key (invalid_api_key)",
                FailureReason::AuthError,
            ),
            ("openai api error (malformed body): empty choices", FailureReason::Malformed),
            (
                "proxy api error (connect) [retryable]: error sending request",
                FailureReason::Connect,
            ),
            ("something odd", FailureReason::Unknown),
        ];
        for (message, expected) in cases {
            assert_eq!(classify_failure(message), expected, "{message}");
        }
    }

    #[tokio::test]
    async fn falls_through_to_next_transport() {
        let direct = FixedProvider::new("hello");
        let gateway = ModelGateway::new(
            Environment::Test,
            500,
            vec![
                strategy("proxy", TransportKind::Proxy, not_found()),
                strategy("direct", TransportKind::Direct, direct.clone()),
            ],
        );
        let text = gateway.complete("sys", "hi", 0.5, "gpt-4o-mini").await.unwrap();
        assert_eq!(text, "hello");
        assert_eq!(direct.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_lists_attempts() {
        let gateway = ModelGateway::new(
            Environment::Test,
            500,
            vec![
                strategy("proxy", TransportKind::Proxy, not_found()),
                strategy("direct", TransportKind::Direct, FixedProvider::new("   ")),
            ],
        );
        let err = gateway.complete("sys", "hi", 0.5, "m").await.unwrap_err();
        assert_eq!(
            err,
            PipelineError::UpstreamUnavailable {
                attempts: vec!["proxy: not_found".into(), "direct: empty_completion".into()],
            }
        );
    }

    #[tokio::test]
    async fn mock_is_skipped_in_production_even_if_injected() {
        let mock = FixedProvider::new("canned");
        let gateway = ModelGateway::new(
            Environment::Production,
            500,
            vec![strategy("mock", TransportKind::Mock, mock.clone())],
        );
        let err = gateway.complete("sys", "hi", 0.5, "m").await.unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamUnavailable { .. }));
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn from_config_registers_direct_only_with_key() {
        let mut config = WorkshopConfig::default();
        assert_eq!(ModelGateway::from_config(&config).transport_names(), vec!["proxy"]);

        config.transports.direct.api_key = "sk-test".into();
        assert_eq!(
            ModelGateway::from_config(&config).transport_names(),
            vec!["proxy", "direct"]
        );
    }

    #[test]
    fn default_config_never_registers_mock() {
        let mut config = WorkshopConfig::default();
        config.transports.proxy.enabled = false;
        assert!(ModelGateway::from_config(&config).transport_names().is_empty());

        config.app.environment = Environment::Development;
        assert!(ModelGateway::from_config(&config).transport_names().is_empty());
    }

    #[test]
    fn mock_needs_opt_in_and_a_non_production_environment() {
        let mut config = WorkshopConfig::default();
        config.transports.mock.enabled = true;
        assert_eq!(ModelGateway::from_config(&config).transport_names(), vec!["proxy"]);

        config.app.environment = Environment::Test;
        assert_eq!(ModelGateway::from_config(&config).transport_names(), vec!["proxy", "mock"]);
    }

    #[tokio::test]
    async fn structured_completion_recovers_json() {
        let gateway = ModelGateway::new(
            Environment::Test,
            500,
            vec![strategy(
                "direct",
                TransportKind::Direct,
                FixedProvider::new("Sure! {\"suggestions\": [\"a\"]} enjoy"),
            )],
        );
        let value: serde_json::Value = gateway
            .complete_structured("sys", "hi", 0.2, "m")
            .await
            .unwrap();
        assert_eq!(value["suggestions"][0], "a");
    }

    #[tokio::test]
    async fn summarize_without_service_is_config_error() {
        let gateway = ModelGateway::new(Environment::Test, 500, vec![]);
        assert!(matches!(
            gateway.summarize_url("https://example.com").await,
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(
            gateway.summarize_url("  ").await,
            Err(PipelineError::Validation(_))
        ));
    }
}
