pub mod mock;
pub mod openai;
pub mod proxy;
pub mod summarizer;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use mock::MockProvider;
pub use openai::{OpenAiProvider, ProviderErrorKind, OPENAI_API_BASE};
pub use proxy::ProxyProvider;
pub use summarizer::UrlSummarizer;
pub use types::*;

/// A transport to the generative-text backend.
///
/// Errors carry the upstream status in their message, e.g.
/// `"openai api error (503 Service Unavailable) [retryable]"`, so callers can
/// classify them without downcasting.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn providers_are_object_safe() {
        let providers: Vec<Arc<dyn LlmProvider>> = vec![
            Arc::new(MockProvider::new()),
            Arc::new(OpenAiProvider::new("sk-test", OPENAI_API_BASE)),
            Arc::new(ProxyProvider::new("http://localhost:8888/.netlify/functions/openai")),
        ];
        assert_eq!(providers.len(), 3);
        let reply = providers[0]
            .chat(LlmRequest::simple("m".into(), None, "hello".into()))
            .await
            .unwrap();
        assert!(!reply.text.is_empty());
    }

    #[test]
    fn error_kind_from_status() {
        use reqwest::StatusCode;
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::NOT_FOUND),
            ProviderErrorKind::NotFound
        );
        assert!(ProviderErrorKind::from_status(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(!ProviderErrorKind::from_status(StatusCode::UNAUTHORIZED).is_retryable());
    }
}
