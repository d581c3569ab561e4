//! Primary transport: a serverless function that forwards chat completion
//! requests to the backend and holds the credential server-side.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::openai::{
    format_api_error, to_api_request, to_llm_response, ApiErrorEnvelope, ApiResponse,
};
use crate::{LlmProvider, LlmRequest, LlmResponse};

#[derive(Debug, Clone)]
pub struct ProxyProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl ProxyProvider {
    /// `endpoint` is the full function URL, e.g.
    /// `https://example.app/.netlify/functions/openai`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for ProxyProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let payload = to_api_request(request);

        let resp = match self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(anyhow!(
                    "proxy api error (timeout) [retryable]: request timed out after 60s"
                ));
            }
            Err(e) if e.is_connect() => {
                return Err(anyhow!("proxy api error (connect) [retryable]: {e}"));
            }
            Err(e) => return Err(e.into()),
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            let parsed = serde_json::from_str::<ApiErrorEnvelope>(&text).ok();
            return Err(format_api_error("proxy", status, parsed));
        }

        let body: ApiResponse = resp
            .json()
            .await
            .map_err(|e| anyhow!("proxy api error (malformed body): {e}"))?;
        to_llm_response("proxy", body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    #[tokio::test]
    async fn forwards_request_without_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/.netlify/functions/openai"))
            .respond_with(|req: &Request| {
                assert!(req.headers.get("authorization").is_none());
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                assert_eq!(body["messages"][0]["role"], "system");
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "choices": [{"message": {"content": "from proxy"}}]
                }))
            })
            .expect(1)
            .mount(&server)
            .await;

        let provider = ProxyProvider::new(format!("{}/.netlify/functions/openai", server.uri()));
        let resp = provider
            .chat(LlmRequest::simple("m".into(), Some("sys".into()), "hi".into()))
            .await
            .unwrap();
        assert_eq!(resp.text, "from proxy");
    }

    #[tokio::test]
    async fn any_success_status_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/.netlify/functions/openai"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "created"}}]
            })))
            .mount(&server)
            .await;

        let provider = ProxyProvider::new(format!("{}/.netlify/functions/openai", server.uri()));
        let resp = provider
            .chat(LlmRequest::simple("m".into(), None, "hi".into()))
            .await
            .unwrap();
        assert_eq!(resp.text, "created");
    }

    #[tokio::test]
    async fn missing_function_reports_not_found() {
        let server = MockServer::start().await;
        let provider = ProxyProvider::new(format!("{}/.netlify/functions/openai", server.uri()));
        let err = provider
            .chat(LlmRequest::simple("m".into(), None, "hi".into()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().starts_with("proxy api error"));
    }
}
