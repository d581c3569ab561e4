use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Client for the website summarization function used by "brainstorm from a URL".
#[derive(Debug, Clone)]
pub struct UrlSummarizer {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    summary: String,
}

impl UrlSummarizer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
        }
    }

    pub async fn summarize(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&SummarizeRequest { url })
            .send()
            .await
            .map_err(|e| anyhow!("summarizer error (connect): {e}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("summarizer error ({status}): {body}"));
        }

        let body: SummarizeResponse = resp
            .json()
            .await
            .map_err(|e| anyhow!("summarizer error (malformed body): {e}"))?;
        Ok(body.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn returns_summary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/summarize"))
            .and(body_json(serde_json::json!({"url": "https://example.com"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"summary": "A bakery in Leeds."})),
            )
            .mount(&server)
            .await;

        let summarizer = UrlSummarizer::new(format!("{}/summarize", server.uri()));
        let summary = summarizer.summarize("https://example.com").await.unwrap();
        assert_eq!(summary, "A bakery in Leeds.");
    }

    #[tokio::test]
    async fn non_success_includes_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/summarize"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream fetch failed"))
            .mount(&server)
            .await;

        let summarizer = UrlSummarizer::new(format!("{}/summarize", server.uri()));
        let err = summarizer.summarize("https://example.com").await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("502"));
        assert!(text.contains("upstream fetch failed"));
    }
}
