use std::sync::Arc;

use sparky_core::*;
use sparky_schema::{SuggestionType, WorkshopState, WorkshopStep};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROXY_PATH: &str = "/.netlify/functions/openai";

fn completion(text: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{
            "message": {"content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5}
    })
}

fn api_error(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(serde_json::json!({
        "error": {"type": "api_error", "message": message}
    }))
}

fn config_for(server: &MockServer, environment: Environment) -> WorkshopConfig {
    let mut config = WorkshopConfig::default();
    config.app.environment = environment;
    config.transports.proxy.url = format!("{}{PROXY_PATH}", server.uri());
    config.transports.direct.base_url = server.uri();
    config.transports.mock.enabled = false;
    config
}

#[tokio::test]
async fn proxy_not_found_falls_back_to_direct_with_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PROXY_PATH))
        .respond_with(api_error(404, "no such function"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-direct"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("direct answer")))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server, Environment::Test);
    config.transports.direct.api_key = "sk-direct".into();
    let gateway = ModelGateway::from_config(&config);

    let text = gateway
        .complete("be brief", "hello", 0.5, "gpt-4o-mini")
        .await
        .unwrap();
    assert_eq!(text, "direct answer");
}

#[tokio::test]
async fn proxy_failure_without_key_lands_on_mock_outside_production() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PROXY_PATH))
        .respond_with(api_error(503, "overloaded"))
        .mount(&server)
        .await;

    let mut config = config_for(&server, Environment::Development);
    config.transports.mock.enabled = true;
    let gateway = ModelGateway::from_config(&config);
    assert_eq!(gateway.transport_names(), vec!["proxy", "mock"]);

    let text = gateway
        .complete("You are a helpful coach.", "What is a FIRE pain?", 0.7, "gpt-4o-mini")
        .await
        .unwrap();
    assert!(text.starts_with("[mock:gpt-4o-mini]"));
}

#[tokio::test]
async fn production_exhaustion_reports_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PROXY_PATH))
        .respond_with(api_error(500, "boom"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(api_error(401, "bad key"))
        .mount(&server)
        .await;

    let mut config = config_for(&server, Environment::Production);
    config.transports.mock.enabled = true;
    config.transports.direct.api_key = "sk-revoked".into();
    let gateway = ModelGateway::from_config(&config);

    let err = gateway.complete("sys", "hi", 0.5, "m").await.unwrap_err();
    assert_eq!(
        err,
        PipelineError::UpstreamUnavailable {
            attempts: vec!["proxy: server_error".into(), "direct: auth_error".into()],
        }
    );
}

#[tokio::test]
async fn empty_choices_count_as_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PROXY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("second try")))
        .mount(&server)
        .await;

    let mut config = config_for(&server, Environment::Test);
    config.transports.direct.api_key = "sk-direct".into();
    let gateway = ModelGateway::from_config(&config);
    assert_eq!(gateway.complete("sys", "hi", 0.5, "m").await.unwrap(), "second try");
}

#[tokio::test]
async fn chatty_jobs_reply_becomes_suggestions() {
    let server = MockServer::start().await;
    let reply = "Sure! {\"overarchingJobStatement\": \"Help me grow my studio\", \
                 \"supportingJobStatements\": [\"Help me find new clients\"]} Let me know!";
    Mock::given(method("POST"))
        .and(path(PROXY_PATH))
        .and(body_string_contains("Help me [VERB] my [OBJECT] [CONTEXT]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(reply)))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server, Environment::Test);
    let orchestrator = SuggestionOrchestrator::from_config(&config);
    let suggestions = orchestrator
        .try_get_suggestions(5, SuggestionType::Jobs, &WorkshopState::default())
        .await
        .unwrap();

    let contents: Vec<&str> = suggestions.iter().map(|s| s.content.as_str()).collect();
    assert_eq!(contents, vec!["Help me grow my studio", "Help me find new clients"]);
    assert!(suggestions.iter().all(|s| s.suggestion_type == SuggestionType::Jobs));
}

#[tokio::test]
async fn malformed_json_reply_degrades_to_fallbacks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PROXY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("I'd rather not.")))
        .mount(&server)
        .await;

    let config = config_for(&server, Environment::Test);
    let orchestrator = SuggestionOrchestrator::from_config(&config);
    let err = orchestrator
        .try_get_suggestions(9, SuggestionType::OfferConcepts, &WorkshopState::default())
        .await
        .unwrap_err();
    assert_eq!(err.raw_text(), Some("I'd rather not."));

    let suggestions = orchestrator
        .get_suggestions(9, SuggestionType::OfferConcepts, &WorkshopState::default())
        .await;
    let expected: Vec<String> = fallback_contents(SuggestionType::OfferConcepts)
        .iter()
        .map(|s| s.to_string())
        .collect();
    let contents: Vec<String> = suggestions.into_iter().map(|s| s.content).collect();
    assert_eq!(contents, expected);
}

#[tokio::test]
async fn brainstorm_from_url_feeds_summary_into_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/summarize"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"summary": "A pottery studio in Leeds"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PROXY_PATH))
        .and(body_string_contains("Website summary: A pottery studio in Leeds"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("1. Pottery classes\n2. Glaze kits\n3. Studio rental")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server, Environment::Test);
    config.summarizer.url = Some(format!("{}/summarize", server.uri()));
    let orchestrator = SuggestionOrchestrator::from_config(&config);

    let result = orchestrator
        .brainstorm_from_url("https://pottery.example", &WorkshopState::default())
        .await
        .unwrap();
    assert_eq!(result.summary, "A pottery studio in Leeds");
    let contents: Vec<&str> = result.suggestions.iter().map(|s| s.content.as_str()).collect();
    assert_eq!(contents, vec!["Pottery classes", "Glaze kits", "Studio rental"]);
}

#[tokio::test]
async fn summarizer_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/summarize"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream fetch failed"))
        .mount(&server)
        .await;

    let mut config = config_for(&server, Environment::Test);
    config.summarizer.url = Some(format!("{}/summarize", server.uri()));
    let gateway = Arc::new(ModelGateway::from_config(&config));

    match gateway.summarize_url("https://example.com").await.unwrap_err() {
        PipelineError::Transport {
            transport,
            reason,
            message,
        } => {
            assert_eq!(transport, "summarizer");
            assert_eq!(reason, "server_error");
            assert!(message.contains("502"));
            assert!(message.contains("upstream fetch failed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn chat_answer_failure_is_an_apology() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PROXY_PATH))
        .respond_with(api_error(500, "boom"))
        .mount(&server)
        .await;

    let config = config_for(&server, Environment::Test);
    let orchestrator = SuggestionOrchestrator::from_config(&config);
    let answer = orchestrator
        .answer_question(WorkshopStep::Jobs, "What is a job?", &[], &WorkshopState::default())
        .await;
    assert_eq!(answer, CHAT_APOLOGY);
}
