//! HTTP-level tests for the LLM extraction engine against a mock
//! chat-completions endpoint.

use std::time::Duration;

use aivis_core::SentimentLabel;
use aivis_scoring::{
    BrandContext, CompetitorRef, ExtractionEngine, LlmEngine, LlmEngineConfig, ScoringError,
};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn engine(server: &MockServer, timeout: Duration) -> LlmEngine {
    LlmEngine::new(LlmEngineConfig {
        base_url: format!("{}/v1/", server.uri()),
        api_key: "sk-test".to_owned(),
        model: "gpt-4o-mini".to_owned(),
        timeout,
    })
    .expect("client builds")
}

fn context() -> BrandContext {
    BrandContext::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        "BrandX",
        vec![CompetitorRef {
            id: Uuid::new_v4(),
            name: "CompetitorY".to_owned(),
        }],
    )
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn strict_json_reply_becomes_an_analysis() {
    let server = MockServer::start().await;
    let content = json!({
        "products": [{"entity": "BrandX", "product": "Ultra 2"}],
        "sentiments": {
            "brand": {"score": 0.7, "positive_sentences": ["BrandX offers free shipping."]},
            "competitors": [{"name": "CompetitorY", "score": -0.4,
                             "negative_sentences": ["CompetitorY is pricier."]}]
        }
    })
    .to_string();

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "response_format": { "type": "json_object" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&content)))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context();
    let analysis = engine(&server, Duration::from_secs(5))
        .analyze("BrandX offers free shipping. CompetitorY is pricier.", &ctx)
        .await
        .expect("analysis");

    assert_eq!(analysis.engine, "llm");
    assert_eq!(analysis.products.len(), 1);
    assert_eq!(analysis.products[0].product, "Ultra 2");
    assert_eq!(analysis.sentiments.brand.label, SentimentLabel::Positive);
    let y = &analysis.sentiments.competitors[0];
    assert_eq!(y.competitor_id, ctx.competitors[0].id);
    assert_eq!(y.sentiment.label, SentimentLabel::Negative);
    assert_eq!(y.sentiment.negative_sentences, vec!["CompetitorY is pricier."]);
}

#[tokio::test]
async fn server_error_is_an_extraction_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = engine(&server, Duration::from_secs(5))
        .analyze("anything", &context())
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::Extraction(ref m) if m.contains("500")), "{err}");
}

#[tokio::test]
async fn non_json_content_is_malformed_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion("I cannot help with that.")),
        )
        .mount(&server)
        .await;

    let err = engine(&server, Duration::from_secs(5))
        .analyze("anything", &context())
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::MalformedModelOutput(_)), "{err}");
}

#[tokio::test]
async fn missing_choices_is_malformed_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = engine(&server, Duration::from_secs(5))
        .analyze("anything", &context())
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::MalformedModelOutput(_)), "{err}");
}

#[tokio::test]
async fn slow_model_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("{}"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = engine(&server, Duration::from_millis(100))
        .analyze("anything", &context())
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::Extraction(ref m) if m.contains("timed out")), "{err}");
}
