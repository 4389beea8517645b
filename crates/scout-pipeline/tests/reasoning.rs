//! Reasoning-service client and enrichment fallback against a mock
//! chat-completions endpoint.

use scout_core::{RawCandidate, RawMetrics, ScanFilters, SourceTag};
use scout_pipeline::{Enricher, HeuristicScorer, OpenAiReasoningClient, PipelineError, ReasoningClient};
use serde_json::json;
use wiremock::matchers::{bearer_token, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> OpenAiReasoningClient {
    OpenAiReasoningClient::new(&format!("{}/v1", server.uri()), "test-model", "sk-test", 5)
        .expect("failed to build reasoning client")
}

fn completion(content: &str) -> serde_json::Value {
    json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
}

fn candidates() -> Vec<RawCandidate> {
    vec![
        RawCandidate::new(SourceTag::Aliexpress, "Neck Fan").with_metrics(RawMetrics {
            orders: Some(8_000),
            price: Some(6.0),
            ..RawMetrics::default()
        }),
        RawCandidate::new(SourceTag::Amazon, "Desk Lamp").with_metrics(RawMetrics {
            rank: Some(4),
            price: Some(30.0),
            ..RawMetrics::default()
        }),
    ]
}

#[tokio::test]
async fn sends_json_mode_request_and_parses_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(bearer_token("sk-test"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "response_format": { "type": "json_object" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(r#"{"ok": true}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server)
        .complete_json("system", "user")
        .await
        .expect("completion should parse");
    assert_eq!(reply, json!({ "ok": true }));
}

#[tokio::test]
async fn non_success_status_is_typed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = client(&server).complete_json("s", "u").await.unwrap_err();
    match err {
        PipelineError::ReasoningStatus { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid api key");
        }
        other => panic!("expected ReasoningStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_choices_is_empty_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    assert!(matches!(
        client(&server).complete_json("s", "u").await,
        Err(PipelineError::EmptyCompletion)
    ));
}

#[tokio::test]
async fn enrichment_uses_service_scores() {
    let server = MockServer::start().await;
    let content = json!({ "products": [
        {
            "name": "Neck Fan",
            "category": "Summer Gear",
            "why_trending": "Heatwave demand",
            "source_cost": 6.0,
            "recommended_price": 24.0,
            "overall_score": 91,
            "trend_score": 88,
            "saturation": "low",
            "trend_direction": "up"
        }
    ]})
    .to_string();
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&content)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let out = Enricher::new(HeuristicScorer::default(), 20)
        .enrich(&candidates(), &ScanFilters::default(), Some(&client))
        .await;

    assert!(out.enriched);
    assert_eq!(out.products.len(), 1);
    let fan = &out.products[0];
    assert_eq!(fan.category, "Summer Gear");
    assert_eq!(fan.overall_score, 91);
    assert!((fan.margin_percent - 75.0).abs() < 1e-9);
    assert_eq!(fan.raw_metrics.orders, Some(8_000));
}

#[tokio::test]
async fn service_outage_falls_back_to_bounded_heuristic_scores() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client(&server);
    let out = Enricher::new(HeuristicScorer::default(), 20)
        .enrich(&candidates(), &ScanFilters::default(), Some(&client))
        .await;

    assert!(!out.enriched);
    assert_eq!(out.products.len(), 2);
    for p in &out.products {
        assert!(p.overall_score <= 100 && p.trend_score <= 100);
        assert!(p.competition_score <= 100 && p.profit_score <= 100);
        assert!(!p.enriched);
    }
    assert_eq!(out.products[0].name, "Neck Fan");
}

#[tokio::test]
async fn prose_reply_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion("Here are some great products!")),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    let out = Enricher::new(HeuristicScorer::default(), 20)
        .enrich(&candidates(), &ScanFilters::default(), Some(&client))
        .await;
    assert!(!out.enriched);
    assert_eq!(out.products.len(), 2);
}
