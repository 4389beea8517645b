//! Integration tests for the per-source fallback chains.
//!
//! Every source is pointed at one local `wiremock` server. Paths that are not
//! mounted answer 404, which the chains treat as a failed strategy.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scout_core::SourceTag;
use scout_scraper::sources::{amazon, google_trends, meta_ads, tiktok};
use scout_scraper::{Collector, FetchConfig, HttpFetcher, SourceEndpoints};

fn test_fetcher() -> Arc<HttpFetcher> {
    Arc::new(HttpFetcher::new(&FetchConfig::immediate()).expect("failed to build test fetcher"))
}

#[tokio::test]
async fn amazon_falls_through_failed_feed_to_bestseller_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gp/rss/bestsellers/home-garden"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let page = r#"<html><body>
        <div id="gridItemRoot"><a class="a-link-normal" href="/dp/B0LAMP0001"><img src="https://m.media-amazon.com/lamp.jpg" alt="Sunset Lamp"></a>
          <span class="p13n-sc-price">$21.99</span></div>
        <div id="gridItemRoot"><a class="a-link-normal" href="/dp/B0FAN00002"><img src="https://m.media-amazon.com/fan.jpg" alt="Neck Fan"></a></div>
    </body></html>"#;
    Mock::given(method("GET"))
        .and(path("/gp/bestsellers/home-garden"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let chain = amazon::collector(test_fetcher(), &server.uri());
    let out = chain.collect(Some("kitchen")).await;

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].source, SourceTag::Amazon);
    assert_eq!(out[0].name, "Sunset Lamp");
    assert_eq!(out[0].metrics.price, Some(21.99));
    assert_eq!(out[0].metrics.strategy.as_deref(), Some("bestseller_page"));
}

#[tokio::test]
async fn amazon_exhausted_chain_is_empty_not_error() {
    let server = MockServer::start().await;
    let chain = amazon::collector(test_fetcher(), &server.uri());
    assert!(chain.collect(None).await.is_empty());
}

#[tokio::test]
async fn tiktok_first_strategy_wins_and_later_ones_are_skipped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/creative_radar_api/v1/popular_trend/hashtag/list"))
        .and(query_param("country_code", "US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "list": [
                { "hashtag_name": "galaxyprojector", "video_views": 12_000_000 },
                { "hashtag_name": "fyp", "video_views": 1 }
            ] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/creative_radar_api/v1/popular_trend/keyword/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "list": [] } })))
        .expect(0)
        .mount(&server)
        .await;

    let endpoints = SourceEndpoints::single_origin(&server.uri());
    let chain = tiktok::collector(test_fetcher(), &endpoints.tiktok);
    let out = chain.collect(None).await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].name, "Galaxyprojector");
    assert_eq!(out[0].metrics.views, Some(12_000_000));
}

#[tokio::test]
async fn tiktok_blocked_api_falls_back_to_hashtag_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/creative_radar_api/v1/popular_trend/hashtag/list"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tag/icefaceroller"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><meta name="description" content="2.1M views. #icefaceroller #skincaretools"></head></html>"#,
        ))
        .mount(&server)
        .await;

    let endpoints = SourceEndpoints::single_origin(&server.uri());
    let chain = tiktok::collector(test_fetcher(), &endpoints.tiktok);
    let out = chain.collect(Some("Ice Face Roller")).await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].name, "Skincaretools");
    assert_eq!(out[0].metrics.strategy.as_deref(), Some("hashtag_pages"));
}

#[tokio::test]
async fn google_trends_related_queries_via_widget_token() {
    let server = MockServer::start().await;

    let explore = format!(
        ")]}}'\n{}",
        json!({ "widgets": [
            { "id": "RELATED_QUERIES", "token": "tok123", "request": { "keyword": "blender" } }
        ] })
    );
    Mock::given(method("GET"))
        .and(path("/trends/api/explore"))
        .respond_with(ResponseTemplate::new(200).set_body_string(explore))
        .mount(&server)
        .await;

    let related = format!(
        ")]}}',\n{}",
        json!({ "default": { "rankedList": [
            { "rankedKeyword": [ { "query": "blender bottle", "value": 100, "formattedValue": "100" } ] },
            { "rankedKeyword": [ { "query": "portable blender", "value": 900, "formattedValue": "Breakout" } ] }
        ] } })
    );
    Mock::given(method("GET"))
        .and(path("/trends/api/widgetdata/relatedsearches"))
        .and(query_param("token", "tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(related))
        .mount(&server)
        .await;

    let chain = google_trends::collector(test_fetcher(), &server.uri(), vec!["unused".to_string()]);
    let out = chain.collect(Some("blender")).await;

    let names: Vec<_> = out.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["portable blender", "blender bottle"]);
    assert_eq!(out[0].metrics.search_volume, Some(1000));
}

#[tokio::test]
async fn ad_archive_reports_result_count() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ads/library/"))
        .and(query_param("q", "neck fan"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><div>~180 results</div>
               <div data-testid="ad-card"><strong>CoolCo</strong></div></body></html>"#,
        ))
        .mount(&server)
        .await;

    let archive = meta_ads::AdArchive::new(test_fetcher(), &server.uri());
    let summary = archive.search("neck fan").await.expect("search should succeed");
    assert_eq!(summary.total_ads, 180);
    assert_eq!(summary.advertisers, vec!["CoolCo"]);
}

#[tokio::test]
async fn ad_archive_login_wall_is_shape_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ads/library/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Log in</html>"))
        .mount(&server)
        .await;

    let archive = meta_ads::AdArchive::new(test_fetcher(), &server.uri());
    let result = archive.search("anything").await;
    assert!(
        matches!(result, Err(scout_scraper::ScraperError::Shape { .. })),
        "expected Shape, got: {result:?}"
    );
}
