mod common;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{mount_completion, posted, state};
use kinetic_bot::AppState;
use kinetic_bot::handlers::router;

// Serve the app on an ephemeral port and return its base url
async fn spawn_app(state: Arc<AppState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn health_reports_features_and_quota() {
    let upstream = MockServer::start().await;
    let base = spawn_app(state(&upstream)).await;

    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["features"]["degen_alerts_enabled"], true);
    assert_eq!(body["quota"]["daily_ceiling"], 80);
    assert_eq!(body["posting"]["max_posts_per_hour"], 50);
}

#[tokio::test]
async fn cron_routes_require_the_secret() {
    let upstream = MockServer::start().await;
    let base = spawn_app(state(&upstream)).await;
    let client = reqwest::Client::new();

    for route in [
        "/api/cron/market-update",
        "/api/cron/degen-alert?force=true",
        "/api/cron/content/defi",
        "/api/cron/content/tip",
        "/api/cron/mentions",
    ] {
        let response = client
            .post(format!("{base}{route}"))
            .bearer_auth("wrong")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401, "{route}");

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error_type"], "auth");
    }

    // nothing reached the upstream services
    assert!(upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn maintenance_toggle_pauses_jobs() {
    let upstream = MockServer::start().await;
    let base = spawn_app(state(&upstream)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/maintenance"))
        .bearer_auth("cron-secret")
        .json(&json!({ "enabled": true, "reason": "deploy" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["maintenance_mode"], true);
    assert_eq!(body["reason"], "deploy");

    let report: Value = client
        .post(format!("{base}/api/cron/degen-alert"))
        .bearer_auth("cron-secret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["skipped"], true);
    assert_eq!(report["reason"], "maintenance");

    let health: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["features"]["maintenance_mode"], true);
    assert_eq!(health["maintenance_reason"], "deploy");
}

#[tokio::test]
async fn metrics_and_analytics_are_public() {
    let upstream = MockServer::start().await;
    let base = spawn_app(state(&upstream)).await;

    let analytics: Value = reqwest::get(format!("{base}/api/analytics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let metrics = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(metrics.status(), 200);
    assert!(metrics.text().await.unwrap().contains("kinetic_cache_misses_total"));

    assert_eq!(analytics["market_updates"]["total"], 0);
    assert_eq!(analytics["system_health"]["status"], "healthy");
}

#[tokio::test]
async fn webhook_pulls_and_answers_mentions() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": "410", "text": "@KineticCryptoAI where is $BTC heading?", "author_id": "u1" }
            ],
            "includes": { "users": [{ "id": "u1", "username": "alice" }] },
            "meta": { "newest_id": "410" }
        })))
        .expect(1)
        .mount(&upstream)
        .await;
    mount_completion(&upstream, "Range bound under 70k. DYOR").await;
    Mock::given(method("POST"))
        .and(path("/tweets"))
        .respond_with(posted("411"))
        .expect(1)
        .mount(&upstream)
        .await;

    let state = state(&upstream);
    let base = spawn_app(Arc::clone(&state)).await;

    // no bearer token needed; the body is ignored
    let response = reqwest::Client::new()
        .post(format!("{base}/api/webhooks/twitter"))
        .json(&json!({ "for_user_id": "42" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let report: Value = response.json().await.unwrap();
    assert_eq!(report["job"], "mention_processing");
    assert_eq!(report["success"], true);
    assert_eq!(report["skipped"], false);
    assert_eq!(report["found"], 1);
    assert_eq!(report["successful"], 1);
    assert_eq!(state.social.last_mention_id().as_deref(), Some("410"));
}
