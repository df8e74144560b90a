#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kinetic_bot::AppState;
use kinetic_bot::config::Settings;

pub const BOT: &str = "KineticCryptoAI";

// Settings pointing both upstreams at one mock server
pub fn settings(uri: &str) -> Settings {
    let mut settings = Settings::default();
    settings.completion.api_key = "test-key".to_string();
    settings.completion.base_url = uri.to_string();
    settings.social.base_url = uri.to_string();
    settings.social.bearer_token = "app-token".to_string();
    settings.social.access_token = "user-token".to_string();
    settings.social.bot_handle = BOT.to_string();
    settings.cron_secret = "cron-secret".to_string();
    settings.reply_delay = Duration::ZERO;
    settings
}

pub fn state(server: &MockServer) -> Arc<AppState> {
    Arc::new(AppState::new(settings(&server.uri())).unwrap())
}

pub fn chat_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

pub async fn mount_completion(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(content)))
        .mount(server)
        .await;
}

pub async fn mount_credentials(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": "42", "username": BOT }
        })))
        .mount(server)
        .await;
}

pub fn posted(id: &str) -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(json!({
        "data": { "id": id, "text": "ok" }
    }))
}

// Bodies of every POST /tweets the server saw
pub async fn tweets_sent(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.method.as_str() == "POST" && request.url.path() == "/tweets")
        .map(|request| request.body_json::<Value>().unwrap())
        .collect()
}
