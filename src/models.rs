use serde::{Deserialize, Serialize};

// Chat completion request format
#[derive(Debug, Serialize, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

// Chat completion response format
#[derive(Debug, Deserialize, Clone)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

// POST /tweets body
#[derive(Debug, Serialize, Clone)]
pub struct CreateTweet {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplySettings>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ReplySettings {
    pub in_reply_to_tweet_id: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PostedTweet {
    pub id: String,
    #[serde(default)]
    pub text: String,
}

// Platform responses wrap payloads in `data`
#[derive(Debug, Deserialize, Clone)]
pub struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Account {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Vec<RawTweet>,
    #[serde(default)]
    pub includes: Option<Includes>,
    #[serde(default)]
    pub meta: Option<SearchMeta>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RawTweet {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<Account>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchMeta {
    #[serde(default)]
    pub newest_id: Option<String>,
}

// A mention with its author resolved
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Mention {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub author_username: String,
    pub created_at: Option<String>,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MentionBatch {
    pub mentions: Vec<Mention>,
    pub newest_id: Option<String>,
}
