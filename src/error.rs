use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Errors produced while generating or publishing content.
///
/// Policy checks return plain booleans; this is where their denials turn
/// into something a job or handler can report.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("no valid crestal api key configured")]
    MissingApiKey,

    #[error("crestal emergency mode active; upstream calls suspended")]
    EmergencyMode,

    #[error("daily crestal usage limit reached")]
    QuotaExhausted,

    #[error("crestal rate limit hit (429)")]
    ProviderThrottled,

    #[error("crestal api returned status {status}")]
    ProviderStatus { status: u16 },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("crestal returned an empty completion")]
    EmptyCompletion,

    #[error("twitter post rate limit reached")]
    PostThrottled,

    #[error("already replied to tweet {0}")]
    AlreadyReplied(String),

    #[error("user @{0} is rate limited")]
    UserCoolingDown(String),

    #[error("twitter api returned status {status}: {body}")]
    Platform { status: u16, body: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("metrics encoding failed: {0}")]
    Metrics(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// Coarse category used in job reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BotError::QuotaExhausted
            | BotError::ProviderThrottled
            | BotError::PostThrottled
            | BotError::UserCoolingDown(_)
            | BotError::EmergencyMode => "rate_limit",
            BotError::Timeout(_) => "timeout",
            BotError::Http(e) if e.is_timeout() => "timeout",
            BotError::Http(_) => "network",
            BotError::Unauthorized | BotError::MissingApiKey => "auth",
            BotError::Platform { status: 401 | 403, .. } => "auth",
            BotError::Platform { .. } | BotError::AlreadyReplied(_) => "twitter_api",
            BotError::ProviderStatus { .. } | BotError::EmptyCompletion => "crestal_api",
            BotError::Config(_) => "config",
            BotError::Metrics(_) | BotError::Io(_) => "unknown",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            "timeout" | "network" | "twitter_api" | "crestal_api"
        )
    }

    pub fn is_rate_limit(&self) -> bool {
        self.kind() == "rate_limit"
    }

    /// Short public text used when a mention cannot get a real answer.
    pub fn reply_text(&self) -> &'static str {
        match self {
            BotError::EmergencyMode | BotError::QuotaExhausted => {
                "Running on cached data. Fresh analysis coming soon! DYOR."
            }
            BotError::ProviderThrottled | BotError::UserCoolingDown(_) => {
                "High demand! Try again in a few minutes. DYOR."
            }
            BotError::Timeout(_) => {
                "Analysis taking longer than expected. Try a simpler question!"
            }
            BotError::Http(e) if e.is_timeout() => {
                "Analysis taking longer than expected. Try a simpler question!"
            }
            _ => "AI temporarily unavailable. Market looking good! DYOR always.",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            BotError::Unauthorized => StatusCode::UNAUTHORIZED,
            BotError::PostThrottled | BotError::ProviderThrottled | BotError::UserCoolingDown(_) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            BotError::EmergencyMode | BotError::QuotaExhausted => StatusCode::SERVICE_UNAVAILABLE,
            BotError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    error_type: &'static str,
    retryable: bool,
    timestamp: String,
}

impl IntoResponse for BotError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            success: false,
            error: self.to_string(),
            error_type: self.kind(),
            retryable: self.is_retryable(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        });

        (status, body).into_response()
    }
}
