use chrono::{Timelike, Utc};
use std::sync::Arc;

use crate::cache::{Cache, CacheKey};
use crate::config::{CompletionSettings, minutes};
use crate::error::BotError;
use crate::formatter::{extract_command, sanitize_handle};
use crate::metrics::{AI_CALLS, AI_FAILURES};
use crate::models::{ChatMessage, ChatRequest, ChatResponse};
use crate::quota::{QuotaStats, QuotaTracker};
use crate::rate_limit::UserCooldown;

const MARKET_ANALYSIS_PROMPT: &str = "You are Kinetic Crypto AI. Provide concise crypto market analysis in 180 chars max. Include key price levels and trends. Always end with DYOR.";
const DEGEN_ALERT_PROMPT: &str = "You are Kinetic Crypto AI focused on meme coins and degen plays. Alert about pumping tokens in 150 chars max. Be excited but include DYOR.";
const DEFI_UPDATE_PROMPT: &str = "You are Kinetic Crypto AI specializing in DeFi. Summarize TVL changes and yield opportunities in 180 chars max. Include DYOR.";
const USER_REPLY_PROMPT: &str = "You are Kinetic Crypto AI. Answer the users crypto question helpfully in 200 chars max. Be direct and include DYOR for trading advice.";
const TRADING_TIP_PROMPT: &str = "You are Kinetic Crypto AI. Give practical trading advice in 180 chars max. Focus on risk management and include DYOR.";

/// Client for the hosted chat-completion service.
///
/// Every upstream call is charged against the shared quota before it is
/// sent; a 429 from the provider switches the quota into emergency mode.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    settings: CompletionSettings,
    cache: Arc<Cache>,
    quota: Arc<QuotaTracker>,
    cooldown: Arc<UserCooldown>,
}

impl CompletionClient {
    pub fn new(
        http: reqwest::Client,
        settings: CompletionSettings,
        cache: Arc<Cache>,
        quota: Arc<QuotaTracker>,
        cooldown: Arc<UserCooldown>,
    ) -> Self {
        Self {
            http,
            settings,
            cache,
            quota,
            cooldown,
        }
    }

    pub async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, BotError> {
        let result = self.call(system_prompt, prompt).await;
        if let Err(e) = &result {
            AI_FAILURES.with_label_values(&[e.kind()]).inc();
            tracing::warn!(error = %e, "completion failed");
        }
        result
    }

    async fn call(&self, system_prompt: &str, prompt: &str) -> Result<String, BotError> {
        if !self.settings.has_usable_key() {
            return Err(BotError::MissingApiKey);
        }
        if self.quota.is_emergency() {
            tracing::info!("emergency mode, skipping completion");
            return Err(BotError::EmergencyMode);
        }
        if !self.quota.try_acquire() {
            self.quota.enter_emergency_mode();
            return Err(BotError::QuotaExhausted);
        }

        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(prompt)],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        AI_CALLS.inc();
        tracing::info!(model = %request.model, "calling completion api");

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.settings.base_url))
            .bearer_auth(&self.settings.api_key)
            .timeout(self.settings.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BotError::Timeout("completion request".to_string())
                } else {
                    BotError::Http(e)
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.quota.enter_emergency_mode();
            return Err(BotError::ProviderThrottled);
        }
        if !status.is_success() {
            return Err(BotError::ProviderStatus {
                status: status.as_u16(),
            });
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(BotError::EmptyCompletion)?;

        tracing::info!(chars = content.chars().count(), "completion received");
        Ok(content)
    }

    /// Market commentary, served from cache outside active trading hours.
    pub async fn market_analysis(&self) -> Result<String, BotError> {
        if !is_active_trading_hour(Utc::now().hour()) {
            if let Some(cached) = self.cache.get_as::<String>(&CacheKey::MarketAnalysis) {
                tracing::info!("using cached market analysis");
                return Ok(cached);
            }
        }

        let prompt = "Analyze the current crypto market. Focus on BTC, ETH, and top altcoins. Include key price levels, market sentiment, and any significant movements. What should traders watch today?";
        let analysis = self.complete(MARKET_ANALYSIS_PROMPT, prompt).await?;
        self.cache
            .set_as(&CacheKey::MarketAnalysis, &analysis, minutes(30));
        Ok(analysis)
    }

    pub async fn degen_alert(&self) -> Result<String, BotError> {
        let prompt = "Check for trending meme coins and tokens with unusual activity. Look for new listings, volume spikes, or social media buzz. What degen plays are happening right now?";
        self.complete(DEGEN_ALERT_PROMPT, prompt).await
    }

    pub async fn defi_update(&self) -> Result<String, BotError> {
        if let Some(cached) = self.cache.get_as::<String>(&CacheKey::DefiUpdate) {
            tracing::info!("using cached defi update");
            return Ok(cached);
        }

        let prompt = "Analyze current DeFi landscape. Check TVL changes, new yield opportunities, protocol updates, and any significant developments. What should DeFi users know today?";
        let update = self.complete(DEFI_UPDATE_PROMPT, prompt).await?;
        self.cache.set_as(&CacheKey::DefiUpdate, &update, minutes(45));
        Ok(update)
    }

    pub async fn trading_tip(&self) -> Result<String, BotError> {
        let prompt = "Provide a practical cryptocurrency trading tip. Focus on risk management, entry/exit strategies, or market psychology. Make it actionable for traders.";
        self.complete(TRADING_TIP_PROMPT, prompt).await
    }

    /// Answer a user's question, subject to the per-user cooldown.
    pub async fn analyze_user_query(
        &self,
        query: &str,
        handle: Option<&str>,
    ) -> Result<String, BotError> {
        if let Some(handle) = handle {
            let handle = sanitize_handle(handle);
            if !self.cooldown.try_interact(&handle) {
                tracing::info!(user = %handle, "user is cooling down");
                return Err(BotError::UserCoolingDown(handle));
            }
        }

        let command = extract_command(query);
        let prompt = format!(
            "User asked ({}): \"{}\". Provide helpful crypto analysis or information. If it's about a specific token, include price action and key levels if possible.",
            command.command, query
        );
        self.complete(USER_REPLY_PROMPT, &prompt).await
    }

    pub fn usage_stats(&self) -> QuotaStats {
        self.quota.stats()
    }
}

// Roughly US market hours, UTC
pub fn is_active_trading_hour(hour: u32) -> bool {
    (13..=21).contains(&hour)
}
