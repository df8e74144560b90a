use std::sync::Arc;

use crate::cache::{Cache, CacheKey};
use crate::config::{SocialSettings, minutes};
use crate::error::BotError;
use crate::formatter::{Template, format_tweet, truncate};
use crate::metrics::POSTS_TOTAL;
use crate::models::{
    Account, CreateTweet, DataEnvelope, Mention, MentionBatch, PostedTweet, ReplySettings,
    SearchResponse,
};
use crate::rate_limit::ReplyLedger;
use crate::throttle::{PostThrottle, ThrottleStats};

/// Client for the social platform's v2 API.
///
/// Each client owns its post throttle. Reads use the app bearer token,
/// writes use the user access token.
#[derive(Debug)]
pub struct SocialClient {
    http: reqwest::Client,
    settings: SocialSettings,
    max_len: usize,
    throttle: PostThrottle,
    ledger: Arc<ReplyLedger>,
    cache: Arc<Cache>,
}

impl SocialClient {
    pub fn new(
        http: reqwest::Client,
        settings: SocialSettings,
        max_len: usize,
        max_posts_per_hour: u32,
        ledger: Arc<ReplyLedger>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            http,
            settings,
            max_len,
            throttle: PostThrottle::new(max_posts_per_hour),
            ledger,
            cache,
        }
    }

    pub fn bot_handle(&self) -> &str {
        &self.settings.bot_handle
    }

    /// Format and publish a templated post.
    pub async fn post(&self, template: Template, body: &str) -> Result<PostedTweet, BotError> {
        let text = format_tweet(template, body, self.max_len);
        if !self.throttle.try_record() {
            tracing::warn!(template = template.name(), "post rate limit reached");
            return Err(BotError::PostThrottled);
        }

        let tweet = self.create(CreateTweet { text, reply: None }).await?;
        POSTS_TOTAL.with_label_values(&[template.name()]).inc();
        tracing::info!(id = %tweet.id, template = template.name(), "posted");
        Ok(tweet)
    }

    pub async fn reply(
        &self,
        tweet_id: &str,
        text: &str,
        handle: &str,
    ) -> Result<PostedTweet, BotError> {
        if !self.throttle.can_post() {
            tracing::warn!("reply rate limit reached");
            return Err(BotError::PostThrottled);
        }
        if !self.ledger.claim(tweet_id) {
            tracing::info!(tweet_id, "already replied");
            return Err(BotError::AlreadyReplied(tweet_id.to_string()));
        }
        if !self.throttle.try_record() {
            self.ledger.release(tweet_id);
            return Err(BotError::PostThrottled);
        }

        let budget = self.max_len.saturating_sub(handle.chars().count() + 10);
        let request = CreateTweet {
            text: truncate(text, budget),
            reply: Some(ReplySettings {
                in_reply_to_tweet_id: tweet_id.to_string(),
            }),
        };

        match self.create(request).await {
            Ok(tweet) => {
                POSTS_TOTAL.with_label_values(&["reply"]).inc();
                tracing::info!(id = %tweet.id, user = handle, "reply sent");
                Ok(tweet)
            }
            Err(e) => {
                self.ledger.release(tweet_id);
                Err(e)
            }
        }
    }

    async fn create(&self, body: CreateTweet) -> Result<PostedTweet, BotError> {
        let response = self
            .http
            .post(format!("{}/tweets", self.settings.base_url))
            .bearer_auth(&self.settings.access_token)
            .timeout(self.settings.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Platform {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: DataEnvelope<PostedTweet> = response.json().await?;
        Ok(envelope.data)
    }

    /// Recent mentions of the bot, optionally only those newer than `since_id`.
    pub async fn mentions(&self, since_id: Option<&str>) -> Result<MentionBatch, BotError> {
        let query = format!("@{} -is:retweet", self.settings.bot_handle);
        let mut params = vec![
            ("query", query.as_str()),
            ("tweet.fields", "author_id,created_at,conversation_id"),
            ("user.fields", "username"),
            ("expansions", "author_id"),
            ("max_results", "100"),
        ];
        if let Some(since_id) = since_id {
            params.push(("since_id", since_id));
        }

        let url = reqwest::Url::parse_with_params(
            &format!("{}/tweets/search/recent", self.settings.base_url),
            &params,
        )
        .map_err(|e| BotError::Config(format!("invalid twitter api url: {e}")))?;

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.settings.bearer_token)
            .timeout(self.settings.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Platform {
                status: status.as_u16(),
                body,
            });
        }

        let search: SearchResponse = response.json().await?;
        let batch = join_authors(search);
        if batch.mentions.is_empty() {
            tracing::info!("no new mentions");
        } else {
            tracing::info!(count = batch.mentions.len(), "found mentions");
        }
        Ok(batch)
    }

    pub async fn verify_credentials(&self) -> Result<Account, BotError> {
        let response = self
            .http
            .get(format!("{}/users/me", self.settings.base_url))
            .bearer_auth(&self.settings.access_token)
            .timeout(self.settings.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "twitter connection failed");
            return Err(BotError::Platform {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: DataEnvelope<Account> = response.json().await?;
        tracing::info!(username = %envelope.data.username, "twitter connection validated");
        Ok(envelope.data)
    }

    pub fn last_mention_id(&self) -> Option<String> {
        self.cache.get_as(&CacheKey::LastMentionId)
    }

    pub fn set_last_mention_id(&self, id: &str) {
        self.cache
            .set_as(&CacheKey::LastMentionId, &id, minutes(24 * 60));
    }

    pub fn stats(&self) -> ThrottleStats {
        self.throttle.stats()
    }
}

fn join_authors(search: SearchResponse) -> MentionBatch {
    let users = search.includes.unwrap_or_default().users;
    let newest_from_meta = search.meta.and_then(|meta| meta.newest_id);

    let mentions: Vec<Mention> = search
        .data
        .into_iter()
        .map(|tweet| {
            let author_username = tweet
                .author_id
                .as_ref()
                .and_then(|author| users.iter().find(|user| &user.id == author))
                .map(|user| user.username.clone())
                .unwrap_or_else(|| "unknown".to_string());
            Mention {
                id: tweet.id,
                text: tweet.text,
                author_id: tweet.author_id,
                author_username,
                created_at: tweet.created_at,
                conversation_id: tweet.conversation_id,
            }
        })
        .collect();

    let newest_id = newest_from_meta.or_else(|| {
        mentions
            .iter()
            .map(|m| m.id.clone())
            .max_by(|a, b| compare_ids(a, b))
    });

    MentionBatch {
        mentions,
        newest_id,
    }
}

// Snowflake ids are decimal strings; longer means newer
pub fn compare_ids(a: &str, b: &str) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Includes, RawTweet, SearchMeta};
    use std::cmp::Ordering;

    fn raw(id: &str, author: Option<&str>) -> RawTweet {
        RawTweet {
            id: id.to_string(),
            text: format!("tweet {id}"),
            author_id: author.map(String::from),
            created_at: None,
            conversation_id: None,
        }
    }

    #[test]
    fn authors_are_joined_and_missing_ones_are_unknown() {
        let batch = join_authors(SearchResponse {
            data: vec![raw("5", Some("u1")), raw("6", Some("u9")), raw("7", None)],
            includes: Some(Includes {
                users: vec![Account {
                    id: "u1".to_string(),
                    username: "alice".to_string(),
                }],
            }),
            meta: None,
        });

        let names: Vec<&str> = batch
            .mentions
            .iter()
            .map(|m| m.author_username.as_str())
            .collect();
        assert_eq!(names, vec!["alice", "unknown", "unknown"]);
        assert_eq!(batch.newest_id.as_deref(), Some("7"));
    }

    #[test]
    fn meta_newest_id_wins() {
        let batch = join_authors(SearchResponse {
            data: vec![raw("100", None)],
            includes: None,
            meta: Some(SearchMeta {
                newest_id: Some("150".to_string()),
            }),
        });
        assert_eq!(batch.newest_id.as_deref(), Some("150"));
    }

    #[test]
    fn ids_compare_numerically() {
        assert_eq!(compare_ids("99", "100"), Ordering::Less);
        assert_eq!(compare_ids("1800", "1799"), Ordering::Greater);
        assert_eq!(compare_ids("42", "42"), Ordering::Equal);
    }
}
