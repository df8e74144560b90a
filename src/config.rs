use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::time::Duration;

use crate::error::BotError;

const PLACEHOLDER_API_KEY: &str = "your_crestal_api_key_here";

// CLI argument structure; every secret can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "kinetic-bot")]
#[command(about = "Scheduled crypto commentary bot with quota-aware posting")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Completion provider
    #[arg(long, env = "CRESTAL_API_KEY", default_value = "")]
    pub crestal_api_key: String,

    #[arg(long, env = "CRESTAL_API_URL", default_value = "https://open.service.crestal.network")]
    pub crestal_api_url: String,

    // Social platform
    #[arg(long, env = "TWITTER_API_URL", default_value = "https://api.twitter.com/2")]
    pub twitter_api_url: String,

    // App-only token used for reads
    #[arg(long, env = "TWITTER_BEARER_TOKEN", default_value = "")]
    pub twitter_bearer_token: String,

    // OAuth 2.0 user-context token used for posting
    #[arg(long, env = "TWITTER_ACCESS_TOKEN", default_value = "")]
    pub twitter_access_token: String,

    #[arg(long, env = "BOT_TWITTER_HANDLE", default_value = "KineticCryptoAI")]
    pub bot_handle: String,

    #[arg(long, env = "CRON_SECRET", default_value = "")]
    pub cron_secret: String,

    #[arg(long, env = "BOT_ENV", default_value = "development")]
    pub environment: String,

    // Feature gates: maintenance only on "true", features on unless "false"
    #[arg(long, env = "MAINTENANCE_MODE", default_value_t = false, action = ArgAction::Set, value_parser = only_true)]
    pub maintenance_mode: bool,

    #[arg(long, env = "ENABLE_AUTO_POSTS", default_value_t = true, action = ArgAction::Set, value_parser = unless_false)]
    pub enable_auto_posts: bool,

    #[arg(long, env = "ENABLE_MENTION_REPLIES", default_value_t = true, action = ArgAction::Set, value_parser = unless_false)]
    pub enable_mention_replies: bool,

    #[arg(long, env = "ENABLE_DEGEN_ALERTS", default_value_t = true, action = ArgAction::Set, value_parser = unless_false)]
    pub enable_degen_alerts: bool,

    // Budgets
    #[arg(long, default_value_t = 50)]
    pub max_posts_per_hour: u32,

    #[arg(long, default_value_t = 20)]
    pub max_calls_per_cycle: u32,

    #[arg(long, default_value_t = 4)]
    pub cycles_per_day: u32,

    // Cache sweep interval in seconds
    #[arg(long, default_value_t = 600)]
    pub sweep_interval: u64,

    // Pause between mention replies in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub reply_delay_ms: u64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Run a single job and exit
    Run {
        #[arg(value_enum)]
        job: JobKind,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    MarketUpdate,
    DegenAlert,
    ContentDefi,
    ContentTip,
    Mentions,
}

impl Args {
    /// Report every missing secret at once.
    pub fn validate(&self) -> Result<(), BotError> {
        let required = [
            ("TWITTER_BEARER_TOKEN", &self.twitter_bearer_token),
            ("TWITTER_ACCESS_TOKEN", &self.twitter_access_token),
            ("CRESTAL_API_KEY", &self.crestal_api_key),
            ("CRON_SECRET", &self.cron_secret),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            tracing::info!("environment validation passed");
            Ok(())
        } else {
            Err(BotError::Config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Fixed policy limits.
#[derive(Debug, Clone)]
pub struct BotLimits {
    pub max_posts_per_hour: u32,
    pub max_calls_per_cycle: u32,
    pub cycles_per_day: u32,
    pub reply_cooldown_max: usize,
    pub reply_cooldown_window: Duration,
    pub replied_ledger_capacity: usize,
    pub tweet_max_len: usize,
    pub degen_min_interval: Duration,
    pub degen_quota_reserve: u32,
    pub degen_min_len: usize,
    pub degen_similarity: f64,
    pub content_similarity: f64,
}

impl Default for BotLimits {
    fn default() -> Self {
        Self {
            max_posts_per_hour: 50,
            max_calls_per_cycle: 20,
            cycles_per_day: 4,
            reply_cooldown_max: 3,
            reply_cooldown_window: minutes(5),
            replied_ledger_capacity: 1000,
            tweet_max_len: 280,
            degen_min_interval: minutes(4 * 60),
            degen_quota_reserve: 15,
            degen_min_len: 20,
            degen_similarity: 0.5,
            content_similarity: 0.6,
        }
    }
}

impl BotLimits {
    pub fn daily_ceiling(&self) -> u32 {
        self.max_calls_per_cycle.saturating_mul(self.cycles_per_day)
    }
}

// Completion request parameters
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl CompletionSettings {
    pub fn has_usable_key(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != PLACEHOLDER_API_KEY
    }
}

#[derive(Debug, Clone)]
pub struct SocialSettings {
    pub base_url: String,
    pub bearer_token: String,
    pub access_token: String,
    pub bot_handle: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FeatureFlags {
    pub maintenance_mode: bool,
    pub auto_posts: bool,
    pub mention_replies: bool,
    pub degen_alerts: bool,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub completion: CompletionSettings,
    pub social: SocialSettings,
    pub cron_secret: String,
    pub environment: String,
    pub features: FeatureFlags,
    pub limits: BotLimits,
    pub sweep_interval: Duration,
    pub reply_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8080,
            completion: CompletionSettings {
                api_key: String::new(),
                base_url: "https://open.service.crestal.network".to_string(),
                model: "gpt-4o-mini".to_string(),
                max_tokens: 100,
                temperature: 0.7,
                timeout: Duration::from_secs(8),
            },
            social: SocialSettings {
                base_url: "https://api.twitter.com/2".to_string(),
                bearer_token: String::new(),
                access_token: String::new(),
                bot_handle: "KineticCryptoAI".to_string(),
                timeout: Duration::from_secs(10),
            },
            cron_secret: String::new(),
            environment: "development".to_string(),
            features: FeatureFlags {
                maintenance_mode: false,
                auto_posts: true,
                mention_replies: true,
                degen_alerts: true,
            },
            limits: BotLimits::default(),
            sweep_interval: minutes(10),
            reply_delay: Duration::from_secs(1),
        }
    }
}

impl From<&Args> for Settings {
    fn from(args: &Args) -> Self {
        let defaults = Settings::default();
        Self {
            port: args.port,
            completion: CompletionSettings {
                api_key: args.crestal_api_key.clone(),
                base_url: args.crestal_api_url.trim_end_matches('/').to_string(),
                ..defaults.completion
            },
            social: SocialSettings {
                base_url: args.twitter_api_url.trim_end_matches('/').to_string(),
                bearer_token: args.twitter_bearer_token.clone(),
                access_token: args.twitter_access_token.clone(),
                bot_handle: args.bot_handle.trim_start_matches('@').to_string(),
                ..defaults.social
            },
            cron_secret: args.cron_secret.clone(),
            environment: args.environment.clone(),
            features: FeatureFlags {
                maintenance_mode: args.maintenance_mode,
                auto_posts: args.enable_auto_posts,
                mention_replies: args.enable_mention_replies,
                degen_alerts: args.enable_degen_alerts,
            },
            limits: BotLimits {
                max_posts_per_hour: args.max_posts_per_hour,
                max_calls_per_cycle: args.max_calls_per_cycle,
                cycles_per_day: args.cycles_per_day,
                ..defaults.limits
            },
            sweep_interval: Duration::from_secs(args.sweep_interval.max(1)),
            reply_delay: Duration::from_millis(args.reply_delay_ms),
        }
    }
}

fn only_true(value: &str) -> Result<bool, String> {
    Ok(value.trim().eq_ignore_ascii_case("true"))
}

fn unless_false(value: &str) -> Result<bool, String> {
    Ok(!value.trim().eq_ignore_ascii_case("false"))
}

// Consumers speak in whole minutes
pub fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_lists_every_missing_secret() {
        let args = Args::parse_from([
            "kinetic-bot",
            "--crestal-api-key",
            "key",
            "--twitter-bearer-token",
            "",
            "--twitter-access-token",
            "",
            "--cron-secret",
            "",
        ]);
        let err = args.validate().unwrap_err().to_string();
        assert!(err.contains("TWITTER_BEARER_TOKEN"));
        assert!(err.contains("TWITTER_ACCESS_TOKEN"));
        assert!(err.contains("CRON_SECRET"));
        assert!(!err.contains("CRESTAL_API_KEY"));
    }

    #[test]
    fn settings_resolve_from_args() {
        let args = Args::parse_from([
            "kinetic-bot",
            "--crestal-api-url",
            "http://localhost:9000/",
            "--bot-handle",
            "@TestBot",
            "--enable-degen-alerts",
            "false",
            "--max-calls-per-cycle",
            "5",
            "run",
            "degen-alert",
        ]);
        let settings = Settings::from(&args);
        assert_eq!(settings.completion.base_url, "http://localhost:9000");
        assert_eq!(settings.social.bot_handle, "TestBot");
        assert!(!settings.features.degen_alerts);
        assert_eq!(settings.limits.daily_ceiling(), 20);
        assert!(matches!(
            args.command,
            Some(Command::Run {
                job: JobKind::DegenAlert
            })
        ));
    }

    #[test]
    fn feature_flags_are_on_unless_false() {
        let args = Args::parse_from([
            "kinetic-bot",
            "--enable-auto-posts",
            "1",
            "--enable-mention-replies",
            "FALSE",
            "--maintenance-mode",
            "yes",
        ]);
        assert!(args.enable_auto_posts);
        assert!(!args.enable_mention_replies);
        assert!(args.enable_degen_alerts);
        // maintenance needs an explicit "true"
        assert!(!args.maintenance_mode);

        let args = Args::parse_from(["kinetic-bot", "--maintenance-mode", "true"]);
        assert!(args.maintenance_mode);
    }

    #[test]
    fn placeholder_key_is_not_usable() {
        let mut settings = Settings::default().completion;
        assert!(!settings.has_usable_key());
        settings.api_key = PLACEHOLDER_API_KEY.to_string();
        assert!(!settings.has_usable_key());
        settings.api_key = "sk-live".to_string();
        assert!(settings.has_usable_key());
    }
}
