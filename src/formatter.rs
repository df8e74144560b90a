//! Tweet text shaping: templates, length limits and light parsing of
//! user mentions.

const ELLIPSIS: &str = "...";

// Tickers recognised without a `$` prefix
const KNOWN_TICKERS: &[&str] = &[
    "BTC", "ETH", "SOL", "ADA", "DOT", "LINK", "UNI", "AAVE", "PEPE", "DOGE", "SHIB",
];

const COMMANDS: &[(&str, &str)] = &[
    ("analyze", "Analyze a specific token or market"),
    ("price", "Get current price information"),
    ("yield", "Find yield opportunities"),
    ("news", "Latest crypto news and updates"),
    ("tip", "Get a trading tip"),
    ("defi", "DeFi protocol information"),
    ("degen", "Meme coin and degen alerts"),
];

const TRADING_WORDS: &[&str] = &["buy", "sell", "entry", "exit", "target", "support", "resistance"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    MarketUpdate,
    DegenAlert,
    DefiUpdate,
    TradingTip,
}

impl Template {
    fn header(self) -> &'static str {
        match self {
            Template::MarketUpdate => "📊 MARKET UPDATE",
            Template::DegenAlert => "🚨 DEGEN ALERT 🚨",
            Template::DefiUpdate => "🏛️ DeFi UPDATE",
            Template::TradingTip => "💡 TRADING TIP",
        }
    }

    fn hashtags(self) -> &'static str {
        match self {
            Template::MarketUpdate => "#crypto #Bitcoin #Ethereum #trading",
            Template::DegenAlert => "#memecoins #degen #crypto #altcoins",
            Template::DefiUpdate => "#DeFi #yield #crypto #staking",
            Template::TradingTip => "#crypto #blockchain #DYOR",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Template::MarketUpdate => "market_update",
            Template::DegenAlert => "degen_alert",
            Template::DefiUpdate => "defi_update",
            Template::TradingTip => "trading_tip",
        }
    }
}

/// Fill a template, trimming the body when the result is too long so the
/// hashtag line always survives.
pub fn format_tweet(template: Template, body: &str, max_len: usize) -> String {
    let head = format!("{}\n\n{}", template.header(), body.trim());
    let tail = format!("\n\n{}", template.hashtags());
    let full = format!("{head}{tail}");

    if char_len(&full) <= max_len {
        return full;
    }

    let tail_len = char_len(&tail) + ELLIPSIS.len();
    if tail_len >= max_len {
        return truncate(&full, max_len);
    }

    let kept: String = head.chars().take(max_len - tail_len).collect();
    format!("{}{ELLIPSIS}{tail}", kept.trim_end())
}

// Cut to `max` chars, marking the cut
pub fn truncate(text: &str, max: usize) -> String {
    if char_len(text) <= max {
        return text.to_string();
    }
    if max <= ELLIPSIS.len() {
        return text.chars().take(max).collect();
    }
    let kept: String = text.chars().take(max - ELLIPSIS.len()).collect();
    format!("{kept}{ELLIPSIS}")
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// `$TICKER` mentions plus well-known tickers written as plain words,
/// upper-cased and in first-seen order.
pub fn extract_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();

    let mut rest = text;
    while let Some(pos) = rest.find('$') {
        rest = &rest[pos + 1..];
        let symbol: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        if !symbol.is_empty() {
            let symbol = symbol.to_ascii_uppercase();
            if !tokens.contains(&symbol) {
                tokens.push(symbol);
            }
        }
    }

    let words: Vec<String> = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_uppercase)
        .collect();
    for ticker in KNOWN_TICKERS {
        if words.iter().any(|w| w == ticker) && !tokens.iter().any(|t| t == ticker) {
            tokens.push((*ticker).to_string());
        }
    }

    tokens
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: &'static str,
    pub description: &'static str,
    pub full_text: String,
}

pub fn extract_command(text: &str) -> ParsedCommand {
    let lowered = text.to_lowercase();
    let without_mentions: Vec<&str> = lowered
        .split_whitespace()
        .filter(|word| !word.starts_with('@'))
        .collect();
    let clean: String = without_mentions
        .join(" ")
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '$' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    let clean = clean.trim().to_string();

    let (command, description) = COMMANDS
        .iter()
        .find(|(name, _)| clean.contains(name))
        .copied()
        .unwrap_or(COMMANDS[0]);

    ParsedCommand {
        command,
        description,
        full_text: clean,
    }
}

/// Prefix the asked-about tickers when the answer never names them and
/// make sure trading advice carries a DYOR.
pub fn format_analysis_response(analysis: &str, tokens: &[String]) -> String {
    let mut response = analysis.trim().to_string();

    if let Some(first) = tokens.first() {
        if !response.to_lowercase().contains(&first.to_lowercase()) {
            response = format!("{}: {}", tokens.join(", "), response);
        }
    }

    let lowered = response.to_lowercase();
    let advises = TRADING_WORDS.iter().any(|word| lowered.contains(word));
    if advises && !lowered.contains("dyor") {
        response.push_str(" DYOR!");
    }

    response
}

/// Remove every `@handle` (any case) from the text.
pub fn strip_mention(text: &str, handle: &str) -> String {
    let needle = format!("@{}", handle.trim_start_matches('@').to_ascii_lowercase());
    // ascii lowering keeps byte offsets aligned with `text`
    let lowered = text.to_ascii_lowercase();

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some(found) = lowered[cursor..].find(&needle) {
        let start = cursor + found;
        out.push_str(&text[cursor..start]);
        cursor = start + needle.len();
    }
    out.push_str(&text[cursor..]);

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Handles go into cache keys; keep them tame
pub fn sanitize_handle(handle: &str) -> String {
    handle
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(15)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_tweets_are_untouched() {
        let tweet = format_tweet(Template::MarketUpdate, "BTC steady at 60k. DYOR", 280);
        assert_eq!(
            tweet,
            "📊 MARKET UPDATE\n\nBTC steady at 60k. DYOR\n\n#crypto #Bitcoin #Ethereum #trading"
        );
    }

    #[test]
    fn long_bodies_are_trimmed_and_hashtags_kept() {
        let body = "word ".repeat(100);
        let tweet = format_tweet(Template::DegenAlert, &body, 280);
        assert!(tweet.chars().count() <= 280);
        assert!(tweet.ends_with("...\n\n#memecoins #degen #crypto #altcoins"));
        assert!(tweet.starts_with("🚨 DEGEN ALERT 🚨"));
    }

    #[test]
    fn tiny_limits_fall_back_to_plain_truncation() {
        let tweet = format_tweet(Template::TradingTip, "buy low", 10);
        assert_eq!(tweet.chars().count(), 10);
        assert!(tweet.ends_with("..."));
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("🚀🚀🚀🚀🚀", 5), "🚀🚀🚀🚀🚀");
        assert_eq!(truncate("🚀🚀🚀🚀🚀🚀", 5), "🚀🚀...");
    }

    #[test]
    fn tokens_come_from_cashtags_and_known_words() {
        let tokens = extract_tokens("thoughts on $pepe and $WIF? also eth vs btc, $PEPE again");
        assert_eq!(tokens, vec!["PEPE", "WIF", "BTC", "ETH"]);
    }

    #[test]
    fn known_tickers_need_word_boundaries() {
        // "community" contains "uni", "method" contains "eth"
        assert!(extract_tokens("community method").is_empty());
    }

    #[test]
    fn commands_default_to_analyze() {
        assert_eq!(extract_command("@KineticCryptoAI what's the price of $SOL?").command, "price");
        assert_eq!(extract_command("@KineticCryptoAI any yield farms?").command, "yield");
        let parsed = extract_command("@KineticCryptoAI gm!");
        assert_eq!(parsed.command, "analyze");
        assert_eq!(parsed.full_text, "gm");
    }

    #[test]
    fn analysis_gets_ticker_prefix_and_dyor() {
        let tokens = vec!["SOL".to_string(), "ETH".to_string()];
        assert_eq!(
            format_analysis_response("Strong support at 140.", &tokens),
            "SOL, ETH: Strong support at 140. DYOR!"
        );
        assert_eq!(
            format_analysis_response("SOL looks calm. DYOR", &tokens),
            "SOL looks calm. DYOR"
        );
        assert_eq!(format_analysis_response("Markets are quiet.", &[]), "Markets are quiet.");
    }

    #[test]
    fn mentions_are_stripped_case_insensitively() {
        assert_eq!(
            strip_mention("@kineticcryptoai  analyze $BTC @KineticCryptoAI", "KineticCryptoAI"),
            "analyze $BTC"
        );
        assert_eq!(strip_mention("no mention here", "bot"), "no mention here");
    }

    #[test]
    fn handles_are_sanitized() {
        assert_eq!(sanitize_handle("al!ce_the.great_trader"), "alce_thegreat_t");
    }
}
