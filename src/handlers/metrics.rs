use crate::error::BotError;
use crate::metrics::gather_text;

pub async fn metrics_handler() -> Result<String, BotError> {
    gather_text()
}
