use anyhow::Result;
use std::time::Duration;

#[derive(Clone)]
pub struct WebhookDispatcher {
    pub client: reqwest::Client,
    pub target_url: String,
    pub secret: Option<String>,
    pub timeout: Duration,
}

impl WebhookDispatcher {
    /// Posts `payload` as-is; the same bytes are what a replay returns.
    pub async fn emit(&self, event_type: &str, payload: &str) -> Result<()> {
        let mut req = self
            .client
            .post(&self.target_url)
            .header("Content-Type", "application/json")
            .header("X-Event-Type", event_type)
            .timeout(self.timeout)
            .body(payload.to_string());
        if let Some(secret) = &self.secret {
            req = req.header("X-Webhook-Secret", secret);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("webhook endpoint answered HTTP_{}", resp.status().as_u16());
        }
        Ok(())
    }
}
