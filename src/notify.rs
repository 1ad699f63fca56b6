//! Outbound notifications over the Mailgun messages API.
//!
//! Delivery is best-effort: failures are logged once and never surfaced to
//! the pipeline.

use std::time::Duration;

use tracing::{debug, error};

pub struct Notifier {
    http: reqwest::Client,
    api_key: String,
    domain: String,
    sender: String,
    recipient: String,
}

impl Notifier {
    pub fn new(api_key: String, domain: String, sender: String, recipient: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            domain,
            sender,
            recipient,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.domain.is_empty()
    }

    pub async fn send(&self, subject: &str, text: &str) {
        if !self.is_configured() {
            debug!("notifier not configured, skipping: {subject}");
            return;
        }

        let url = format!("https://api.mailgun.net/v3/{}/messages", self.domain);
        let params = [
            ("from", self.sender.as_str()),
            ("to", self.recipient.as_str()),
            ("subject", subject),
            ("text", text),
        ];

        let result = self
            .http
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .form(&params)
            .timeout(Duration::from_secs(10))
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                debug!("notification sent: {subject}");
            }
            Ok(resp) => {
                error!("notification rejected ({}): {subject}", resp.status());
            }
            Err(e) => {
                error!("failed to send notification `{subject}`: {e}");
            }
        }
    }
}
