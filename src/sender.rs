//! HTTP sender
//!
//! Issues outbound webhook POSTs with a bounded timeout and normalizes
//! every failure mode — non-2xx response, connect error, timeout — into
//! an `Outcome`. Never returns `Err`; a sender that can't talk to the
//! network is exactly as routine as one that gets a 500 back.

use std::time::Duration;

use reqwest::Client;

/// Response bodies are truncated to this many bytes before being
/// returned or persisted.
pub const RESPONSE_BODY_TRUNCATE_BYTES: usize = 2048;

/// Result of one outbound delivery attempt.
#[derive(Debug, Clone)]
pub enum Outcome {
    Response {
        status_code: u16,
        body: String,
    },
    TransportError {
        message: String,
    },
}

impl Outcome {
    /// `status_code in [200, 300)` is success; anything else (including
    /// a transport error) is a failure eligible for retry.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Response { status_code, .. } if (200..300).contains(status_code))
    }
}

pub struct Sender {
    client: Client,
}

impl Sender {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// POST `body` to `target_url` with `headers`, returning a
    /// normalized `Outcome` regardless of what happens on the wire.
    pub async fn send(
        &self,
        target_url: &str,
        body: Vec<u8>,
        headers: Vec<(&'static str, String)>,
    ) -> Outcome {
        let mut request = self.client.post(target_url).body(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        match request.send().await {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                let truncated = truncate(&body, RESPONSE_BODY_TRUNCATE_BYTES);
                Outcome::Response {
                    status_code,
                    body: truncated,
                }
            }
            Err(e) => Outcome::TransportError {
                message: e.to_string(),
            },
        }
    }
}

fn truncate(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    // Respect UTF-8 boundaries when cutting.
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
