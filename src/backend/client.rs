//! Streaming client for the chat-completion backend.
//!
//! Issues a streaming POST to `/chat-messages` and decodes the SSE response
//! into [`Frame`]s as they arrive.

use futures::{Stream, StreamExt};

use super::{BackendSettings, Frame, StreamError};

/// Client for a Dify-style chat-completion endpoint.
///
/// Connects to `<base_url>/chat-messages` and yields decoded [`Frame`]s.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    settings: BackendSettings,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("settings", &self.settings)
            .finish()
    }
}

impl BackendClient {
    /// Create a new client with the given settings.
    #[must_use]
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    /// Open a streaming exchange for one query.
    ///
    /// The request body carries the query text, an empty input map, the fixed
    /// streaming response mode, the configured user identifier, and the
    /// optional conversation id from a prior exchange. The returned stream
    /// yields frames in arrival order; a decode failure or mid-stream
    /// transport failure is yielded as the terminal `Err` item.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Transport`] if the request cannot be sent or
    /// the server answers with a non-2xx status.
    pub async fn stream(
        &self,
        query: &str,
        conversation_id: Option<&str>,
    ) -> Result<
        std::pin::Pin<Box<dyn Stream<Item = Result<Frame, StreamError>> + Send>>,
        StreamError,
    > {
        let url = format!(
            "{}/chat-messages",
            self.settings.base_url.trim_end_matches('/')
        );

        let mut body = serde_json::json!({
            "query": query,
            "inputs": {},
            "response_mode": "streaming",
            "user": self.settings.user,
        });
        if let Some(id) = conversation_id {
            body["conversation_id"] = serde_json::Value::String(id.to_string());
        }

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let byte_stream = resp.bytes_stream();

        let out = async_stream::try_stream! {
            let mut buf = Vec::<u8>::new();

            futures::pin_mut!(byte_stream);
            while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk?;
                buf.extend_from_slice(&chunk);

                while let Some(pos) = find_double_newline(&buf) {
                    let frame = buf.drain(..pos + 2).collect::<Vec<_>>();
                    let text = String::from_utf8_lossy(&frame);

                    for line in text.lines() {
                        let line = line.trim();
                        let Some(data) = line.strip_prefix("data:") else {
                            continue;
                        };
                        let data = data.trim();
                        // Frames with no payload are ignored.
                        if data.is_empty() {
                            continue;
                        }

                        let frame: Frame = serde_json::from_str(data)?;
                        yield frame;
                    }
                }
            }
        };

        Ok(Box::pin(out))
    }
}

/// Find the position of a double newline in the buffer.
fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_double_newline() {
        assert_eq!(find_double_newline(b"data: {}\n\nrest"), Some(8));
        assert_eq!(find_double_newline(b"data: {}"), None);
        assert_eq!(find_double_newline(b""), None);
    }
}
