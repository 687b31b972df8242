//! HTTP/SSE client for a remote colloquy service.

use async_trait::async_trait;
use colloquy_protocol::{AgentDescriptor, AgentId, InvokeRequest, Message, StreamEvent};
use futures_util::StreamExt;
use reqwest::header::AUTHORIZATION;
use tracing::debug;

use crate::error::ClientError;
use crate::invoker::{AgentInvoker, ClientEventStream};
use crate::sse::{is_ignorable, parse_sse_data};

/// Talks to a running colloquy-api instance over HTTP.
///
/// Blocking invokes are plain request/response; streaming invokes consume
/// the SSE body incrementally and reconstruct typed [`StreamEvent`]s.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    base_url: String,
    http: reqwest::Client,
    auth_secret: Option<String>,
}

impl ServiceClient {
    /// Create a client for `base_url` (e.g. `http://127.0.0.1:8080`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            http,
            auth_secret: None,
        }
    }

    /// Attach a bearer secret sent with every request.
    pub fn with_auth_secret(mut self, secret: impl Into<String>) -> Self {
        self.auth_secret = Some(secret.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_secret {
            Some(secret) => builder.header(AUTHORIZATION, format!("Bearer {secret}")),
            None => builder,
        }
    }

    /// Turn a non-2xx response into an [`ClientError::Api`], extracting the
    /// service's `{"error": ...}` body when present.
    async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| value.get("error").and_then(|e| e.as_str()).map(str::to_owned))
            .unwrap_or(body);
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl AgentInvoker for ServiceClient {
    async fn agents(&self) -> Result<Vec<AgentDescriptor>, ClientError> {
        let response = self
            .request(self.http.get(self.url("/agents")))
            .send()
            .await?;
        let response = Self::error_for_status(response).await?;
        Ok(response.json().await?)
    }

    async fn invoke(
        &self,
        agent_id: &AgentId,
        request: InvokeRequest,
    ) -> Result<Message, ClientError> {
        let url = self.url(&format!("/agents/{agent_id}/invoke"));
        debug!(%agent_id, "blocking invoke");
        let response = self
            .request(self.http.post(url).json(&request))
            .send()
            .await?;
        let response = Self::error_for_status(response).await?;
        Ok(response.json().await?)
    }

    async fn stream(
        &self,
        agent_id: &AgentId,
        request: InvokeRequest,
    ) -> Result<ClientEventStream, ClientError> {
        let url = self.url(&format!("/agents/{agent_id}/stream"));
        debug!(%agent_id, "streaming invoke");
        let response = self
            .request(self.http.post(url).json(&request))
            .send()
            .await?;
        let response = Self::error_for_status(response).await?;
        let byte_stream = response.bytes_stream();

        let events = async_stream::stream! {
            let mut buffer = String::new();
            futures_util::pin_mut!(byte_stream);

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(error) => {
                        yield Err(ClientError::Http(error));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_owned();
                    buffer = buffer[line_end + 1..].to_owned();

                    if is_ignorable(&line) {
                        continue;
                    }
                    let Some(data) = parse_sse_data(&line) else {
                        continue;
                    };
                    let event: StreamEvent = match serde_json::from_str(data) {
                        Ok(event) => event,
                        Err(error) => {
                            yield Err(ClientError::Decode(error));
                            return;
                        }
                    };
                    let terminal = event.is_terminal();
                    yield Ok(event);
                    if terminal {
                        return;
                    }
                }
            }

            // The connection closed without `end` or `error`.
            yield Err(ClientError::Protocol(
                "stream ended before a terminal event".to_owned(),
            ));
        };

        Ok(events.boxed())
    }
}
