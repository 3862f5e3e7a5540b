//! Client for the inference backend.
//!
//! The backend accepts a JSON POST naming the stored image and the prompt,
//! and answers with a streamed text body. The body is relayed to the browser
//! chunk by chunk in arrival order; it is never buffered whole.

use async_stream::stream;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::errors::{Error, Result};

// Sampling parameters are pinned; the backend exposes no other knobs here.
const TOP_P: f32 = 1.0;
const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 1024;

/// Wire format of the backend request. Field names are part of the contract.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    image: &'a str,
    prompt: &'a str,
    top_p: f32,
    temperature: f32,
    max_tokens: u32,
}

/// HTTP client for the configured inference backend.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    url: Option<Url>,
    request_timeout: Duration,
}

impl BackendClient {
    pub fn new(url: Option<Url>, request_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            request_timeout,
        }
    }

    /// POST the image reference and prompt, returning the backend's response
    /// body as a chunk stream.
    ///
    /// Failures before the stream starts (unconfigured URL, network errors,
    /// non-2xx statuses, request timeout) surface as [`Error::Backend`].
    /// Failures after it starts become a final visible chunk instead - see
    /// [`relay_chunks`].
    pub async fn generate(&self, image_uri: &str, prompt: &str) -> Result<BoxStream<'static, Bytes>> {
        let Some(url) = &self.url else {
            return Err(Error::Backend {
                message: "BACKEND_URL is not configured".to_string(),
            });
        };

        let payload = GenerateRequest {
            image: image_uri,
            prompt,
            top_p: TOP_P,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let send = self.http.post(url.clone()).json(&payload).send();
        let response = tokio::time::timeout(self.request_timeout, send)
            .await
            .map_err(|_| Error::Backend {
                message: format!("request timed out after {}s", self.request_timeout.as_secs()),
            })?
            .map_err(|e| Error::Backend { message: e.to_string() })?
            .error_for_status()
            .map_err(|e| Error::Backend { message: e.to_string() })?;

        Ok(relay_chunks(response.bytes_stream()).boxed())
    }
}

/// Forward `upstream` verbatim, in order, without buffering.
///
/// A mid-stream failure becomes one final `Error: {message}` chunk rather
/// than a bare connection close: by that point the 200 and earlier chunks
/// are already on the wire, so an inline marker is the only way the client
/// ever learns the answer is truncated.
pub fn relay_chunks<S, E>(upstream: S) -> impl futures::Stream<Item = Bytes> + Send
where
    S: futures::Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send,
{
    stream! {
        for await chunk in upstream {
            match chunk {
                Ok(bytes) => yield bytes,
                Err(e) => {
                    tracing::error!("Backend stream failed mid-response: {e}");
                    yield Bytes::from(format!("Error: {e}"));
                    break;
                }
            }
        }
    }
}
