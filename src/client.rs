// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming chat-completion client
//!
//! Issues a chat-completion request against a provider and incrementally
//! decodes the streamed response body into text deltas. The only
//! provider-dependent piece is the frame envelope (`data: ` prefix or bare
//! JSON lines); delta extraction from the parsed payload is uniform.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::{ApiError, QuillError, Result};
use crate::message::Message;
use crate::provider::{FrameFormat, ProviderConfig};

/// A run of this many consecutive unparsable frames fails the stream rather
/// than hanging on a garbage body. Keep-alive noise never comes close.
const MAX_CONSECUTIVE_SKIPS: usize = 256;

/// Lazy, finite sequence of text deltas. Not restartable; retry means a new call.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Sampling parameters forwarded to the provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Sampling temperature
    pub temperature: f32,
    /// Repetition penalty, sent as `frequency_penalty`
    pub repetition_penalty: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            repetition_penalty: 1.1,
        }
    }
}

/// Seam for issuing streaming chat completions
#[async_trait]
pub trait ChatStreamer: Send + Sync {
    /// Start a streaming completion for the given history. The system
    /// preamble is prepended to the messages; deltas arrive in order.
    async fn stream(
        &self,
        provider: &ProviderConfig,
        credential: &str,
        preamble: &str,
        messages: &[Message],
        params: SamplingParams,
    ) -> Result<DeltaStream>;
}

/// HTTP implementation of [`ChatStreamer`] over reqwest
pub struct HttpChatClient {
    client: Client,
}

impl HttpChatClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn build_body(
        provider: &ProviderConfig,
        preamble: &str,
        messages: &[Message],
        params: SamplingParams,
    ) -> ChatRequest {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        wire_messages.push(Message::system(preamble));
        wire_messages.extend(messages.iter().cloned());

        ChatRequest {
            model: provider.model.clone(),
            messages: wire_messages,
            temperature: params.temperature,
            frequency_penalty: params.repetition_penalty,
            stream: true,
        }
    }

    /// Build the non-2xx error, pulling the message out of the error envelope
    /// when the body carries one.
    fn parse_error(provider: &ProviderConfig, status: u16, body: &str) -> QuillError {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_default();

        QuillError::Api(ApiError::Server {
            provider: provider.name.clone(),
            status,
            message,
        })
    }
}

impl Default for HttpChatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatStreamer for HttpChatClient {
    async fn stream(
        &self,
        provider: &ProviderConfig,
        credential: &str,
        preamble: &str,
        messages: &[Message],
        params: SamplingParams,
    ) -> Result<DeltaStream> {
        if credential.is_empty() {
            return Err(QuillError::MissingCredential(provider.name.clone()));
        }

        let body = Self::build_body(provider, preamble, messages, params);
        let url = format!("{}/chat/completions", provider.base_url);

        let mut req = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {credential}"))
            .header("Content-Type", "application/json");

        for (name, value) in &provider.extra_headers {
            req = req.header(name, value);
        }

        let response = req
            .json(&body)
            .send()
            .await
            .map_err(|e| QuillError::Api(ApiError::Transport(e.to_string())))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %provider.name, status, "completion request rejected");
            return Err(Self::parse_error(provider, status, &body));
        }

        let byte_stream = response.bytes_stream();
        let decoder = FrameDecoder::new(provider.frame_format);

        let delta_stream = byte_stream
            .map(|result| {
                result.map_err(|e| QuillError::Api(ApiError::Transport(e.to_string())))
            })
            .scan(decoder, |decoder, result| {
                if decoder.finished() {
                    return futures::future::ready(None);
                }

                let items = match result {
                    Ok(bytes) => match decoder.push(&String::from_utf8_lossy(&bytes)) {
                        Ok(deltas) => deltas.into_iter().map(Ok).collect(),
                        Err(e) => {
                            decoder.finish();
                            vec![Err(e)]
                        }
                    },
                    Err(e) => {
                        decoder.finish();
                        vec![Err(e)]
                    }
                };

                futures::future::ready(Some(items))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(delta_stream))
    }
}

/// Incremental line-oriented decoder for a streamed completion body.
///
/// Reassembles partial frames across chunk boundaries, strips the
/// provider-specific envelope, and extracts `choices[0].delta.content`.
/// Transient state only; dropped when the call completes or fails.
#[derive(Debug)]
pub(crate) struct FrameDecoder {
    format: FrameFormat,
    buffer: String,
    consecutive_skips: usize,
    done: bool,
}

impl FrameDecoder {
    pub(crate) fn new(format: FrameFormat) -> Self {
        Self {
            format,
            buffer: String::new(),
            consecutive_skips: 0,
            done: false,
        }
    }

    /// Feed a chunk of body text, returning any completed deltas.
    pub(crate) fn push(&mut self, chunk: &str) -> Result<Vec<String>> {
        self.buffer.push_str(chunk);

        let mut deltas = Vec::new();
        while !self.done {
            let Some(line_end) = self.buffer.find('\n') else {
                break;
            };
            let line = self.buffer[..line_end].trim().to_string();
            self.buffer.drain(..=line_end);

            if let Some(delta) = self.decode_line(&line)? {
                deltas.push(delta);
            }
        }

        Ok(deltas)
    }

    pub(crate) fn finished(&self) -> bool {
        self.done
    }

    pub(crate) fn finish(&mut self) {
        self.done = true;
    }

    fn decode_line(&mut self, line: &str) -> Result<Option<String>> {
        if line.is_empty() {
            return Ok(None);
        }

        let payload = match self.format {
            FrameFormat::Sse => match line.strip_prefix("data: ") {
                Some(data) => data,
                // SSE comments and event names are protocol noise, not frames
                None => return Ok(None),
            },
            // Bare JSON per line; tolerate a stray `data: ` prefix anyway
            FrameFormat::JsonLines => line.strip_prefix("data: ").unwrap_or(line),
        };

        if payload == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let chunk: StreamChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(_) => {
                // Keep-alive/noise frame; skip, but refuse to spin on a
                // stream that never parses again.
                self.consecutive_skips += 1;
                tracing::debug!(skips = self.consecutive_skips, "skipping unparsable frame");
                if self.consecutive_skips >= MAX_CONSECUTIVE_SKIPS {
                    return Err(QuillError::Api(ApiError::Stream(format!(
                        "{} consecutive unparsable frames",
                        self.consecutive_skips
                    ))));
                }
                return Ok(None);
            }
        };
        self.consecutive_skips = 0;

        // Role-only and finish-reason frames carry no content
        let delta = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty());

        Ok(delta)
    }
}

// Wire types (OpenAI-compatible format)

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    frequency_penalty: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}
