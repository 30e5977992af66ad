// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat session orchestration
//!
//! `ChatSession` composes the rate limiter, session store, and streaming
//! client into one submit flow: admit, persist the user turn, stream and
//! accumulate the response, persist the assistant turn. Any failure from
//! streaming onward rolls the user turn back, so the persisted log never
//! ends with an unanswered user message.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::{ChatStreamer, HttpChatClient, SamplingParams};
use crate::error::{ApiError, QuillError, Result, StoreError};
use crate::limiter::RateLimiter;
use crate::message::Message;
use crate::provider::ProviderConfig;
use crate::store::SessionStore;

/// Default system preamble
pub const DEFAULT_PREAMBLE: &str = "You are a helpful assistant.";

/// Orchestrates one logical chat session with injected dependencies.
/// One submit runs to completion at a time; a second concurrent submit is
/// rejected with [`QuillError::Busy`].
pub struct ChatSession {
    id: Uuid,
    provider: ProviderConfig,
    credential: String,
    preamble: String,
    params: SamplingParams,
    limiter: Arc<RateLimiter>,
    store: Arc<SessionStore>,
    streamer: Arc<dyn ChatStreamer>,
    delta_sink: Option<UnboundedSender<String>>,
    cancel: Mutex<CancellationToken>,
    in_flight: AtomicBool,
}

/// Builder for creating ChatSession instances
pub struct ChatSessionBuilder {
    provider: Option<ProviderConfig>,
    credential: String,
    preamble: String,
    params: SamplingParams,
    limiter: Option<Arc<RateLimiter>>,
    store: Option<Arc<SessionStore>>,
    streamer: Option<Arc<dyn ChatStreamer>>,
    delta_sink: Option<UnboundedSender<String>>,
    resume_id: Option<Uuid>,
}

impl ChatSessionBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            credential: String::new(),
            preamble: DEFAULT_PREAMBLE.to_string(),
            params: SamplingParams::default(),
            limiter: None,
            store: None,
            streamer: None,
            delta_sink: None,
            resume_id: None,
        }
    }

    /// Set the provider configuration
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the API credential passed through to the provider
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = credential.into();
        self
    }

    /// Set the system preamble
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    /// Set sampling parameters
    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }

    /// Share a rate limiter across sessions
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Set the session store
    pub fn with_store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Inject a streaming client (defaults to [`HttpChatClient`])
    pub fn with_streamer(mut self, streamer: Arc<dyn ChatStreamer>) -> Self {
        self.streamer = Some(streamer);
        self
    }

    /// Channel receiving live text deltas for incremental display
    pub fn with_delta_sink(mut self, sink: UnboundedSender<String>) -> Self {
        self.delta_sink = Some(sink);
        self
    }

    /// Resume an existing session instead of starting a new one
    pub fn resume(mut self, id: Uuid) -> Self {
        self.resume_id = Some(id);
        self
    }

    /// Build the ChatSession. Validation failures (missing provider, store,
    /// or credential) surface here, before any network call or persistence.
    pub fn build(self) -> Result<ChatSession> {
        let provider = self
            .provider
            .ok_or_else(|| QuillError::Config("no provider configured".into()))?;
        let store = self
            .store
            .ok_or_else(|| QuillError::Config("no session store configured".into()))?;

        if self.credential.is_empty() {
            return Err(QuillError::MissingCredential(provider.name.clone()));
        }

        Ok(ChatSession {
            id: self.resume_id.unwrap_or_else(Uuid::new_v4),
            provider,
            credential: self.credential,
            preamble: self.preamble,
            params: self.params,
            limiter: self.limiter.unwrap_or_default(),
            store,
            streamer: self
                .streamer
                .unwrap_or_else(|| Arc::new(HttpChatClient::new())),
            delta_sink: self.delta_sink,
            cancel: Mutex::new(CancellationToken::new()),
            in_flight: AtomicBool::new(false),
        })
    }
}

impl Default for ChatSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// Create a builder for constructing a ChatSession
    pub fn builder() -> ChatSessionBuilder {
        ChatSessionBuilder::new()
    }

    /// Session id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Provider this session talks to
    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    /// Rotate to a fresh session id; the previous session stays archived in
    /// the store.
    pub fn new_chat(&mut self) -> Uuid {
        self.id = Uuid::new_v4();
        self.id
    }

    /// The persisted message log for this session (empty if nothing has been
    /// persisted yet).
    pub fn history(&self) -> Result<Vec<Message>> {
        match self.store.load(self.id) {
            Ok(session) => Ok(session.messages),
            Err(QuillError::Store(StoreError::NotFound(_))) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Cancel the in-flight submit, if any. Streaming stops, partial output
    /// is discarded, and the user turn is rolled back.
    pub fn cancel(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .cancel();
    }

    /// Submit a user turn and return the finalized assistant message.
    ///
    /// Attachment text, when present and non-empty, is prepended to the
    /// typed text with a newline separator before persisting.
    pub async fn submit(&self, text: &str, attachment: Option<&str>) -> Result<Message> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(QuillError::Busy);
        }

        let cancel = CancellationToken::new();
        *self
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = cancel.clone();

        let result = self.submit_inner(text, attachment, cancel).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn submit_inner(
        &self,
        text: &str,
        attachment: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<Message> {
        if !self.limiter.admit() {
            return Err(QuillError::RateLimited {
                max: self.limiter.max_calls(),
                window_secs: self.limiter.window().as_secs(),
            });
        }

        let user = Message::compose_user(text, attachment);
        let session = self.store.append(self.id, user.clone())?;
        tracing::debug!(session = %self.id, "persisted user turn");

        match self.run_stream(&session.messages, cancel).await {
            Ok(content) => {
                let assistant = Message::assistant(content);
                self.store.append(self.id, assistant.clone())?;
                tracing::debug!(session = %self.id, "persisted assistant turn");
                Ok(assistant)
            }
            Err(stream_err) if !stream_err.triggers_rollback() => Err(stream_err),
            Err(stream_err) => {
                // The user turn must not stay visible without a response.
                match self.store.rollback(self.id, &user) {
                    Ok(_) => Err(stream_err),
                    Err(rollback_err) => {
                        tracing::error!(
                            session = %self.id,
                            stream_error = %stream_err,
                            rollback_error = %rollback_err,
                            "rollback failed after stream error, session needs reload"
                        );
                        Err(rollback_err)
                    }
                }
            }
        }
    }

    /// Drive the delta stream to completion, forwarding deltas to the sink
    /// and accumulating the final text. All-or-nothing for storage: partial
    /// text reaches the sink only.
    async fn run_stream(
        &self,
        history: &[Message],
        cancel: CancellationToken,
    ) -> Result<String> {
        let mut stream = self
            .streamer
            .stream(
                &self.provider,
                &self.credential,
                &self.preamble,
                history,
                self.params,
            )
            .await?;

        let mut accumulated = String::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(session = %self.id, "stream cancelled");
                    return Err(ApiError::Cancelled.into());
                }
                delta = stream.next() => match delta {
                    Some(Ok(delta)) => {
                        if let Some(sink) = &self.delta_sink {
                            // Sink gone means the renderer went away; keep streaming
                            let _ = sink.send(delta.clone());
                        }
                        accumulated.push_str(&delta);
                    }
                    Some(Err(e)) => return Err(e),
                    None => return Ok(accumulated),
                },
            }
        }
    }
}
