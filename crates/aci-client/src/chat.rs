// Streaming chat transport
//
// POST /v1/agent/chat answers with the data stream line protocol. The body
// is read chunk by chunk and fed through LineDecoder, so events reach the
// session as soon as their line is complete.

use std::collections::VecDeque;
use std::pin::Pin;

use aci_core::error::Result;
use aci_core::stream::{ChatRequest, ChatStreamEvent, LineDecoder};
use aci_core::traits::{ChatApi, ChatEventStream};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Method;
use tracing::{debug, warn};

use crate::client::{Auth, PortalClient};

pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";

type BodyStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

struct DecodeState {
    body: BodyStream,
    decoder: LineDecoder,
    pending: VecDeque<ChatStreamEvent>,
    done: bool,
}

/// Turn a response body into decoded chat events
pub(crate) fn decode_body(body: BodyStream) -> ChatEventStream {
    let state = DecodeState {
        body,
        decoder: LineDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    let events = futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            if state.done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.pending.extend(state.decoder.push(&chunk)),
                Some(Err(e)) => {
                    warn!(error = %e, "Chat stream interrupted");
                    state.pending.extend(state.decoder.finish());
                    state
                        .pending
                        .push_back(ChatStreamEvent::Error(format!("stream interrupted: {}", e)));
                    state.done = true;
                }
                None => {
                    state.pending.extend(state.decoder.finish());
                    state.done = true;
                }
            }
        }
    });
    Box::pin(events)
}

impl PortalClient {
    pub async fn chat_stream(&self, api_key: &str, request: &ChatRequest) -> Result<ChatEventStream> {
        let builder = self
            .request(Method::POST, "/v1/agent/chat", Auth::ApiKey(api_key))
            .json(request);
        let response = self.send(builder).await?;

        match response.headers().get(DATA_STREAM_HEADER) {
            Some(version) => debug!(version = ?version, "Chat stream opened"),
            None => debug!("Chat response has no data stream header"),
        }
        Ok(decode_body(Box::pin(response.bytes_stream())))
    }
}

#[async_trait]
impl ChatApi for PortalClient {
    async fn chat_stream(&self, api_key: &str, request: &ChatRequest) -> Result<ChatEventStream> {
        PortalClient::chat_stream(self, api_key, request).await
    }
}
