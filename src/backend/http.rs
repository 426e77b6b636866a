//! Production streaming backend over HTTP.
//!
//! Speaks the OpenAI-compatible chat-completions dialect with SSE streaming,
//! which every provider in the closed set either serves natively or exposes
//! through a compatibility endpoint (see the per-provider base URLs in the
//! adapter selector). Provider-specific SDK transports are out of scope.

use crate::backend::{ObjectCall, RawInvocation, StreamingBackend, TextCall};
use crate::error::{classify_status, translate, ChainError};
use crate::provider::LanguageModelHandle;
use crate::request::OutputMode;
use crate::types::chunk::StreamChunk;
use crate::types::message::{ContentBlock, Message, MessageContent, MessageRole};
use crate::types::tool::{CallableToolMap, ToolCall};
use crate::types::usage::TokenUsage;
use crate::{BoxStream, ChunkStream, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

const SSE_DELIMITER: &str = "\n\n";
const SSE_PREFIX: &str = "data:";
const SSE_DONE: &str = "[DONE]";

pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            // Builder only fails on TLS backend misconfiguration.
            .unwrap_or_default();
        Self { client }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn dispatch(
        &self,
        handle: &LanguageModelHandle,
        body: Value,
        object_mode: bool,
        telemetry: bool,
        cancel: CancellationToken,
    ) -> Result<RawInvocation> {
        let url = format!("{}/chat/completions", handle.base_url);
        let request_id = Uuid::new_v4().to_string();
        let start = std::time::Instant::now();

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&handle.api_key)
            .header("accept", "text/event-stream")
            .header("x-chaincall-request-id", &request_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| translate(Box::new(e)))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            if telemetry {
                info!(
                    provider = handle.provider.as_str(),
                    model = handle.model.as_str(),
                    request_id = request_id.as_str(),
                    http_status = status,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "chaincall provider call failed"
                );
            }
            return Err(classify_status(status, &body));
        }

        if telemetry {
            info!(
                provider = handle.provider.as_str(),
                model = handle.model.as_str(),
                request_id = request_id.as_str(),
                duration_ms = start.elapsed().as_millis() as u64,
                "chaincall provider call streaming"
            );
        }

        let bytes: BoxStream<'static, std::result::Result<Bytes, ChainError>> =
            Box::pin(resp.bytes_stream().map(|r| {
                r.map_err(|e| {
                    ChainError::unknown("provider stream interrupted").with_cause(e.to_string())
                })
            }));

        let chunks = decode_sse(bytes, object_mode);
        let chunks: ChunkStream = Box::pin(chunks.take_until(cancel.cancelled_owned()));
        Ok(RawInvocation::new(chunks))
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamingBackend for HttpBackend {
    async fn stream_text(&self, call: TextCall) -> Result<RawInvocation> {
        let body = text_body(&call);
        self.dispatch(&call.handle, body, false, call.telemetry, call.cancel.clone())
            .await
    }

    async fn stream_object(&self, call: ObjectCall) -> Result<RawInvocation> {
        let body = object_body(&call);
        self.dispatch(&call.handle, body, true, call.telemetry, call.cancel.clone())
            .await
    }
}

fn base_body(
    handle: &LanguageModelHandle,
    messages: &[Message],
    prompt: &Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    top_p: Option<f64>,
    provider_options: &serde_json::Map<String, Value>,
) -> Value {
    let wire_messages = match prompt {
        Some(p) => vec![json!({"role": "user", "content": p})],
        None => messages.iter().map(wire_message).collect(),
    };

    let mut body = json!({
        "model": handle.model,
        "messages": wire_messages,
        "stream": true,
        "stream_options": {"include_usage": true},
    });
    if let Some(t) = temperature {
        body["temperature"] = json!(t);
    }
    if let Some(m) = max_tokens {
        body["max_tokens"] = json!(m);
    }
    if let Some(p) = top_p {
        body["top_p"] = json!(p);
    }
    for (k, v) in provider_options {
        body[k.as_str()] = v.clone();
    }
    body
}

fn text_body(call: &TextCall) -> Value {
    let mut body = base_body(
        &call.handle,
        &call.messages,
        &call.prompt,
        call.temperature,
        call.max_tokens,
        call.top_p,
        &call.provider_options,
    );
    if !call.tools.is_empty() {
        body["tools"] = wire_tools(&call.tools);
    }
    body
}

fn object_body(call: &ObjectCall) -> Value {
    let mut body = base_body(
        &call.handle,
        &call.messages,
        &call.prompt,
        call.temperature,
        call.max_tokens,
        call.top_p,
        &call.provider_options,
    );
    body["response_format"] = match call.output_mode {
        OutputMode::NoSchema => json!({"type": "json_object"}),
        OutputMode::Object => json!({
            "type": "json_schema",
            "json_schema": {"name": "output", "strict": true, "schema": call.schema},
        }),
        OutputMode::Array => json!({
            "type": "json_schema",
            "json_schema": {
                "name": "output",
                "strict": true,
                "schema": {"type": "array", "items": call.schema},
            },
        }),
    };
    body
}

fn wire_message(m: &Message) -> Value {
    let role = match m.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    };
    match &m.content {
        MessageContent::Text(s) => {
            let mut obj = json!({"role": role, "content": s});
            if let Some(id) = &m.tool_call_id {
                obj["tool_call_id"] = json!(id);
            }
            obj
        }
        MessageContent::Blocks(blocks) => {
            // Assistant tool-use blocks become the tool_calls array; tool
            // results collapse to their content payload.
            let mut text = String::new();
            let mut tool_calls = Vec::new();
            for b in blocks {
                match b {
                    ContentBlock::Text { text: t } => text.push_str(t),
                    ContentBlock::ToolUse { id, name, input } => tool_calls.push(json!({
                        "id": id,
                        "type": "function",
                        "function": {"name": name, "arguments": input.to_string()},
                    })),
                    ContentBlock::ToolResult { content, .. } => {
                        text.push_str(&content.to_string())
                    }
                }
            }
            let mut obj = json!({"role": role, "content": text});
            if !tool_calls.is_empty() {
                obj["tool_calls"] = json!(tool_calls);
            }
            if let Some(id) = &m.tool_call_id {
                obj["tool_call_id"] = json!(id);
            }
            obj
        }
    }
}

fn wire_tools(tools: &CallableToolMap) -> Value {
    let entries: Vec<Value> = tools
        .iter()
        .map(|(name, tool)| {
            json!({
                "type": "function",
                "function": {
                    "name": name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                },
            })
        })
        .collect();
    json!(entries)
}

/// Collects streamed tool-call fragments into final [`ToolCall`]s.
/// Tolerant by intent: unparseable argument payloads stay raw strings.
#[derive(Default)]
struct ToolCallAssembler {
    calls: Vec<(u64, ToolCall, String)>,
}

impl ToolCallAssembler {
    fn on_fragment(&mut self, index: u64, id: Option<&str>, name: Option<&str>, args: &str) {
        let pos = match self.calls.iter().position(|(i, _, _)| *i == index) {
            Some(p) => p,
            None => {
                self.calls.push((
                    index,
                    ToolCall {
                        id: String::new(),
                        name: String::new(),
                        arguments: Value::Null,
                    },
                    String::new(),
                ));
                self.calls.len() - 1
            }
        };
        let entry = &mut self.calls[pos];
        if let Some(id) = id {
            entry.1.id = id.to_string();
        }
        if let Some(name) = name {
            entry.1.name = name.to_string();
        }
        entry.2.push_str(args);
    }

    fn finalize(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .map(|(_, mut call, raw)| {
                let trimmed = raw.trim();
                call.arguments = serde_json::from_str(trimmed)
                    .unwrap_or(Value::String(trimmed.to_string()));
                call
            })
            .collect()
    }
}

struct DecodeState {
    bytes: BoxStream<'static, std::result::Result<Bytes, ChainError>>,
    buf: String,
    out: VecDeque<StreamChunk>,
    assembler: ToolCallAssembler,
    object_mode: bool,
    acc_content: String,
    usage: Option<TokenUsage>,
    provider_metadata: Option<Value>,
    finish_reason: Option<String>,
    done: bool,
}

impl DecodeState {
    fn process_frame(&mut self, frame: &Value) {
        if self.provider_metadata.is_none() {
            if let (Some(id), Some(model)) = (frame.get("id"), frame.get("model")) {
                self.provider_metadata = Some(json!({"id": id, "model": model}));
            }
        }

        if let Some(content) = frame
            .pointer("/choices/0/delta/content")
            .and_then(|c| c.as_str())
        {
            if !content.is_empty() {
                if self.object_mode {
                    self.acc_content.push_str(content);
                    // Emit the latest parseable prefix as the partial value.
                    if let Ok(v) = serde_json::from_str::<Value>(&self.acc_content) {
                        self.out.push_back(StreamChunk::ObjectDelta { value: v });
                    }
                } else {
                    self.out.push_back(StreamChunk::text_delta(content));
                }
            }
        }

        if let Some(reasoning) = frame
            .pointer("/choices/0/delta/reasoning_content")
            .and_then(|c| c.as_str())
        {
            if !reasoning.is_empty() {
                self.out.push_back(StreamChunk::ReasoningDelta {
                    text: reasoning.to_string(),
                });
            }
        }

        if let Some(fragments) = frame
            .pointer("/choices/0/delta/tool_calls")
            .and_then(|t| t.as_array())
        {
            for f in fragments {
                let index = f.get("index").and_then(|i| i.as_u64()).unwrap_or(0);
                let id = f.get("id").and_then(|i| i.as_str());
                let name = f.pointer("/function/name").and_then(|n| n.as_str());
                let args = f
                    .pointer("/function/arguments")
                    .and_then(|a| a.as_str())
                    .unwrap_or("");
                self.assembler.on_fragment(index, id, name, args);
            }
        }

        if let Some(u) = frame.get("usage").filter(|u| u.is_object()) {
            self.usage = Some(TokenUsage::new(
                u["prompt_tokens"].as_u64().unwrap_or(0),
                u["completion_tokens"].as_u64().unwrap_or(0),
            ));
        }

        if let Some(reason) = frame
            .pointer("/choices/0/finish_reason")
            .and_then(|r| r.as_str())
        {
            self.finish_reason = Some(reason.to_string());
        }
    }

    fn finalize(&mut self) {
        for call in std::mem::take(&mut self.assembler).finalize() {
            self.out.push_back(StreamChunk::ToolCall {
                id: call.id,
                name: call.name,
                arguments: call.arguments,
            });
        }
        if self.usage.is_some() || self.provider_metadata.is_some() {
            self.out.push_back(StreamChunk::Metadata {
                usage: self.usage.take(),
                provider_metadata: self.provider_metadata.take(),
            });
        }
        self.out.push_back(StreamChunk::StreamEnd {
            finish_reason: self.finish_reason.take(),
        });
        self.done = true;
    }
}

fn parse_payload(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    let payload = trimmed.strip_prefix(SSE_PREFIX).unwrap_or(trimmed).trim_start();
    serde_json::from_str(payload).ok()
}

fn is_done_frame(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed == SSE_DONE
        || trimmed
            .strip_prefix(SSE_PREFIX)
            .map(|rest| rest.trim() == SSE_DONE)
            .unwrap_or(false)
}

/// Decode an SSE byte stream into chunks.
///
/// Frames are split on blank lines, the `data:` prefix is stripped and the
/// `[DONE]` sentinel ends the stream. Transport errors surface in-band as a
/// terminal `StreamError` chunk.
pub(crate) fn decode_sse(
    bytes: BoxStream<'static, std::result::Result<Bytes, ChainError>>,
    object_mode: bool,
) -> ChunkStream {
    let state = DecodeState {
        bytes,
        buf: String::new(),
        out: VecDeque::new(),
        assembler: ToolCallAssembler::default(),
        object_mode,
        acc_content: String::new(),
        usage: None,
        provider_metadata: None,
        finish_reason: None,
        done: false,
    };

    Box::pin(futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(chunk) = st.out.pop_front() {
                return Some((chunk, st));
            }
            if st.done {
                return None;
            }

            if let Some(idx) = st.buf.find(SSE_DELIMITER) {
                let frame = st.buf[..idx].to_string();
                st.buf.drain(..idx + SSE_DELIMITER.len());
                if is_done_frame(&frame) {
                    st.finalize();
                } else if let Some(v) = parse_payload(&frame) {
                    st.process_frame(&v);
                }
                continue;
            }

            match st.bytes.next().await {
                Some(Ok(bytes)) => {
                    st.buf.push_str(&String::from_utf8_lossy(&bytes));
                }
                Some(Err(e)) => {
                    st.out.push_back(StreamChunk::StreamError {
                        message: e.to_string(),
                    });
                    st.done = true;
                }
                None => {
                    // EOF without [DONE]: flush whatever is buffered.
                    let rest = std::mem::take(&mut st.buf);
                    if !is_done_frame(&rest) {
                        if let Some(v) = parse_payload(&rest) {
                            st.process_frame(&v);
                        }
                    }
                    st.finalize();
                }
            }
        }
    }))
}
