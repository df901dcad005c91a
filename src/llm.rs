//! Chat-completion providers used to compose answers.
//!
//! A [`ChatModel`] turns one rendered prompt into answer text, either in a
//! single response ([`ChatModel::complete`]) or as a stream of text
//! fragments ([`ChatModel::stream`]). Providers:
//!
//! - **[`OpenAiChatModel`]**: `POST {url}/chat/completions`, with
//!   `"stream": true` decoded from server-sent events.
//! - **[`DisabledChatModel`]**: always fails; retrieval still works.
//!
//! Dropping a [`FragmentStream`] drops the underlying HTTP response, which
//! closes the connection. No shared state is touched by a stream.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};

use civic_rag_core::{ProviderError, ProviderErrorKind, RagError};

use crate::config::GenerationConfig;
use crate::credentials::ApiKey;
use crate::http;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";

/// Incremental answer text. Concatenate the fragments for the full answer.
pub type FragmentStream = BoxStream<'static, Result<String, RagError>>;

/// One generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Generate the whole answer in one response.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError>;

    /// Start a streaming generation. Errors after the stream has started
    /// arrive as `Err` items of type [`RagError::Generation`].
    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, ProviderError>;
}

/// Create the [`ChatModel`] selected by `config.provider`.
pub fn create_chat_model(
    config: &GenerationConfig,
    api_key: Option<&ApiKey>,
) -> Result<Box<dyn ChatModel>, RagError> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledChatModel)),
        "openai" => {
            let key = api_key.ok_or_else(|| {
                RagError::input("the openai generation provider requires an API key")
            })?;
            Ok(Box::new(OpenAiChatModel::new(config, key.clone())?))
        }
        other => Err(RagError::input(format!(
            "unknown generation provider: {}",
            other
        ))),
    }
}

// ============ Disabled Provider ============

pub struct DisabledChatModel;

fn disabled_error() -> ProviderError {
    ProviderError::new(
        ProviderErrorKind::Disabled,
        "generation provider is disabled; set [generation] provider in config",
    )
}

#[async_trait]
impl ChatModel for DisabledChatModel {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _request: &ChatRequest) -> Result<String, ProviderError> {
        Err(disabled_error())
    }
    async fn stream(&self, _request: &ChatRequest) -> Result<FragmentStream, ProviderError> {
        Err(disabled_error())
    }
}

// ============ OpenAI Provider ============

pub struct OpenAiChatModel {
    client: reqwest::Client,
    url: String,
    api_key: ApiKey,
    model: String,
    timeout: Duration,
}

impl OpenAiChatModel {
    pub fn new(config: &GenerationConfig, api_key: ApiKey) -> Result<Self, RagError> {
        let client = http::streaming_client(config.timeout_secs)
            .map_err(|e| RagError::input(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            timeout: Duration::from_secs(config.timeout_secs),
            url: http::endpoint(
                config.url.as_deref().unwrap_or(OPENAI_DEFAULT_URL),
                "chat/completions",
            ),
            api_key,
            model: config.model.clone(),
        })
    }

    fn body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": request.prompt}],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": stream,
        })
    }

    /// POST `body`. Streamed requests are bounded per read only; others get
    /// a whole-request deadline as well.
    async fn send(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut request = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose())
            .json(body);
        if !stream {
            request = request.timeout(self.timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|e| http::classify("OpenAI", e))?;
        if !response.status().is_success() {
            return Err(http::error_from_response("OpenAI", response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let response = self.send(&self.body(request, false), false).await?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| http::classify("OpenAI", e))?;
        parse_completion(&json)
    }

    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, ProviderError> {
        let response = self.send(&self.body(request, true), true).await?;
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();
        Ok(fragment_stream(body))
    }
}

fn parse_completion(json: &serde_json::Value) -> Result<String, ProviderError> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ProviderError::invalid_response("completion response has no message content"))
}

/// Text of one streamed chunk, if it carries any.
fn parse_delta(payload: &str) -> Result<Option<String>, ProviderError> {
    let json: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| ProviderError::invalid_response(format!("bad stream event: {}", e)))?;
    if let Some(err) = json.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("stream reported an error");
        return Err(ProviderError::new(ProviderErrorKind::Server, message));
    }
    Ok(json
        .pointer("/choices/0/delta/content")
        .and_then(|c| c.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string()))
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, RagError>>,
    done: bool,
}

impl StreamState {
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            if self.done {
                return;
            }
            match event {
                SseEvent::Done => self.done = true,
                SseEvent::Data(payload) => match parse_delta(&payload) {
                    Ok(Some(text)) => self.pending.push_back(Ok(text)),
                    Ok(None) => {}
                    Err(e) => {
                        self.pending.push_back(Err(RagError::Generation(e)));
                        self.done = true;
                    }
                },
            }
        }
    }
}

fn fragment_stream(body: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> FragmentStream {
    let state = StreamState {
        body,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    let events = st.decoder.push(&bytes);
                    st.absorb(events);
                }
                Some(Err(e)) => {
                    st.pending
                        .push_back(Err(RagError::Generation(http::classify("OpenAI", e))));
                    st.done = true;
                }
                None => {
                    let events = st.decoder.finish();
                    st.absorb(events);
                    st.done = true;
                }
            }
        }
    })
    .boxed()
}

// ============ Server-sent events ============

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes may arrive split at any point, including inside a UTF-8 sequence;
/// only complete lines are decoded. Fields other than `data:` and comment
/// lines are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(event) = decode_line(&line[..line.len() - 1]) {
                events.push(event);
            }
        }
        events
    }

    /// Decode a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buf);
        decode_line(&rest).into_iter().collect()
    }
}

fn decode_line(line: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches('\r');
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload == "[DONE]" {
        Some(SseEvent::Done)
    } else if payload.is_empty() {
        None
    } else {
        Some(SseEvent::Data(payload.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_handles_split_lines() {
        let mut d = SseDecoder::default();
        assert!(d.push(b"data: {\"a\"").is_empty());
        let events = d.push(b":1}\n\n: keep-alive\ndata: [DONE]\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"a\":1}".into()), SseEvent::Done]
        );
    }

    #[test]
    fn decoder_handles_split_utf8_and_crlf() {
        let mut d = SseDecoder::default();
        let bytes = "data: 여권\r\n".as_bytes();
        assert!(d.push(&bytes[..8]).is_empty());
        assert_eq!(d.push(&bytes[8..]), vec![SseEvent::Data("여권".into())]);
    }

    #[test]
    fn decoder_finish_flushes_tail() {
        let mut d = SseDecoder::default();
        assert!(d.push(b"data: tail").is_empty());
        assert_eq!(d.finish(), vec![SseEvent::Data("tail".into())]);
        assert!(d.finish().is_empty());
    }

    #[test]
    fn delta_extraction() {
        let with_text = r#"{"choices":[{"delta":{"content":"Hello"}}]}"#;
        assert_eq!(parse_delta(with_text).unwrap().as_deref(), Some("Hello"));
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_delta(role_only).unwrap(), None);
        assert!(parse_delta(r#"{"error":{"message":"overloaded"}}"#).is_err());
        assert!(parse_delta("not json").is_err());
    }

    #[test]
    fn completion_extraction() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Bring a photo."}}]
        });
        assert_eq!(parse_completion(&json).unwrap(), "Bring a photo.");
        let err = parse_completion(&serde_json::json!({"choices": []})).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn fragment_stream_stops_at_done() {
        let chunks: Vec<reqwest::Result<Vec<u8>>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"Bring \"}}]}\n\n".to_vec()),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"a photo\"}}]}\n\ndata: [DONE]\n\n"
                .to_vec()),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n".to_vec()),
        ];
        let fragments: Vec<String> = fragment_stream(stream::iter(chunks).boxed())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["Bring ", "a photo"]);
    }

    #[tokio::test]
    async fn fragment_stream_surfaces_provider_error() {
        let chunks: Vec<reqwest::Result<Vec<u8>>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n".to_vec()),
            Ok(b"data: {\"error\":{\"message\":\"overloaded\"}}\n".to_vec()),
        ];
        let items: Vec<Result<String, RagError>> =
            fragment_stream(stream::iter(chunks).boxed()).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(RagError::Generation(_))));
    }

    #[tokio::test]
    async fn disabled_model_fails() {
        let req = ChatRequest {
            prompt: "p".into(),
            max_tokens: 10,
            temperature: 0.0,
        };
        let err = DisabledChatModel.complete(&req).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Disabled);
    }

    /// Serve one chat request as a slow SSE stream, one delta per `gap`.
    async fn serve_slow_stream(
        listener: tokio::net::TcpListener,
        deltas: &'static [&'static str],
        gap: std::time::Duration,
    ) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
        let content_length: usize = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse().unwrap())
            .unwrap_or(0);
        while request.len() < header_end + content_length {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
        }

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        for delta in deltas {
            tokio::time::sleep(gap).await;
            let event = serde_json::json!({"choices": [{"delta": {"content": delta}}]});
            socket
                .write_all(format!("data: {}\n\n", event).as_bytes())
                .await
                .unwrap();
            socket.flush().await.unwrap();
        }
        socket.write_all(b"data: [DONE]\n\n").await.unwrap();
        socket.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn stream_outlives_request_timeout_while_data_flows() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_slow_stream(
            listener,
            &["Bring ", "a ", "photo"],
            std::time::Duration::from_millis(600),
        ));

        let config = GenerationConfig {
            url: Some(format!("http://{}", addr)),
            timeout_secs: 1,
            ..GenerationConfig::default()
        };
        let model = OpenAiChatModel::new(&config, ApiKey::parse("sk-test").unwrap()).unwrap();
        let req = ChatRequest {
            prompt: "What do I bring?".into(),
            max_tokens: 32,
            temperature: 0.0,
        };
        let fragments: Vec<String> = model
            .stream(&req)
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(fragments.concat(), "Bring a photo");
        server.await.unwrap();
    }

    #[test]
    fn openai_requires_key() {
        let config = GenerationConfig::default();
        assert!(matches!(
            create_chat_model(&config, None),
            Err(RagError::Input(_))
        ));
    }
}
