use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use memchr::memchr;
use tracing::{debug, warn};

use super::{
    ChunkStream, HistoryTurn, ImageProvider, ImageRequest, ImageResponse, ModelProvider,
    ProviderError, StreamRequest, Tool,
};
use crate::api::decode::{decode_chunk, decode_image_response};
use crate::api::{
    ApiErrorEnvelope, Content, EmptyObject, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, ImageConfig, Part, ToolSpec,
};
use crate::core::message::{Chunk, ImagePayload};
use crate::utils::url::construct_api_url;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini REST client for streamed chat and single-shot image calls.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    image_model: String,
}

impl GeminiClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            image_model: image_model.into(),
        }
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        construct_api_url(&self.base_url, &format!("models/{model}:{method}"))
    }

    async fn post(
        &self,
        url: String,
        body: &GenerateContentRequest,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ProviderError::from_http(status, &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ModelProvider for GeminiClient {
    async fn stream_generate(&self, request: &StreamRequest) -> Result<ChunkStream, ProviderError> {
        let body = build_stream_request(request);
        let url = format!("{}?alt=sse", self.endpoint(&self.model, "streamGenerateContent"));
        debug!(model = %self.model, turns = body.contents.len(), "opening stream");

        let response = self.post(url, &body).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(sse_chunks(bytes))
    }
}

#[async_trait]
impl ImageProvider for GeminiClient {
    async fn generate(&self, request: &ImageRequest) -> Result<ImageResponse, ProviderError> {
        let body = build_image_request(request);
        let url = self.endpoint(&self.image_model, "generateContent");
        debug!(model = %self.image_model, edit = request.source_image.is_some(), "image request");

        let response = self.post(url, &body).await?;
        let text = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|err| ProviderError::new(format!("malformed image response: {err}")))?;
        decode_image_response(&parsed)
    }
}

fn inline_part(image: &ImagePayload) -> Part {
    Part::inline(image.mime_type.clone(), image.to_base64())
}

fn history_content(turn: &HistoryTurn) -> Option<Content> {
    let role = turn.role.to_api_role()?;
    let mut parts = vec![Part::text(turn.text.clone())];
    // Stored images carry no reliable type, so history always resends them as png.
    parts.extend(
        turn.images
            .iter()
            .map(|image| Part::inline("image/png", image.to_base64())),
    );
    Some(Content {
        role: Some(role.to_string()),
        parts,
    })
}

fn tool_specs(tools: &std::collections::BTreeSet<Tool>) -> Vec<ToolSpec> {
    tools
        .iter()
        .map(|tool| match tool {
            Tool::Search => ToolSpec {
                google_search: Some(EmptyObject {}),
                ..ToolSpec::default()
            },
            Tool::Maps => ToolSpec {
                google_maps: Some(EmptyObject {}),
                ..ToolSpec::default()
            },
        })
        .collect()
}

pub(crate) fn build_stream_request(request: &StreamRequest) -> GenerateContentRequest {
    let mut contents: Vec<Content> = request.history.iter().filter_map(history_content).collect();

    let mut prompt_parts = vec![Part::text(request.prompt.clone())];
    if let Some(image) = &request.image {
        prompt_parts.push(inline_part(image));
    }
    contents.push(Content {
        role: Some("user".to_string()),
        parts: prompt_parts,
    });

    let instruction = request.settings.system_instruction.trim();
    GenerateContentRequest {
        contents,
        system_instruction: (!instruction.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part::text(instruction)],
        }),
        tools: tool_specs(&request.settings.tools),
        generation_config: None,
    }
}

pub(crate) fn build_image_request(request: &ImageRequest) -> GenerateContentRequest {
    match &request.source_image {
        Some(source) => GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![inline_part(source), Part::text(request.prompt.clone())],
            }],
            ..GenerateContentRequest::default()
        },
        None => GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(request.prompt.clone())],
            }],
            generation_config: Some(GenerationConfig {
                image_config: Some(ImageConfig {
                    aspect_ratio: request.aspect_ratio.clone(),
                    image_size: request.image_size.clone(),
                }),
            }),
            ..GenerateContentRequest::default()
        },
    }
}

/// Splits a byte stream into SSE `data:` payloads.
#[derive(Debug, Default)]
struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            if let Some(payload) = line_payload(&self.buffer[..newline_pos]) {
                payloads.push(payload);
            }
            self.buffer.drain(..=newline_pos);
        }
        payloads
    }

    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        line_payload(&rest)
    }
}

fn line_payload(line: &[u8]) -> Option<String> {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line.trim(),
        Err(err) => {
            warn!("invalid UTF-8 in stream: {err}");
            return None;
        }
    };
    line.strip_prefix("data:")
        .map(str::trim_start)
        .filter(|payload| !payload.is_empty() && *payload != "[DONE]")
        .map(str::to_string)
}

fn decode_payload(payload: &str) -> Result<Chunk, ProviderError> {
    if let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(payload) {
        let message = envelope
            .error
            .message
            .unwrap_or_else(|| "stream reported an error".to_string());
        return Err(ProviderError {
            status: None,
            code: envelope.error.code,
            message,
        });
    }
    serde_json::from_str::<GenerateContentResponse>(payload)
        .map(|response| decode_chunk(&response))
        .map_err(|err| ProviderError::new(format!("malformed stream payload: {err}")))
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    lines: SseLineBuffer,
    pending: VecDeque<Result<Chunk, ProviderError>>,
    finished: bool,
}

/// Turn a raw SSE body into decoded chunks. The first error ends the stream.
fn sse_chunks(body: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> ChunkStream {
    let state = SseState {
        body,
        lines: SseLineBuffer::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.finished = true;
                    state.pending.clear();
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let decoded = state.lines.push(&bytes);
                    state
                        .pending
                        .extend(decoded.iter().map(|payload| decode_payload(payload)));
                }
                Some(Err(err)) => state.pending.push_back(Err(err.into())),
                None => {
                    state.finished = true;
                    if let Some(payload) = state.lines.finish() {
                        state.pending.push_back(decode_payload(&payload));
                    }
                }
            }
        }
    })
    .boxed()
}
