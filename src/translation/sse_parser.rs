//! Server-Sent Events parsing for OpenAI-compatible streaming responses.

use anyhow::{Result, anyhow};
use bytes::Bytes;
use futures_util::Stream;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Content(String),
    Error(String),
    Done,
    Skip,
}

/// Converts a raw SSE byte stream into a stream of text deltas.
///
/// Bytes are buffered until a full line is available, so a multi-byte
/// character split across network chunks is decoded intact. The stream
/// ends at `data: [DONE]` or when the connection closes.
pub fn sse_to_text_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send {
    async_stream::stream! {
        use futures_util::StreamExt;

        let mut byte_stream = std::pin::pin!(byte_stream);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(anyhow!("Stream error: {e}"));
                    return;
                }
            };

            buffer.extend_from_slice(&chunk);

            while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                let line = String::from_utf8_lossy(&raw);

                match parse_sse_line(line.trim()) {
                    SseLine::Content(content) => yield Ok(content),
                    SseLine::Error(message) => {
                        yield Err(anyhow!("API error: {message}"));
                        return;
                    }
                    SseLine::Done => return,
                    SseLine::Skip => {}
                }
            }
        }
    }
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    let Ok(response) = serde_json::from_str::<StreamResponse>(data) else {
        return SseLine::Skip;
    };

    if let Some(error) = response.error {
        return SseLine::Error(error.message);
    }

    let content: String = response
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect();

    if content.is_empty() {
        SseLine::Skip
    } else {
        SseLine::Content(content)
    }
}
