use anyhow::{Context, Result, bail};
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use std::borrow::Cow;
use std::pin::Pin;

use super::backend::{BlockTranslation, TranslationBackend, TranslationContext};
use super::prompt::{build_context_note, build_system_prompt};
use super::sse_parser::sse_to_text_stream;

#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub source_text: String,
    pub target_language: String,
    pub model: String,
    /// Extra system message, e.g. block layout hints.
    pub note: Option<String>,
}

// Use Cow to avoid cloning strings that are only borrowed for serialization
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Cow<'a, str>,
}

/// Streaming client for an OpenAI-compatible `/v1/chat/completions`
/// endpoint.
pub struct TranslationClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl TranslationClient {
    pub fn new(endpoint: String, api_key: Option<String>, model: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            api_key,
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn translate_stream(
        &self,
        request: &TranslationRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<String>> + Send>>> {
        let url = format!(
            "{}/v1/chat/completions",
            self.endpoint.trim_end_matches('/')
        );

        let mut messages = vec![Message {
            role: "system",
            content: Cow::Owned(build_system_prompt(&request.target_language)),
        }];
        if let Some(note) = &request.note {
            messages.push(Message {
                role: "system",
                content: Cow::Borrowed(note),
            });
        }
        messages.push(Message {
            role: "user",
            content: Cow::Borrowed(&request.source_text),
        });

        let chat_request = ChatCompletionRequest {
            model: &request.model,
            messages,
            stream: true,
        };

        let mut http_request = self.client.post(&url).json(&chat_request);

        if let Some(api_key) = &self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = http_request
            .send()
            .await
            .with_context(|| format!("Failed to connect to API endpoint: {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("API request failed with status {status}: {body}");
        }

        Ok(Box::pin(sse_to_text_stream(response.bytes_stream())))
    }

    /// Sends one block and gathers the whole streamed answer.
    async fn translate_collect(&self, text: &str, context: &TranslationContext) -> Result<String> {
        let request = TranslationRequest {
            source_text: text.to_string(),
            target_language: context.target_language.clone(),
            model: self.model.clone(),
            note: build_context_note(context),
        };

        let mut stream = self.translate_stream(&request).await?;
        let mut code = String::new();
        while let Some(delta) = stream.next().await {
            code.push_str(&delta?);
        }

        Ok(code)
    }
}

impl TranslationBackend for TranslationClient {
    async fn translate_text_block(&self, text: &str, context: &TranslationContext) -> BlockTranslation {
        match self.translate_collect(text, context).await {
            Ok(code) if code.trim().is_empty() => {
                BlockTranslation::failure("translation backend returned no code")
            }
            Ok(code) => BlockTranslation::success(code),
            Err(e) => {
                tracing::warn!(chunk = context.chunk_index, error = %e, "block translation failed");
                BlockTranslation::failure(format!("{e:#}"))
            }
        }
    }
}
