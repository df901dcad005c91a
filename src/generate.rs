//! Grounded answer generation: prompt rendering plus one model call.
//!
//! Whatever shape the provider answers in, callers get a
//! [`GenerationResult`]: either the full text or a fragment stream.
//! Provider failures become [`RagError::Generation`]; nothing is
//! substituted for a failed answer.

use futures_util::StreamExt;

use civic_rag_core::prompt::PromptTemplate;
use civic_rag_core::RagError;

use crate::llm::{ChatModel, ChatRequest, FragmentStream};

/// Generated answer, whole or incremental.
pub enum GenerationResult {
    Text(String),
    Stream(FragmentStream),
}

impl GenerationResult {
    /// Full answer text, draining the stream if there is one.
    pub async fn into_text(self) -> Result<String, RagError> {
        match self {
            GenerationResult::Text(text) => Ok(text),
            GenerationResult::Stream(mut stream) => {
                let mut text = String::new();
                while let Some(fragment) = stream.next().await {
                    text.push_str(&fragment?);
                }
                Ok(text)
            }
        }
    }
}

impl std::fmt::Debug for GenerationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationResult::Text(text) => f.debug_tuple("Text").field(text).finish(),
            GenerationResult::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Sampling settings for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.0,
        }
    }
}

/// Render the prompt for `question` over `context` and ask `model`.
///
/// With `stream` the result is a [`GenerationResult::Stream`]; otherwise
/// [`GenerationResult::Text`].
pub async fn generate(
    model: &dyn ChatModel,
    template: &PromptTemplate,
    context: &str,
    question: &str,
    forms: &[String],
    params: GenerationParams,
    stream: bool,
) -> Result<GenerationResult, RagError> {
    let request = ChatRequest {
        prompt: template.render(context, question, forms),
        max_tokens: params.max_tokens,
        temperature: params.temperature,
    };
    tracing::debug!(
        model = model.model_name(),
        prompt_chars = request.prompt.chars().count(),
        stream,
        "requesting answer"
    );

    let result = if stream {
        model.stream(&request).await.map(GenerationResult::Stream)
    } else {
        model.complete(&request).await.map(GenerationResult::Text)
    };
    result.map_err(|e| {
        tracing::warn!(kind = %e.kind, "answer generation failed");
        RagError::Generation(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use civic_rag_core::{ProviderError, ProviderErrorKind};
    use futures_util::stream;

    /// Replies with the prompt itself, whole or in two halves.
    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
            Ok(request.prompt.clone())
        }
        async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, ProviderError> {
            let mid = request
                .prompt
                .char_indices()
                .nth(request.prompt.chars().count() / 2)
                .map(|(i, _)| i)
                .unwrap_or(0);
            let parts = vec![
                Ok(request.prompt[..mid].to_string()),
                Ok(request.prompt[mid..].to_string()),
            ];
            Ok(stream::iter(parts).boxed())
        }
    }

    struct RateLimitedModel;

    #[async_trait]
    impl ChatModel for RateLimitedModel {
        fn model_name(&self) -> &str {
            "limited"
        }
        async fn complete(&self, _request: &ChatRequest) -> Result<String, ProviderError> {
            Err(ProviderError::new(ProviderErrorKind::RateLimited, "HTTP 429"))
        }
        async fn stream(&self, _request: &ChatRequest) -> Result<FragmentStream, ProviderError> {
            Err(ProviderError::new(ProviderErrorKind::RateLimited, "HTTP 429"))
        }
    }

    fn template() -> PromptTemplate {
        PromptTemplate {
            office_name: "Town Hall".into(),
            contact: None,
        }
    }

    #[tokio::test]
    async fn text_and_stream_agree() {
        let forms = vec!["Annex 3 application form".to_string()];
        let whole = generate(
            &EchoModel,
            &template(),
            "[h p.2]\nBring a photo.",
            "What do I bring?",
            &forms,
            GenerationParams::default(),
            false,
        )
        .await
        .unwrap();
        assert!(matches!(whole, GenerationResult::Text(_)));

        let streamed = generate(
            &EchoModel,
            &template(),
            "[h p.2]\nBring a photo.",
            "What do I bring?",
            &forms,
            GenerationParams::default(),
            true,
        )
        .await
        .unwrap();
        assert!(matches!(streamed, GenerationResult::Stream(_)));

        let a = whole.into_text().await.unwrap();
        let b = streamed.into_text().await.unwrap();
        assert_eq!(a, b);
        assert!(a.contains("Bring a photo."));
        assert!(a.contains("Annex 3 application form"));
        assert!(a.ends_with("What do I bring?"));
    }

    #[tokio::test]
    async fn provider_failure_is_generation_error() {
        for stream in [false, true] {
            let err = generate(
                &RateLimitedModel,
                &template(),
                "ctx",
                "q",
                &[],
                GenerationParams::default(),
                stream,
            )
            .await
            .unwrap_err();
            assert!(matches!(err, RagError::Generation(ref e) if e.kind == ProviderErrorKind::RateLimited));
            assert!(err.is_transient());
        }
    }

    #[tokio::test]
    async fn stream_error_surfaces_from_into_text() {
        let parts: Vec<Result<String, RagError>> = vec![
            Ok("partial".into()),
            Err(RagError::Generation(ProviderError::new(
                ProviderErrorKind::Network,
                "reset",
            ))),
        ];
        let result = GenerationResult::Stream(stream::iter(parts).boxed());
        assert!(result.into_text().await.is_err());
    }
}
