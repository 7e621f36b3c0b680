//! Interpreter: turns user text into an `InterpretationResult` via the language model.
//!
//! `AppState` holds an `Arc<dyn Interpreter>`; `GeminiInterpreter` is the
//! production backend and tests swap in canned output.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::errors::AppError;
use crate::interpretation::models::InterpretationResult;
use crate::interpretation::prompts::PromptTemplate;
use crate::llm_client::{strip_json_fences, LlmClient, UsageMetadata};

/// Completion size assumed when the provider reports no usage.
const ESTIMATED_COMPLETION_TOKENS: i32 = 100;

/// Everything the store needs from one model call.
#[derive(Debug, Clone)]
pub struct ModelInterpretation {
    pub result: InterpretationResult,
    /// Model output exactly as received.
    pub original_result: String,
    /// `original_result` decoded, unnormalised.
    pub original_data: Value,
    pub model: String,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
}

#[async_trait]
pub trait Interpreter: Send + Sync {
    fn model_name(&self) -> &str;

    async fn interpret(&self, input: &str) -> Result<ModelInterpretation, AppError>;
}

pub struct GeminiInterpreter {
    client: LlmClient,
    prompt: PromptTemplate,
}

impl GeminiInterpreter {
    pub fn new(client: LlmClient, prompt: PromptTemplate) -> Self {
        Self { client, prompt }
    }
}

#[async_trait]
impl Interpreter for GeminiInterpreter {
    fn model_name(&self) -> &str {
        self.client.model()
    }

    async fn interpret(&self, input: &str) -> Result<ModelInterpretation, AppError> {
        let prompt = self.prompt.render(input);
        let response = self.client.generate(&prompt).await?;
        let parsed = parse_model_output(response.text, response.usage, input, self.model_name())?;

        info!(
            "Interpreted input: model={}, prompt_tokens={}, completion_tokens={}",
            parsed.model, parsed.prompt_tokens, parsed.completion_tokens
        );
        Ok(parsed)
    }
}

/// Decodes raw model text. Code fences are tolerated; anything that is not a
/// JSON object matching the result schema is `LanguageModelMalformed`.
pub fn parse_model_output(
    raw: String,
    usage: Option<UsageMetadata>,
    input: &str,
    model: &str,
) -> Result<ModelInterpretation, AppError> {
    let body = strip_json_fences(&raw);

    let original_data: Value = match serde_json::from_str(body) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => {
            return Err(AppError::LanguageModelMalformed {
                message: "expected a JSON object".to_string(),
                raw,
            })
        }
        Err(e) => {
            return Err(AppError::LanguageModelMalformed {
                message: e.to_string(),
                raw,
            })
        }
    };

    let result: InterpretationResult = match serde_json::from_value(original_data.clone()) {
        Ok(result) => result,
        Err(e) => {
            return Err(AppError::LanguageModelMalformed {
                message: e.to_string(),
                raw,
            })
        }
    };

    let usage = usage.unwrap_or_default();
    let prompt_tokens = usage
        .prompt_token_count
        .unwrap_or_else(|| i32::try_from(input.len() / 4).unwrap_or(i32::MAX));
    let completion_tokens = usage
        .candidates_token_count
        .unwrap_or(ESTIMATED_COMPLETION_TOKENS);

    Ok(ModelInterpretation {
        result,
        original_result: raw,
        original_data,
        model: model.to_string(),
        prompt_tokens,
        completion_tokens,
    })
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Interpreter that answers every call with the same raw text, optionally
    /// after a delay.
    pub struct CannedInterpreter {
        pub raw: String,
        pub delay: std::time::Duration,
    }

    impl CannedInterpreter {
        pub fn new(raw: impl Into<String>) -> Self {
            Self {
                raw: raw.into(),
                delay: std::time::Duration::ZERO,
            }
        }

        pub fn slow(raw: impl Into<String>, delay: std::time::Duration) -> Self {
            Self {
                delay,
                ..Self::new(raw)
            }
        }
    }

    #[async_trait]
    impl Interpreter for CannedInterpreter {
        fn model_name(&self) -> &str {
            "canned-model"
        }

        async fn interpret(&self, input: &str) -> Result<ModelInterpretation, AppError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            parse_model_output(self.raw.clone(), None, input, self.model_name())
        }
    }
}
