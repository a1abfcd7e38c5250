//! Chat assistant that answers questions about the computed figures.
//!
//! The gateway builds the context from the day's indicators, the weekly
//! payout and the rates in effect, then forwards the question and the
//! conversation so far to a [`CompletionProvider`].

pub mod gemini;
pub mod ollama;
pub mod prompt;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use prompt::{build_context, system_instruction};

use crate::config::{AssistantConfig, AssistantProvider};
use crate::error::AssistantError;
use crate::models::{DailyKpiSnapshot, RateConfig, WeeklyWorkerSummary};
use crate::session::{ChatTurn, MAX_HISTORY_TURNS};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Marks an answer that reports a failure instead of coming from the model.
pub const FAILURE_MARKER: &str = "❌";

const SUGGESTED_QUESTIONS: [&str; 3] = [
    "Quem foi mais produtivo?",
    "Resumo de custos",
    "Dicas de economia",
];

/// Questions offered to the operator as a starting point.
pub fn suggested_questions() -> [&'static str; 3] {
    SUGGESTED_QUESTIONS
}

/// A text completion API.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Answer `user_text` given the system instruction and prior turns.
    async fn complete(
        &self,
        system: &str,
        history: &[ChatTurn],
        user_text: &str,
    ) -> Result<String, AssistantError>;

    fn name(&self) -> &str;
}

/// Map a transport failure to the matching error.
pub(crate) fn send_error(e: reqwest::Error, endpoint: &str, timeout_seconds: u64) -> AssistantError {
    if e.is_timeout() {
        AssistantError::Timeout(timeout_seconds)
    } else if e.is_connect() {
        AssistantError::Connect(endpoint.to_string())
    } else {
        AssistantError::Connect(format!("{} ({})", endpoint, e))
    }
}

pub struct AssistantGateway {
    /// `None` when the provider could not be configured (missing API key).
    provider: Option<Box<dyn CompletionProvider>>,
}

impl AssistantGateway {
    pub fn new(provider: Box<dyn CompletionProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Build the provider selected in the configuration.
    ///
    /// A missing Gemini API key is not an error here; questions are answered
    /// with a configuration message instead.
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let provider: Box<dyn CompletionProvider> = match config.provider {
            AssistantProvider::Gemini => match config.api_key() {
                Ok(api_key) => Box::new(
                    GeminiProvider::new(
                        &config.gemini_url,
                        api_key,
                        config.model(),
                        config.temperature,
                        config.timeout_seconds,
                    )
                    .context("Failed to create Gemini client")?,
                ),
                Err(e) => {
                    warn!("{}; the assistant is disabled", e);
                    return Ok(Self { provider: None });
                }
            },
            AssistantProvider::Ollama => Box::new(
                OllamaProvider::new(
                    &config.ollama_url,
                    config.model(),
                    config.temperature,
                    config.timeout_seconds,
                )
                .context("Failed to create Ollama client")?,
            ),
        };

        info!("Assistant using {} ({})", provider.name(), config.model());
        Ok(Self::new(provider))
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Ask a question and return the model's answer.
    pub async fn try_ask(
        &self,
        user_text: &str,
        kpis: &DailyKpiSnapshot,
        weekly: &[WeeklyWorkerSummary],
        rates: &RateConfig,
        history: &[ChatTurn],
    ) -> Result<String, AssistantError> {
        let provider = self.provider.as_ref().ok_or(AssistantError::MissingApiKey)?;

        let context = build_context(kpis, weekly, rates);
        let system = system_instruction(&context);
        let history = &history[history.len().saturating_sub(MAX_HISTORY_TURNS)..];

        debug!(
            provider = provider.name(),
            context_len = context.len(),
            turns = history.len(),
            "sending question to assistant"
        );

        let answer = provider.complete(&system, history, user_text).await?;
        if answer.trim().is_empty() {
            return Err(AssistantError::EmptyResponse);
        }
        Ok(answer)
    }

    /// Like [`Self::try_ask`], but every failure becomes a message for the operator.
    pub async fn ask_assistant(
        &self,
        user_text: &str,
        kpis: &DailyKpiSnapshot,
        weekly: &[WeeklyWorkerSummary],
        rates: &RateConfig,
        history: &[ChatTurn],
    ) -> String {
        match self.try_ask(user_text, kpis, weekly, rates, history).await {
            Ok(answer) => answer,
            Err(AssistantError::MissingApiKey) => {
                format!("{} Erro de configuração.", FAILURE_MARKER)
            }
            Err(e) => {
                warn!(error = %e, "assistant request failed");
                format!("{} Erro na API: {}", FAILURE_MARKER, e)
            }
        }
    }
}
