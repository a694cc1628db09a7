//! LLM domain: screenshots in, structured problem/solution out.
//!
//! `ModelGateway` is the seam the pipeline talks to. `LlmGateway` is the
//! production implementation: it reads the configured model for each stage
//! from `StateManager`, routes to a backend family, and races the HTTP call
//! against the run's cancellation token.
//!
//! Backends:
//!   - OpenAI Chat Completions (openai.rs)
//!   - Anthropic Messages (anthropic.rs)
//!   - Gemini generateContent (gemini.rs)
//!
//! Shared:
//!   - prompts.rs   system prompts + user message builders
//!   - response.rs  fence stripping, JSON parsing, upstream error mapping
//!   - provider.rs  family routing + provider metadata

mod anthropic;
mod gemini;
mod openai;
pub mod prompts;
pub mod provider;
pub mod response;
pub mod types;

pub use provider::BackendFamily;
pub use types::{ImagePayload, ProblemInfo, SolutionData, TestCase};

use crate::config::AppConfig;
use crate::error::GatewayError;
use crate::settings::ModelStage;
use crate::state::StateManager;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The three model stages, each cancellable through `token`.
pub trait ModelGateway: Send + Sync {
    fn extract_problem(
        &self,
        images: Vec<ImagePayload>,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<ProblemInfo, GatewayError>> + Send;

    fn generate_solution(
        &self,
        problem: &ProblemInfo,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<SolutionData, GatewayError>> + Send;

    /// `images` are the original captures followed by the new ones.
    /// `problem == None` fails with `MissingProblem` before any request.
    fn debug_solution(
        &self,
        images: Vec<ImagePayload>,
        problem: Option<&ProblemInfo>,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<SolutionData, GatewayError>> + Send;
}

/// Everything one backend call needs, independent of family.
pub(crate) struct StageRequest<'a> {
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub user_message: String,
    pub images: &'a [ImagePayload],
    pub max_tokens: u32,
}

/// Production gateway over reqwest.
pub struct LlmGateway {
    state: Arc<StateManager>,
    config: AppConfig,
    client: reqwest::Client,
}

impl LlmGateway {
    pub fn new(state: Arc<StateManager>, config: AppConfig) -> Self {
        Self::with_client(state, config, reqwest::Client::new())
    }

    pub fn with_client(state: Arc<StateManager>, config: AppConfig, client: reqwest::Client) -> Self {
        Self {
            state,
            config,
            client,
        }
    }

    /// Model, family and key for `stage`, read at call time.
    fn resolve(&self, stage: ModelStage) -> Result<(String, BackendFamily, String), GatewayError> {
        let snapshot = self.state.get_state();
        let model = stage.model_in(&snapshot).to_string();
        let family = BackendFamily::for_model(&model).ok_or_else(|| GatewayError::UnsupportedModel {
            stage: stage.label(),
            model: model.clone(),
        })?;
        let api_key = snapshot
            .api_keys
            .get(family)
            .ok_or(GatewayError::MissingCredential(family))?
            .to_string();
        Ok((model, family, api_key))
    }

    async fn run_stage<T: DeserializeOwned>(
        &self,
        stage: ModelStage,
        system_prompt: &str,
        user_message: String,
        images: &[ImagePayload],
        token: &CancellationToken,
    ) -> Result<T, GatewayError> {
        if token.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }
        let (model, family, api_key) = self.resolve(stage)?;
        let request = StageRequest {
            model: &model,
            system_prompt,
            user_message,
            images,
            max_tokens: prompts::MAX_TOKENS,
        };

        log::info!(
            "[LLM] {} stage: provider={} model={} images={}",
            stage.label(),
            family.id(),
            model,
            images.len()
        );
        let start = std::time::Instant::now();

        let call = self.send(family, &request, &api_key);
        // Dropping `call` on cancellation aborts the in-flight request.
        let text = tokio::select! {
            biased;
            _ = token.cancelled() => {
                log::info!("[LLM] {} stage canceled after {}ms", stage.label(), start.elapsed().as_millis());
                return Err(GatewayError::Cancelled);
            }
            result = call => result?,
        };

        log::info!(
            "[LLM] {} stage response in {}ms ({} chars)",
            stage.label(),
            start.elapsed().as_millis(),
            text.len()
        );
        response::parse_model_json(&text)
    }

    async fn send(
        &self,
        family: BackendFamily,
        request: &StageRequest<'_>,
        api_key: &str,
    ) -> Result<String, GatewayError> {
        match family {
            BackendFamily::OpenAi => {
                let body = openai::build_request(request);
                openai::send(&self.client, &self.config.openai_base_url, api_key, &body).await
            }
            BackendFamily::Anthropic => {
                let body = anthropic::build_request(request);
                anthropic::send(&self.client, &self.config.anthropic_base_url, api_key, &body).await
            }
            BackendFamily::Gemini => {
                let body = gemini::build_request(request);
                gemini::send(
                    &self.client,
                    &self.config.gemini_base_url,
                    request.model,
                    api_key,
                    &body,
                )
                .await
            }
        }
    }

    /// Send a minimal prompt to check that a family's key works.
    pub async fn test_provider(&self, family: BackendFamily) -> Result<bool, GatewayError> {
        let api_key = self
            .state
            .get_state()
            .api_keys
            .get(family)
            .ok_or(GatewayError::MissingCredential(family))?
            .to_string();
        let model = crate::settings::ALLOWED_MODELS
            .iter()
            .find(|m| BackendFamily::for_model(m) == Some(family))
            .copied()
            .unwrap_or(crate::settings::DEFAULT_MODEL);
        let request = StageRequest {
            model,
            system_prompt: "Reply with a JSON object.",
            user_message: "Reply with just: {\"ok\": true}".to_string(),
            images: &[],
            max_tokens: 50,
        };
        match self.send(family, &request, &api_key).await {
            Ok(_) => {
                log::info!("[SETTINGS] Test {}: ok", family);
                Ok(true)
            }
            Err(GatewayError::Upstream(message)) => {
                log::warn!("[SETTINGS] Test {}: {}", family, message);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl ModelGateway for LlmGateway {
    async fn extract_problem(
        &self,
        images: Vec<ImagePayload>,
        token: &CancellationToken,
    ) -> Result<ProblemInfo, GatewayError> {
        let message = prompts::build_extract_message(images.len());
        self.run_stage(
            ModelStage::Extraction,
            prompts::EXTRACT_SYSTEM_PROMPT,
            message,
            &images,
            token,
        )
        .await
    }

    async fn generate_solution(
        &self,
        problem: &ProblemInfo,
        token: &CancellationToken,
    ) -> Result<SolutionData, GatewayError> {
        let language = self.state.get_state().language;
        let message = prompts::build_solve_message(problem, language);
        self.run_stage(
            ModelStage::Solution,
            prompts::SOLVE_SYSTEM_PROMPT,
            message,
            &[],
            token,
        )
        .await
    }

    async fn debug_solution(
        &self,
        images: Vec<ImagePayload>,
        problem: Option<&ProblemInfo>,
        token: &CancellationToken,
    ) -> Result<SolutionData, GatewayError> {
        let problem = problem.ok_or(GatewayError::MissingProblem)?;
        let language = self.state.get_state().language;
        let message = prompts::build_debug_message(problem, language, images.len());
        self.run_stage(
            ModelStage::Debugging,
            prompts::DEBUG_SYSTEM_PROMPT,
            message,
            &images,
            token,
        )
        .await
    }
}
