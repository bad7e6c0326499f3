//! Routes user text through the loaded model and shapes the reply

use tracing::{debug, warn};

use crate::config::{render_prompt, ChatConfig, GenerationConfig};
use crate::error::Result;
use crate::model::ModelHandle;

/// Reply used while no model is installed.
pub const NOT_LOADED_REPLY: &str = "Model not loaded yet.";

/// Reply used when the model produced nothing printable.
pub const EMPTY_REPLY: &str = "...";

/// Marker of the next user turn; generation past it is dropped.
const TURN_MARKER: &str = "User:";

/// Stateless request builder around an optional model.
///
/// Clones share the same `ModelHandle`, so each request can run on its own
/// blocking thread.
#[derive(Debug, Clone)]
pub struct InferenceRouter {
    model: Option<ModelHandle>,
    generation: GenerationConfig,
    prompt_template: String,
}

impl InferenceRouter {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            model: None,
            generation: config.generation.clone(),
            prompt_template: config.prompt_template.clone(),
        }
    }

    pub fn with_model(mut self, model: ModelHandle) -> Self {
        self.model = Some(model);
        self
    }

    /// Install the model. Returns `false` if one was already installed.
    pub fn install(&mut self, model: ModelHandle) -> bool {
        if self.model.is_some() {
            return false;
        }
        self.model = Some(model);
        true
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&ModelHandle> {
        self.model.as_ref()
    }

    pub fn prompt_for(&self, input: &str) -> String {
        render_prompt(&self.prompt_template, input)
    }

    /// Answer `input`, blocking until the engine returns.
    ///
    /// Never fails: every error is folded into the reply text.
    pub fn respond(&self, input: &str) -> String {
        match self.try_respond(input) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Inference failed: {}", e);
                e.to_string()
            }
        }
    }

    fn try_respond(&self, input: &str) -> Result<String> {
        let Some(model) = &self.model else {
            return Ok(NOT_LOADED_REPLY.to_string());
        };

        let prompt = self.prompt_for(input);
        let completion = model.generate(&prompt, &self.generation)?;
        debug!(
            "{} answered with {} tokens in {} ms",
            model.backend(),
            completion.tokens_generated,
            completion.latency_ms
        );

        Ok(shape_reply(&completion.text))
    }
}

/// Keep only the assistant's turn and never return an empty string.
pub fn shape_reply(raw: &str) -> String {
    let turn = raw.split(TURN_MARKER).next().unwrap_or_default().trim();
    if turn.is_empty() {
        EMPTY_REPLY.to_string()
    } else {
        turn.to_string()
    }
}
