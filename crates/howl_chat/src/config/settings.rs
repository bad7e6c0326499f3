//! Fetch and generation settings

use std::env;
use std::path::PathBuf;

use super::prompts::DEFAULT_PROMPT_TEMPLATE;

/// Model artifact fetched when no URL is configured.
pub const DEFAULT_MODEL_URL: &str =
    "https://huggingface.co/bartowski/Llama-3.2-3B-Instruct-GGUF/resolve/main/Llama-3.2-3B-Instruct-Q4_K_M.gguf";

/// File name the artifact is stored under. Overwritten on every download.
pub const DEFAULT_MODEL_FILE: &str = "model.gguf";

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn default_model_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("howl"))
        .unwrap_or_else(|| PathBuf::from("models"))
}

/// Where the model artifact comes from and where it lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub model_url: String,
    pub model_dir: PathBuf,
    pub model_file: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            model_url: env::var("HOWL_MODEL_URL").unwrap_or_else(|_| DEFAULT_MODEL_URL.to_string()),
            model_dir: env::var("HOWL_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_model_dir()),
            model_file: env::var("HOWL_MODEL_FILE")
                .unwrap_or_else(|_| DEFAULT_MODEL_FILE.to_string()),
        }
    }
}

impl FetchConfig {
    pub fn new(model_url: impl Into<String>, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_url: model_url.into(),
            model_dir: model_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_model_file(mut self, model_file: impl Into<String>) -> Self {
        self.model_file = model_file.into();
        self
    }

    /// Final location of the artifact
    pub fn destination(&self) -> PathBuf {
        self.model_dir.join(&self.model_file)
    }

    /// Location the body is streamed to before it replaces `destination()`
    pub fn partial_destination(&self) -> PathBuf {
        self.model_dir.join(format!("{}.part", self.model_file))
    }
}

/// Knobs passed to the inference engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    pub max_tokens: usize,
    pub context_size: u32,
    /// `None` lets the backend pick from the available cores.
    pub threads: Option<usize>,
    pub seed: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: env_parse("HOWL_MAX_TOKENS").unwrap_or(256),
            context_size: env_parse("HOWL_CONTEXT_SIZE").unwrap_or(2048),
            threads: env_parse("HOWL_THREADS"),
            seed: env_parse("HOWL_SEED").unwrap_or(1234),
        }
    }
}

impl GenerationConfig {
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_context_size(mut self, context_size: u32) -> Self {
        self.context_size = context_size;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

/// Everything the chat application needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub fetch: FetchConfig,
    pub generation: GenerationConfig,
    pub prompt_template: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            generation: GenerationConfig::default(),
            prompt_template: env::var("HOWL_PROMPT_TEMPLATE")
                .unwrap_or_else(|_| DEFAULT_PROMPT_TEMPLATE.to_string()),
        }
    }
}

impl ChatConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }
}
