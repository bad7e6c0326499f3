//! GGUF inference through llama.cpp

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use tracing::debug;

use super::handle::{Completion, InferenceEngine};
use crate::config::GenerationConfig;
use crate::error::{HowlError, Result};

/// llama.cpp refuses decode batches larger than this.
const PREFILL_BATCH_SIZE: usize = 512;

static BACKEND: OnceLock<std::result::Result<LlamaBackend, String>> = OnceLock::new();

/// llama.cpp may only be initialised once per process; a failed init is
/// remembered rather than retried.
fn backend() -> Result<&'static LlamaBackend> {
    BACKEND
        .get_or_init(|| LlamaBackend::init().map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| HowlError::ModelLoad(e.clone()))
}

/// Tokens can end in the middle of a UTF-8 sequence, so pieces are joined as
/// bytes and decoded once.
fn decode_pieces(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn cpu_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

pub struct LlamaEngine {
    backend: &'static LlamaBackend,
    model: LlamaModel,
}

impl LlamaEngine {
    pub fn load(path: &Path) -> Result<Self> {
        let backend = backend()?;
        let params = LlamaModelParams::default();
        let model = LlamaModel::load_from_file(backend, path, &params)
            .map_err(|e| HowlError::ModelLoad(e.to_string()))?;
        Ok(Self { backend, model })
    }
}

impl InferenceEngine for LlamaEngine {
    fn name(&self) -> &str {
        "llama.cpp"
    }

    fn generate(&self, prompt: &str, params: &GenerationConfig) -> Result<Completion> {
        let threads = params.threads.unwrap_or_else(cpu_cores) as i32;
        let n_ctx = NonZeroU32::new(params.context_size)
            .or(NonZeroU32::new(2048))
            .ok_or_else(|| HowlError::Inference("invalid context size".into()))?;

        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(Some(n_ctx))
            .with_n_threads(threads)
            .with_n_threads_batch(threads);

        let mut ctx = self
            .model
            .new_context(self.backend, ctx_params)
            .map_err(|e| HowlError::Inference(e.to_string()))?;

        let tokens = self
            .model
            .str_to_token(prompt, AddBos::Always)
            .map_err(|e| HowlError::Inference(e.to_string()))?;

        let mut batch = LlamaBatch::new(PREFILL_BATCH_SIZE, 1);
        let n_tokens = tokens.len();
        let last_pos = (n_tokens as i32).saturating_sub(1);

        // Prefill in chunks so no single decode exceeds the batch size.
        let mut pos = 0i32;
        for chunk in tokens.chunks(PREFILL_BATCH_SIZE) {
            batch.clear();
            for (j, &token) in chunk.iter().enumerate() {
                let p = pos + j as i32;
                batch
                    .add(token, p, &[0], p == last_pos)
                    .map_err(|e| HowlError::Inference(e.to_string()))?;
            }
            ctx.decode(&mut batch)
                .map_err(|e| HowlError::Inference(e.to_string()))?;
            pos += chunk.len() as i32;
        }

        let mut sampler =
            LlamaSampler::chain_simple([LlamaSampler::dist(params.seed), LlamaSampler::greedy()]);

        let start = Instant::now();
        let mut bytes = Vec::new();
        let mut n_cur = n_tokens as i32;
        let mut tokens_generated: u32 = 0;

        for _ in 0..params.max_tokens {
            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(token);

            if self.model.is_eog_token(token) {
                break;
            }

            let piece = self
                .model
                .token_to_bytes(token, Special::Tokenize)
                .map_err(|e| HowlError::Inference(e.to_string()))?;
            bytes.extend_from_slice(&piece);

            batch.clear();
            batch
                .add(token, n_cur, &[0], true)
                .map_err(|e| HowlError::Inference(e.to_string()))?;
            n_cur += 1;
            tokens_generated += 1;

            ctx.decode(&mut batch)
                .map_err(|e| HowlError::Inference(e.to_string()))?;
        }

        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(
            "Generated {} tokens in {} ms",
            tokens_generated, latency_ms
        );

        Ok(Completion {
            text: decode_pieces(&bytes),
            tokens_generated,
            latency_ms,
        })
    }
}
