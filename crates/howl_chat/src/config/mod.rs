//! Configuration module for howl_chat
//!
//! This module contains:
//! - `settings`: fetch and generation settings, with `HOWL_*` env overrides
//! - `prompts`: the chat prompt template

mod prompts;
mod settings;

pub use prompts::{render_prompt, DEFAULT_PROMPT_TEMPLATE, INPUT_PLACEHOLDER};
pub use settings::{
    ChatConfig, FetchConfig, GenerationConfig, DEFAULT_MODEL_FILE, DEFAULT_MODEL_URL,
};
