//! Chat messages and the ordered transcript

mod message;
mod transcript;

pub use message::{ChatMessage, Origin};
pub use transcript::Transcript;
