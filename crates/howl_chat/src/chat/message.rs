//! A single chat line

use chrono::{DateTime, Local};
use std::fmt;

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    User,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub text: String,
    pub origin: Origin,
    /// Local short time, e.g. `14:05`
    pub timestamp: String,
}

impl ChatMessage {
    pub fn new(text: impl Into<String>, origin: Origin) -> Self {
        Self::at(text, origin, Local::now())
    }

    pub fn at(text: impl Into<String>, origin: Origin, time: DateTime<Local>) -> Self {
        Self {
            text: text.into(),
            origin,
            timestamp: time.format("%H:%M").to_string(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, Origin::User)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(text, Origin::System)
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.timestamp, self.text)
    }
}
