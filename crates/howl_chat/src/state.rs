//! Model lifecycle state machine

use crate::error::{HowlError, Result};

/// Where the model is in its one-way lifecycle.
///
/// `Loaded` and `Failed` are terminal: nothing moves the process back to
/// `Downloading` once a model has been installed or setup has given up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelState {
    #[default]
    NotLoaded,
    Downloading,
    Loading,
    Loaded,
    Failed,
}

impl ModelState {
    /// Whether `self -> next` is a legal move.
    pub fn can_transition_to(self, next: ModelState) -> bool {
        use ModelState::*;
        matches!(
            (self, next),
            (NotLoaded, Downloading)
                | (NotLoaded, Loading)
                | (Downloading, Loading)
                | (Downloading, Failed)
                | (Loading, Loaded)
                | (Loading, Failed)
        )
    }

    /// Move to `next`, or return `InvalidTransition` and leave `self` untouched.
    pub fn transition(&mut self, next: ModelState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(HowlError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ModelState::Loaded | ModelState::Failed)
    }

    pub fn is_busy(self) -> bool {
        matches!(self, ModelState::Downloading | ModelState::Loading)
    }
}
