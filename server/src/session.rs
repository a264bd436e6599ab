//! Per-connection game state

use shared::render_reveal;

/// Progress of one client through one word.
///
/// A session is created when its connection is accepted and dropped when the
/// connection is torn down. Only the owning connection ever mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    content: Vec<u8>,
    revealed: Vec<bool>,
    remaining_attempts: u32,
}

impl Session {
    pub fn new(content: Vec<u8>, attempts: u32) -> Self {
        let revealed = vec![false; content.len()];
        Self {
            content,
            revealed,
            remaining_attempts: attempts,
        }
    }

    /// Reveals every position holding `symbol` and reports whether the whole
    /// word is now revealed.
    ///
    /// A guess that matches nothing costs one attempt. The budget is tracked
    /// but never ends the game.
    pub fn apply_guess(&mut self, symbol: u8) -> bool {
        let mut matched = false;
        for (shown, &candidate) in self.revealed.iter_mut().zip(&self.content) {
            if candidate == symbol {
                *shown = true;
                matched = true;
            }
        }

        if !matched {
            self.remaining_attempts = self.remaining_attempts.saturating_sub(1);
        }

        self.is_complete()
    }

    /// True once every position has been revealed
    pub fn is_complete(&self) -> bool {
        self.revealed.iter().all(|&shown| shown)
    }

    /// Reveal line for the current progress, newline included
    pub fn render(&self) -> Vec<u8> {
        render_reveal(&self.content, &self.revealed)
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn revealed(&self) -> &[bool] {
        &self.revealed
    }

    pub fn remaining_attempts(&self) -> u32 {
        self.remaining_attempts
    }
}
