use serde::{Deserialize, Serialize};

use crate::api::events::GameEvent;

const WAITING: &str = "Waiting for event...";

/// One integration requirement shown to the game author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub completed: bool,
    pub message: String,
}

impl Default for ChecklistItem {
    fn default() -> Self {
        Self {
            completed: false,
            message: WAITING.to_string(),
        }
    }
}

impl ChecklistItem {
    fn complete(&mut self, message: String) {
        self.completed = true;
        self.message = message;
    }
}

/// SDK integration checklist driven by events from the guest.
///
/// Owned by the embedding page; the bridge only ever hands it events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    pub ready: ChecklistItem,
    pub score: ChecklistItem,
    pub play_again: ChecklistItem,
    pub wager: ChecklistItem,
}

impl Checklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event. Returns false for events the checklist does not track.
    pub fn apply(&mut self, event: &GameEvent) -> bool {
        match event {
            GameEvent::Ready => self.ready.complete("Received Ready Event".to_string()),
            GameEvent::GameOver(data) => {
                self.score.complete(format!("Received Score: {}", data.score))
            }
            GameEvent::Wager => self.wager.complete("Received Wager Event".to_string()),
            GameEvent::PlayAgain => {
                self.play_again.complete("Received Play Again Event".to_string())
            }
            GameEvent::HapticFeedback | GameEvent::Error(_) => return false,
        }
        true
    }

    pub fn is_complete(&self) -> bool {
        [&self.ready, &self.score, &self.play_again, &self.wager]
            .iter()
            .all(|item| item.completed)
    }
}
