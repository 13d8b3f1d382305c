//! User-facing message surface.
//!
//! Authoring errors found during a type update (for example an operator
//! declaring an input of a type nobody can create) must reach the user, not
//! just the log. The editor implements [`MessageSurface`] with a blocking
//! dialog; headless hosts use [`LogMessageSurface`] or collect messages with
//! [`RecordingMessageSurface`].

use parking_lot::Mutex;
use serde::Serialize;

/// Something that can show a blocking message to the user.
pub trait MessageSurface: Send + Sync {
    fn show_message_box(&self, message: &str, title: &str);
}

/// Writes messages to the log at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessageSurface;

impl MessageSurface for LogMessageSurface {
    fn show_message_box(&self, message: &str, title: &str) {
        tracing::error!("{}: {}", title, message);
    }
}

/// A message captured by [`RecordingMessageSurface`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMessage {
    pub title: String,
    pub message: String,
}

/// Keeps every message so callers can report them later.
#[derive(Debug, Default)]
pub struct RecordingMessageSurface {
    messages: Mutex<Vec<UserMessage>>,
}

impl RecordingMessageSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all messages shown so far.
    pub fn messages(&self) -> Vec<UserMessage> {
        self.messages.lock().clone()
    }

    /// Removes and returns all messages shown so far.
    pub fn take(&self) -> Vec<UserMessage> {
        std::mem::take(&mut *self.messages.lock())
    }
}

impl MessageSurface for RecordingMessageSurface {
    fn show_message_box(&self, message: &str, title: &str) {
        tracing::warn!("{}: {}", title, message);
        self.messages.lock().push(UserMessage {
            title: title.to_string(),
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_surface_keeps_order() {
        let surface = RecordingMessageSurface::new();
        surface.show_message_box("first", "T");
        surface.show_message_box("second", "T");

        let taken = surface.take();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].message, "first");
        assert!(surface.messages().is_empty());
    }
}
