//! `ConversationTurn`: one entry in a session's append-only log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a [`ConversationTurn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The synthesized answer.
    Assistant,
}

/// One turn in a conversation session, ordered within the session by `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// The session this turn belongs to.
    pub session_id: String,
    /// Who produced this turn.
    pub role: Role,
    /// Turn text.
    pub text: String,
    /// When the turn was appended.
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Creates a turn stamped with the current time.
    #[must_use]
    pub fn new(session_id: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_turn_stamps_current_time() {
        let turn = ConversationTurn::new("s1", Role::User, "hello");
        assert_eq!(turn.session_id, "s1");
        assert_eq!(turn.role, Role::User);
    }
}
