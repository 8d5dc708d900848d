//! UI-agnostic conversation data types
//!
//! These are shared by every front-end and don't depend on any UI framework.

use serde::{Deserialize, Serialize};

/// Opening assistant message every transcript starts with
pub const GREETING: &str =
    "Hello! I am your Insurance Policy Assistant. How can I help you today?";

/// Assistant message substituted for the reply when the backend call fails
pub const FALLBACK_TEXT: &str = "Sorry, I encountered an error. Ensure the backend is running.";

/// A single transcript entry. Identity is its position in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Speaker name shown above a message
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
        }
    }
}
