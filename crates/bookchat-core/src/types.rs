//! Domain types shared by every Bookchat crate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Map a stored role string onto a [`Role`].
    ///
    /// Only `user` (any case) is the customer; the upstream service writes
    /// `assistant`, `bot` or `ai` for replies, so everything else is treated
    /// as the assistant.
    pub fn from_stored(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("user") {
            Role::User
        } else {
            Role::Assistant
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of a conversation, as stored in `chat_messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    pub session_id: String,
}

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Database,
    Policy,
    Chitchat,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Database => "database",
            Source::Policy => "policy",
            Source::Chitchat => "chitchat",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub source: Source,
    pub content: String,
}

/// Category assigned to a question by the intent classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    Database,
    Policy,
    Chitchat,
}

impl Intent {
    /// The exact label the model is asked to emit.
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Database => "DATABASE",
            Intent::Policy => "POLICY",
            Intent::Chitchat => "CHITCHAT",
        }
    }

    /// Parse a model label. Matching is exact and case-sensitive after the
    /// caller has trimmed surrounding whitespace; `"database"` or
    /// `"DATABASE."` are not labels.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "DATABASE" => Some(Intent::Database),
            "POLICY" => Some(Intent::Policy),
            "CHITCHAT" => Some(Intent::Chitchat),
            _ => None,
        }
    }

    /// Source reported for answers produced on this intent's path.
    pub fn source(&self) -> Source {
        match self {
            Intent::Database => Source::Database,
            Intent::Policy => Source::Policy,
            Intent::Chitchat => Source::Chitchat,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A store policy text with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRecord {
    pub title: String,
    pub content: String,
    pub embedding: Vec<f32>,
}
