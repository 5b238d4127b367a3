//! Turning conversation text into knowledge records.
//!
//! Two extractors produce records that [`crate::writer::KnowledgeWriter`]
//! fans out into the vault:
//!
//! 1. **Light** (`light::extract`) – synchronous line classification.  No I/O.
//! 2. **Deep** (`deep::DeepExtractor`) – a structured-JSON request to a
//!    completion provider, with every failure collapsing to
//!    [`deep::Extraction::NoExtraction`].

pub mod deep;
pub mod light;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::System => "System",
        }
    }
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
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

/// Output of the light extractor.  Each list holds at most
/// [`light::MAX_PER_KIND`] distinct entries in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedKnowledge {
    pub decisions: Vec<String>,
    pub solutions: Vec<String>,
    pub learnings: Vec<String>,
    pub todos: Vec<String>,
    pub commands: Vec<String>,
    pub project_context: Option<String>,
}

impl ExtractedKnowledge {
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
            && self.solutions.is_empty()
            && self.learnings.is_empty()
            && self.todos.is_empty()
            && self.commands.is_empty()
    }
}

/// Render turns as `User:` / `Assistant:` blocks, keeping only the trailing
/// `max_chars` characters when the transcript is longer.
pub fn format_conversation(turns: &[Turn], max_chars: usize) -> String {
    let rendered = turns
        .iter()
        .filter(|turn| !turn.content.trim().is_empty())
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");

    let total = rendered.chars().count();
    if max_chars == 0 || total <= max_chars {
        return rendered;
    }
    rendered.chars().skip(total - max_chars).collect()
}
