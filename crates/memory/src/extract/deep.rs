//! Provider-assisted structured extraction.
//!
//! The runtime hands over the conversation, [`build_prompt`] asks the model
//! for one JSON object, and [`parse_response`] decodes the reply.  Nothing in
//! here returns an error: cancellation, timeouts, transport failures and
//! undecodable replies all become [`Extraction::NoExtraction`] so the caller
//! writes nothing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use paravault_config::{ExtractionConfig, LlmConfig};
use paravault_llm::{CompletionProvider, strip_code_fence};

use super::{Turn, format_conversation};

/// Structured record returned by the model.
///
/// `summary` is mandatory; list fields and `projectNotes` default to empty
/// when the model leaves them out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepExtraction {
    pub summary: String,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub solutions: Vec<String>,
    #[serde(default)]
    pub learnings: Vec<String>,
    #[serde(default)]
    pub todos: Vec<String>,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub project_notes: String,
    #[serde(default)]
    pub resource_topics: Vec<String>,
}

impl DeepExtraction {
    fn cleaned(mut self) -> Self {
        fn tidy(items: &mut Vec<String>) {
            for item in items.iter_mut() {
                *item = item.trim().to_string();
            }
            items.retain(|item| !item.is_empty());
        }

        self.summary = self.summary.trim().to_string();
        self.project_notes = self.project_notes.trim().to_string();
        tidy(&mut self.decisions);
        tidy(&mut self.solutions);
        tidy(&mut self.learnings);
        tidy(&mut self.todos);
        tidy(&mut self.commands);
        tidy(&mut self.resource_topics);
        self
    }
}

/// Either a complete record or nothing at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Extracted(DeepExtraction),
    NoExtraction,
}

impl Extraction {
    pub fn is_extracted(&self) -> bool {
        matches!(self, Self::Extracted(_))
    }

    pub fn into_option(self) -> Option<DeepExtraction> {
        match self {
            Self::Extracted(extraction) => Some(extraction),
            Self::NoExtraction => None,
        }
    }
}

/// Deterministic extraction prompt for `conversation`.
pub fn build_prompt(conversation: &str, project_hint: Option<&str>) -> String {
    let project = project_hint
        .map(str::trim)
        .filter(|hint| !hint.is_empty())
        .unwrap_or("(none)");

    format!(
        "You are extracting durable knowledge from a working session so it can be filed \
into a personal knowledge base. Read the conversation below and answer with ONE JSON \
object with exactly these fields:

{{
  \"summary\": \"one sentence describing what was accomplished\",
  \"decisions\": [\"choices that were made, with the reason if stated\"],
  \"solutions\": [\"problems that were solved and how\"],
  \"learnings\": [\"non-obvious facts or insights worth remembering\"],
  \"todos\": [\"follow-up work that is still open\"],
  \"commands\": [\"shell commands worth keeping, verbatim\"],
  \"projectNotes\": \"progress on the current project in one or two sentences\",
  \"resourceTopics\": [\"reusable reference topics that deserve their own note\"]
}}

Use empty arrays (and an empty string for projectNotes) when nothing applies.
Respond with the JSON object only: no prose, no code fences.

PROJECT: {project}

CONVERSATION:
{conversation}
"
    )
}

/// Decode a model reply.  One leading and one trailing code-fence line are
/// tolerated; anything that does not decode into a full record is
/// `NoExtraction`.
pub fn parse_response(raw: &str) -> Extraction {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Extraction::NoExtraction;
    }

    match serde_json::from_str::<DeepExtraction>(body) {
        Ok(extraction) => Extraction::Extracted(extraction.cleaned()),
        Err(err) => {
            debug!(%err, "deep extraction reply did not decode");
            Extraction::NoExtraction
        }
    }
}

/// Runs one extraction round trip against a completion provider.
#[derive(Debug, Clone)]
pub struct DeepExtractor {
    timeout: Duration,
    max_conversation_chars: usize,
}

impl DeepExtractor {
    pub fn new(timeout: Duration, max_conversation_chars: usize) -> Self {
        Self {
            timeout,
            max_conversation_chars,
        }
    }

    pub fn from_config(llm: &LlmConfig, extraction: &ExtractionConfig) -> Self {
        Self::new(
            Duration::from_secs(llm.request_timeout_secs.max(1)),
            extraction.max_conversation_chars,
        )
    }

    /// Ask `provider` for a structured record of `turns`.
    ///
    /// `cancel` flipping to `true` abandons the request.  A dropped sender is
    /// treated as "never cancelled".
    pub async fn extract(
        &self,
        provider: &dyn CompletionProvider,
        turns: &[Turn],
        project_hint: Option<&str>,
        mut cancel: watch::Receiver<bool>,
    ) -> Extraction {
        let conversation = format_conversation(turns, self.max_conversation_chars);
        if conversation.trim().is_empty() {
            debug!("deep extraction skipped: empty conversation");
            return Extraction::NoExtraction;
        }
        if *cancel.borrow() {
            return Extraction::NoExtraction;
        }

        let prompt = build_prompt(&conversation, project_hint);
        let request = tokio::time::timeout(self.timeout, provider.complete(&prompt));

        let reply = tokio::select! {
            outcome = request => outcome,
            _ = cancelled(&mut cancel) => {
                info!(provider = provider.name(), "deep extraction cancelled");
                return Extraction::NoExtraction;
            }
        };

        match reply {
            Ok(Ok(raw)) => {
                let extraction = parse_response(&raw);
                if !extraction.is_extracted() {
                    warn!(provider = provider.name(), reply_chars = raw.len(), "deep extraction reply unusable");
                }
                extraction
            }
            Ok(Err(err)) => {
                warn!(?err, provider = provider.name(), "deep extraction request failed");
                Extraction::NoExtraction
            }
            Err(_) => {
                warn!(
                    provider = provider.name(),
                    timeout_secs = self.timeout.as_secs_f32(),
                    "deep extraction timed out"
                );
                Extraction::NoExtraction
            }
        }
    }
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|flag| *flag).await.is_err() {
        std::future::pending::<()>().await;
    }
}
