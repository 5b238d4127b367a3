//! Fans extracted knowledge out into vault documents.
//!
//! Every mutation is a single line splice (or a single new file) applied
//! after the full record is in hand.  Callers learn what changed from the
//! returned [`WriteReport`] rather than from shared state.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use paravault_config::ExtractionMode;
use paravault_llm::CompletionProvider;

use crate::category::{Category, slugify};
use crate::daily::{DECISIONS, DailyNoteEngine, LEARNED, PROGRESS};
use crate::document::{VaultError, read_document, write_document};
use crate::extract::deep::{DeepExtraction, DeepExtractor, Extraction};
use crate::extract::{ExtractedKnowledge, Turn, light};
use crate::section::{self, HeaderMatch};

/// Documents changed by one or more writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub touched: Vec<PathBuf>,
}

impl WriteReport {
    /// True once anything was written; the search index is stale from then on.
    pub fn needs_reindex(&self) -> bool {
        !self.touched.is_empty()
    }

    pub fn merge(&mut self, other: WriteReport) {
        for path in other.touched {
            self.touch(path);
        }
    }

    fn touch(&mut self, path: PathBuf) {
        if !self.touched.contains(&path) {
            self.touched.push(path);
        }
    }
}

pub struct KnowledgeWriter {
    daily: DailyNoteEngine,
    deep: DeepExtractor,
}

impl KnowledgeWriter {
    pub fn new(daily: DailyNoteEngine, deep: DeepExtractor) -> Self {
        Self { daily, deep }
    }

    pub fn daily(&self) -> &DailyNoteEngine {
        &self.daily
    }

    /// Persist a light record: one Log summary (only when decisions,
    /// solutions or learnings were found), then decisions and learnings as
    /// bullets.  Solutions, todos and commands only feed the summary counts.
    pub fn write_light(&self, knowledge: &ExtractedKnowledge, date: NaiveDate) -> Result<WriteReport, VaultError> {
        let mut report = WriteReport::default();

        if let Some(summary) = light_summary(knowledge) {
            self.daily.append_to_log(&summary, date)?;
            report.touch(self.daily.path_for(date));
        }
        self.append_bullets(DECISIONS, &knowledge.decisions, date, &mut report)?;
        self.append_bullets(LEARNED, &knowledge.learnings, date, &mut report)?;

        debug!(%date, touched = report.touched.len(), "light knowledge written");
        Ok(report)
    }

    /// Persist a deep record across the daily note, the project's Progress
    /// section, resource stubs and one inbox capture.
    ///
    /// Everything that needs reading (project note, existing resources) is
    /// resolved before the first write, so a storage fault there leaves the
    /// vault untouched.
    pub fn write_deep(
        &self,
        extraction: &DeepExtraction,
        project_hint: Option<&str>,
        date: NaiveDate,
    ) -> Result<WriteReport, VaultError> {
        let project = project_hint.map(str::trim).filter(|hint| !hint.is_empty());
        let progress = match project {
            Some(project) => self.plan_progress(project, extraction, date)?,
            None => None,
        };
        let stubs = self.plan_resource_stubs(&extraction.resource_topics)?;

        let mut report = WriteReport::default();
        let summary = deep_summary(extraction);
        let line = match project {
            Some(project) => format!("[{project}] {summary}"),
            None => summary,
        };
        self.daily.append_to_log(&line, date)?;
        report.touch(self.daily.path_for(date));
        self.append_bullets(DECISIONS, &extraction.decisions, date, &mut report)?;
        self.append_bullets(LEARNED, &extraction.learnings, date, &mut report)?;

        if let Some((path, updated)) = progress {
            write_document(&path, &updated)?;
            report.touch(path);
        }
        for topic in stubs {
            self.create_resource_stub(topic, project, date, &mut report)?;
        }
        self.write_capture(extraction, project, &mut report)?;

        info!(%date, project = project.unwrap_or("-"), touched = report.touched.len(), "deep knowledge written");
        Ok(report)
    }

    /// Extract from `turns` with the configured mode and write the result.
    ///
    /// Deep mode without a provider, or with any extraction failure, writes
    /// nothing and does not fall back to light extraction.
    pub async fn capture_session(
        &self,
        turns: &[Turn],
        project_hint: Option<&str>,
        mode: ExtractionMode,
        provider: Option<&dyn CompletionProvider>,
        cancel: watch::Receiver<bool>,
        date: NaiveDate,
    ) -> Result<WriteReport, VaultError> {
        match mode {
            ExtractionMode::Light => {
                let knowledge = light::extract(turns, project_hint);
                if knowledge.is_empty() {
                    debug!("light extraction found nothing");
                    return Ok(WriteReport::default());
                }
                self.write_light(&knowledge, date)
            }
            ExtractionMode::Deep => {
                let Some(provider) = provider else {
                    warn!("deep extraction requested without a completion provider");
                    return Ok(WriteReport::default());
                };
                match self.deep.extract(provider, turns, project_hint, cancel).await {
                    Extraction::Extracted(extraction) => self.write_deep(&extraction, project_hint, date),
                    Extraction::NoExtraction => Ok(WriteReport::default()),
                }
            }
        }
    }

    /// Newest-first insertion, so items go in reverse to read in order.
    fn append_bullets(
        &self,
        section: &str,
        items: &[String],
        date: NaiveDate,
        report: &mut WriteReport,
    ) -> Result<(), VaultError> {
        for item in items.iter().rev() {
            if self.daily.append_to_section(section, &format!("- {item}"), date)? {
                report.touch(self.daily.path_for(date));
            }
        }
        Ok(())
    }

    /// Project note path and its updated text, when the project exists and
    /// has a Progress section.
    fn plan_progress(
        &self,
        project: &str,
        extraction: &DeepExtraction,
        date: NaiveDate,
    ) -> Result<Option<(PathBuf, String)>, VaultError> {
        let note_text = if extraction.project_notes.is_empty() {
            extraction.summary.as_str()
        } else {
            extraction.project_notes.as_str()
        };
        if note_text.is_empty() {
            return Ok(None);
        }

        let store = self.daily.store();
        let Some(note) = store.find_note(Category::Projects, project)? else {
            debug!(project, "no project document; progress not recorded");
            return Ok(None);
        };

        let content = read_document(&note.path)?;
        let line = format!("- {}: {note_text}", date.format("%Y-%m-%d"));
        let Some(updated) = section::insert_line(&content, HeaderMatch::Exact(PROGRESS), &line) else {
            debug!(project, path = %note.path.display(), "project has no Progress section");
            return Ok(None);
        };
        Ok(Some((note.path, updated)))
    }

    /// Topics whose slug matches neither `resources/<slug>` nor the last name
    /// segment of any listed resource.  Repeated slugs are kept once.
    fn plan_resource_stubs<'a>(&self, topics: &'a [String]) -> Result<Vec<&'a str>, VaultError> {
        if topics.is_empty() {
            return Ok(Vec::new());
        }

        let store = self.daily.store();
        let mut known: HashSet<String> = store
            .list(Category::Resources)?
            .into_iter()
            .filter_map(|note| note.name.rsplit('/').next().map(ToString::to_string))
            .collect();

        let mut planned = Vec::new();
        for topic in topics {
            let slug = slugify(topic);
            if slug.is_empty() {
                continue;
            }
            let direct = store.resolve(Category::Resources).join(store.file_name(&slug));
            if direct.exists() || !known.insert(slug) {
                debug!(topic = topic.as_str(), "resource already documented");
                continue;
            }
            planned.push(topic.as_str());
        }
        Ok(planned)
    }

    fn create_resource_stub(
        &self,
        topic: &str,
        project: Option<&str>,
        date: NaiveDate,
        report: &mut WriteReport,
    ) -> Result<(), VaultError> {
        let mut origin = format!("a session on {}", date.format("%Y-%m-%d"));
        if let Some(project) = project {
            origin.push_str(&format!(" (project: {project})"));
        }
        let body = format!("> Stub created from {origin}.\n\n## Summary\n\n## Details\n\n## Links\n");
        let path = self.daily.store().create_note(Category::Resources, topic, &body)?;
        report.touch(path);
        Ok(())
    }

    fn write_capture(
        &self,
        extraction: &DeepExtraction,
        project: Option<&str>,
        report: &mut WriteReport,
    ) -> Result<(), VaultError> {
        let bullets: Vec<String> = extraction
            .solutions
            .iter()
            .map(|item| format!("- Solution: {item}"))
            .chain(extraction.commands.iter().map(|item| format!("- Command: {item}")))
            .chain(extraction.todos.iter().map(|item| format!("- TODO: {item}")))
            .collect();
        if bullets.is_empty() {
            return Ok(());
        }

        let now = self.daily.clock().now();
        let store = self.daily.store();
        let stem = format!(
            "capture-{}-{}",
            now.format("%Y%m%d-%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let path = store.resolve(Category::Inbox).join(store.file_name(&stem));

        let mut content = format!("# Session capture {}\n\n", now.format("%Y-%m-%d %H:%M"));
        if let Some(project) = project {
            content.push_str(&format!("Project: {project}\n\n"));
        }
        if !extraction.summary.is_empty() {
            content.push_str(&format!("> {}\n\n", extraction.summary));
        }
        content.push_str(&bullets.join("\n"));
        content.push('\n');

        write_document(&path, &content)?;
        report.touch(path);
        Ok(())
    }
}

/// `2 decisions, 1 learning`.  `None` when every count is zero.
fn count_phrase(counts: &[(usize, &str)]) -> Option<String> {
    let parts: Vec<String> = counts
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, noun)| {
            if *count == 1 {
                format!("{count} {noun}")
            } else {
                format!("{count} {noun}s")
            }
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// `[project] 2 decisions, 1 learning`.  `None` when there is nothing to count.
fn light_summary(knowledge: &ExtractedKnowledge) -> Option<String> {
    let joined = count_phrase(&[
        (knowledge.decisions.len(), "decision"),
        (knowledge.solutions.len(), "solution"),
        (knowledge.learnings.len(), "learning"),
    ])?;
    Some(match &knowledge.project_context {
        Some(project) => format!("[{project}] {joined}"),
        None => joined,
    })
}

/// The model's summary, or a count line when it left the summary blank.
fn deep_summary(extraction: &DeepExtraction) -> String {
    if !extraction.summary.is_empty() {
        return extraction.summary.clone();
    }
    count_phrase(&[
        (extraction.decisions.len(), "decision"),
        (extraction.solutions.len(), "solution"),
        (extraction.learnings.len(), "learning"),
        (extraction.todos.len(), "todo"),
        (extraction.commands.len(), "command"),
    ])
    .unwrap_or_else(|| "session captured".to_string())
}
