//! One document per calendar date.
//!
//! A daily note is created lazily the first time anything touches its date:
//! the `daily` template (or a built-in skeleton) is instantiated and the
//! previous day's unfinished priorities are carried over.  After creation the
//! note is only ever changed by line splices into its sections.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use chrono::{Days, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::category::CategoryStore;
use crate::clock::Clock;
use crate::document::{VaultError, read_document, read_optional, write_document};
use crate::section::{self, HeaderMatch};

pub const PRIORITIES: &str = "Priorities";
pub const LOG: &str = "Log";
pub const NOTES: &str = "Notes";
pub const DECISIONS: &str = "Decisions";
pub const LEARNED: &str = "Learned";
pub const PROGRESS: &str = "Progress";

/// Sections every built-in daily note carries, in document order.
pub const DAILY_SECTIONS: [&str; 5] = [PRIORITIES, LOG, NOTES, DECISIONS, LEARNED];

pub const ROLLOVER_MARKER: &str = "(rolled over)";

const DAILY_TEMPLATE: &str = "daily";

static DAILY_STEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid daily stem regex"));

/// One checklist line of the Priorities section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityItem {
    pub text: String,
    pub done: bool,
}

impl PriorityItem {
    pub fn to_line(&self) -> String {
        let mark = if self.done { 'x' } else { ' ' };
        if self.text.is_empty() {
            format!("- [{mark}]")
        } else {
            format!("- [{mark}] {}", self.text)
        }
    }
}

/// `Some((done, text))` for `- [ ] text` / `- [x] text` lines.
fn parse_checklist(line: &str) -> Option<(bool, &str)> {
    let rest = line.trim_start().strip_prefix("- [")?;
    let mut chars = rest.chars();
    let done = match chars.next()? {
        ' ' => false,
        'x' | 'X' => true,
        _ => return None,
    };
    let rest = chars.as_str().strip_prefix(']')?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some((done, rest.trim()))
}

fn is_empty_placeholder(line: &str) -> bool {
    matches!(parse_checklist(line), Some((false, "")))
}

fn strip_rollover_marker(text: &str) -> &str {
    let mut text = text.trim_end();
    while let Some(stripped) = text.strip_suffix(ROLLOVER_MARKER) {
        text = stripped.trim_end();
    }
    text
}

fn render_template(template: &str, date: NaiveDate) -> String {
    template
        .replace("{{date}}", &date.format("%Y-%m-%d").to_string())
        .replace("{{weekday}}", &date.format("%A").to_string())
        .replace("{{date_long}}", &date.format("%B %-d, %Y").to_string())
}

fn builtin_skeleton(date: NaiveDate) -> String {
    render_template(
        "---\ndate: {{date}}\ntype: daily\n---\n\n# {{weekday}}, {{date_long}}\n\n## Priorities\n\n- [ ] \n\n## Log\n\n## Notes\n\n## Decisions\n\n## Learned\n",
        date,
    )
}

/// Lifecycle and section access for daily notes.
#[derive(Clone)]
pub struct DailyNoteEngine {
    store: CategoryStore,
    clock: Arc<dyn Clock>,
}

impl DailyNoteEngine {
    pub fn new(store: CategoryStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &CategoryStore {
        &self.store
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        let stem = date.format("%Y-%m-%d").to_string();
        self.store.daily_dir().join(self.store.file_name(&stem))
    }

    /// Create the note for `date` if it does not exist yet and return its path.
    pub fn ensure(&self, date: NaiveDate) -> Result<PathBuf, VaultError> {
        let path = self.path_for(date);
        if path.exists() {
            return Ok(path);
        }

        self.store.ensure_layout()?;

        let template_path = self.store.template_path(DAILY_TEMPLATE);
        let mut content = match read_optional(&template_path)? {
            Some(template) => render_template(&template, date),
            None => builtin_skeleton(date),
        };

        let carried = self.unfinished_from_previous_day(date)?;
        if !carried.is_empty() {
            match splice_rollover(&content, &carried) {
                Some(updated) => content = updated,
                None => debug!(
                    date = %date,
                    "daily template has no single empty priority line; rollover skipped"
                ),
            }
        }

        write_document(&path, &content)?;
        debug!(path = %path.display(), carried = carried.len(), "daily note created");
        Ok(path)
    }

    /// Unchecked, non-empty priorities of the day before `date`, annotated
    /// for carrying over.
    fn unfinished_from_previous_day(&self, date: NaiveDate) -> Result<Vec<String>, VaultError> {
        let Some(yesterday) = date.checked_sub_days(Days::new(1)) else {
            return Ok(Vec::new());
        };
        let Some(content) = read_optional(&self.path_for(yesterday))? else {
            return Ok(Vec::new());
        };
        let Some(lines) = section::section_lines(&content, PRIORITIES) else {
            return Ok(Vec::new());
        };

        Ok(lines
            .into_iter()
            .filter_map(parse_checklist)
            .filter(|(done, _)| !done)
            .map(|(_, text)| strip_rollover_marker(text))
            .filter(|text| !text.is_empty())
            .map(|text| format!("- [ ] {text} {ROLLOVER_MARKER}"))
            .collect())
    }

    /// Insert `new_line` as the first entry of section `name`.
    ///
    /// Returns `Ok(false)` without touching the file when the section header
    /// is absent.
    pub fn append_to_section(&self, name: &str, new_line: &str, date: NaiveDate) -> Result<bool, VaultError> {
        let path = self.ensure(date)?;
        let content = read_document(&path)?;
        let Some(updated) = section::insert_line(&content, HeaderMatch::Exact(name), new_line) else {
            debug!(section = name, path = %path.display(), "section missing; nothing appended");
            return Ok(false);
        };
        write_document(&path, &updated)?;
        Ok(true)
    }

    /// Add `- HH:MM — text` to the first `## Log…` section of `date`'s note,
    /// using the current time.  Without any Log header the line is appended
    /// to the end of the document instead.
    pub fn append_to_log(&self, text: &str, date: NaiveDate) -> Result<(), VaultError> {
        let path = self.ensure(date)?;
        let content = read_document(&path)?;
        let line = format!("- {} — {}", self.clock.now().format("%H:%M"), text.trim());
        let updated = section::insert_line(&content, HeaderMatch::Prefix(LOG), &line)
            .unwrap_or_else(|| section::append_at_end(&content, &line));
        write_document(&path, &updated)
    }

    pub fn read_content(&self, date: NaiveDate) -> Result<String, VaultError> {
        let path = self.ensure(date)?;
        read_document(&path)
    }

    pub fn get_priorities(&self, date: NaiveDate) -> Result<Vec<PriorityItem>, VaultError> {
        let content = self.read_content(date)?;
        let Some(lines) = section::section_lines(&content, PRIORITIES) else {
            return Ok(Vec::new());
        };

        Ok(lines
            .into_iter()
            .filter_map(parse_checklist)
            .filter(|(done, text)| *done || !text.is_empty())
            .map(|(done, text)| PriorityItem {
                text: text.to_string(),
                done,
            })
            .collect())
    }

    /// Replace the whole Priorities body with `lines`.  `Ok(false)` when the
    /// note has no Priorities header.
    pub fn write_priorities(&self, lines: &[String], date: NaiveDate) -> Result<bool, VaultError> {
        let path = self.ensure(date)?;
        let content = read_document(&path)?;
        let Some(updated) = section::replace_body(&content, PRIORITIES, lines) else {
            return Ok(false);
        };
        write_document(&path, &updated)?;
        Ok(true)
    }

    /// Dates (`YYYY-MM-DD`) of the newest `limit` daily notes.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<String>, VaultError> {
        let dir = self.store.daily_dir();
        let reader = match fs::read_dir(&dir) {
            Ok(reader) => reader,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(VaultError::List { path: dir, source }),
        };

        let mut dates = Vec::new();
        for entry in reader {
            let entry = entry.map_err(|source| VaultError::List {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            let matches_extension = path
                .extension()
                .map(|ext| ext.to_string_lossy() == self.store.extension())
                .unwrap_or(false);
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };
            if matches_extension && DAILY_STEM_RE.is_match(&stem) {
                dates.push(stem);
            }
        }

        dates.sort_by(|left, right| right.cmp(left));
        dates.truncate(limit);
        Ok(dates)
    }
}

/// Put `carried` in place of the template's single empty checklist line,
/// keeping that line after them.  `None` unless exactly one such line exists.
fn splice_rollover(content: &str, carried: &[String]) -> Option<String> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut anchors = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| is_empty_placeholder(line))
        .map(|(index, _)| index);
    let anchor = anchors.next()?;
    if anchors.next().is_some() {
        return None;
    }

    let mut rebuilt: Vec<&str> = Vec::with_capacity(lines.len() + carried.len());
    rebuilt.extend_from_slice(&lines[..anchor]);
    rebuilt.extend(carried.iter().map(String::as_str));
    rebuilt.extend_from_slice(&lines[anchor..]);
    Some(rebuilt.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> DailyNoteEngine {
        let clock = FixedClock::at(2026, 10, 17, 14, 5).unwrap();
        DailyNoteEngine::new(CategoryStore::new(dir.path()), Arc::new(clock))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn checklist_parsing() {
        assert_eq!(parse_checklist("- [ ] write docs"), Some((false, "write docs")));
        assert_eq!(parse_checklist("- [X] shipped"), Some((true, "shipped")));
        assert_eq!(parse_checklist("- [x]"), Some((true, "")));
        assert_eq!(parse_checklist("- [ ] "), Some((false, "")));
        assert_eq!(parse_checklist("- [y] nope"), None);
        assert_eq!(parse_checklist("- [ ]glued"), None);
        assert_eq!(parse_checklist("* [ ] star"), None);
    }

    #[test]
    fn path_for_uses_iso_date() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        assert!(engine.path_for(date(2026, 1, 5)).ends_with("daily/2026-01-05.md"));
    }

    #[test]
    fn ensure_on_empty_vault_builds_layout_and_skeleton() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("fresh");
        let engine = DailyNoteEngine::new(
            CategoryStore::new(&root),
            Arc::new(FixedClock::at(2026, 10, 17, 9, 0).unwrap()),
        );

        let path = engine.ensure(engine.today()).unwrap();
        assert!(root.join("templates").is_dir());
        assert!(root.join("inbox").is_dir());
        assert!(path.ends_with("daily/2026-10-17.md"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("# Saturday, October 17, 2026"));
        for name in DAILY_SECTIONS {
            let header = format!("## {name}");
            assert_eq!(content.lines().filter(|l| *l == header).count(), 1, "{header}");
        }
        assert!(engine.get_priorities(engine.today()).unwrap().is_empty());
    }

    #[test]
    fn ensure_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let day = date(2026, 10, 17);
        let path = engine.ensure(day).unwrap();
        fs::write(&path, "# edited by hand\n").unwrap();
        assert_eq!(engine.ensure(day).unwrap(), path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "# edited by hand\n");
    }

    #[test]
    fn template_placeholders_are_substituted() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let template = engine.store().template_path("daily");
        fs::create_dir_all(template.parent().unwrap()).unwrap();
        fs::write(
            &template,
            "# {{date}} ({{weekday}})\n{{date_long}} / {{date}}\n## Priorities\n- [ ]\n## Log\n",
        )
        .unwrap();

        let content = engine.read_content(date(2026, 3, 2)).unwrap();
        assert!(content.starts_with("# 2026-03-02 (Monday)\nMarch 2, 2026 / 2026-03-02\n"));
    }

    #[test]
    fn rollover_carries_unchecked_items_only() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let yesterday = date(2026, 10, 16);
        engine
            .write_priorities(
                &[
                    "- [ ] X".to_string(),
                    "- [x] Y".to_string(),
                    "- [ ] Z (rolled over)".to_string(),
                    "- [ ] ".to_string(),
                ],
                yesterday,
            )
            .unwrap();

        let items = engine.get_priorities(date(2026, 10, 17)).unwrap();
        assert_eq!(
            items,
            vec![
                PriorityItem { text: "X (rolled over)".to_string(), done: false },
                PriorityItem { text: "Z (rolled over)".to_string(), done: false },
            ]
        );

        let content = engine.read_content(date(2026, 10, 17)).unwrap();
        assert!(!content.contains("] Y"));
        assert!(content.contains("- [ ] Z (rolled over)\n- [ ] \n"));
    }

    #[test]
    fn rollover_skipped_when_template_has_no_single_anchor() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let template = engine.store().template_path("daily");
        fs::create_dir_all(template.parent().unwrap()).unwrap();
        fs::write(&template, "## Priorities\n- [ ]\n- [ ]\n## Log\n").unwrap();

        fs::create_dir_all(engine.store().daily_dir()).unwrap();
        fs::write(engine.path_for(date(2026, 10, 16)), "## Priorities\n- [ ] carry me\n").unwrap();

        let content = engine.read_content(date(2026, 10, 17)).unwrap();
        assert_eq!(content, "## Priorities\n- [ ]\n- [ ]\n## Log\n");
    }

    #[test]
    fn append_to_section_inserts_newest_first() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let day = date(2026, 10, 17);
        assert!(engine.append_to_section(NOTES, "- first", day).unwrap());
        assert!(engine.append_to_section(NOTES, "- second", day).unwrap());

        let content = engine.read_content(day).unwrap();
        assert!(content.contains("## Notes\n- second\n- first\n"));
    }

    #[test]
    fn append_to_missing_section_leaves_document_unchanged() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let day = date(2026, 10, 17);
        let before = engine.read_content(day).unwrap();
        assert!(!engine.append_to_section("Retro", "- nothing", day).unwrap());
        assert_eq!(engine.read_content(day).unwrap(), before);
    }

    #[test]
    fn log_lines_use_clock_time_and_prefix_header() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let day = date(2026, 10, 1);
        fs::create_dir_all(engine.store().daily_dir()).unwrap();
        fs::write(engine.path_for(day), "# Day\n## Log (work)\n- 08:00 — earlier\n").unwrap();

        engine.append_to_log("deployed", day).unwrap();
        assert_eq!(
            engine.read_content(day).unwrap(),
            "# Day\n## Log (work)\n- 14:05 — deployed\n- 08:00 — earlier\n"
        );
    }

    #[test]
    fn log_without_header_appends_at_end() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let day = date(2026, 10, 1);
        fs::create_dir_all(engine.store().daily_dir()).unwrap();
        fs::write(engine.path_for(day), "# Day\n## Notes\n- n").unwrap();

        engine.append_to_log("no log section", day).unwrap();
        assert_eq!(
            engine.read_content(day).unwrap(),
            "# Day\n## Notes\n- n\n- 14:05 — no log section\n"
        );
    }

    #[test]
    fn priorities_round_trip() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let day = date(2026, 10, 17);
        let lines = vec![
            "- [ ] Write release notes".to_string(),
            "- [x] Fix flaky test".to_string(),
            "- [X] ".to_string(),
            "not a checklist line".to_string(),
        ];
        assert!(engine.write_priorities(&lines, day).unwrap());

        let items = engine.get_priorities(day).unwrap();
        assert_eq!(
            items,
            vec![
                PriorityItem { text: "Write release notes".to_string(), done: false },
                PriorityItem { text: "Fix flaky test".to_string(), done: true },
                PriorityItem { text: String::new(), done: true },
            ]
        );
        assert_eq!(items[0].to_line(), "- [ ] Write release notes");
        assert_eq!(items[2].to_line(), "- [x]");
    }

    #[test]
    fn write_priorities_without_header_is_noop() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let day = date(2026, 10, 1);
        fs::create_dir_all(engine.store().daily_dir()).unwrap();
        fs::write(engine.path_for(day), "# Day\n").unwrap();

        assert!(!engine.write_priorities(&["- [ ] a".to_string()], day).unwrap());
        assert_eq!(engine.read_content(day).unwrap(), "# Day\n");
    }

    #[test]
    fn priorities_stop_at_the_next_header() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let day = date(2026, 10, 2);
        fs::create_dir_all(engine.store().daily_dir()).unwrap();
        fs::write(engine.path_for(day), "## Priorities\n- [ ] a\n## Log\n- [ ] not a priority\n").unwrap();

        assert_eq!(
            engine.get_priorities(day).unwrap(),
            vec![PriorityItem { text: "a".to_string(), done: false }]
        );
    }

    #[test]
    fn list_recent_filters_and_orders() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let daily = engine.store().daily_dir();
        fs::create_dir_all(&daily).unwrap();
        for name in ["2026-10-15.md", "2026-10-17.md", "2026-09-30.md", "notes.md", "2026-10-16.txt", "2026-1-1.md"] {
            fs::write(daily.join(name), "").unwrap();
        }

        assert_eq!(engine.list_recent(2).unwrap(), vec!["2026-10-17", "2026-10-15"]);
        assert_eq!(engine.list_recent(10).unwrap().len(), 3);
    }

    #[test]
    fn list_recent_without_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(engine(&dir).list_recent(5).unwrap().is_empty());
    }
}
