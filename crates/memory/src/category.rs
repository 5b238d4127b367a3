//! Category layout of the vault and note enumeration.
//!
//! ```text
//! root/
//! ├── inbox/        unsorted captures
//! ├── projects/     active work (optionally grouped one level deep)
//! ├── areas/        ongoing responsibilities
//! ├── resources/    reference material
//! ├── archive/
//! ├── daily/        YYYY-MM-DD.<ext>
//! └── templates/    <type>.<ext>
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use paravault_config::VaultConfig;

use crate::document::{VaultError, derive_title, read_document, write_document};

const DAILY_DIR: &str = "daily";
const TEMPLATES_DIR: &str = "templates";
const SLUG_MAX_LEN: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Inbox,
    Projects,
    Areas,
    Resources,
    Archive,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Inbox,
        Category::Projects,
        Category::Areas,
        Category::Resources,
        Category::Archive,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Projects => "projects",
            Self::Areas => "areas",
            Self::Resources => "resources",
            Self::Archive => "archive",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inbox" => Ok(Self::Inbox),
            "projects" | "project" => Ok(Self::Projects),
            "areas" | "area" => Ok(Self::Areas),
            "resources" | "resource" => Ok(Self::Resources),
            "archive" => Ok(Self::Archive),
            other => bail!("unknown category '{other}' (expected inbox, projects, areas, resources or archive)"),
        }
    }
}

/// One listed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteInfo {
    pub category: Category,
    /// File stem, or `group/stem` for notes one directory deeper.
    pub name: String,
    pub title: String,
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

/// Resolves categories to directories and enumerates their documents.
///
/// Holds no document state: every call goes back to the filesystem.
#[derive(Debug, Clone)]
pub struct CategoryStore {
    root: PathBuf,
    extension: String,
}

impl CategoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "md".to_string(),
        }
    }

    pub fn from_config(config: &VaultConfig) -> Self {
        Self::new(config.root_path()).with_extension(&config.extension)
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        let trimmed = extension.trim().trim_start_matches('.');
        if !trimmed.is_empty() {
            self.extension = trimmed.to_string();
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn resolve(&self, category: Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    pub fn daily_dir(&self) -> PathBuf {
        self.root.join(DAILY_DIR)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(TEMPLATES_DIR)
    }

    pub fn template_path(&self, kind: &str) -> PathBuf {
        self.templates_dir().join(self.file_name(kind))
    }

    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.extension)
    }

    /// Create every category, daily and template directory.  Idempotent.
    pub fn ensure_layout(&self) -> Result<(), VaultError> {
        let dirs = Category::ALL
            .iter()
            .map(|category| self.resolve(*category))
            .chain([self.daily_dir(), self.templates_dir()]);
        for dir in dirs {
            fs::create_dir_all(&dir).map_err(|source| VaultError::Write { path: dir, source })?;
        }
        Ok(())
    }

    /// Documents directly in the category directory plus those one level
    /// inside each subdirectory, newest first.  A missing directory lists as
    /// empty.
    pub fn list(&self, category: Category) -> Result<Vec<NoteInfo>, VaultError> {
        let dir = self.resolve(category);
        let mut notes = Vec::new();

        for entry in self.read_dir_entries(&dir)? {
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();
            if path.is_dir() {
                for inner in self.read_dir_entries(&path)? {
                    let inner_path = inner.path();
                    if let Some(stem) = self.document_stem(&inner_path) {
                        let name = format!("{file_name}/{stem}");
                        notes.push(self.note_info(category, name, inner_path));
                    }
                }
            } else if let Some(stem) = self.document_stem(&path) {
                notes.push(self.note_info(category, stem, path));
            }
        }

        notes.sort_by(|left, right| {
            right
                .modified
                .cmp(&left.modified)
                .then_with(|| left.name.cmp(&right.name))
        });
        Ok(notes)
    }

    pub fn counts(&self) -> Result<BTreeMap<Category, usize>, VaultError> {
        let mut counts = BTreeMap::new();
        for category in Category::ALL {
            counts.insert(category, self.list(category)?.len());
        }
        Ok(counts)
    }

    /// Note in `category` whose stored name equals `name`, or whose slugified
    /// title equals the slugified `name`.  First match in listing order wins.
    pub fn find_note(&self, category: Category, name: &str) -> Result<Option<NoteInfo>, VaultError> {
        let wanted = slugify(name);
        let notes = self.list(category)?;
        Ok(notes.into_iter().find(|note| {
            note.name == name || (!wanted.is_empty() && slugify(&note.title) == wanted)
        }))
    }

    /// Project whose name or title matches the last segment of `cwd`.
    ///
    /// Lookup failures are logged and reported as no project.
    pub fn detect_project(&self, cwd: &Path) -> Option<String> {
        let segment = cwd.file_name()?.to_string_lossy().to_string();
        match self.find_note(Category::Projects, &segment) {
            Ok(found) => found.map(|note| note.name),
            Err(err) => {
                warn!(?err, cwd = %cwd.display(), "project detection failed");
                None
            }
        }
    }

    /// Write `<category>/<slug>.<ext>` with a `# title` heading followed by
    /// `body`.  An existing note with the same slug is overwritten.
    pub fn create_note(&self, category: Category, title: &str, body: &str) -> Result<PathBuf, VaultError> {
        let slug = slugify(title);
        if slug.is_empty() {
            return Err(VaultError::EmptySlug(title.to_string()));
        }

        let path = self.resolve(category).join(self.file_name(&slug));
        let mut content = format!("# {}\n", title.trim());
        if !body.trim().is_empty() {
            content.push('\n');
            content.push_str(body.trim_end());
            content.push('\n');
        }
        write_document(&path, &content)?;
        debug!(path = %path.display(), %category, "note created");
        Ok(path)
    }

    fn read_dir_entries(&self, dir: &Path) -> Result<Vec<fs::DirEntry>, VaultError> {
        let list_err = |source| VaultError::List {
            path: dir.to_path_buf(),
            source,
        };
        let reader = match fs::read_dir(dir) {
            Ok(reader) => reader,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(list_err(err)),
        };

        let mut entries = Vec::new();
        for entry in reader {
            let entry = entry.map_err(list_err)?;
            // Skip hidden files and in-flight `.tmp` writes.
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    fn document_stem(&self, path: &Path) -> Option<String> {
        if !path.is_file() {
            return None;
        }
        let extension = path.extension()?.to_string_lossy();
        if extension != self.extension.as_str() {
            return None;
        }
        path.file_stem().map(|stem| stem.to_string_lossy().to_string())
    }

    /// An unreadable document (e.g. not UTF-8) is still listed, titled by
    /// its file stem.
    fn note_info(&self, category: Category, name: String, path: PathBuf) -> NoteInfo {
        let content = match read_document(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!(%err, "listing note without a readable title");
                String::new()
            }
        };
        let modified = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        NoteInfo {
            category,
            title: derive_title(&content, &path),
            name,
            path,
            modified: DateTime::<Utc>::from(modified),
        }
    }
}

/// Filesystem-safe identifier for a title: lowercase ASCII alphanumerics,
/// runs of anything else collapsed to one hyphen, no leading or trailing
/// hyphen, at most 60 characters.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;

    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    slug.truncate(SLUG_MAX_LEN);
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn slugify_examples() {
        assert_eq!(slugify("Terraform S3 bucket policy!!"), "terraform-s3-bucket-policy");
        assert_eq!(slugify("  --Hello,   World--  "), "hello-world");
        assert_eq!(slugify("Café au lait"), "caf-au-lait");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slugify_truncates_to_sixty() {
        let slug = slugify(&"abcdefghij ".repeat(10));
        assert_eq!(slug.len(), 60);
        assert!(slug.starts_with("abcdefghij-abcdefghij"));
    }

    #[test]
    fn category_parse_and_display() {
        assert_eq!("Projects".parse::<Category>().unwrap(), Category::Projects);
        assert_eq!("resource".parse::<Category>().unwrap(), Category::Resources);
        assert!("daily".parse::<Category>().is_err());
        assert_eq!(Category::Archive.to_string(), "archive");
    }

    #[test]
    fn resolve_uses_fixed_layout() {
        let store = CategoryStore::new("/vault");
        assert_eq!(store.resolve(Category::Inbox), PathBuf::from("/vault/inbox"));
        assert_eq!(store.daily_dir(), PathBuf::from("/vault/daily"));
        assert_eq!(store.template_path("daily"), PathBuf::from("/vault/templates/daily.md"));
    }

    #[test]
    fn list_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::new(dir.path());
        assert!(store.list(Category::Areas).unwrap().is_empty());
    }

    #[test]
    fn list_includes_grouped_notes_and_sorts_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::new(dir.path());
        let projects = store.resolve(Category::Projects);
        fs::create_dir_all(projects.join("clients")).unwrap();

        fs::write(projects.join("older.md"), "no heading here\n").unwrap();
        sleep(Duration::from_millis(20));
        fs::write(projects.join("clients/acme.md"), "# Acme Rollout\n").unwrap();
        fs::write(projects.join("ignored.txt"), "# Not a note\n").unwrap();
        fs::write(projects.join(".hidden.md"), "# Hidden\n").unwrap();

        let notes = store.list(Category::Projects).unwrap();
        let names: Vec<_> = notes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["clients/acme", "older"]);
        assert_eq!(notes[0].title, "Acme Rollout");
        assert_eq!(notes[1].title, "older");
    }

    #[test]
    fn counts_cover_every_category() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::new(dir.path());
        store.create_note(Category::Inbox, "First", "").unwrap();
        store.create_note(Category::Inbox, "Second", "").unwrap();
        store.create_note(Category::Archive, "Old", "").unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.len(), 5);
        assert_eq!(counts[&Category::Inbox], 2);
        assert_eq!(counts[&Category::Archive], 1);
        assert_eq!(counts[&Category::Projects], 0);
    }

    #[test]
    fn detect_project_by_name_or_title() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::new(dir.path());
        let projects = store.resolve(Category::Projects);
        fs::create_dir_all(&projects).unwrap();
        fs::write(projects.join("infra.md"), "# Infra\n").unwrap();
        fs::write(projects.join("website.md"), "# Marketing Site\n").unwrap();

        assert_eq!(store.detect_project(Path::new("/home/me/code/infra")).as_deref(), Some("infra"));
        assert_eq!(
            store.detect_project(Path::new("/home/me/code/marketing_site")).as_deref(),
            Some("website")
        );
        assert!(store.detect_project(Path::new("/home/me/code/unrelated")).is_none());
    }

    #[test]
    fn create_note_overwrites_on_slug_collision() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::new(dir.path());
        let first = store.create_note(Category::Resources, "Rust Tips", "one").unwrap();
        let second = store.create_note(Category::Resources, "rust tips!", "two").unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(&second).unwrap(), "# rust tips!\n\ntwo\n");
        assert!(matches!(
            store.create_note(Category::Resources, "???", ""),
            Err(VaultError::EmptySlug(_))
        ));
    }

    #[test]
    fn non_utf8_note_is_listed_by_stem() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::new(dir.path());
        store.create_note(Category::Resources, "Tokio", "").unwrap();
        fs::write(store.resolve(Category::Resources).join("latin1.md"), b"# Caf\xe9 notes\n").unwrap();

        let notes = store.list(Category::Resources).unwrap();
        assert_eq!(notes.len(), 2);
        let latin1 = notes.iter().find(|n| n.name == "latin1").unwrap();
        assert_eq!(latin1.title, "latin1");
        assert_eq!(store.counts().unwrap()[&Category::Resources], 2);
    }

    #[test]
    fn custom_extension_is_respected() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::new(dir.path()).with_extension(".txt");
        let path = store.create_note(Category::Areas, "Health", "").unwrap();
        assert!(path.ends_with("areas/health.txt"));
        assert_eq!(store.list(Category::Areas).unwrap().len(), 1);
    }
}
