//! Search collaborator.
//!
//! Hosts may plug in any ranked search backend; failures from it are never
//! surfaced, they read as "no results".  [`ScanSearch`] is the built-in
//! fallback that simply reads every document.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::category::{Category, CategoryStore};
use crate::document::{VaultError, derive_title, read_document};

const TITLE_WEIGHT: f32 = 3.0;
const SNIPPET_MAX_CHARS: usize = 160;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub path: PathBuf,
    pub title: String,
    pub score: f32,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;
}

/// Run `provider`, treating errors and non-finite scores as absent results.
pub async fn search_or_empty(provider: &dyn SearchProvider, query: &str, limit: usize) -> Vec<SearchResult> {
    if query.trim().is_empty() || limit == 0 {
        return Vec::new();
    }
    match provider.search(query, limit).await {
        Ok(mut results) => {
            results.retain(|result| result.score.is_finite());
            results.truncate(limit);
            results
        }
        Err(err) => {
            warn!(?err, query, "search provider failed; returning no results");
            Vec::new()
        }
    }
}

/// Term-frequency scan over every category and the daily notes.
#[derive(Debug, Clone)]
pub struct ScanSearch {
    store: CategoryStore,
}

impl ScanSearch {
    pub fn new(store: CategoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SearchProvider for ScanSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let store = self.store.clone();
        let query = query.to_string();
        let results = tokio::task::spawn_blocking(move || scan(&store, &query, limit)).await??;
        Ok(results)
    }
}

fn scan(store: &CategoryStore, query: &str, limit: usize) -> Result<Vec<SearchResult>, VaultError> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    for category in Category::ALL {
        candidates.extend(store.list(category)?.into_iter().map(|note| note.path));
    }
    candidates.extend(daily_documents(store)?);

    let mut results = Vec::new();
    for path in candidates {
        let content = match read_document(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!(%err, "search skipped unreadable document");
                continue;
            }
        };
        if let Some(result) = score_document(&path, &content, &terms) {
            results.push(result);
        }
    }

    results.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then_with(|| left.path.cmp(&right.path))
    });
    results.truncate(limit);
    debug!(query, hits = results.len(), "scan search finished");
    Ok(results)
}

fn daily_documents(store: &CategoryStore) -> Result<Vec<PathBuf>, VaultError> {
    let dir = store.daily_dir();
    let reader = match fs::read_dir(&dir) {
        Ok(reader) => reader,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(VaultError::List { path: dir, source }),
    };

    let mut paths = Vec::new();
    for entry in reader {
        let path = entry
            .map_err(|source| VaultError::List {
                path: dir.clone(),
                source,
            })?
            .path();
        let is_document = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy() == store.extension());
        if is_document {
            paths.push(path);
        }
    }
    Ok(paths)
}

fn score_document(path: &Path, content: &str, terms: &[String]) -> Option<SearchResult> {
    let title = derive_title(content, path);
    let lowered_title = title.to_lowercase();
    let lowered = content.to_lowercase();

    let score: f32 = terms
        .iter()
        .map(|term| {
            lowered.matches(term.as_str()).count() as f32
                + lowered_title.matches(term.as_str()).count() as f32 * TITLE_WEIGHT
        })
        .sum();
    if score == 0.0 {
        return None;
    }

    let body_lines = || {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && *line != "---")
    };
    let snippet = body_lines()
        .find(|line| {
            let line = line.to_lowercase();
            terms.iter().any(|term| line.contains(term.as_str()))
        })
        .or_else(|| body_lines().next())
        .unwrap_or_default()
        .chars()
        .take(SNIPPET_MAX_CHARS)
        .collect();

    Some(SearchResult {
        path: path.to_path_buf(),
        title,
        score,
        snippet,
    })
}
