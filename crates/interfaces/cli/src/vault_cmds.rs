use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use tokio::sync::watch;
use tracing::{info, warn};

use paravault_config::{AppConfig, ExtractionMode};
use paravault_llm::{CompletionProvider, provider_from_config};
use paravault_memory::{
    Category, CategoryStore, DailyNoteEngine, DeepExtractor, KnowledgeWriter, PriorityItem, ScanSearch,
    SystemClock, WriteReport, search_or_empty,
};

use crate::transcript;

/// Store, daily engine and writer wired to one configuration.
pub(crate) struct Vault {
    pub store: CategoryStore,
    pub daily: DailyNoteEngine,
    pub writer: KnowledgeWriter,
}

impl Vault {
    pub(crate) fn open(config: &AppConfig) -> Self {
        let store = CategoryStore::from_config(&config.vault);
        let daily = DailyNoteEngine::new(store.clone(), Arc::new(SystemClock));
        let writer = KnowledgeWriter::new(
            daily.clone(),
            DeepExtractor::from_config(&config.llm, &config.extraction),
        );
        Self { store, daily, writer }
    }

    fn date_or_today(&self, date: Option<NaiveDate>) -> NaiveDate {
        date.unwrap_or_else(|| self.daily.today())
    }
}

pub(crate) fn run_init(vault: &Vault) -> Result<()> {
    vault.store.ensure_layout()?;
    println!("vault ready at {}", vault.store.root().display());
    for category in Category::ALL {
        println!("  {}", vault.store.resolve(category).display());
    }
    println!("  {}", vault.store.daily_dir().display());
    println!("  {}", vault.store.templates_dir().display());
    Ok(())
}

pub(crate) fn run_daily(vault: &Vault, date: Option<NaiveDate>, print: bool) -> Result<()> {
    let date = vault.date_or_today(date);
    if print {
        print!("{}", vault.daily.read_content(date)?);
    } else {
        println!("{}", vault.daily.ensure(date)?.display());
    }
    Ok(())
}

pub(crate) fn run_log(vault: &Vault, text: &str, date: Option<NaiveDate>) -> Result<()> {
    let date = vault.date_or_today(date);
    vault.daily.append_to_log(text, date)?;
    println!("logged to {}", vault.daily.path_for(date).display());
    Ok(())
}

pub(crate) fn run_append(vault: &Vault, section: &str, text: &str, date: Option<NaiveDate>) -> Result<()> {
    let date = vault.date_or_today(date);
    let line = if text.trim_start().starts_with("- ") {
        text.trim().to_string()
    } else {
        format!("- {}", text.trim())
    };
    if vault.daily.append_to_section(section, &line, date)? {
        println!("added to ## {section}");
    } else {
        println!("no '## {section}' section in {}; nothing written", vault.daily.path_for(date).display());
    }
    Ok(())
}

pub(crate) fn run_priorities_show(vault: &Vault, date: Option<NaiveDate>) -> Result<()> {
    let date = vault.date_or_today(date);
    let items = vault.daily.get_priorities(date)?;
    println!("── priorities {date} ─────────────────────────────────");
    if items.is_empty() {
        println!("  (none)");
    }
    for (index, item) in items.iter().enumerate() {
        let mark = if item.done { 'x' } else { ' ' };
        println!("  {:>2}. [{mark}] {}", index + 1, item.text);
    }
    Ok(())
}

pub(crate) fn run_priorities_set(vault: &Vault, items: &[String], date: Option<NaiveDate>) -> Result<()> {
    let date = vault.date_or_today(date);
    let lines: Vec<String> = items
        .iter()
        .map(|text| {
            PriorityItem {
                text: text.trim().to_string(),
                done: false,
            }
            .to_line()
        })
        .collect();
    if vault.daily.write_priorities(&lines, date)? {
        println!("{} priorities set for {date}", lines.len());
    } else {
        println!("daily note for {date} has no Priorities section; nothing written");
    }
    Ok(())
}

/// Mark the 1-based `index` item done and rewrite the section.
pub(crate) fn run_priorities_done(vault: &Vault, index: usize, date: Option<NaiveDate>) -> Result<()> {
    let date = vault.date_or_today(date);
    let mut items = vault.daily.get_priorities(date)?;
    let Some(item) = index.checked_sub(1).and_then(|slot| items.get_mut(slot)) else {
        bail!("no priority #{index} on {date} ({} listed)", items.len());
    };
    item.done = true;
    let text = item.text.clone();

    let lines: Vec<String> = items.iter().map(PriorityItem::to_line).collect();
    vault.daily.write_priorities(&lines, date)?;
    println!("done: {text}");
    Ok(())
}

pub(crate) fn run_recent(vault: &Vault, limit: usize) -> Result<()> {
    for date in vault.daily.list_recent(limit)? {
        println!("{date}");
    }
    Ok(())
}

pub(crate) fn run_list(vault: &Vault, category: Category) -> Result<()> {
    let notes = vault.store.list(category)?;
    println!("── {category} ({}) ─────────────────────────────────", notes.len());
    for note in notes {
        println!(
            "  {:<32} {}  {}",
            note.name,
            note.modified.format("%Y-%m-%d %H:%M"),
            note.title
        );
    }
    Ok(())
}

pub(crate) fn run_counts(vault: &Vault) -> Result<()> {
    let counts = vault.store.counts()?;
    println!("── vault counts ─────────────────────────────────────");
    for (category, count) in &counts {
        println!("  {:<10} : {count}", category.to_string());
    }
    println!("  {:<10} : {}", "daily", vault.daily.list_recent(usize::MAX)?.len());
    Ok(())
}

pub(crate) fn run_capture(vault: &Vault, title: &str, body: Option<&str>) -> Result<()> {
    let path = vault.store.create_note(Category::Inbox, title, body.unwrap_or_default())?;
    println!("captured {}", path.display());
    Ok(())
}

pub(crate) fn run_project(vault: &Vault, dir: Option<PathBuf>) -> Result<()> {
    let dir = match dir {
        Some(dir) => dir,
        None => env::current_dir()?,
    };
    match vault.store.detect_project(&dir) {
        Some(name) => println!("{name}"),
        None => println!("no project matches {}", dir.display()),
    }
    Ok(())
}

pub(crate) async fn run_search(vault: &Vault, query: &str, limit: usize) -> Result<()> {
    let provider = ScanSearch::new(vault.store.clone());
    let results = search_or_empty(&provider, query, limit).await;
    if results.is_empty() {
        println!("no results for '{query}'");
    }
    for result in results {
        println!("{:>6.1}  {}  ({})", result.score, result.title, result.path.display());
        if !result.snippet.is_empty() {
            println!("        {}", result.snippet);
        }
    }
    Ok(())
}

pub(crate) struct ExtractArgs<'a> {
    pub transcript: &'a Path,
    pub deep: bool,
    pub project: Option<String>,
    pub date: Option<NaiveDate>,
}

pub(crate) async fn run_extract(vault: &Vault, config: &AppConfig, args: ExtractArgs<'_>) -> Result<()> {
    let turns = transcript::load_turns(args.transcript)?;
    let date = vault.date_or_today(args.date);
    let mode = if args.deep {
        ExtractionMode::Deep
    } else {
        config.extraction.mode
    };
    let project = match args.project {
        Some(project) => Some(project),
        None => env::current_dir()
            .ok()
            .and_then(|cwd| vault.store.detect_project(&cwd)),
    };

    let provider: Option<Box<dyn CompletionProvider>> = match mode {
        ExtractionMode::Light => None,
        ExtractionMode::Deep => match provider_from_config(&config.llm) {
            Ok(provider) => Some(provider),
            Err(err) => {
                warn!(?err, "completion provider unavailable");
                None
            }
        },
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; cancelling extraction");
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = vault
        .writer
        .capture_session(
            &turns,
            project.as_deref(),
            mode,
            provider.as_deref(),
            cancel_rx,
            date,
        )
        .await;
    interrupt.abort();

    print_report(&outcome?, turns.len());
    Ok(())
}

fn print_report(report: &WriteReport, turns: usize) {
    if !report.needs_reindex() {
        println!("{turns} turns read; nothing extracted");
        return;
    }
    println!("{turns} turns read; updated {} documents", report.touched.len());
    for path in &report.touched {
        println!("  {}", path.display());
    }
}
