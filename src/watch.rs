//! Live reload coordinator.
//!
//! Watches `pages/` and maps each batch of changes onto the smallest set of
//! recompilations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Event Loop                              │
//! │                                                              │
//! │  ┌──────────┐    ┌──────────┐    ┌────────────────────────┐  │
//! │  │ notify   │───▶│ Debouncer│───▶│  classify() per path   │  │
//! │  │ events   │    │ (300ms)  │    └───────────┬────────────┘  │
//! │  └──────────┘    └──────────┘                ▼               │
//! │                                  ┌────────────────────────┐  │
//! │                                  │  Plan: removals,       │  │
//! │                                  │  policy, disjoint dirs │  │
//! │                                  └───────────┬────────────┘  │
//! │                                              ▼               │
//! │                                  ┌────────────────────────┐  │
//! │                                  │  apply() ── rayon ──▶  │  │
//! │                                  │  compile_dir per dir   │  │
//! │                                  └────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Change                         | Reaction                               |
//! |--------------------------------|----------------------------------------|
//! | `csp.toml` written             | reload policy, recompile everything    |
//! | `csp.toml` removed             | reset policy, recompile everything     |
//! | `.html`/`.md` written          | recompile the containing directory     |
//! | directory added                | compile that directory                 |
//! | `.html`/`.md` removed          | drop its artifacts, recompile the dir  |
//! | anything else removed          | drop the artifacts of its URI          |

use crate::{
    compiler::{Compiler, Report, output::shadows_root},
    log,
    logger::WatchStatus,
    template::WIDGET_MARKER,
    utils::path::UriPath,
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

const DEBOUNCE_MS: u64 = 300;

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

fn is_page_source(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("html" | "md"))
}

fn display_uri(uri: &UriPath) -> String {
    if uri.is_root() { "/".to_owned() } else { format!("/{uri}") }
}

// =============================================================================
// Classification
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolicyChange {
    Reload,
    Reset,
}

/// Artifacts to drop before recompiling.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Removal {
    /// Every variant of a page URI, and its `dist/` directory.
    Page(UriPath),
    /// `dist/<dir>/@name.html`.
    Dynamic { dir: UriPath, name: String },
}

/// The reaction to one changed path.
#[derive(Debug, Default, PartialEq, Eq)]
struct Change {
    policy: Option<PolicyChange>,
    removal: Option<Removal>,
    recompile: Option<UriPath>,
}

/// Classify `path` by its state on disk after the batch settled.
fn classify(path: &Path, pages: &Path, csp: &Path) -> Change {
    if path == csp {
        let policy = if path.is_file() { PolicyChange::Reload } else { PolicyChange::Reset };
        return Change {
            policy: Some(policy),
            ..Change::default()
        };
    }

    let Some(uri) = path.strip_prefix(pages).ok().and_then(UriPath::from_relative) else {
        return Change::default();
    };
    if uri.is_root() || uri.segments().iter().any(|s| s.starts_with('.')) {
        return Change::default();
    }

    if path.is_dir() {
        return Change {
            recompile: Some(uri),
            ..Change::default()
        };
    }

    if path.exists() {
        return if is_page_source(path) {
            Change {
                recompile: uri.parent(),
                ..Change::default()
            }
        } else {
            Change::default()
        };
    }

    if !is_page_source(path) {
        return Change {
            removal: (!shadows_root(&uri)).then_some(Removal::Page(uri)),
            ..Change::default()
        };
    }

    let dir = uri.parent().unwrap_or_else(UriPath::root);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let removal = if stem.starts_with(WIDGET_MARKER) {
        Some(Removal::Dynamic {
            dir: dir.clone(),
            name: stem.to_owned(),
        })
    } else {
        let page = dir.child(stem);
        (!shadows_root(&page) && !page.to_path(pages).is_dir()).then_some(Removal::Page(page))
    };
    Change {
        policy: None,
        removal,
        recompile: Some(dir),
    }
}

// =============================================================================
// Planning
// =============================================================================

/// One batch of changes, deduplicated.
#[derive(Debug, Default, PartialEq, Eq)]
struct Plan {
    policy: Option<PolicyChange>,
    removals: Vec<Removal>,
    /// Disjoint directories, none below another.
    dirs: Vec<UriPath>,
}

impl Plan {
    fn from_changes(changes: impl IntoIterator<Item = Change>) -> Self {
        let mut plan = Self::default();
        let mut dirs = Vec::new();
        for change in changes {
            if change.policy.is_some() {
                plan.policy = change.policy;
            }
            if let Some(removal) = change.removal
                && !plan.removals.contains(&removal)
            {
                plan.removals.push(removal);
            }
            dirs.extend(change.recompile);
        }
        plan.dirs = prune_descendants(dirs);
        plan
    }

    fn is_empty(&self) -> bool {
        self.policy.is_none() && self.removals.is_empty() && self.dirs.is_empty()
    }
}

/// Drop every directory that another one in the list contains.
fn prune_descendants(mut dirs: Vec<UriPath>) -> Vec<UriPath> {
    dirs.sort_by_key(UriPath::len);
    let mut kept: Vec<UriPath> = Vec::new();
    for dir in dirs {
        if !kept.iter().any(|k| dir.starts_with(k)) {
            kept.push(dir);
        }
    }
    kept.sort_by_key(ToString::to_string);
    kept
}

// =============================================================================
// Coordinator
// =============================================================================

struct Coordinator<'a> {
    compiler: &'a Compiler,
    csp_hash: Option<blake3::Hash>,
    status: WatchStatus,
}

impl<'a> Coordinator<'a> {
    fn new(compiler: &'a Compiler) -> Self {
        Self {
            compiler,
            csp_hash: hash_file(&compiler.config().csp_path()),
            status: WatchStatus::new(),
        }
    }

    fn handle(&mut self, paths: &[PathBuf]) {
        let config = self.compiler.config();
        let pages = &config.build.pages;
        let csp = config.csp_path();
        let plan = Plan::from_changes(paths.iter().map(|p| classify(p, pages, &csp)));
        if !plan.is_empty() {
            self.apply(plan);
        }
    }

    /// Run one plan to completion, every recompiled subtree included.
    fn apply(&mut self, plan: Plan) {
        let mut failed = Vec::new();
        for removal in &plan.removals {
            let result = match removal {
                Removal::Page(uri) => self.compiler.remove_artifacts(uri),
                Removal::Dynamic { dir, name } => self.compiler.remove_dynamic(dir, name),
            };
            if let Err(e) = result {
                failed.push(format!("{removal:?}: {e}"));
            }
        }

        let recompile_all = match plan.policy {
            Some(PolicyChange::Reload) => self.reload_policy(),
            Some(PolicyChange::Reset) => {
                self.csp_hash = None;
                self.compiler.reset_policy();
                log!("watch"; "csp.toml removed, csp disabled");
                true
            }
            None => false,
        };

        let (what, report) = if recompile_all {
            ("everything".to_owned(), self.compiler.compile_all())
        } else if plan.dirs.is_empty() {
            (String::new(), Report::default())
        } else {
            let what = plan.dirs.iter().map(display_uri).collect::<Vec<_>>().join(", ");
            let report = plan
                .dirs
                .par_iter()
                .map(|dir| self.compiler.compile_dir(dir))
                .sum::<Report>();
            (what, report)
        };

        if report.failed > 0 {
            failed.push(format!("{} pages failed", report.failed));
        }
        if !failed.is_empty() {
            self.status.error(&format!("recompile failed: {what}"), &failed.join("\n"));
        } else if !what.is_empty() {
            self.status.success(&format!("recompiled: {what}"));
        } else if !plan.removals.is_empty() {
            self.status.success(&format!("removed {} artifacts", plan.removals.len()));
        }
    }

    /// Reload `csp.toml` if its content changed. Returns whether it did.
    fn reload_policy(&mut self) -> bool {
        let hash = hash_file(&self.compiler.config().csp_path());
        if hash.is_some() && hash == self.csp_hash {
            self.status.unchanged("csp.toml");
            return false;
        }
        self.csp_hash = hash;
        self.compiler.load_policy();
        true
    }
}

fn hash_file(path: &Path) -> Option<blake3::Hash> {
    fs::read(path).ok().map(|bytes| blake3::hash(&bytes))
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events with debouncing.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
        }
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) {
                self.pending.insert(path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Public API
// =============================================================================

/// Watch `pages/` and recompile on change. Blocks until the watcher
/// channel closes.
pub fn watch_for_changes_blocking(compiler: &Compiler) -> Result<()> {
    let pages = &compiler.config().build.pages;

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    watcher
        .watch(pages, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", pages.display()))?;

    let root = compiler.config().get_root();
    log!("watch"; "{}/", pages.strip_prefix(root).unwrap_or(pages).display());

    let mut debouncer = Debouncer::new();
    let mut coordinator = Coordinator::new(compiler);

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) => debouncer.add(event),
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) if debouncer.ready() => {
                coordinator.handle(&debouncer.take());
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            _ => {}
        }
    }

    Ok(())
}
