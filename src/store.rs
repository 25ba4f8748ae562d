// Embedded document store
// Two collections (projects, tasks) persisted as JSON files under the app
// data directory. Documents live in memory behind RwLock; every mutation
// rewrites the collection file. The store is the sole owner of document
// identity and timestamps, and ids never leave it as anything but String.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{Project, Task};
use crate::status::StatusManager;

/// First-run provisioning is bounded; past this the init is surfaced as failed
const INIT_TIMEOUT: Duration = Duration::from_secs(180);

/// Generate a new document id
pub fn newId() -> String {
    Uuid::new_v4().to_string()
}

// ============================================
// PATHS
// ============================================

/// Filesystem locations the app reads and writes
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub dataDir: PathBuf,
    pub downloadsDir: PathBuf,
}

impl AppPaths {
    /// Platform defaults (~/.local/share/taskboard etc.)
    pub fn resolve() -> Self {
        let dataDir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskboard");
        let downloadsDir = dirs::download_dir().unwrap_or_else(|| PathBuf::from("."));
        Self { dataDir, downloadsDir }
    }

    pub fn backupsDir(&self) -> PathBuf {
        self.dataDir.join("backups")
    }
}

// ============================================
// DOCUMENT CONTRACT
// ============================================

/// Uniform access the collections need into a stored document
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn setId(&mut self, id: String);
    fn setCreatedAt(&mut self, at: DateTime<Utc>);
    fn setUpdatedAt(&mut self, at: DateTime<Utc>);
    /// Text the relevance search runs over
    fn searchText(&self) -> String;
}

impl Document for Project {
    fn id(&self) -> &str {
        &self.id
    }
    fn setId(&mut self, id: String) {
        self.id = id;
    }
    fn setCreatedAt(&mut self, at: DateTime<Utc>) {
        self.createdAt = at;
    }
    fn setUpdatedAt(&mut self, at: DateTime<Utc>) {
        self.updatedAt = at;
    }
    fn searchText(&self) -> String {
        self.name.clone()
    }
}

impl Document for Task {
    fn id(&self) -> &str {
        &self.id
    }
    fn setId(&mut self, id: String) {
        self.id = id;
    }
    fn setCreatedAt(&mut self, at: DateTime<Utc>) {
        self.createdAt = at;
    }
    fn setUpdatedAt(&mut self, at: DateTime<Utc>) {
        self.updatedAt = at;
    }
    fn searchText(&self) -> String {
        match &self.description {
            Some(d) => format!("{} {}", self.title, d),
            None => self.title.clone(),
        }
    }
}

// ============================================
// COLLECTION
// ============================================

/// One persisted collection of documents
#[derive(Debug)]
pub struct Collection<T: Document> {
    name: &'static str,
    path: PathBuf,
    docs: RwLock<Vec<T>>,
}

impl<T: Document> Collection<T> {
    fn new(name: &'static str, dataDir: &PathBuf) -> Self {
        Self {
            name,
            path: dataDir.join(format!("{}.json", name)),
            docs: RwLock::new(Vec::new()),
        }
    }

    /// Load the collection file into memory. A missing file is an empty
    /// collection; a malformed file is a fault.
    fn load(&self) -> Result<(), String> {
        if !self.path.exists() {
            return Ok(());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| format!("Failed to read {} collection: {}", self.name, e))?;
        let docs: Vec<T> = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse {} collection: {}", self.name, e))?;
        *self.docs.write() = docs;
        Ok(())
    }

    fn persist(&self, docs: &[T]) -> Result<(), String> {
        let content = serde_json::to_string_pretty(docs)
            .map_err(|e| format!("Failed to serialize {} collection: {}", self.name, e))?;
        fs::write(&self.path, content)
            .map_err(|e| format!("Failed to write {} collection: {}", self.name, e))
    }

    /// Insert a new document: mints the id, stamps both timestamps
    pub fn insert(&self, doc: T) -> Result<T, String> {
        let now = Utc::now();
        self.insertWith(doc, now, now)
    }

    /// Insert a new document with explicit timestamps (import path)
    pub fn insertWith(
        &self,
        mut doc: T,
        createdAt: DateTime<Utc>,
        updatedAt: DateTime<Utc>,
    ) -> Result<T, String> {
        doc.setId(newId());
        doc.setCreatedAt(createdAt);
        doc.setUpdatedAt(updatedAt);
        let mut docs = self.docs.write();
        docs.push(doc.clone());
        self.persist(&docs)?;
        Ok(doc)
    }

    /// Insert preserving the document's id and timestamps (restore path)
    pub fn restore(&self, doc: T) -> Result<T, String> {
        if doc.id().is_empty() {
            return Err(format!("Cannot restore a {} document without an id", self.name));
        }
        let mut docs = self.docs.write();
        docs.push(doc.clone());
        self.persist(&docs)?;
        Ok(doc)
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.docs.read().iter().find(|d| d.id() == id).cloned()
    }

    pub fn find(&self, filter: impl Fn(&T) -> bool) -> Vec<T> {
        self.docs.read().iter().filter(|d| filter(d)).cloned().collect()
    }

    pub fn findSorted(
        &self,
        filter: impl Fn(&T) -> bool,
        cmp: impl Fn(&T, &T) -> std::cmp::Ordering,
    ) -> Vec<T> {
        let mut found = self.find(filter);
        found.sort_by(cmp);
        found
    }

    /// Apply a mutation to one document; stamps updatedAt and persists.
    /// Returns None when the id does not exist.
    pub fn update(&self, id: &str, mutate: impl FnOnce(&mut T)) -> Result<Option<T>, String> {
        let mut docs = self.docs.write();
        let Some(doc) = docs.iter_mut().find(|d| d.id() == id) else {
            return Ok(None);
        };
        mutate(doc);
        doc.setUpdatedAt(Utc::now());
        let updated = doc.clone();
        self.persist(&docs)?;
        Ok(Some(updated))
    }

    /// Mutate every listed document in one batch with a single write-out.
    /// The mutator receives the document and its index in `ids` and returns
    /// whether it applied; unknown ids and declined documents are skipped.
    /// Returns the number of documents modified.
    pub fn updateBatch(
        &self,
        ids: &[String],
        mutate: impl Fn(&mut T, usize) -> bool,
    ) -> Result<usize, String> {
        let now = Utc::now();
        let mut docs = self.docs.write();
        let mut modified = 0;
        for (index, id) in ids.iter().enumerate() {
            if let Some(doc) = docs.iter_mut().find(|d| d.id() == id) {
                if mutate(doc, index) {
                    doc.setUpdatedAt(now);
                    modified += 1;
                }
            }
        }
        self.persist(&docs)?;
        Ok(modified)
    }

    /// Remove one document, returning it; None when the id does not exist
    pub fn remove(&self, id: &str) -> Result<Option<T>, String> {
        let mut docs = self.docs.write();
        let Some(index) = docs.iter().position(|d| d.id() == id) else {
            return Ok(None);
        };
        let removed = docs.remove(index);
        self.persist(&docs)?;
        Ok(Some(removed))
    }

    /// Remove every document matching the filter, returning how many
    pub fn removeWhere(&self, filter: impl Fn(&T) -> bool) -> Result<usize, String> {
        let mut docs = self.docs.write();
        let before = docs.len();
        docs.retain(|d| !filter(d));
        let removed = before - docs.len();
        self.persist(&docs)?;
        Ok(removed)
    }

    pub fn clear(&self) -> Result<usize, String> {
        self.removeWhere(|_| true)
    }

    pub fn count(&self) -> usize {
        self.docs.read().len()
    }

    /// Text relevance query: whitespace-tokenized term, case-insensitive
    /// occurrence count over searchText, score-descending, zero-score excluded
    pub fn search(&self, term: &str, filter: impl Fn(&T) -> bool) -> Vec<T> {
        let tokens: Vec<String> = term
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, T)> = self
            .docs
            .read()
            .iter()
            .filter(|d| filter(d))
            .filter_map(|d| {
                let text = d.searchText().to_lowercase();
                let score: usize = tokens.iter().map(|t| text.matches(t.as_str()).count()).sum();
                if score > 0 { Some((score, d.clone())) } else { None }
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, d)| d).collect()
    }
}

// ============================================
// DATABASE
// ============================================

/// The persistent store: two collections plus the status channel
#[derive(Debug)]
pub struct Database {
    pub paths: AppPaths,
    pub projects: Collection<Project>,
    pub tasks: Collection<Task>,
    pub status: StatusManager,
}

pub type DatabaseState = Arc<Database>;

impl Database {
    fn open(paths: AppPaths) -> Self {
        Self {
            projects: Collection::new("projects", &paths.dataDir),
            tasks: Collection::new("tasks", &paths.dataDir),
            paths,
            status: StatusManager::new(),
        }
    }

    fn provision(&self) -> Result<(), String> {
        fs::create_dir_all(&self.paths.dataDir)
            .map_err(|e| format!("Failed to create data directory: {}", e))?;
        self.projects.load()?;
        self.tasks.load()?;
        Ok(())
    }

    /// Open the store under the given paths, provisioning the data directory
    /// on first run. Bounded by a generous timeout so a stuck first-run setup
    /// surfaces as a failure instead of hanging the host.
    pub async fn init(paths: AppPaths) -> Result<DatabaseState, String> {
        let db = Arc::new(Database::open(paths));
        db.status.setInitializing("Provisioning database...");

        let provisioning = {
            let db = db.clone();
            tokio::task::spawn_blocking(move || db.provision())
        };

        let result = match tokio::time::timeout(INIT_TIMEOUT, provisioning).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(format!("Database provisioning failed: {}", e)),
            Err(_) => Err(format!(
                "Database initialization timed out after {}s",
                INIT_TIMEOUT.as_secs()
            )),
        };

        match result {
            Ok(()) => {
                db.status.setConnected();
                tracing::info!(
                    "[Database::init] connected, {} projects / {} tasks loaded",
                    db.projects.count(),
                    db.tasks.count()
                );
                Ok(db)
            }
            Err(e) => {
                db.status.setError(&e);
                Err(e)
            }
        }
    }
}
