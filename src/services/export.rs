// Export engine - JSON/CSV exports, full backups, backup listing
// Public operations never reject; they resolve to a structured ExportResult

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use crate::models::{Project, Task};
use crate::store::DatabaseState;

pub const EXPORT_VERSION: &str = "1.0";
pub const BACKUP_TYPE: &str = "full-backup";
pub const BACKUP_PREFIX: &str = "taskboard-backup-";

const INVALID_SCOPE: &str = "Invalid export scope or missing required parameters";

/// Export options as they arrive over the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(default)]
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projectId: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taskIds: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includeArchived: Option<bool>,
}

/// Resolved export scope; every branch point matches exhaustively on this
#[derive(Debug, Clone, PartialEq)]
pub enum ExportScope {
    All { includeArchived: bool },
    SingleProject { projectId: String, includeArchived: bool },
    SelectedTasks { taskIds: Vec<String> },
}

impl ExportScope {
    pub fn label(&self) -> &'static str {
        match self {
            Self::All { .. } => "all",
            Self::SingleProject { .. } => "single-project",
            Self::SelectedTasks { .. } => "selected-tasks",
        }
    }
}

impl ExportOptions {
    /// An unknown or incomplete scope combination is a hard failure,
    /// never a silent fallback
    pub fn resolveScope(&self) -> Result<ExportScope, String> {
        let includeArchived = self.includeArchived.unwrap_or(false);
        match self.scope.as_str() {
            "all" => Ok(ExportScope::All { includeArchived }),
            "single-project" => match &self.projectId {
                Some(projectId) if !projectId.is_empty() => Ok(ExportScope::SingleProject {
                    projectId: projectId.clone(),
                    includeArchived,
                }),
                _ => Err(INVALID_SCOPE.to_string()),
            },
            "selected-tasks" => match &self.taskIds {
                Some(taskIds) => Ok(ExportScope::SelectedTasks {
                    taskIds: taskIds.clone(),
                }),
                None => Err(INVALID_SCOPE.to_string()),
            },
            _ => Err(INVALID_SCOPE.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filePath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportResult {
    fn ok(filePath: PathBuf) -> Self {
        Self {
            success: true,
            filePath: Some(filePath.to_string_lossy().to_string()),
            error: None,
        }
    }

    fn fail(error: String) -> Self {
        Self {
            success: false,
            filePath: None,
            error: Some(error),
        }
    }
}

fn isoNow() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Filesystem-safe, lexicographically sortable timestamp for filenames
fn fileTimestamp() -> String {
    isoNow()
        .chars()
        .map(|c| if c == ':' || c == '.' { '-' } else { c })
        .collect()
}

/// Wrap in double quotes (doubling internal quotes) only when the value
/// contains a comma, a quote or a newline
fn escapeCsvValue(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[derive(Clone)]
pub struct ExportService {
    db: DatabaseState,
}

impl ExportService {
    pub fn new(db: DatabaseState) -> Self {
        Self { db }
    }

    /// Export projects and tasks as a versioned JSON envelope
    pub async fn toJSON(&self, options: ExportOptions) -> ExportResult {
        match self.exportJson(&options) {
            Ok(path) => ExportResult::ok(path),
            Err(e) => {
                tracing::error!("[ExportService::toJSON] {}", e);
                ExportResult::fail(e)
            }
        }
    }

    /// Export tasks as CSV, one row per task
    pub async fn toCSV(&self, options: ExportOptions) -> ExportResult {
        match self.exportCsv(&options) {
            Ok(path) => ExportResult::ok(path),
            Err(e) => {
                tracing::error!("[ExportService::toCSV] {}", e);
                ExportResult::fail(e)
            }
        }
    }

    /// Full unscoped dump with original identifiers, for later restore
    pub async fn createBackup(&self) -> ExportResult {
        match self.writeBackup() {
            Ok(path) => ExportResult::ok(path),
            Err(e) => {
                tracing::error!("[ExportService::createBackup] {}", e);
                ExportResult::fail(e)
            }
        }
    }

    /// Backup file paths, most recent first; best effort, empty on fault
    pub async fn listBackups(&self) -> Vec<String> {
        let backupsDir = self.db.paths.backupsDir();
        if fs::create_dir_all(&backupsDir).is_err() {
            return Vec::new();
        }
        let Ok(entries) = fs::read_dir(&backupsDir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.starts_with(BACKUP_PREFIX) && name.ends_with(".json"))
            .collect();
        names.sort();
        names.reverse();
        names
            .into_iter()
            .map(|name| backupsDir.join(name).to_string_lossy().to_string())
            .collect()
    }

    /// Resolve the scope to the documents it covers
    fn fetchScoped(&self, scope: &ExportScope) -> (Vec<Project>, Vec<Task>) {
        match scope {
            ExportScope::All { includeArchived } => {
                let projects = self.db.projects.find(|p| *includeArchived || !p.isArchived);
                let tasks = self.db.tasks.find(|t| *includeArchived || !t.isArchived);
                (projects, tasks)
            }
            ExportScope::SingleProject {
                projectId,
                includeArchived,
            } => {
                let projects = match self.db.projects.get(projectId) {
                    Some(p) => vec![p],
                    None => Vec::new(),
                };
                let tasks = self.db.tasks.find(|t| {
                    t.projectId == *projectId && (*includeArchived || !t.isArchived)
                });
                (projects, tasks)
            }
            ExportScope::SelectedTasks { taskIds } => {
                let wanted: HashSet<&str> = taskIds.iter().map(|s| s.as_str()).collect();
                let tasks = self.db.tasks.find(|t| wanted.contains(t.id.as_str()));
                // Owning projects are derived from the selected tasks
                let owners: HashSet<&str> = tasks.iter().map(|t| t.projectId.as_str()).collect();
                let projects = self.db.projects.find(|p| owners.contains(p.id.as_str()));
                (projects, tasks)
            }
        }
    }

    fn exportJson(&self, options: &ExportOptions) -> Result<PathBuf, String> {
        let scope = options.resolveScope()?;
        let (projects, tasks) = self.fetchScoped(&scope);

        let exportData = json!({
            "version": EXPORT_VERSION,
            "exportDate": isoNow(),
            "projects": projects,
            "tasks": tasks,
            "metadata": {
                "totalProjects": projects.len(),
                "totalTasks": tasks.len(),
                "scope": scope.label(),
            },
        });

        let fileName = format!("taskboard-export-{}.json", fileTimestamp());
        let filePath = self.db.paths.downloadsDir.join(fileName);
        fs::create_dir_all(&self.db.paths.downloadsDir)
            .map_err(|e| format!("Failed to create downloads directory: {}", e))?;
        let content = serde_json::to_string_pretty(&exportData)
            .map_err(|e| format!("Failed to serialize export: {}", e))?;
        fs::write(&filePath, content).map_err(|e| format!("Failed to write export: {}", e))?;
        Ok(filePath)
    }

    fn exportCsv(&self, options: &ExportOptions) -> Result<PathBuf, String> {
        let scope = options.resolveScope()?;
        let (_, tasks) = self.fetchScoped(&scope);

        // Project names for the Project column, looked up from the distinct
        // projectIds the exported tasks reference
        let owners: HashSet<&str> = tasks.iter().map(|t| t.projectId.as_str()).collect();
        let projectNames: HashMap<String, String> = self
            .db
            .projects
            .find(|p| owners.contains(p.id.as_str()))
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let header = "ID,Title,Description,Status,Priority,Project,Due Date,Created At,Updated At,Archived";
        let mut lines = vec![header.to_string()];
        for task in &tasks {
            let row = [
                task.id.clone(),
                escapeCsvValue(&task.title),
                escapeCsvValue(task.description.as_deref().unwrap_or("")),
                task.status.asStr().to_string(),
                task.priority.asStr().to_string(),
                projectNames
                    .get(&task.projectId)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
                task.dueDate
                    .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
                    .unwrap_or_default(),
                task.createdAt.to_rfc3339_opts(SecondsFormat::Millis, true),
                task.updatedAt.to_rfc3339_opts(SecondsFormat::Millis, true),
                if task.isArchived { "Yes" } else { "No" }.to_string(),
            ];
            lines.push(row.join(","));
        }

        let fileName = format!("taskboard-export-{}.csv", fileTimestamp());
        let filePath = self.db.paths.downloadsDir.join(fileName);
        fs::create_dir_all(&self.db.paths.downloadsDir)
            .map_err(|e| format!("Failed to create downloads directory: {}", e))?;
        fs::write(&filePath, lines.join("\n"))
            .map_err(|e| format!("Failed to write export: {}", e))?;
        Ok(filePath)
    }

    fn writeBackup(&self) -> Result<PathBuf, String> {
        let projects = self.db.projects.find(|_| true);
        let tasks = self.db.tasks.find(|_| true);

        let backupData = json!({
            "version": EXPORT_VERSION,
            "backupDate": isoNow(),
            "type": BACKUP_TYPE,
            "projects": projects,
            "tasks": tasks,
        });

        let backupsDir = self.db.paths.backupsDir();
        fs::create_dir_all(&backupsDir)
            .map_err(|e| format!("Failed to create backups directory: {}", e))?;

        let fileName = format!("{}{}.json", BACKUP_PREFIX, fileTimestamp());
        let filePath = backupsDir.join(fileName);
        let content = serde_json::to_string_pretty(&backupData)
            .map_err(|e| format!("Failed to serialize backup: {}", e))?;
        fs::write(&filePath, content).map_err(|e| format!("Failed to write backup: {}", e))?;
        Ok(filePath)
    }
}
