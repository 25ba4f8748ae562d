// Import engine - payload validation, merge/replace imports, backup restore
// Public operations never reject; they resolve to a structured ImportResult

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs;

use crate::models::{ChecklistItem, Priority, Project, ProjectSettings, Task, TaskStatus};
use crate::models::project::DEFAULT_COLOR;
use crate::services::export::BACKUP_TYPE;
use crate::store::DatabaseState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Add alongside existing data, minting fresh identifiers
    Merge,
    /// Wipe existing data, keep payload identifiers
    Replace,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportOptions {
    pub filePath: String,
    pub mode: ImportMode,
    #[serde(default)]
    pub validateOnly: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportCounts {
    pub projects: usize,
    pub tasks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported: Option<ImportCounts>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ImportResult {
    fn fail(errors: Vec<String>) -> Self {
        Self {
            success: false,
            imported: None,
            errors,
            warnings: Vec::new(),
        }
    }
}

struct Validation {
    errors: Vec<String>,
    warnings: Vec<String>,
}

fn nonEmptyString(value: Option<&Value>) -> Option<&str> {
    value.and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

/// Structural validation; errors are fatal, warnings are not.
/// Messages are itemized per offending index.
fn validateImportData(data: &Value) -> Validation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let projects = data.get("projects").and_then(|v| v.as_array());
    let tasks = data.get("tasks").and_then(|v| v.as_array());
    if projects.is_none() {
        errors.push("Missing or invalid 'projects' array".to_string());
    }
    if tasks.is_none() {
        errors.push("Missing or invalid 'tasks' array".to_string());
    }
    // Array-shape failures short-circuit the per-entry checks
    let (Some(projects), Some(tasks)) = (projects, tasks) else {
        return Validation { errors, warnings };
    };

    for (index, project) in projects.iter().enumerate() {
        if nonEmptyString(project.get("name")).is_none() {
            errors.push(format!("Project at index {} is missing 'name' field", index));
        }
        if nonEmptyString(project.get("_id")).is_none() {
            errors.push(format!("Project at index {} is missing '_id' field", index));
        }
    }

    let projectIds: HashSet<&str> = projects
        .iter()
        .filter_map(|p| nonEmptyString(p.get("_id")))
        .collect();

    for (index, task) in tasks.iter().enumerate() {
        let title = nonEmptyString(task.get("title"));
        if title.is_none() {
            errors.push(format!("Task at index {} is missing 'title' field", index));
        }
        if nonEmptyString(task.get("_id")).is_none() {
            errors.push(format!("Task at index {} is missing '_id' field", index));
        }
        let title = title.unwrap_or("(untitled)");
        match nonEmptyString(task.get("projectId")) {
            None => {
                errors.push(format!("Task at index {} is missing 'projectId' field", index));
            }
            Some(projectId) if !projectIds.contains(projectId) => {
                warnings.push(format!(
                    "Task \"{}\" references non-existent project (will be skipped)",
                    title
                ));
            }
            Some(_) => {}
        }
        let status = task.get("status").and_then(|v| v.as_str()).unwrap_or("");
        if TaskStatus::parse(status).is_none() {
            warnings.push(format!(
                "Task \"{}\" has invalid status: {} (will be set to 'todo')",
                title,
                if status.is_empty() { "none" } else { status }
            ));
        }
    }

    Validation { errors, warnings }
}

fn parseDate(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

/// Typed boundary conversion for a payload project. The id is carried over
/// verbatim; callers decide whether to keep or remint it.
fn projectFromPayload(value: &Value, importTime: DateTime<Utc>) -> Project {
    Project {
        id: value.get("_id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        name: value.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        description: value
            .get("description")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        color: value
            .get("color")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_COLOR)
            .to_string(),
        icon: value.get("icon").and_then(|v| v.as_str()).map(|s| s.to_string()),
        isArchived: value.get("isArchived").and_then(|v| v.as_bool()).unwrap_or(false),
        settings: value
            .get("settings")
            .cloned()
            .and_then(|v| serde_json::from_value::<ProjectSettings>(v).ok()),
        createdAt: parseDate(value.get("createdAt")).unwrap_or(importTime),
        updatedAt: parseDate(value.get("updatedAt")).unwrap_or(importTime),
    }
}

/// Typed boundary conversion for a payload task; an unrecognized status is
/// coerced to the default here
fn taskFromPayload(value: &Value, importTime: DateTime<Utc>) -> Task {
    Task {
        id: value.get("_id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        projectId: value
            .get("projectId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        title: value.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        description: value
            .get("description")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        status: value
            .get("status")
            .and_then(|v| v.as_str())
            .and_then(TaskStatus::parse)
            .unwrap_or_default(),
        priority: value
            .get("priority")
            .cloned()
            .and_then(|v| serde_json::from_value::<Priority>(v).ok())
            .unwrap_or_default(),
        labels: value
            .get("labels")
            .cloned()
            .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok())
            .unwrap_or_default(),
        dueDate: parseDate(value.get("dueDate")),
        checklist: value
            .get("checklist")
            .cloned()
            .and_then(|v| serde_json::from_value::<Vec<ChecklistItem>>(v).ok())
            .unwrap_or_default(),
        position: value.get("position").and_then(|v| v.as_i64()).unwrap_or(0),
        isArchived: value.get("isArchived").and_then(|v| v.as_bool()).unwrap_or(false),
        createdAt: parseDate(value.get("createdAt")).unwrap_or(importTime),
        updatedAt: parseDate(value.get("updatedAt")).unwrap_or(importTime),
    }
}

#[derive(Clone)]
pub struct ImportService {
    db: DatabaseState,
}

impl ImportService {
    pub fn new(db: DatabaseState) -> Self {
        Self { db }
    }

    /// Import a JSON export payload. validateOnly reports errors/warnings and
    /// counts without touching the store.
    pub async fn fromJSON(&self, options: ImportOptions) -> ImportResult {
        let data = match self.readPayload(&options.filePath) {
            Ok(data) => data,
            Err(e) => return ImportResult::fail(vec![e]),
        };

        let validation = validateImportData(&data);
        if !validation.errors.is_empty() {
            return ImportResult::fail(validation.errors);
        }

        // Array shape was just validated
        let projects = data["projects"].as_array().cloned().unwrap_or_default();
        let tasks = data["tasks"].as_array().cloned().unwrap_or_default();

        if options.validateOnly {
            return ImportResult {
                success: true,
                imported: Some(ImportCounts {
                    projects: projects.len(),
                    tasks: tasks.len(),
                }),
                errors: Vec::new(),
                warnings: validation.warnings,
            };
        }

        let imported = match options.mode {
            ImportMode::Merge => self.importMerge(&projects, &tasks),
            ImportMode::Replace => self.importReplace(&projects, &tasks),
        };
        match imported {
            Ok(counts) => ImportResult {
                success: true,
                imported: Some(counts),
                errors: Vec::new(),
                warnings: validation.warnings,
            },
            Err(e) => {
                tracing::error!("[ImportService::fromJSON] {}", e);
                ImportResult::fail(vec![e])
            }
        }
    }

    /// Restore a full backup: requires the full-backup tag, wipes the store,
    /// and keeps every identifier and timestamp intact
    pub async fn restoreBackup(&self, backupPath: &str) -> ImportResult {
        let data = match self.readPayload(backupPath) {
            Ok(data) => data,
            Err(e) => return ImportResult::fail(vec![e]),
        };

        // The type gate comes before any deletion
        if data.get("type").and_then(|v| v.as_str()) != Some(BACKUP_TYPE) {
            return ImportResult::fail(vec!["Invalid backup file format".to_string()]);
        }

        let projects = data["projects"].as_array().cloned().unwrap_or_default();
        let tasks = data["tasks"].as_array().cloned().unwrap_or_default();

        match self.restoreAll(&projects, &tasks) {
            Ok(counts) => ImportResult {
                success: true,
                imported: Some(counts),
                errors: Vec::new(),
                warnings: Vec::new(),
            },
            Err(e) => {
                tracing::error!("[ImportService::restoreBackup] {}", e);
                ImportResult::fail(vec![e])
            }
        }
    }

    fn readPayload(&self, path: &str) -> Result<Value, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read import file: {}", e))?;
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse import file: {}", e))
    }

    /// Merge: every payload project becomes a new document with a fresh id;
    /// tasks follow through the old-id -> new-id mapping, and a task whose
    /// old projectId never got a mapping entry is dropped
    fn importMerge(&self, projects: &[Value], tasks: &[Value]) -> Result<ImportCounts, String> {
        let importTime = Utc::now();
        let mut projectIdMap: HashMap<String, String> = HashMap::new();
        let mut importedProjects = 0;

        for payload in projects {
            let oldId = payload.get("_id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let project = projectFromPayload(payload, importTime);
            let createdAt = project.createdAt;
            let updatedAt = project.updatedAt;
            let created = self.db.projects.insertWith(project, createdAt, updatedAt)?;
            projectIdMap.insert(oldId, created.id);
            importedProjects += 1;
        }

        let mut importedTasks = 0;
        for payload in tasks {
            let oldProjectId = payload
                .get("projectId")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let Some(newProjectId) = projectIdMap.get(oldProjectId) else {
                // Dangling reference, already surfaced as a validation warning
                continue;
            };
            let mut task = taskFromPayload(payload, importTime);
            task.projectId = newProjectId.clone();
            let createdAt = task.createdAt;
            let updatedAt = task.updatedAt;
            self.db.tasks.insertWith(task, createdAt, updatedAt)?;
            importedTasks += 1;
        }

        Ok(ImportCounts {
            projects: importedProjects,
            tasks: importedTasks,
        })
    }

    /// Replace: wipe everything, then import keeping the payload identifiers.
    /// Tasks referencing a project absent from the payload are still dropped.
    fn importReplace(&self, projects: &[Value], tasks: &[Value]) -> Result<ImportCounts, String> {
        let importTime = Utc::now();
        self.db.projects.clear()?;
        self.db.tasks.clear()?;

        let mut keptProjectIds: HashSet<String> = HashSet::new();
        let mut importedProjects = 0;
        for payload in projects {
            let project = projectFromPayload(payload, importTime);
            keptProjectIds.insert(project.id.clone());
            self.db.projects.restore(project)?;
            importedProjects += 1;
        }

        let mut importedTasks = 0;
        for payload in tasks {
            let task = taskFromPayload(payload, importTime);
            if !keptProjectIds.contains(&task.projectId) {
                continue;
            }
            self.db.tasks.restore(task)?;
            importedTasks += 1;
        }

        Ok(ImportCounts {
            projects: importedProjects,
            tasks: importedTasks,
        })
    }

    /// Backup restore path: no validation, no skipping; a well-formed backup
    /// is self-consistent by construction
    fn restoreAll(&self, projects: &[Value], tasks: &[Value]) -> Result<ImportCounts, String> {
        let importTime = Utc::now();
        self.db.projects.clear()?;
        self.db.tasks.clear()?;

        for payload in projects {
            self.db.projects.restore(projectFromPayload(payload, importTime))?;
        }
        for payload in tasks {
            self.db.tasks.restore(taskFromPayload(payload, importTime))?;
        }

        Ok(ImportCounts {
            projects: projects.len(),
            tasks: tasks.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateProjectInput;
    use crate::services::project::ProjectService;
    use crate::store::{AppPaths, Database};
    use serde_json::json;
    use std::io::Write;

    async fn setup(dir: &tempfile::TempDir) -> (DatabaseState, ImportService) {
        let db = Database::init(AppPaths {
            dataDir: dir.path().join("data"),
            downloadsDir: dir.path().join("downloads"),
        })
        .await
        .unwrap();
        (db.clone(), ImportService::new(db))
    }

    fn writePayload(dir: &tempfile::TempDir, payload: &Value) -> String {
        let path = dir.path().join("payload.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(serde_json::to_string_pretty(payload).unwrap().as_bytes())
            .unwrap();
        path.to_string_lossy().to_string()
    }

    fn samplePayload() -> Value {
        json!({
            "version": "1.0",
            "projects": [
                {"_id": "p1", "name": "Alpha"},
                {"_id": "p2", "name": "Beta"},
            ],
            "tasks": [
                {"_id": "t1", "projectId": "p1", "title": "one", "status": "todo"},
                {"_id": "t2", "projectId": "p2", "title": "two", "status": "done"},
                {"_id": "t3", "projectId": "p-missing", "title": "orphan", "status": "todo"},
            ],
        })
    }

    #[tokio::test]
    async fn test_missing_tasks_array_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, service) = setup(&dir).await;
        let path = writePayload(&dir, &json!({"projects": []}));

        let result = service
            .fromJSON(ImportOptions {
                filePath: path,
                mode: ImportMode::Merge,
                validateOnly: true,
            })
            .await;
        assert!(!result.success);
        assert_eq!(result.errors, vec!["Missing or invalid 'tasks' array"]);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_itemized_field_errors() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, service) = setup(&dir).await;
        let path = writePayload(
            &dir,
            &json!({
                "projects": [{"_id": "p1"}, {"name": "No id"}],
                "tasks": [{"_id": "t1", "projectId": "p1"}],
            }),
        );

        let result = service
            .fromJSON(ImportOptions {
                filePath: path,
                mode: ImportMode::Merge,
                validateOnly: true,
            })
            .await;
        assert!(!result.success);
        assert!(result
            .errors
            .contains(&"Project at index 0 is missing 'name' field".to_string()));
        assert!(result
            .errors
            .contains(&"Project at index 1 is missing '_id' field".to_string()));
        assert!(result
            .errors
            .contains(&"Task at index 0 is missing 'title' field".to_string()));
    }

    #[tokio::test]
    async fn test_dangling_reference_is_warning_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let (db, service) = setup(&dir).await;
        let path = writePayload(&dir, &samplePayload());

        let result = service
            .fromJSON(ImportOptions {
                filePath: path,
                mode: ImportMode::Merge,
                validateOnly: true,
            })
            .await;
        assert!(result.success);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("orphan"));
        assert!(result.warnings[0].contains("will be skipped"));
        // validateOnly never mutates
        assert_eq!(db.projects.count(), 0);
        assert_eq!(db.tasks.count(), 0);
        let counts = result.imported.unwrap();
        assert_eq!(counts.projects, 2);
        assert_eq!(counts.tasks, 3);
    }

    #[tokio::test]
    async fn test_merge_remaps_ids_and_drops_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let (db, service) = setup(&dir).await;
        let existing = ProjectService::new(db.clone())
            .create(CreateProjectInput {
                name: "Existing".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let path = writePayload(&dir, &samplePayload());

        let result = service
            .fromJSON(ImportOptions {
                filePath: path,
                mode: ImportMode::Merge,
                validateOnly: false,
            })
            .await;
        assert!(result.success);
        let counts = result.imported.unwrap();
        assert_eq!(counts.projects, 2);
        assert_eq!(counts.tasks, 2);

        // Merge leaves existing data intact
        assert_eq!(db.projects.count(), 3);
        assert!(db.projects.get(&existing.id).is_some());

        // Fresh identities: the payload ids are gone, and every surviving
        // task points at one of the newly minted projects
        assert!(db.projects.get("p1").is_none());
        assert!(db.tasks.get("t1").is_none());
        let newIds: HashSet<String> = db
            .projects
            .find(|p| p.id != existing.id)
            .into_iter()
            .map(|p| p.id)
            .collect();
        let tasks = db.tasks.find(|_| true);
        assert_eq!(tasks.len(), 2);
        for task in &tasks {
            assert!(newIds.contains(&task.projectId));
        }
        assert!(tasks.iter().all(|t| t.title != "orphan"));
    }

    #[tokio::test]
    async fn test_merge_keeps_payload_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let (db, service) = setup(&dir).await;
        let path = writePayload(
            &dir,
            &json!({
                "projects": [{
                    "_id": "p1",
                    "name": "Dated",
                    "createdAt": "2020-01-02T03:04:05.000Z",
                    "updatedAt": "2021-06-07T08:09:10.000Z",
                }],
                "tasks": [],
            }),
        );

        let result = service
            .fromJSON(ImportOptions {
                filePath: path,
                mode: ImportMode::Merge,
                validateOnly: false,
            })
            .await;
        assert!(result.success);
        let project = &db.projects.find(|_| true)[0];
        assert_eq!(project.createdAt.to_rfc3339(), "2020-01-02T03:04:05+00:00");
        assert_eq!(project.updatedAt.to_rfc3339(), "2021-06-07T08:09:10+00:00");
    }

    #[tokio::test]
    async fn test_invalid_status_warns_then_coerces_on_mutating_import() {
        let dir = tempfile::tempdir().unwrap();
        let (db, service) = setup(&dir).await;
        let path = writePayload(
            &dir,
            &json!({
                "projects": [{"_id": "p1", "name": "Alpha"}],
                "tasks": [{"_id": "t1", "projectId": "p1", "title": "weird", "status": "paused"}],
            }),
        );

        let validated = service
            .fromJSON(ImportOptions {
                filePath: path.clone(),
                mode: ImportMode::Merge,
                validateOnly: true,
            })
            .await;
        assert!(validated.success);
        assert_eq!(validated.warnings.len(), 1);
        assert!(validated.warnings[0].contains("invalid status: paused"));

        let result = service
            .fromJSON(ImportOptions {
                filePath: path,
                mode: ImportMode::Merge,
                validateOnly: false,
            })
            .await;
        assert!(result.success);
        let task = &db.tasks.find(|_| true)[0];
        assert_eq!(task.status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_replace_wipes_and_preserves_payload_ids() {
        let dir = tempfile::tempdir().unwrap();
        let (db, service) = setup(&dir).await;
        ProjectService::new(db.clone())
            .create(CreateProjectInput {
                name: "Doomed".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let path = writePayload(&dir, &samplePayload());

        let result = service
            .fromJSON(ImportOptions {
                filePath: path,
                mode: ImportMode::Replace,
                validateOnly: false,
            })
            .await;
        assert!(result.success);
        assert_eq!(db.projects.count(), 2);
        assert_eq!(db.tasks.count(), 2);
        assert!(db.projects.get("p1").is_some());
        assert!(db.projects.get("p2").is_some());
        assert_eq!(db.tasks.get("t1").unwrap().projectId, "p1");
        assert!(db.tasks.get("t3").is_none());
    }

    #[tokio::test]
    async fn test_restore_requires_backup_tag_and_deletes_nothing_otherwise() {
        let dir = tempfile::tempdir().unwrap();
        let (db, service) = setup(&dir).await;
        let existing = ProjectService::new(db.clone())
            .create(CreateProjectInput {
                name: "Survivor".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        // A plain export payload is not a backup
        let path = writePayload(&dir, &samplePayload());

        let result = service.restoreBackup(&path).await;
        assert!(!result.success);
        assert_eq!(result.errors, vec!["Invalid backup file format"]);
        assert!(db.projects.get(&existing.id).is_some());
        assert_eq!(db.projects.count(), 1);
    }

    #[tokio::test]
    async fn test_restore_replaces_everything_preserving_ids() {
        let dir = tempfile::tempdir().unwrap();
        let (db, service) = setup(&dir).await;
        ProjectService::new(db.clone())
            .create(CreateProjectInput {
                name: "Old".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut payload = samplePayload();
        payload["type"] = json!(BACKUP_TYPE);
        payload["backupDate"] = json!("2024-01-01T00:00:00.000Z");
        let path = writePayload(&dir, &payload);

        let result = service.restoreBackup(&path).await;
        assert!(result.success);
        let counts = result.imported.unwrap();
        assert_eq!(counts.projects, 2);
        // Restore keeps even the payload-orphaned task
        assert_eq!(counts.tasks, 3);
        assert_eq!(db.projects.count(), 2);
        assert_eq!(db.tasks.count(), 3);
        assert!(db.projects.get("p1").is_some());
        assert!(db.tasks.get("t3").is_some());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_structured_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, service) = setup(&dir).await;

        let result = service
            .fromJSON(ImportOptions {
                filePath: dir.path().join("missing.json").to_string_lossy().to_string(),
                mode: ImportMode::Merge,
                validateOnly: false,
            })
            .await;
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("Failed to read import file"));

        let garbled = dir.path().join("garbled.json");
        fs::write(&garbled, "{not json").unwrap();
        let result = service
            .fromJSON(ImportOptions {
                filePath: garbled.to_string_lossy().to_string(),
                mode: ImportMode::Replace,
                validateOnly: false,
            })
            .await;
        assert!(!result.success);
        assert!(result.errors[0].contains("Failed to parse import file"));
    }
}
