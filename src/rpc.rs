// Transport boundary
// Named-procedure calls: a method name plus a JSON array of positional
// arguments in, a JSON result or an error message out. Api is the in-process
// dispatcher the desktop shell registers its IPC handlers against; the client
// state manager talks to the same surface through the Transport trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::models::{CreateProjectInput, CreateTaskInput, TaskStatus, UpdateProjectInput, UpdateTaskInput};
use crate::services::{ExportOptions, ExportService, ImportOptions, ImportService, ProjectService, TaskService};
use crate::store::DatabaseState;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, method: &str, args: Value) -> Result<Value, String>;
}

/// File selection is dialog presentation, which the desktop shell owns;
/// the core only defines the seam
#[async_trait]
pub trait FilePicker: Send + Sync {
    /// Resolves to the chosen path, or None when the user cancelled
    async fn pickImportFile(&self) -> Result<Option<String>, String>;
}

fn arg<T: DeserializeOwned>(args: &Value, index: usize, name: &str) -> Result<T, String> {
    let value = args.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| format!("Invalid argument '{}': {}", name, e))
}

fn ok<T: Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| format!("Failed to serialize response: {}", e))
}

/// The full procedure surface of the core
pub struct Api {
    db: DatabaseState,
    projects: ProjectService,
    tasks: TaskService,
    export: ExportService,
    import: ImportService,
    filePicker: Option<Arc<dyn FilePicker>>,
}

impl Api {
    pub fn new(db: DatabaseState) -> Self {
        Self {
            projects: ProjectService::new(db.clone()),
            tasks: TaskService::new(db.clone()),
            export: ExportService::new(db.clone()),
            import: ImportService::new(db.clone()),
            db,
            filePicker: None,
        }
    }

    pub fn withFilePicker(mut self, picker: Arc<dyn FilePicker>) -> Self {
        self.filePicker = Some(picker);
        self
    }
}

#[async_trait]
impl Transport for Api {
    async fn call(&self, method: &str, args: Value) -> Result<Value, String> {
        match method {
            // Project procedures
            "project:create" => {
                let data: CreateProjectInput = arg(&args, 0, "data")?;
                ok(self.projects.create(data).await?)
            }
            "project:getAll" => {
                let includeArchived: Option<bool> = arg(&args, 0, "includeArchived")?;
                ok(self.projects.findAll(includeArchived.unwrap_or(false)).await?)
            }
            "project:getById" => {
                let id: String = arg(&args, 0, "id")?;
                ok(self.projects.findById(&id).await?)
            }
            "project:update" => {
                let id: String = arg(&args, 0, "id")?;
                let data: UpdateProjectInput = arg(&args, 1, "data")?;
                ok(self.projects.update(&id, data).await?)
            }
            "project:delete" => {
                let id: String = arg(&args, 0, "id")?;
                ok(self.projects.delete(&id).await?)
            }
            "project:archive" => {
                let id: String = arg(&args, 0, "id")?;
                ok(self.projects.archive(&id).await?)
            }
            "project:unarchive" => {
                let id: String = arg(&args, 0, "id")?;
                ok(self.projects.unarchive(&id).await?)
            }
            "project:search" => {
                let searchTerm: String = arg(&args, 0, "searchTerm")?;
                ok(self.projects.search(&searchTerm).await?)
            }

            // Task procedures
            "task:create" => {
                let data: CreateTaskInput = arg(&args, 0, "data")?;
                ok(self.tasks.create(data).await?)
            }
            "task:getByProject" => {
                let projectId: String = arg(&args, 0, "projectId")?;
                let includeArchived: Option<bool> = arg(&args, 1, "includeArchived")?;
                ok(self
                    .tasks
                    .findByProject(&projectId, includeArchived.unwrap_or(false))
                    .await?)
            }
            "task:getById" => {
                let id: String = arg(&args, 0, "id")?;
                ok(self.tasks.findById(&id).await?)
            }
            "task:update" => {
                let id: String = arg(&args, 0, "id")?;
                let data: UpdateTaskInput = arg(&args, 1, "data")?;
                ok(self.tasks.update(&id, data).await?)
            }
            "task:delete" => {
                let id: String = arg(&args, 0, "id")?;
                ok(self.tasks.delete(&id).await?)
            }
            "task:archive" => {
                let id: String = arg(&args, 0, "id")?;
                ok(self.tasks.archive(&id).await?)
            }
            "task:updatePosition" => {
                let id: String = arg(&args, 0, "id")?;
                let status: TaskStatus = arg(&args, 1, "status")?;
                let position: i64 = arg(&args, 2, "position")?;
                ok(self.tasks.updatePosition(&id, status, position).await?)
            }
            "task:reorder" => {
                let projectId: String = arg(&args, 0, "projectId")?;
                let status: TaskStatus = arg(&args, 1, "status")?;
                let taskIds: Vec<String> = arg(&args, 2, "taskIds")?;
                ok(self.tasks.reorderTasks(&projectId, status, &taskIds).await?)
            }
            "task:getByDueDate" => {
                let startDate: DateTime<Utc> = arg(&args, 0, "startDate")?;
                let endDate: DateTime<Utc> = arg(&args, 1, "endDate")?;
                ok(self.tasks.findByDueDate(startDate, endDate).await?)
            }
            "task:search" => {
                let projectId: String = arg(&args, 0, "projectId")?;
                let searchTerm: String = arg(&args, 1, "searchTerm")?;
                ok(self.tasks.search(&projectId, &searchTerm).await?)
            }

            // Export procedures
            "export:toJSON" => {
                let options: ExportOptions = arg(&args, 0, "options")?;
                ok(self.export.toJSON(options).await)
            }
            "export:toCSV" => {
                let options: ExportOptions = arg(&args, 0, "options")?;
                ok(self.export.toCSV(options).await)
            }
            "export:createBackup" => ok(self.export.createBackup().await),
            "export:listBackups" => ok(self.export.listBackups().await),

            // Import procedures
            "import:fromJSON" => {
                let options: ImportOptions = arg(&args, 0, "options")?;
                ok(self.import.fromJSON(options).await)
            }
            "import:restoreBackup" => {
                let backupPath: String = arg(&args, 0, "backupPath")?;
                ok(self.import.restoreBackup(&backupPath).await)
            }
            "import:selectFile" => match &self.filePicker {
                Some(picker) => ok(picker.pickImportFile().await?),
                None => Err("No file picker is available".to_string()),
            },

            // Database status
            "database:getStatus" => ok(self.db.status.status()),

            _ => Err(format!("Unknown method: {}", method)),
        }
    }
}
