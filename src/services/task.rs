// Task service - position assignment, column ordering and archive semantics
// over the tasks collection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CreateTaskInput, Task, TaskStatus, UpdateTaskInput};
use crate::store::DatabaseState;

const TITLE_MAX: usize = 200;
const DESCRIPTION_MAX: usize = 2000;

fn validateTitle(title: &str) -> Result<String, String> {
    let title = title.trim().to_string();
    if title.is_empty() {
        return Err("Task title is required".to_string());
    }
    if title.chars().count() > TITLE_MAX {
        return Err(format!("Task title must be at most {} characters", TITLE_MAX));
    }
    Ok(title)
}

fn validateDescription(description: Option<String>) -> Result<Option<String>, String> {
    match description {
        Some(d) => {
            let d = d.trim().to_string();
            if d.chars().count() > DESCRIPTION_MAX {
                return Err(format!(
                    "Task description must be at most {} characters",
                    DESCRIPTION_MAX
                ));
            }
            Ok(if d.is_empty() { None } else { Some(d) })
        }
        None => Ok(None),
    }
}

/// Outcome of a bulk reorder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderResult {
    pub modifiedCount: usize,
}

#[derive(Clone)]
pub struct TaskService {
    db: DatabaseState,
}

impl TaskService {
    pub fn new(db: DatabaseState) -> Self {
        Self { db }
    }

    /// Create a task at the end of its column: position is the current max
    /// within (projectId, status) plus one, or 0 for an empty column
    pub async fn create(&self, data: CreateTaskInput) -> Result<Task, String> {
        if data.projectId.trim().is_empty() {
            return Err("Task projectId is required".to_string());
        }
        let status = data.status.unwrap_or_default();
        let position = self
            .db
            .tasks
            .find(|t| t.projectId == data.projectId && t.status == status)
            .iter()
            .map(|t| t.position)
            .max()
            .map(|max| max + 1)
            .unwrap_or(0);

        let now = Utc::now();
        let task = Task {
            id: String::new(),
            projectId: data.projectId.clone(),
            title: validateTitle(&data.title)?,
            description: validateDescription(data.description)?,
            status,
            priority: data.priority.unwrap_or_default(),
            labels: data.labels.unwrap_or_default(),
            dueDate: data.dueDate,
            checklist: data.checklist.unwrap_or_default(),
            position,
            isArchived: false,
            createdAt: now,
            updatedAt: now,
        };
        self.db
            .tasks
            .insert(task)
            .inspect_err(|e| tracing::error!("[TaskService::create] {}", e))
    }

    /// Board query: sorted by status then position so every column comes back
    /// internally ordered from one call
    pub async fn findByProject(
        &self,
        projectId: &str,
        includeArchived: bool,
    ) -> Result<Vec<Task>, String> {
        Ok(self.db.tasks.findSorted(
            |t| t.projectId == projectId && (includeArchived || !t.isArchived),
            |a, b| a.status.cmp(&b.status).then(a.position.cmp(&b.position)),
        ))
    }

    pub async fn findById(&self, id: &str) -> Result<Option<Task>, String> {
        Ok(self.db.tasks.get(id))
    }

    pub async fn update(&self, id: &str, data: UpdateTaskInput) -> Result<Option<Task>, String> {
        let title = match &data.title {
            Some(t) => Some(validateTitle(t)?),
            None => None,
        };
        let description = match data.description {
            Some(d) => Some(validateDescription(Some(d))?),
            None => None,
        };
        self.db
            .tasks
            .update(id, |task| {
                if let Some(title) = title {
                    task.title = title;
                }
                if let Some(description) = description {
                    task.description = description;
                }
                if let Some(status) = data.status {
                    task.status = status;
                }
                if let Some(priority) = data.priority {
                    task.priority = priority;
                }
                if let Some(labels) = data.labels {
                    task.labels = labels;
                }
                if let Some(dueDate) = data.dueDate {
                    task.dueDate = Some(dueDate);
                }
                if let Some(checklist) = data.checklist {
                    task.checklist = checklist;
                }
                if let Some(position) = data.position {
                    task.position = position;
                }
                if let Some(isArchived) = data.isArchived {
                    task.isArchived = isArchived;
                }
            })
            .inspect_err(|e| tracing::error!("[TaskService::update] {}", e))
    }

    pub async fn delete(&self, id: &str) -> Result<Option<Task>, String> {
        self.db
            .tasks
            .remove(id)
            .inspect_err(|e| tracing::error!("[TaskService::delete] {}", e))
    }

    pub async fn archive(&self, id: &str) -> Result<Option<Task>, String> {
        self.db
            .tasks
            .update(id, |task| task.isArchived = true)
            .inspect_err(|e| tracing::error!("[TaskService::archive] {}", e))
    }

    /// Overwrite status and position for a single drag-and-drop move.
    /// Siblings are not renumbered; gaps are fine because column order only
    /// depends on relative position values.
    pub async fn updatePosition(
        &self,
        id: &str,
        newStatus: TaskStatus,
        newPosition: i64,
    ) -> Result<Option<Task>, String> {
        self.db
            .tasks
            .update(id, |task| {
                task.status = newStatus;
                task.position = newPosition;
            })
            .inspect_err(|e| tracing::error!("[TaskService::updatePosition] {}", e))
    }

    /// Authoritative bulk reposition: every listed task of the project gets
    /// position = index-in-list and the given status, as one batch
    pub async fn reorderTasks(
        &self,
        projectId: &str,
        status: TaskStatus,
        taskIds: &[String],
    ) -> Result<ReorderResult, String> {
        let modifiedCount = self
            .db
            .tasks
            .updateBatch(taskIds, |task, index| {
                if task.projectId != projectId {
                    return false;
                }
                task.status = status;
                task.position = index as i64;
                true
            })
            .inspect_err(|e| tracing::error!("[TaskService::reorderTasks] {}", e))?;
        Ok(ReorderResult { modifiedCount })
    }

    /// Inclusive due-date range, non-archived only, soonest first
    pub async fn findByDueDate(
        &self,
        startDate: DateTime<Utc>,
        endDate: DateTime<Utc>,
    ) -> Result<Vec<Task>, String> {
        Ok(self.db.tasks.findSorted(
            |t| {
                !t.isArchived
                    && t.dueDate
                        .map(|due| due >= startDate && due <= endDate)
                        .unwrap_or(false)
            },
            |a, b| a.dueDate.cmp(&b.dueDate),
        ))
    }

    /// Relevance-ordered search within one project, non-archived only
    pub async fn search(&self, projectId: &str, searchTerm: &str) -> Result<Vec<Task>, String> {
        Ok(self
            .db
            .tasks
            .search(searchTerm, |t| t.projectId == projectId && !t.isArchived))
    }
}
