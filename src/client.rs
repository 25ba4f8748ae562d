// Client state manager
// An in-memory mirror of the visible project list and the selected project's
// tasks. Every mutation is optimistic: apply the change locally first, issue
// the real call over the transport, then confirm with the authoritative
// entity or roll the snapshot back and surface a failure notice.
//
// Two in-flight mutations against the same entity resolve last-write-wins
// (the later response overwrites the cache). That weak ordering is accepted
// in exchange for never blocking the UI on a round-trip.

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::models::{
    CreateProjectInput, CreateTaskInput, Project, ProjectSettings, Task, TaskStatus,
    UpdateProjectInput, UpdateTaskInput,
};
use crate::models::project::DEFAULT_COLOR;
use crate::rpc::Transport;
use serde::de::DeserializeOwned;

const TEMP_PREFIX: &str = "temp-";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Placeholder id for an entity the store has not confirmed yet. The store
/// mints uuids, so the prefix cannot collide.
fn tempId() -> String {
    format!(
        "{}{}-{}",
        TEMP_PREFIX,
        Utc::now().timestamp_millis(),
        TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

pub fn isTempId(id: &str) -> bool {
    id.starts_with(TEMP_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// User-facing outcome of a mutating action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct BoardState {
    pub projects: Vec<Project>,
    pub currentProjectId: Option<String>,
    pub showArchivedProjects: bool,
    pub tasks: Vec<Task>,
    pub loadingProjects: bool,
    pub loadingTasks: bool,
}

pub struct BoardStore {
    transport: Arc<dyn Transport>,
    state: RwLock<BoardState>,
    notices: broadcast::Sender<Notice>,
}

impl BoardStore {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (notices, _) = broadcast::channel(64);
        Self {
            transport,
            state: RwLock::new(BoardState::default()),
            notices,
        }
    }

    /// Snapshot of the current state; rendering reads this synchronously
    pub fn snapshot(&self) -> BoardState {
        self.state.read().clone()
    }

    pub fn subscribeNotices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Pure lookup, never triggers I/O
    pub fn currentProject(&self) -> Option<Project> {
        let state = self.state.read();
        let id = state.currentProjectId.as_deref()?;
        state.projects.iter().find(|p| p.id == id).cloned()
    }

    /// Pure filter, never triggers I/O
    pub fn visibleProjects(&self) -> Vec<Project> {
        let state = self.state.read();
        if state.showArchivedProjects {
            state.projects.clone()
        } else {
            state.projects.iter().filter(|p| !p.isArchived).cloned().collect()
        }
    }

    fn notifySuccess(&self, message: String) {
        let _ = self.notices.send(Notice {
            kind: NoticeKind::Success,
            message,
        });
    }

    fn notifyError(&self, message: String) {
        tracing::warn!("[BoardStore] {}", message);
        let _ = self.notices.send(Notice {
            kind: NoticeKind::Error,
            message,
        });
    }

    async fn invoke<T: DeserializeOwned>(&self, method: &str, args: Value) -> Result<T, String> {
        let result = self.transport.call(method, args).await?;
        serde_json::from_value(result)
            .map_err(|e| format!("Unexpected response from {}: {}", method, e))
    }

    // ============================================
    // PROJECT ACTIONS
    // ============================================

    /// Reload the project list, filtered server-side by the archived toggle
    pub async fn loadProjects(&self) -> Result<(), String> {
        let showArchived = {
            let mut state = self.state.write();
            state.loadingProjects = true;
            state.showArchivedProjects
        };
        let result: Result<Vec<Project>, String> =
            self.invoke("project:getAll", json!([showArchived])).await;
        let mut state = self.state.write();
        state.loadingProjects = false;
        match result {
            Ok(projects) => {
                state.projects = projects;
                Ok(())
            }
            Err(e) => {
                tracing::error!("[BoardStore::loadProjects] {}", e);
                Err(e)
            }
        }
    }

    pub async fn createProject(&self, data: CreateProjectInput) -> Result<Project, String> {
        let now = Utc::now();
        let temp = Project {
            id: tempId(),
            name: data.name.trim().to_string(),
            description: data.description.clone(),
            color: data.color.clone().unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            icon: data.icon.clone(),
            isArchived: false,
            settings: data.settings.clone().or_else(|| Some(ProjectSettings::default())),
            createdAt: now,
            updatedAt: now,
        };
        let previousCurrent = {
            let mut state = self.state.write();
            let previous = state.currentProjectId.clone();
            // New projects show on top, selected, before the store confirms
            state.projects.insert(0, temp.clone());
            state.currentProjectId = Some(temp.id.clone());
            previous
        };

        match self.invoke::<Project>("project:create", json!([data])).await {
            Ok(project) => {
                {
                    let mut state = self.state.write();
                    if let Some(slot) = state.projects.iter_mut().find(|p| p.id == temp.id) {
                        *slot = project.clone();
                    }
                    if state.currentProjectId.as_deref() == Some(temp.id.as_str()) {
                        state.currentProjectId = Some(project.id.clone());
                    }
                }
                self.notifySuccess(format!("Project \"{}\" created", project.name));
                Ok(project)
            }
            Err(e) => {
                {
                    let mut state = self.state.write();
                    state.projects.retain(|p| p.id != temp.id);
                    if state.currentProjectId.as_deref() == Some(temp.id.as_str()) {
                        state.currentProjectId = previousCurrent;
                    }
                }
                self.notifyError(format!("Failed to create project: {}", e));
                Err(e)
            }
        }
    }

    pub async fn updateProject(&self, id: &str, data: UpdateProjectInput) -> Result<(), String> {
        let args = json!([id, &data]);
        self.confirmProjectMutation(
            id,
            "project:update",
            args,
            move |project| {
                if let Some(name) = &data.name {
                    project.name = name.trim().to_string();
                }
                if let Some(description) = &data.description {
                    project.description = Some(description.clone());
                }
                if let Some(color) = &data.color {
                    project.color = color.clone();
                }
                if let Some(icon) = &data.icon {
                    project.icon = Some(icon.clone());
                }
                if let Some(isArchived) = data.isArchived {
                    project.isArchived = isArchived;
                }
                if let Some(settings) = &data.settings {
                    project.settings = Some(settings.clone());
                }
            },
            "update",
        )
        .await
    }

    pub async fn archiveProject(&self, id: &str) -> Result<(), String> {
        let args = json!([id]);
        self.confirmProjectMutation(id, "project:archive", args, |p| p.isArchived = true, "archive")
            .await
    }

    pub async fn unarchiveProject(&self, id: &str) -> Result<(), String> {
        let args = json!([id]);
        self.confirmProjectMutation(
            id,
            "project:unarchive",
            args,
            |p| p.isArchived = false,
            "unarchive",
        )
        .await
    }

    pub async fn deleteProject(&self, id: &str) -> Result<(), String> {
        // Rollback snapshot: the entity, where it sat, and the selection
        let snapshot = {
            let mut state = self.state.write();
            let index = state.projects.iter().position(|p| p.id == id);
            let entity = index.map(|i| state.projects.remove(i));
            let previousCurrent = state.currentProjectId.clone();
            if state.currentProjectId.as_deref() == Some(id) {
                state.currentProjectId = None;
            }
            (entity, index, previousCurrent)
        };

        match self.invoke::<Option<Project>>("project:delete", json!([id])).await {
            Ok(_) => {
                self.notifySuccess("Project deleted".to_string());
                Ok(())
            }
            Err(e) => {
                {
                    let mut state = self.state.write();
                    if let (Some(entity), Some(index)) = (snapshot.0, snapshot.1) {
                        let index = index.min(state.projects.len());
                        state.projects.insert(index, entity);
                    }
                    state.currentProjectId = snapshot.2;
                }
                self.notifyError(format!("Failed to delete project: {}", e));
                Err(e)
            }
        }
    }

    /// Apply-then-confirm for field mutations of one project
    async fn confirmProjectMutation(
        &self,
        id: &str,
        method: &str,
        args: Value,
        apply: impl FnOnce(&mut Project),
        action: &str,
    ) -> Result<(), String> {
        let snapshot = {
            let mut state = self.state.write();
            let snapshot = state.projects.iter().find(|p| p.id == id).cloned();
            if let Some(project) = state.projects.iter_mut().find(|p| p.id == id) {
                apply(project);
                project.updatedAt = Utc::now();
            }
            snapshot
        };

        match self.invoke::<Option<Project>>(method, args).await {
            Ok(Some(updated)) => {
                {
                    let mut state = self.state.write();
                    if let Some(slot) = state.projects.iter_mut().find(|p| p.id == updated.id) {
                        *slot = updated;
                    }
                }
                self.notifySuccess(format!("Project {}d", action));
                Ok(())
            }
            Ok(None) => {
                self.rollbackProject(id, snapshot);
                let message = "Project not found".to_string();
                self.notifyError(format!("Failed to {} project: {}", action, message));
                Err(message)
            }
            Err(e) => {
                self.rollbackProject(id, snapshot);
                self.notifyError(format!("Failed to {} project: {}", action, e));
                Err(e)
            }
        }
    }

    fn rollbackProject(&self, id: &str, snapshot: Option<Project>) {
        if let Some(original) = snapshot {
            let mut state = self.state.write();
            if let Some(slot) = state.projects.iter_mut().find(|p| p.id == id) {
                *slot = original;
            }
        }
    }

    /// Switch the board to another project: the task list clears immediately
    /// so the previous project's tasks never linger, then the new list loads
    pub async fn selectProject(&self, id: Option<String>) -> Result<(), String> {
        {
            let mut state = self.state.write();
            state.currentProjectId = id.clone();
            state.tasks.clear();
        }
        match id {
            Some(id) => self.loadTasks(&id).await,
            None => Ok(()),
        }
    }

    /// Flip the archived-visibility toggle and reload; the filter is applied
    /// server-side, so the list briefly shows the old results until the
    /// reload lands
    pub async fn toggleShowArchived(&self) -> Result<(), String> {
        {
            let mut state = self.state.write();
            state.showArchivedProjects = !state.showArchivedProjects;
        }
        self.loadProjects().await
    }

    // ============================================
    // TASK ACTIONS
    // ============================================

    pub async fn loadTasks(&self, projectId: &str) -> Result<(), String> {
        {
            let mut state = self.state.write();
            state.loadingTasks = true;
        }
        let result: Result<Vec<Task>, String> =
            self.invoke("task:getByProject", json!([projectId, false])).await;
        let mut state = self.state.write();
        state.loadingTasks = false;
        match result {
            Ok(tasks) => {
                state.tasks = tasks;
                Ok(())
            }
            Err(e) => {
                tracing::error!("[BoardStore::loadTasks] {}", e);
                Err(e)
            }
        }
    }

    pub async fn createTask(&self, data: CreateTaskInput) -> Result<Task, String> {
        let now = Utc::now();
        let status = data.status.unwrap_or_default();
        let temp = {
            let mut state = self.state.write();
            // Optimistic append-to-column position, recomputed by the store
            let position = state
                .tasks
                .iter()
                .filter(|t| t.projectId == data.projectId && t.status == status)
                .map(|t| t.position)
                .max()
                .map(|max| max + 1)
                .unwrap_or(0);
            let temp = Task {
                id: tempId(),
                projectId: data.projectId.clone(),
                title: data.title.trim().to_string(),
                description: data.description.clone(),
                status,
                priority: data.priority.unwrap_or_default(),
                labels: data.labels.clone().unwrap_or_default(),
                dueDate: data.dueDate,
                checklist: data.checklist.clone().unwrap_or_default(),
                position,
                isArchived: false,
                createdAt: now,
                updatedAt: now,
            };
            state.tasks.push(temp.clone());
            temp
        };

        match self.invoke::<Task>("task:create", json!([data])).await {
            Ok(task) => {
                {
                    let mut state = self.state.write();
                    if let Some(slot) = state.tasks.iter_mut().find(|t| t.id == temp.id) {
                        *slot = task.clone();
                    }
                }
                self.notifySuccess(format!("Task \"{}\" created", task.title));
                Ok(task)
            }
            Err(e) => {
                {
                    let mut state = self.state.write();
                    state.tasks.retain(|t| t.id != temp.id);
                }
                self.notifyError(format!("Failed to create task: {}", e));
                Err(e)
            }
        }
    }

    pub async fn updateTask(&self, id: &str, data: UpdateTaskInput) -> Result<(), String> {
        let args = json!([id, &data]);
        self.confirmTaskMutation(
            id,
            "task:update",
            args,
            move |task| {
                if let Some(title) = &data.title {
                    task.title = title.trim().to_string();
                }
                if let Some(description) = &data.description {
                    task.description = Some(description.clone());
                }
                if let Some(status) = data.status {
                    task.status = status;
                }
                if let Some(priority) = data.priority {
                    task.priority = priority;
                }
                if let Some(labels) = &data.labels {
                    task.labels = labels.clone();
                }
                if let Some(dueDate) = data.dueDate {
                    task.dueDate = Some(dueDate);
                }
                if let Some(checklist) = &data.checklist {
                    task.checklist = checklist.clone();
                }
                if let Some(position) = data.position {
                    task.position = position;
                }
                if let Some(isArchived) = data.isArchived {
                    task.isArchived = isArchived;
                }
            },
            "update",
        )
        .await
    }

    /// Drag-and-drop move: overwrite status and position, optimistically
    pub async fn updateTaskPosition(
        &self,
        id: &str,
        status: TaskStatus,
        position: i64,
    ) -> Result<(), String> {
        let args = json!([id, status, position]);
        self.confirmTaskMutation(
            id,
            "task:updatePosition",
            args,
            move |task| {
                task.status = status;
                task.position = position;
            },
            "move",
        )
        .await
    }

    pub async fn deleteTask(&self, id: &str) -> Result<(), String> {
        let snapshot = {
            let mut state = self.state.write();
            let index = state.tasks.iter().position(|t| t.id == id);
            (index.map(|i| state.tasks.remove(i)), index)
        };

        match self.invoke::<Option<Task>>("task:delete", json!([id])).await {
            Ok(_) => {
                self.notifySuccess("Task deleted".to_string());
                Ok(())
            }
            Err(e) => {
                {
                    let mut state = self.state.write();
                    if let (Some(entity), Some(index)) = snapshot {
                        let index = index.min(state.tasks.len());
                        state.tasks.insert(index, entity);
                    }
                }
                self.notifyError(format!("Failed to delete task: {}", e));
                Err(e)
            }
        }
    }

    pub async fn archiveTask(&self, id: &str) -> Result<(), String> {
        let args = json!([id]);
        self.confirmTaskMutation(id, "task:archive", args, |t| t.isArchived = true, "archive")
            .await
    }

    /// The one non-optimistic mutation: a multi-item reorder's intermediate
    /// states are not worth speculating, so write the batch and reload
    pub async fn reorderTasks(
        &self,
        projectId: &str,
        status: TaskStatus,
        taskIds: Vec<String>,
    ) -> Result<(), String> {
        let result: Result<crate::services::ReorderResult, String> = self
            .invoke("task:reorder", json!([projectId, status, taskIds]))
            .await;
        match result {
            Ok(_) => {
                self.loadTasks(projectId).await?;
                self.notifySuccess("Tasks reordered".to_string());
                Ok(())
            }
            Err(e) => {
                self.notifyError(format!("Failed to reorder tasks: {}", e));
                Err(e)
            }
        }
    }

    /// Apply-then-confirm for field mutations of one task
    async fn confirmTaskMutation(
        &self,
        id: &str,
        method: &str,
        args: Value,
        apply: impl FnOnce(&mut Task),
        action: &str,
    ) -> Result<(), String> {
        let snapshot = {
            let mut state = self.state.write();
            let snapshot = state.tasks.iter().find(|t| t.id == id).cloned();
            if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
                apply(task);
                task.updatedAt = Utc::now();
            }
            snapshot
        };

        match self.invoke::<Option<Task>>(method, args).await {
            Ok(Some(updated)) => {
                {
                    let mut state = self.state.write();
                    if let Some(slot) = state.tasks.iter_mut().find(|t| t.id == updated.id) {
                        *slot = updated;
                    }
                }
                self.notifySuccess(format!("Task {}d", action));
                Ok(())
            }
            Ok(None) => {
                self.rollbackTask(id, snapshot);
                let message = "Task not found".to_string();
                self.notifyError(format!("Failed to {} task: {}", action, message));
                Err(message)
            }
            Err(e) => {
                self.rollbackTask(id, snapshot);
                self.notifyError(format!("Failed to {} task: {}", action, e));
                Err(e)
            }
        }
    }

    fn rollbackTask(&self, id: &str, snapshot: Option<Task>) {
        if let Some(original) = snapshot {
            let mut state = self.state.write();
            if let Some(slot) = state.tasks.iter_mut().find(|t| t.id == id) {
                *slot = original;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::Api;
    use crate::store::{AppPaths, Database};
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Real dispatcher with per-method simulated faults
    struct Flaky {
        inner: Api,
        failing: parking_lot::Mutex<HashSet<String>>,
    }

    impl Flaky {
        fn failOn(&self, method: &str) {
            self.failing.lock().insert(method.to_string());
        }
    }

    #[async_trait]
    impl Transport for Flaky {
        async fn call(&self, method: &str, args: Value) -> Result<Value, String> {
            if self.failing.lock().contains(method) {
                return Err("simulated transport failure".to_string());
            }
            self.inner.call(method, args).await
        }
    }

    async fn setup(dir: &tempfile::TempDir) -> (Arc<Flaky>, BoardStore) {
        let db = Database::init(AppPaths {
            dataDir: dir.path().join("data"),
            downloadsDir: dir.path().join("downloads"),
        })
        .await
        .unwrap();
        let flaky = Arc::new(Flaky {
            inner: Api::new(db),
            failing: parking_lot::Mutex::new(HashSet::new()),
        });
        let store = BoardStore::new(flaky.clone());
        (flaky, store)
    }

    fn projectInput(name: &str) -> CreateProjectInput {
        CreateProjectInput {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn taskInput(projectId: &str, title: &str) -> CreateTaskInput {
        CreateTaskInput {
            projectId: projectId.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_project_confirms_with_store_identity() {
        let dir = tempfile::tempdir().unwrap();
        let (_flaky, store) = setup(&dir).await;

        let project = store.createProject(projectInput("Home")).await.unwrap();
        assert!(!isTempId(&project.id));

        let state = store.snapshot();
        assert_eq!(state.projects.len(), 1);
        assert!(!isTempId(&state.projects[0].id));
        assert_eq!(state.currentProjectId.as_deref(), Some(project.id.as_str()));
    }

    #[tokio::test]
    async fn test_create_project_rolls_back_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (flaky, store) = setup(&dir).await;

        let seeded = store.createProject(projectInput("Seeded")).await.unwrap();
        let mut notices = store.subscribeNotices();

        flaky.failOn("project:create");
        let result = store.createProject(projectInput("Doomed")).await;
        assert!(result.is_err());

        let state = store.snapshot();
        assert_eq!(state.projects.len(), 1);
        assert!(state.projects.iter().all(|p| !isTempId(&p.id)));
        // Selection falls back to the project that was current before
        assert_eq!(state.currentProjectId.as_deref(), Some(seeded.id.as_str()));

        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(notice.message.contains("Failed to create project"));
    }

    #[tokio::test]
    async fn test_create_task_rolls_back_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (flaky, store) = setup(&dir).await;

        let project = store.createProject(projectInput("Board")).await.unwrap();
        store.createTask(taskInput(&project.id, "kept")).await.unwrap();
        let countBefore = store.snapshot().tasks.len();

        flaky.failOn("task:create");
        let result = store.createTask(taskInput(&project.id, "doomed")).await;
        assert!(result.is_err());

        let state = store.snapshot();
        assert_eq!(state.tasks.len(), countBefore);
        assert!(state.tasks.iter().all(|t| !isTempId(&t.id)));
    }

    #[tokio::test]
    async fn test_optimistic_task_update_reverts_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (flaky, store) = setup(&dir).await;

        let project = store.createProject(projectInput("Board")).await.unwrap();
        let task = store.createTask(taskInput(&project.id, "original")).await.unwrap();

        flaky.failOn("task:update");
        let result = store
            .updateTask(
                &task.id,
                UpdateTaskInput {
                    title: Some("changed".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(result.is_err());

        let state = store.snapshot();
        let reverted = state.tasks.iter().find(|t| t.id == task.id).unwrap();
        assert_eq!(reverted.title, "original");
        assert_eq!(reverted.updatedAt, task.updatedAt);
    }

    #[tokio::test]
    async fn test_update_task_confirms_with_server_entity() {
        let dir = tempfile::tempdir().unwrap();
        let (_flaky, store) = setup(&dir).await;

        let project = store.createProject(projectInput("Board")).await.unwrap();
        let task = store.createTask(taskInput(&project.id, "original")).await.unwrap();

        store
            .updateTask(
                &task.id,
                UpdateTaskInput {
                    title: Some("renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let state = store.snapshot();
        assert_eq!(state.tasks[0].title, "renamed");
    }

    #[tokio::test]
    async fn test_update_missing_task_is_error_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let (_flaky, store) = setup(&dir).await;

        let err = store
            .updateTask("missing", UpdateTaskInput::default())
            .await
            .unwrap_err();
        assert_eq!(err, "Task not found");
    }

    #[tokio::test]
    async fn test_delete_project_failure_restores_entity_and_selection() {
        let dir = tempfile::tempdir().unwrap();
        let (flaky, store) = setup(&dir).await;

        store.createProject(projectInput("First")).await.unwrap();
        let second = store.createProject(projectInput("Second")).await.unwrap();
        // createProject prepends, so "Second" sits at index 0 and is current

        flaky.failOn("project:delete");
        assert!(store.deleteProject(&second.id).await.is_err());

        let state = store.snapshot();
        assert_eq!(state.projects.len(), 2);
        assert_eq!(state.projects[0].id, second.id);
        assert_eq!(state.currentProjectId.as_deref(), Some(second.id.as_str()));
    }

    #[tokio::test]
    async fn test_delete_task_applies_immediately_and_confirms() {
        let dir = tempfile::tempdir().unwrap();
        let (_flaky, store) = setup(&dir).await;

        let project = store.createProject(projectInput("Board")).await.unwrap();
        let task = store.createTask(taskInput(&project.id, "bye")).await.unwrap();

        store.deleteTask(&task.id).await.unwrap();
        assert!(store.snapshot().tasks.is_empty());
    }

    #[tokio::test]
    async fn test_reorder_is_a_barrier_that_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let (_flaky, store) = setup(&dir).await;

        let project = store.createProject(projectInput("Board")).await.unwrap();
        let a = store.createTask(taskInput(&project.id, "a")).await.unwrap();
        let b = store.createTask(taskInput(&project.id, "b")).await.unwrap();
        let c = store.createTask(taskInput(&project.id, "c")).await.unwrap();

        store
            .reorderTasks(
                &project.id,
                TaskStatus::Todo,
                vec![c.id.clone(), a.id.clone(), b.id.clone()],
            )
            .await
            .unwrap();

        let titles: Vec<String> = store.snapshot().tasks.iter().map(|t| t.title.clone()).collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_select_project_clears_tasks_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let (_flaky, store) = setup(&dir).await;

        let first = store.createProject(projectInput("First")).await.unwrap();
        store.createTask(taskInput(&first.id, "only here")).await.unwrap();
        let second = store.createProject(projectInput("Second")).await.unwrap();

        store.selectProject(Some(second.id.clone())).await.unwrap();
        let state = store.snapshot();
        assert_eq!(state.currentProjectId.as_deref(), Some(second.id.as_str()));
        assert!(state.tasks.is_empty());

        store.selectProject(None).await.unwrap();
        assert!(store.snapshot().currentProjectId.is_none());
    }

    #[tokio::test]
    async fn test_toggle_show_archived_reloads_with_server_filter() {
        let dir = tempfile::tempdir().unwrap();
        let (_flaky, store) = setup(&dir).await;

        store.createProject(projectInput("Visible")).await.unwrap();
        let hidden = store.createProject(projectInput("Hidden")).await.unwrap();
        store.archiveProject(&hidden.id).await.unwrap();

        store.loadProjects().await.unwrap();
        assert_eq!(store.snapshot().projects.len(), 1);

        store.toggleShowArchived().await.unwrap();
        let state = store.snapshot();
        assert!(state.showArchivedProjects);
        assert_eq!(state.projects.len(), 2);
        assert_eq!(store.visibleProjects().len(), 2);
    }

    #[tokio::test]
    async fn test_archive_project_failure_rolls_back_flag() {
        let dir = tempfile::tempdir().unwrap();
        let (flaky, store) = setup(&dir).await;

        let project = store.createProject(projectInput("Stays")).await.unwrap();
        flaky.failOn("project:archive");
        assert!(store.archiveProject(&project.id).await.is_err());

        let state = store.snapshot();
        assert!(!state.projects[0].isArchived);
    }

    #[tokio::test]
    async fn test_update_position_failure_reverts_column_move() {
        let dir = tempfile::tempdir().unwrap();
        let (flaky, store) = setup(&dir).await;

        let project = store.createProject(projectInput("Board")).await.unwrap();
        let task = store.createTask(taskInput(&project.id, "dragged")).await.unwrap();

        flaky.failOn("task:updatePosition");
        assert!(store
            .updateTaskPosition(&task.id, TaskStatus::Done, 3)
            .await
            .is_err());

        let state = store.snapshot();
        assert_eq!(state.tasks[0].status, TaskStatus::Todo);
        assert_eq!(state.tasks[0].position, task.position);
    }

    #[tokio::test]
    async fn test_mutations_emit_notices() {
        let dir = tempfile::tempdir().unwrap();
        let (_flaky, store) = setup(&dir).await;
        let mut notices = store.subscribeNotices();

        store.createProject(projectInput("Cheers")).await.unwrap();
        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.kind, NoticeKind::Success);
        assert!(notice.message.contains("Cheers"));
    }

    #[tokio::test]
    async fn test_current_project_lookup_is_pure() {
        let dir = tempfile::tempdir().unwrap();
        let (_flaky, store) = setup(&dir).await;

        assert!(store.currentProject().is_none());
        let project = store.createProject(projectInput("Picked")).await.unwrap();
        assert_eq!(store.currentProject().unwrap().id, project.id);
    }
}
