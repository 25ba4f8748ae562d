// Project service - business rules over the projects collection
// Mutations return the post-mutation document, or None when the id is unknown

use crate::models::{CreateProjectInput, Project, ProjectSettings, UpdateProjectInput};
use crate::models::project::DEFAULT_COLOR;
use crate::store::DatabaseState;
use chrono::Utc;

const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;

fn validateName(name: &str) -> Result<String, String> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err("Project name is required".to_string());
    }
    if name.chars().count() > NAME_MAX {
        return Err(format!("Project name must be at most {} characters", NAME_MAX));
    }
    Ok(name)
}

fn validateDescription(description: Option<String>) -> Result<Option<String>, String> {
    match description {
        Some(d) => {
            let d = d.trim().to_string();
            if d.chars().count() > DESCRIPTION_MAX {
                return Err(format!(
                    "Project description must be at most {} characters",
                    DESCRIPTION_MAX
                ));
            }
            Ok(if d.is_empty() { None } else { Some(d) })
        }
        None => Ok(None),
    }
}

#[derive(Clone)]
pub struct ProjectService {
    db: DatabaseState,
}

impl ProjectService {
    pub fn new(db: DatabaseState) -> Self {
        Self { db }
    }

    pub async fn create(&self, data: CreateProjectInput) -> Result<Project, String> {
        let now = Utc::now();
        let project = Project {
            id: String::new(),
            name: validateName(&data.name)?,
            description: validateDescription(data.description)?,
            color: data.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            icon: data.icon,
            isArchived: false,
            settings: Some(data.settings.unwrap_or_else(ProjectSettings::default)),
            createdAt: now,
            updatedAt: now,
        };
        self.db
            .projects
            .insert(project)
            .inspect_err(|e| tracing::error!("[ProjectService::create] {}", e))
    }

    pub async fn findAll(&self, includeArchived: bool) -> Result<Vec<Project>, String> {
        Ok(self.db.projects.findSorted(
            |p| includeArchived || !p.isArchived,
            |a, b| b.updatedAt.cmp(&a.updatedAt),
        ))
    }

    pub async fn findById(&self, id: &str) -> Result<Option<Project>, String> {
        Ok(self.db.projects.get(id))
    }

    pub async fn update(
        &self,
        id: &str,
        data: UpdateProjectInput,
    ) -> Result<Option<Project>, String> {
        let name = match &data.name {
            Some(n) => Some(validateName(n)?),
            None => None,
        };
        let description = match data.description {
            Some(d) => Some(validateDescription(Some(d))?),
            None => None,
        };
        self.db
            .projects
            .update(id, |project| {
                if let Some(name) = name {
                    project.name = name;
                }
                if let Some(description) = description {
                    project.description = description;
                }
                if let Some(color) = data.color {
                    project.color = color;
                }
                if let Some(icon) = data.icon {
                    project.icon = Some(icon);
                }
                if let Some(isArchived) = data.isArchived {
                    project.isArchived = isArchived;
                }
                if let Some(settings) = data.settings {
                    project.settings = Some(settings);
                }
            })
            .inspect_err(|e| tracing::error!("[ProjectService::update] {}", e))
    }

    /// Hard delete; the project's tasks go with it
    pub async fn delete(&self, id: &str) -> Result<Option<Project>, String> {
        let removed = self
            .db
            .projects
            .remove(id)
            .inspect_err(|e| tracing::error!("[ProjectService::delete] {}", e))?;
        if removed.is_some() {
            self.db
                .tasks
                .removeWhere(|t| t.projectId == id)
                .inspect_err(|e| tracing::error!("[ProjectService::delete] task cascade: {}", e))?;
        }
        Ok(removed)
    }

    pub async fn archive(&self, id: &str) -> Result<Option<Project>, String> {
        self.db
            .projects
            .update(id, |project| project.isArchived = true)
            .inspect_err(|e| tracing::error!("[ProjectService::archive] {}", e))
    }

    pub async fn unarchive(&self, id: &str) -> Result<Option<Project>, String> {
        self.db
            .projects
            .update(id, |project| project.isArchived = false)
            .inspect_err(|e| tracing::error!("[ProjectService::unarchive] {}", e))
    }

    /// Relevance-ordered search over non-archived projects
    pub async fn search(&self, searchTerm: &str) -> Result<Vec<Project>, String> {
        Ok(self.db.projects.search(searchTerm, |p| !p.isArchived))
    }
}
