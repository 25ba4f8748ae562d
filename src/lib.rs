// Allow non-snake_case names for JSON serialization compatibility with TypeScript frontend
#![allow(non_snake_case)]

pub mod client;
pub mod models;
pub mod rpc;
pub mod services;
pub mod status;
pub mod store;

use std::sync::Arc;

pub use client::{BoardStore, Notice, NoticeKind};
pub use rpc::{Api, FilePicker, Transport};
pub use status::DbStatus;
pub use store::{AppPaths, Database, DatabaseState};

/// Install the global log subscriber (no-op when one is already set)
pub fn initLogging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();
}

/// Everything a desktop shell needs to mount the core
pub struct App {
    pub db: DatabaseState,
    pub api: Arc<Api>,
    pub board: BoardStore,
}

/// Open the store and wire up the dispatcher and the client state manager
pub async fn bootstrap(paths: AppPaths) -> Result<App, String> {
    let db = Database::init(paths).await?;
    let api = Arc::new(Api::new(db.clone()));
    let board = BoardStore::new(api.clone());
    Ok(App { db, api, board })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateProjectInput;

    #[tokio::test]
    async fn test_bootstrap_wires_the_whole_core() {
        let dir = tempfile::tempdir().unwrap();
        let app = bootstrap(AppPaths {
            dataDir: dir.path().join("data"),
            downloadsDir: dir.path().join("downloads"),
        })
        .await
        .unwrap();

        assert!(app.db.status.status().isConnected());

        let project = app
            .board
            .createProject(CreateProjectInput {
                name: "Smoke".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(app.db.projects.get(&project.id).unwrap().name, "Smoke");
    }
}
