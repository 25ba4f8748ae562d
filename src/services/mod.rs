// Services module - business rules and the export/import engine

pub mod export;
pub mod import;
pub mod project;
pub mod task;

pub use export::{ExportOptions, ExportResult, ExportScope, ExportService};
pub use import::{ImportCounts, ImportMode, ImportOptions, ImportResult, ImportService};
pub use project::ProjectService;
pub use task::{ReorderResult, TaskService};
