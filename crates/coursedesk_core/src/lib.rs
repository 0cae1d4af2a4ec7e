//! Core domain logic for CourseDesk.
//! This crate is the single source of truth for catalog ordering and
//! learner progress invariants.

pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError, ReorderConfig};
pub use context::{AppContext, ContextError};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::catalog::{
    Chapter, ChapterId, ContentKind, Difficulty, Module, ModuleId, ModuleSort, ModuleSummary,
    NewChapter, NewModule,
};
pub use model::ordering::{RankAssignment, Ranked};
pub use model::progress::{
    DashboardSummary, Greeting, ModuleProgress, ProgressStatus, StatusFilter, UserId,
    UserProfile,
};
pub use repo::rank_store::{
    RankStore, SqliteChapterStore, SqliteModuleStore, StoreError, StoreResult,
};
pub use repo::{RepoError, RepoResult};
pub use service::catalog_service::{CatalogService, CatalogServiceError};
pub use service::progress_service::{CatalogQuery, ProgressService, ProgressServiceError};
pub use service::reorder_service::{ListState, ReorderError, ReorderOutcome, ReorderService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
