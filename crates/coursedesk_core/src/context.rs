//! Explicit session context.
//!
//! # Responsibility
//! - Own the database connection and the signed-in learner for one session.
//! - Hand out services bound to that connection.
//! - Release both on `teardown`.
//!
//! # Invariants
//! - A context only exists for a user that is present in the database.
//! - Services borrow the context; none outlives it.

use crate::config::{AppConfig, ConfigError};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::logging::init_logging;
use crate::model::catalog::ModuleId;
use crate::model::progress::{UserId, UserProfile};
use crate::repo::catalog_repo::SqliteCatalogRepository;
use crate::repo::progress_repo::{ProgressRepository, SqliteProgressRepository};
use crate::repo::rank_store::{SqliteChapterStore, SqliteModuleStore, StoreError};
use crate::repo::RepoError;
use crate::service::catalog_service::CatalogService;
use crate::service::progress_service::ProgressService;
use crate::service::reorder_service::{ReorderError, ReorderService};
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors raised while building or using a session context.
#[derive(Debug)]
pub enum ContextError {
    Config(ConfigError),
    /// Logger backend could not be started.
    Logging(String),
    Db(DbError),
    Repo(RepoError),
    Store(StoreError),
    /// Initial list load of a reorder service failed.
    Reorder(ReorderError),
    /// Session user is not in the database.
    UserNotFound(UserId),
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(message) => write!(f, "logging init failed: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Reorder(err) => write!(f, "{err}"),
            Self::UserNotFound(id) => write!(f, "session user not found: {id}"),
        }
    }
}

impl Error for ContextError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Reorder(err) => Some(err),
            Self::Logging(_) | Self::UserNotFound(_) => None,
        }
    }
}

impl From<ConfigError> for ContextError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for ContextError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for ContextError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<StoreError> for ContextError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ReorderError> for ContextError {
    fn from(value: ReorderError) -> Self {
        Self::Reorder(value)
    }
}

/// One signed-in session over one database.
pub struct AppContext {
    conn: Connection,
    config: AppConfig,
    user: UserProfile,
}

impl AppContext {
    /// Opens the configured database and signs `user_id` in.
    ///
    /// File logging starts first when `log_dir` is set.
    pub fn init(config: AppConfig, user_id: UserId) -> Result<Self, ContextError> {
        config.validate()?;
        if let Some(log_dir) = config.log_dir.as_deref() {
            init_logging(&config.log_level, log_dir).map_err(ContextError::Logging)?;
        }

        let conn = match config.db_path.as_deref() {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        Self::with_connection(conn, config, user_id)
    }

    /// Signs `user_id` in over an already migrated connection.
    pub fn with_connection(
        conn: Connection,
        config: AppConfig,
        user_id: UserId,
    ) -> Result<Self, ContextError> {
        config.validate()?;
        let user = SqliteProgressRepository::try_new(&conn)?
            .get_user(user_id)?
            .ok_or(ContextError::UserNotFound(user_id))?;

        info!("event=session_start module=context status=ok user_id={user_id}");
        Ok(Self { conn, config, user })
    }

    /// Returns the signed-in profile as loaded at sign-in.
    pub fn user(&self) -> &UserProfile {
        &self.user
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Backoffice catalog service.
    pub fn catalog(&self) -> Result<CatalogService<SqliteCatalogRepository<'_>>, ContextError> {
        Ok(CatalogService::new(SqliteCatalogRepository::try_new(
            &self.conn,
        )?))
    }

    /// Learner progress service.
    pub fn progress(
        &self,
    ) -> Result<
        ProgressService<SqliteProgressRepository<'_>, SqliteCatalogRepository<'_>>,
        ContextError,
    > {
        Ok(ProgressService::new(
            SqliteProgressRepository::try_new(&self.conn)?,
            SqliteCatalogRepository::try_new(&self.conn)?,
        ))
    }

    /// Loaded reorder service over the chapters of `module_id`.
    pub async fn chapter_reorder(
        &self,
        module_id: ModuleId,
    ) -> Result<ReorderService<SqliteChapterStore<'_>>, ContextError> {
        let store = SqliteChapterStore::try_new(&self.conn, module_id)?;
        Ok(ReorderService::load(store, self.config.reorder()).await?)
    }

    /// Loaded reorder service over the module catalog.
    pub async fn module_reorder(
        &self,
    ) -> Result<ReorderService<SqliteModuleStore<'_>>, ContextError> {
        let store = SqliteModuleStore::try_new(&self.conn)?;
        Ok(ReorderService::load(store, self.config.reorder()).await?)
    }

    /// Ends the session and closes the connection.
    pub fn teardown(self) -> Result<(), ContextError> {
        let user_id = self.user.id;
        self.conn
            .close()
            .map_err(|(_, err)| ContextError::Db(DbError::Sqlite(err)))?;
        info!("event=session_end module=context status=ok user_id={user_id}");
        Ok(())
    }
}
