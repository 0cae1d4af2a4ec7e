//! Remote boundary for ordered lists and its SQLite implementations.
//!
//! # Responsibility
//! - Define the three-call contract (load, set rank, delete) the reorder
//!   service persists through.
//! - Provide SQLite stores for chapters of one module and for the module
//!   catalog.
//!
//! # Invariants
//! - A store is bound to exactly one list (container) at construction.
//! - `set_rank` is idempotent: writing the same rank twice is harmless.
//! - `apply_ranking` succeeds only if every assignment succeeded.
//! - SQLite stores apply a ranking inside one immediate transaction, so a
//!   failed batch leaves no partial ranks behind.

use crate::db::DbError;
use crate::model::catalog::{Chapter, ChapterId, Module, ModuleId};
use crate::model::ordering::{RankAssignment, Ranked};
use crate::repo::catalog_repo::{list_all_modules, list_module_chapters};
use crate::repo::{ensure_schema_ready, RepoError};
use async_trait::async_trait;
use futures::future::join_all;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Result type used by rank store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Id type of the items held by store `S`.
pub type ItemId<S> = <<S as RankStore>::Item as Ranked>::Id;

/// Errors from rank store operations.
///
/// The reorder service treats every variant as one persistence failure.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying database error.
    Db(DbError),
    /// Row addressed by a write no longer exists.
    ItemNotFound(String),
    /// Container the store is bound to no longer exists.
    ContainerNotFound(String),
    /// Store refused the write.
    Rejected(String),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Call did not settle within the configured bound.
    TimedOut(Duration),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ItemNotFound(id) => write!(f, "ordered item not found: {id}"),
            Self::ContainerNotFound(id) => write!(f, "ordered list container not found: {id}"),
            Self::Rejected(message) => write!(f, "store rejected write: {message}"),
            Self::InvalidData(message) => write!(f, "invalid ordered list data: {message}"),
            Self::TimedOut(after) => {
                write!(f, "store call timed out after {} ms", after.as_millis())
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Db(err) => Self::Db(err),
            RepoError::ModuleNotFound(id) => Self::ContainerNotFound(id.to_string()),
            RepoError::ChapterNotFound(id) => Self::ItemNotFound(id.to_string()),
            other => Self::InvalidData(other.to_string()),
        }
    }
}

/// Remote store holding one ordered list.
///
/// Futures are `!Send`: the store is driven from a single-threaded event
/// loop, matching how the reorder service is scheduled.
#[async_trait(?Send)]
pub trait RankStore {
    /// Item type held by this list.
    type Item: Ranked + Clone;

    /// Loads the whole list in its current authoritative order.
    async fn fetch_ordered_list(&self) -> StoreResult<Vec<Self::Item>>;

    /// Persists one rank.
    async fn set_rank(&self, id: &ItemId<Self>, rank: i64) -> StoreResult<()>;

    /// Deletes one item.
    async fn delete_item(&self, id: &ItemId<Self>) -> StoreResult<()>;

    /// Persists a batch of ranks.
    ///
    /// Default dispatches every `set_rank` concurrently and joins them; the
    /// first failure is returned after all calls settled. Stores with
    /// multi-row atomic writes should override this.
    async fn apply_ranking(&self, ranking: &[RankAssignment<ItemId<Self>>]) -> StoreResult<()> {
        let results = join_all(
            ranking
                .iter()
                .map(|(id, rank)| self.set_rank(id, *rank)),
        )
        .await;
        results.into_iter().collect()
    }
}

/// Chapters of one module, ranked by `chapters.order_index`.
pub struct SqliteChapterStore<'conn> {
    conn: &'conn Connection,
    module_id: ModuleId,
}

impl<'conn> SqliteChapterStore<'conn> {
    /// Creates store bound to `module_id` from a migrated connection.
    pub fn try_new(conn: &'conn Connection, module_id: ModuleId) -> StoreResult<Self> {
        ensure_schema_ready(conn, &["modules", "chapters"])?;
        Ok(Self { conn, module_id })
    }

    /// Returns the module this store is bound to.
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    fn ensure_module_exists(&self) -> StoreResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM modules WHERE module_uuid = ?1);",
            [self.module_id.to_string()],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(StoreError::ContainerNotFound(self.module_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl RankStore for SqliteChapterStore<'_> {
    type Item = Chapter;

    async fn fetch_ordered_list(&self) -> StoreResult<Vec<Chapter>> {
        self.ensure_module_exists()?;
        Ok(list_module_chapters(self.conn, self.module_id)?)
    }

    async fn set_rank(&self, id: &ChapterId, rank: i64) -> StoreResult<()> {
        set_chapter_rank(self.conn, self.module_id, *id, rank)
    }

    async fn delete_item(&self, id: &ChapterId) -> StoreResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM chapters WHERE chapter_uuid = ?1 AND module_uuid = ?2;",
            params![id.to_string(), self.module_id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::ItemNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn apply_ranking(&self, ranking: &[RankAssignment<ChapterId>]) -> StoreResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for (id, rank) in ranking {
            set_chapter_rank(&tx, self.module_id, *id, *rank)?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// The module catalog, ranked by `modules.order_index`.
pub struct SqliteModuleStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteModuleStore<'conn> {
    /// Creates catalog store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_schema_ready(conn, &["modules", "categories"])?;
        Ok(Self { conn })
    }
}

#[async_trait(?Send)]
impl RankStore for SqliteModuleStore<'_> {
    type Item = Module;

    async fn fetch_ordered_list(&self) -> StoreResult<Vec<Module>> {
        Ok(list_all_modules(self.conn)?)
    }

    async fn set_rank(&self, id: &ModuleId, rank: i64) -> StoreResult<()> {
        set_module_rank(self.conn, *id, rank)
    }

    async fn delete_item(&self, id: &ModuleId) -> StoreResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM modules WHERE module_uuid = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::ItemNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn apply_ranking(&self, ranking: &[RankAssignment<ModuleId>]) -> StoreResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for (id, rank) in ranking {
            set_module_rank(&tx, *id, *rank)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn set_chapter_rank(
    conn: &Connection,
    module_id: ModuleId,
    chapter_id: ChapterId,
    rank: i64,
) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE chapters
         SET order_index = ?3,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE chapter_uuid = ?1
           AND module_uuid = ?2;",
        params![chapter_id.to_string(), module_id.to_string(), rank],
    )?;
    if changed == 0 {
        return Err(StoreError::ItemNotFound(chapter_id.to_string()));
    }
    Ok(())
}

fn set_module_rank(conn: &Connection, module_id: ModuleId, rank: i64) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE modules
         SET order_index = ?2,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE module_uuid = ?1;",
        params![module_id.to_string(), rank],
    )?;
    if changed == 0 {
        return Err(StoreError::ItemNotFound(module_id.to_string()));
    }
    Ok(())
}
