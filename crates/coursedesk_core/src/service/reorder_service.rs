//! Optimistic reordering of one ordered list.
//!
//! # Responsibility
//! - Hold the local copy of one ordered list (chapters of a module, or the
//!   module catalog) and keep its ranks dense.
//! - Apply moves/removals locally first, then persist through a `RankStore`.
//! - Recover from any persistence failure by reloading the whole list.
//!
//! # Invariants
//! - Ranks of the local list are `1..=n` in iteration order whenever no
//!   operation is in flight.
//! - At most one operation is in flight per list; others get `Busy`.
//! - Rollback is a re-fetch, never an inverse write.
//! - Every store call is bounded by `ReorderConfig::persist_timeout`.
//!
//! # Scheduling
//! The service is driven through `&self` from a single-threaded event loop
//! (current-thread tokio runtime or `LocalSet`). The list is only mutated
//! between awaits, so `RefCell`/`Cell` suffice.

use crate::config::ReorderConfig;
use crate::model::ordering::{
    is_dense, move_within, normalize, position_of, rerank, RankAssignment,
};
use crate::repo::rank_store::{ItemId, RankStore, StoreError, StoreResult};
use log::{debug, info, warn};
use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::Instant;

/// Sync state of the local list relative to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    /// Local ranks are known to match the store.
    Synced,
    /// A move/removal was applied locally; persistence is in flight.
    Pending,
    /// Local state is being replaced by a fresh fetch.
    Reloading,
    /// Local state is not known to match the store; `reload` is required.
    Desynced,
}

impl ListState {
    fn is_in_flight(self) -> bool {
        matches!(self, Self::Pending | Self::Reloading)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Reloading => "reloading",
            Self::Desynced => "desynced",
        }
    }
}

/// How a move/removal settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// Nothing to do (`source == target`).
    Unchanged,
    /// Local order was persisted; the list is synced.
    Persisted,
    /// Persistence failed; the list was reloaded from the store.
    RolledBack,
}

/// Errors surfaced by the reorder service.
#[derive(Debug)]
pub enum ReorderError {
    /// Referenced id is not in the local list (stale caller state).
    UnknownItem(String),
    /// Another operation on this list is still in flight.
    Busy(ListState),
    /// The list must be reloaded before it can be mutated again.
    Desynced,
    /// Fetching the list failed, including the rollback reload.
    Persistence(StoreError),
}

impl Display for ReorderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownItem(id) => write!(f, "item not in ordered list: {id}"),
            Self::Busy(state) => {
                write!(f, "ordered list is busy ({}); retry later", state.as_str())
            }
            Self::Desynced => write!(f, "ordered list must be reloaded before editing"),
            Self::Persistence(err) => write!(f, "ordered list persistence failed: {err}"),
        }
    }
}

impl Error for ReorderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

/// Reorder service over one store-backed ordered list.
pub struct ReorderService<S: RankStore> {
    store: S,
    config: ReorderConfig,
    items: RefCell<Vec<S::Item>>,
    state: Cell<ListState>,
}

impl<S: RankStore> ReorderService<S> {
    /// Creates a service with an empty, unsynced list.
    ///
    /// Call `reload` before editing, or use `load`.
    pub fn new(store: S, config: ReorderConfig) -> Self {
        Self {
            store,
            config,
            items: RefCell::new(Vec::new()),
            state: Cell::new(ListState::Desynced),
        }
    }

    /// Creates a service and performs the initial fetch.
    pub async fn load(store: S, config: ReorderConfig) -> Result<Self, ReorderError> {
        let service = Self::new(store, config);
        service.reload().await?;
        Ok(service)
    }

    /// Returns a snapshot of the local list.
    pub fn items(&self) -> Vec<S::Item> {
        self.items.borrow().clone()
    }

    /// Returns current sync state.
    pub fn state(&self) -> ListState {
        self.state.get()
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Moves `source_id` into the slot currently held by `target_id`.
    ///
    /// The local list is re-ranked and updated before the first await.
    /// Changed ranks are then persisted; on any failure the list is reloaded
    /// and `RolledBack` is returned.
    ///
    /// # Errors
    /// - `UnknownItem` when either id is absent (no local change happens).
    /// - `Busy`/`Desynced` when the list cannot be edited right now.
    /// - `Persistence` only when the rollback reload itself failed.
    pub async fn move_item(
        &self,
        source_id: &ItemId<S>,
        target_id: &ItemId<S>,
    ) -> Result<ReorderOutcome, ReorderError> {
        self.ensure_editable()?;

        let changed = {
            let mut items = self.items.borrow_mut();
            let from = position_of(&items, source_id)
                .ok_or_else(|| ReorderError::UnknownItem(source_id.to_string()))?;
            let to = position_of(&items, target_id)
                .ok_or_else(|| ReorderError::UnknownItem(target_id.to_string()))?;
            if from == to {
                return Ok(ReorderOutcome::Unchanged);
            }
            move_within(&mut items, from, to);
            let changed = rerank(&mut items);
            debug_assert!(is_dense(&items));
            changed
        };

        let _guard = FlightGuard::enter(&self.state, ListState::Pending);
        let started_at = Instant::now();
        debug!(
            "event=reorder_move module=reorder status=start from={source_id} to={target_id} changed={}",
            changed.len()
        );

        let result = self.bounded(self.store.apply_ranking(&changed)).await;
        self.settle("reorder_move", changed.len(), started_at, result)
            .await
    }

    /// Removes `id` and re-ranks the remainder from 1.
    ///
    /// Persists the delete first, then the changed ranks. The two writes are
    /// not atomic; a failure in between is healed by the rollback reload.
    pub async fn remove_and_reindex(
        &self,
        id: &ItemId<S>,
    ) -> Result<ReorderOutcome, ReorderError> {
        self.ensure_editable()?;

        let changed = {
            let mut items = self.items.borrow_mut();
            let index = position_of(&items, id)
                .ok_or_else(|| ReorderError::UnknownItem(id.to_string()))?;
            items.remove(index);
            let changed = rerank(&mut items);
            debug_assert!(is_dense(&items));
            changed
        };

        let _guard = FlightGuard::enter(&self.state, ListState::Pending);
        let started_at = Instant::now();
        debug!(
            "event=reorder_remove module=reorder status=start item={id} changed={}",
            changed.len()
        );

        let result = self
            .bounded(async {
                self.store.delete_item(id).await?;
                if !changed.is_empty() {
                    self.store.apply_ranking(&changed).await?;
                }
                Ok(())
            })
            .await;
        self.settle("reorder_remove", changed.len(), started_at, result)
            .await
    }

    /// Replaces the local list with the store's current order.
    ///
    /// Rows are normalized to dense ranks (`rank ASC, id ASC`); ranks that
    /// had to change are written back before the list counts as synced.
    pub async fn reload(&self) -> Result<(), ReorderError> {
        let state = self.state.get();
        if state.is_in_flight() {
            return Err(ReorderError::Busy(state));
        }
        let _guard = FlightGuard::enter(&self.state, ListState::Reloading);
        self.reload_in_flight().await
    }

    async fn reload_in_flight(&self) -> Result<(), ReorderError> {
        let started_at = Instant::now();
        let mut items = match self.bounded(self.store.fetch_ordered_list()).await {
            Ok(items) => items,
            Err(err) => {
                warn!(
                    "event=reorder_reload module=reorder status=error stage=fetch duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                self.state.set(ListState::Desynced);
                return Err(ReorderError::Persistence(err));
            }
        };

        let healed = normalize(&mut items);
        let item_count = items.len();
        *self.items.borrow_mut() = items;

        if !healed.is_empty() {
            warn!(
                "event=reorder_heal module=reorder status=start healed={}",
                healed.len()
            );
            if let Err(err) = self.persist_heal(&healed).await {
                warn!(
                    "event=reorder_reload module=reorder status=error stage=heal duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                self.state.set(ListState::Desynced);
                return Err(ReorderError::Persistence(err));
            }
        }

        self.state.set(ListState::Synced);
        info!(
            "event=reorder_reload module=reorder status=ok items={item_count} healed={} duration_ms={}",
            healed.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    async fn persist_heal(&self, healed: &[RankAssignment<ItemId<S>>]) -> StoreResult<()> {
        self.bounded(self.store.apply_ranking(healed)).await
    }

    async fn settle(
        &self,
        event: &'static str,
        changed: usize,
        started_at: Instant,
        result: StoreResult<()>,
    ) -> Result<ReorderOutcome, ReorderError> {
        match result {
            Ok(()) => {
                self.state.set(ListState::Synced);
                info!(
                    "event={event} module=reorder status=ok changed={changed} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(ReorderOutcome::Persisted)
            }
            Err(err) => {
                warn!(
                    "event={event} module=reorder status=error action=reload duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                self.state.set(ListState::Reloading);
                self.reload_in_flight().await?;
                Ok(ReorderOutcome::RolledBack)
            }
        }
    }

    fn ensure_editable(&self) -> Result<(), ReorderError> {
        match self.state.get() {
            ListState::Synced => Ok(()),
            ListState::Desynced => Err(ReorderError::Desynced),
            state => Err(ReorderError::Busy(state)),
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        let limit = self.config.persist_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::TimedOut(limit)),
        }
    }
}

/// Marks the list in flight; a dropped (cancelled) operation leaves it
/// `Desynced` instead of stuck in flight.
struct FlightGuard<'a> {
    state: &'a Cell<ListState>,
}

impl<'a> FlightGuard<'a> {
    fn enter(state: &'a Cell<ListState>, in_flight: ListState) -> Self {
        state.set(in_flight);
        Self { state }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.state.get().is_in_flight() {
            self.state.set(ListState::Desynced);
        }
    }
}
