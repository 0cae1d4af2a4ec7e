//! Learner dashboard and progress use-case service.
//!
//! # Responsibility
//! - Fold enrollment/chapter/progress rows into dashboard numbers.
//! - Classify catalog modules by learner status for filtering.
//! - Record enrollment, chapter completion and dashboard visits.
//!
//! # Invariants
//! - Aggregation uses only `model::progress` helpers; no arithmetic here.
//! - Unknown users are rejected before any write.

use crate::model::catalog::{ChapterId, ModuleId, ModuleSort, ModuleSummary};
use crate::model::progress::{
    DashboardSummary, Greeting, ModuleProgress, ProgressStatus, StatusFilter, UserId,
    UserProfile,
};
use crate::repo::catalog_repo::CatalogRepository;
use crate::repo::progress_repo::ProgressRepository;
use crate::repo::RepoError;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use log::info;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from progress service operations.
#[derive(Debug)]
pub enum ProgressServiceError {
    UserNotFound(UserId),
    ModuleNotFound(ModuleId),
    ChapterNotFound(ChapterId),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for ProgressServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::ModuleNotFound(id) => write!(f, "module not found: {id}"),
            Self::ChapterNotFound(id) => write!(f, "chapter not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProgressServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ProgressServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::UserNotFound(id) => Self::UserNotFound(id),
            RepoError::ModuleNotFound(id) => Self::ModuleNotFound(id),
            RepoError::ChapterNotFound(id) => Self::ChapterNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Learner dashboard header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub display_name: String,
    pub greeting: Greeting,
    pub day_streak: u32,
    pub subscription_type: String,
    pub summary: DashboardSummary,
}

/// One catalog row as seen by a learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub summary: ModuleSummary,
    pub status: ProgressStatus,
    /// Present when the learner is enrolled.
    pub progress: Option<ModuleProgress>,
}

/// Learner catalog filter: status, optional search term and ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    pub status: StatusFilter,
    pub search: Option<String>,
    pub sort: ModuleSort,
}

/// Progress service facade.
pub struct ProgressService<P: ProgressRepository, C: CatalogRepository> {
    progress: P,
    catalog: C,
}

impl<P: ProgressRepository, C: CatalogRepository> ProgressService<P, C> {
    /// Creates service from repository implementations.
    pub fn new(progress: P, catalog: C) -> Self {
        Self { progress, catalog }
    }

    /// Loads one profile.
    pub fn profile(&self, user_id: UserId) -> Result<UserProfile, ProgressServiceError> {
        self.progress
            .get_user(user_id)?
            .ok_or(ProgressServiceError::UserNotFound(user_id))
    }

    /// Registers `user_id` to `module_id`; repeated calls are no-ops.
    pub fn enroll(&self, user_id: UserId, module_id: ModuleId) -> Result<(), ProgressServiceError> {
        self.progress.enroll(user_id, module_id)?;
        info!("event=module_enroll module=progress status=ok module_id={module_id}");
        Ok(())
    }

    /// Sets completion state of one chapter.
    pub fn mark_chapter_completed(
        &self,
        user_id: UserId,
        chapter_id: ChapterId,
        completed: bool,
    ) -> Result<(), ProgressServiceError> {
        self.progress
            .set_chapter_completed(user_id, chapter_id, completed)?;
        info!(
            "event=chapter_progress module=progress status=ok chapter_id={chapter_id} completed={completed}"
        );
        Ok(())
    }

    /// Stamps the learner's last dashboard visit.
    pub fn touch_last_login(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<(), ProgressServiceError> {
        self.progress
            .touch_last_login(user_id, &date.format("%Y-%m-%d").to_string())?;
        Ok(())
    }

    /// Computes completion and next-chapter hint of one module.
    pub fn module_progress(
        &self,
        user_id: UserId,
        module_id: ModuleId,
    ) -> Result<ModuleProgress, ProgressServiceError> {
        self.profile(user_id)?;
        let module = self
            .catalog
            .get_module(module_id)?
            .ok_or(ProgressServiceError::ModuleNotFound(module_id))?;
        let rows = self.progress.chapter_progress(user_id, module_id)?;
        Ok(ModuleProgress::from_rows(module_id, module.title, &rows))
    }

    /// Computes progress of every enrolled module, in catalog order.
    pub fn enrolled_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ModuleProgress>, ProgressServiceError> {
        self.profile(user_id)?;
        self.progress
            .list_enrollments(user_id)?
            .into_iter()
            .map(|enrollment| {
                let rows = self
                    .progress
                    .chapter_progress(user_id, enrollment.module_id)?;
                Ok(ModuleProgress::from_rows(
                    enrollment.module_id,
                    enrollment.title,
                    &rows,
                ))
            })
            .collect()
    }

    /// Enrolled modules below 100% ("continue learning").
    pub fn enrolled_in_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ModuleProgress>, ProgressServiceError> {
        let mut modules = self.enrolled_progress(user_id)?;
        modules.retain(|module| module.progress < 100);
        Ok(modules)
    }

    /// Aggregates dashboard counters over all registrations.
    pub fn dashboard_summary(
        &self,
        user_id: UserId,
    ) -> Result<DashboardSummary, ProgressServiceError> {
        self.profile(user_id)?;
        let enrollments = self.progress.list_enrollments(user_id)?;
        let mut rows = Vec::with_capacity(enrollments.len());
        for enrollment in &enrollments {
            rows.push(
                self.progress
                    .chapter_progress(user_id, enrollment.module_id)?,
            );
        }
        Ok(DashboardSummary::from_enrollments(
            rows.iter().map(Vec::as_slice),
        ))
    }

    /// Builds the dashboard header and stamps today's visit.
    pub fn dashboard(
        &self,
        user_id: UserId,
        now: NaiveDateTime,
    ) -> Result<Dashboard, ProgressServiceError> {
        let profile = self.profile(user_id)?;
        let summary = self.dashboard_summary(user_id)?;
        self.touch_last_login(user_id, now.date())?;

        Ok(Dashboard {
            display_name: profile.display_name().to_string(),
            greeting: Greeting::for_hour(now.hour()),
            day_streak: profile.day_streak,
            subscription_type: profile.subscription_type,
            summary,
        })
    }

    /// Lists published modules matching `query`, sorted by `query.sort`.
    pub fn filter_modules(
        &self,
        user_id: UserId,
        query: &CatalogQuery,
    ) -> Result<Vec<CatalogEntry>, ProgressServiceError> {
        let mut enrolled: HashMap<ModuleId, ModuleProgress> = self
            .enrolled_progress(user_id)?
            .into_iter()
            .map(|progress| (progress.module_id, progress))
            .collect();

        let mut entries: Vec<CatalogEntry> = self
            .catalog
            .list_modules(true)?
            .into_iter()
            .filter(|summary| {
                query
                    .search
                    .as_deref()
                    .map_or(true, |term| summary.matches_search(term))
            })
            .filter_map(|summary| {
                let progress = enrolled.remove(&summary.module.id);
                let status = ProgressStatus::from_progress(progress.as_ref());
                query.status.accepts(status).then_some(CatalogEntry {
                    summary,
                    status,
                    progress,
                })
            })
            .collect();
        entries.sort_by(|left, right| {
            query
                .sort
                .compare(&left.summary.module, &right.summary.module)
        });
        Ok(entries)
    }
}
