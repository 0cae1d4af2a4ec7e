//! Backoffice catalog use-case service.
//!
//! # Responsibility
//! - Validate module/chapter management requests above the repository.
//! - Provide create, publish toggle, delete, list/search and paging.
//!
//! # Invariants
//! - Service APIs never bypass repository validation.
//! - Reordering is not done here; see `reorder_service`.

use crate::model::catalog::{
    CatalogValidationError, Category, CategoryId, Chapter, ChapterId, Module, ModuleId,
    ModuleSummary, NewChapter, NewModule,
};
use crate::repo::catalog_repo::{CatalogRepository, NewChapterContent};
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Chapters shown per backoffice page.
pub const DEFAULT_CHAPTERS_PER_PAGE: usize = 5;

/// Errors from catalog service operations.
#[derive(Debug)]
pub enum CatalogServiceError {
    /// Request failed validation.
    Validation(CatalogValidationError),
    ModuleNotFound(ModuleId),
    ChapterNotFound(ChapterId),
    CategoryNotFound(CategoryId),
    /// Page number or page size is zero.
    InvalidPage { page: usize, per_page: usize },
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for CatalogServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::ModuleNotFound(id) => write!(f, "module not found: {id}"),
            Self::ChapterNotFound(id) => write!(f, "chapter not found: {id}"),
            Self::CategoryNotFound(id) => write!(f, "category not found: {id}"),
            Self::InvalidPage { page, per_page } => write!(
                f,
                "page and page size must be positive, got page {page} of size {per_page}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CatalogServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CatalogServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::ModuleNotFound(id) => Self::ModuleNotFound(id),
            RepoError::ChapterNotFound(id) => Self::ChapterNotFound(id),
            RepoError::CategoryNotFound(id) => Self::CategoryNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Backoffice module list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleListQuery {
    /// Learner-facing catalog shows published modules only.
    pub published_only: bool,
    /// Case-insensitive term over title, description, category and difficulty.
    pub search: Option<String>,
}

/// One page of a module's chapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPage {
    pub chapters: Vec<Chapter>,
    /// 1-based page number actually returned (clamped to `total_pages`).
    pub page: usize,
    pub total_pages: usize,
    pub total_chapters: usize,
}

/// Catalog service facade.
pub struct CatalogService<R: CatalogRepository> {
    repo: R,
}

impl<R: CatalogRepository> CatalogService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one category.
    pub fn create_category(&self, name: &str) -> Result<Category, CatalogServiceError> {
        self.repo.create_category(name).map_err(Into::into)
    }

    /// Creates one unpublished module at the end of the catalog.
    pub fn create_module(&self, request: &NewModule) -> Result<Module, CatalogServiceError> {
        request.validate().map_err(CatalogServiceError::Validation)?;
        let module = self.repo.create_module(request)?;
        info!(
            "event=module_create module=catalog status=ok module_id={} order_index={}",
            module.id, module.order_index
        );
        Ok(module)
    }

    /// Creates one chapter at the end of `module_id`.
    pub fn create_chapter(
        &self,
        module_id: ModuleId,
        request: &NewChapter,
    ) -> Result<Chapter, CatalogServiceError> {
        request.validate().map_err(CatalogServiceError::Validation)?;
        let chapter = self.repo.create_chapter(module_id, request)?;
        info!(
            "event=chapter_create module=catalog status=ok module_id={module_id} chapter_id={} order_index={}",
            chapter.id, chapter.order_index
        );
        Ok(chapter)
    }

    /// Attaches learning content to a chapter.
    pub fn add_chapter_content(
        &self,
        chapter_id: ChapterId,
        content: &NewChapterContent,
    ) -> Result<Uuid, CatalogServiceError> {
        self.repo
            .add_chapter_content(chapter_id, content)
            .map_err(Into::into)
    }

    /// Loads one module.
    pub fn get_module(&self, module_id: ModuleId) -> Result<Module, CatalogServiceError> {
        self.repo
            .get_module(module_id)?
            .ok_or(CatalogServiceError::ModuleNotFound(module_id))
    }

    /// Sets publish state.
    pub fn set_published(
        &self,
        module_id: ModuleId,
        is_published: bool,
    ) -> Result<(), CatalogServiceError> {
        self.repo.set_published(module_id, is_published)?;
        info!(
            "event=module_publish module=catalog status=ok module_id={module_id} published={is_published}"
        );
        Ok(())
    }

    /// Flips publish state and returns the new value.
    pub fn toggle_published(&self, module_id: ModuleId) -> Result<bool, CatalogServiceError> {
        let module = self.get_module(module_id)?;
        let next = !module.is_published;
        self.set_published(module_id, next)?;
        Ok(next)
    }

    /// Deletes one module with its chapters, registrations and progress.
    pub fn delete_module(&self, module_id: ModuleId) -> Result<(), CatalogServiceError> {
        self.repo.delete_module(module_id)?;
        info!("event=module_delete module=catalog status=ok module_id={module_id}");
        Ok(())
    }

    /// Lists modules in catalog order, filtered by `query`.
    pub fn list_modules(
        &self,
        query: &ModuleListQuery,
    ) -> Result<Vec<ModuleSummary>, CatalogServiceError> {
        let mut modules = self.repo.list_modules(query.published_only)?;
        if let Some(term) = query.search.as_deref() {
            modules.retain(|summary| summary.matches_search(term));
        }
        Ok(modules)
    }

    /// Lists chapters of one module in rank order.
    pub fn list_chapters(&self, module_id: ModuleId) -> Result<Vec<Chapter>, CatalogServiceError> {
        self.get_module(module_id)?;
        self.repo.list_chapters(module_id).map_err(Into::into)
    }

    /// Returns page `page` (1-based) of a module's chapters.
    ///
    /// Pages past the end are clamped to the last page; an empty module has
    /// one empty page.
    pub fn chapter_page(
        &self,
        module_id: ModuleId,
        page: usize,
        per_page: usize,
    ) -> Result<ChapterPage, CatalogServiceError> {
        if page == 0 || per_page == 0 {
            return Err(CatalogServiceError::InvalidPage { page, per_page });
        }
        let chapters = self.list_chapters(module_id)?;
        Ok(paginate(chapters, page, per_page))
    }
}

fn paginate(chapters: Vec<Chapter>, page: usize, per_page: usize) -> ChapterPage {
    let total_chapters = chapters.len();
    let total_pages = total_chapters.div_ceil(per_page).max(1);
    let page = page.min(total_pages);
    let chapters = chapters
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();
    ChapterPage {
        chapters,
        page,
        total_pages,
        total_chapters,
    }
}

#[cfg(test)]
mod tests {
    use super::paginate;
    use crate::model::catalog::Chapter;
    use uuid::Uuid;

    fn chapters(count: usize) -> Vec<Chapter> {
        let module_id = Uuid::new_v4();
        (0..count)
            .map(|index| Chapter {
                id: Uuid::new_v4(),
                module_id,
                name: format!("Chapter {}", index + 1),
                order_index: index as i64 + 1,
                estimated_time_minutes: 10,
            })
            .collect()
    }

    #[test]
    fn paginate_slices_and_counts_pages() {
        let page = paginate(chapters(12), 3, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_chapters, 12);
        assert_eq!(page.chapters.len(), 2);
        assert_eq!(page.chapters[0].order_index, 11);
    }

    #[test]
    fn paginate_clamps_past_the_end_and_handles_empty() {
        let page = paginate(chapters(6), 9, 5);
        assert_eq!(page.page, 2);
        assert_eq!(page.chapters.len(), 1);

        let empty = paginate(Vec::new(), 1, 5);
        assert_eq!(empty.total_pages, 1);
        assert!(empty.chapters.is_empty());
    }
}
