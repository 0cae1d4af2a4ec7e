//! Course catalog domain model.
//!
//! # Responsibility
//! - Define module/chapter records managed by the backoffice.
//! - Validate create requests before they reach persistence.
//!
//! # Invariants
//! - Ids are stable v4 UUIDs and never reused.
//! - `order_index` is the 1-based rank inside the owning list
//!   (catalog for modules, one module for chapters).

use crate::model::ordering::Ranked;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type CategoryId = Uuid;
pub type ModuleId = Uuid;
pub type ChapterId = Uuid;

/// Module difficulty label, ordered from easiest to hardest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Returns storage/search label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    /// Parses storage label.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }
}

/// Kind of learning content attached to a chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Video,
    File,
    Quiz,
}

impl ContentKind {
    /// Classifies one content row: video wins over file, file over quiz.
    pub fn classify(has_video: bool, has_file: bool) -> Self {
        if has_video {
            Self::Video
        } else if has_file {
            Self::File
        } else {
            Self::Quiz
        }
    }
}

/// Catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Course module read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub title: String,
    pub description: String,
    pub category_id: Option<CategoryId>,
    /// Joined from `categories.name`.
    pub category_name: Option<String>,
    pub picture_url: Option<String>,
    pub notes: String,
    pub difficulty: Difficulty,
    pub is_published: bool,
    /// 1-based rank in the catalog.
    pub order_index: i64,
}

impl Ranked for Module {
    type Id = ModuleId;

    fn id(&self) -> &ModuleId {
        &self.id
    }

    fn rank(&self) -> i64 {
        self.order_index
    }

    fn set_rank(&mut self, rank: i64) {
        self.order_index = rank;
    }
}

/// Backoffice list row: module plus aggregate counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSummary {
    pub module: Module,
    pub chapter_count: u32,
    pub registration_count: u32,
}

impl ModuleSummary {
    /// Case-insensitive match over title, description, category name and
    /// difficulty.
    pub fn matches_search(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        let module = &self.module;
        module.title.to_lowercase().contains(&needle)
            || module.description.to_lowercase().contains(&needle)
            || module
                .category_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&needle))
            || module.difficulty.as_str().contains(&needle)
    }
}

/// Learner catalog ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleSort {
    /// Backoffice rank (`order_index`).
    #[default]
    CatalogOrder,
    /// Title, case-insensitive.
    Name,
    /// Beginner first, then intermediate, then advanced.
    Difficulty,
}

impl ModuleSort {
    /// Compares two modules; ties are `Equal` so a stable sort keeps rank order.
    pub fn compare(self, left: &Module, right: &Module) -> Ordering {
        match self {
            Self::CatalogOrder => Ordering::Equal,
            Self::Name => left
                .title
                .to_lowercase()
                .cmp(&right.title.to_lowercase()),
            Self::Difficulty => left.difficulty.cmp(&right.difficulty),
        }
    }
}

/// Chapter read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub module_id: ModuleId,
    pub name: String,
    /// 1-based rank inside the module.
    pub order_index: i64,
    pub estimated_time_minutes: u32,
}

impl Ranked for Chapter {
    type Id = ChapterId;

    fn id(&self) -> &ChapterId {
        &self.id
    }

    fn rank(&self) -> i64 {
        self.order_index
    }

    fn set_rank(&mut self, rank: i64) {
        self.order_index = rank;
    }
}

/// Create request for a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewModule {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub picture_url: Option<String>,
    #[serde(default)]
    pub notes: String,
    pub difficulty: Difficulty,
}

impl NewModule {
    /// Creates a request with only the required fields set.
    pub fn new(title: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            category_id: None,
            picture_url: None,
            notes: String::new(),
            difficulty,
        }
    }

    /// Validates the request.
    pub fn validate(&self) -> Result<(), CatalogValidationError> {
        if self.title.trim().is_empty() {
            return Err(CatalogValidationError::BlankModuleTitle);
        }
        Ok(())
    }
}

/// Create request for a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChapter {
    pub name: String,
    pub estimated_time_minutes: i64,
}

impl NewChapter {
    pub fn new(name: impl Into<String>, estimated_time_minutes: i64) -> Self {
        Self {
            name: name.into(),
            estimated_time_minutes,
        }
    }

    /// Validates the request.
    pub fn validate(&self) -> Result<(), CatalogValidationError> {
        if self.name.trim().is_empty() {
            return Err(CatalogValidationError::BlankChapterName);
        }
        if self.estimated_time_minutes < 0 || self.estimated_time_minutes > i64::from(u32::MAX) {
            return Err(CatalogValidationError::InvalidEstimatedTime(
                self.estimated_time_minutes,
            ));
        }
        Ok(())
    }
}

/// Validation failures for catalog create requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogValidationError {
    BlankModuleTitle,
    BlankChapterName,
    BlankCategoryName,
    InvalidEstimatedTime(i64),
}

impl Display for CatalogValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankModuleTitle => write!(f, "module title must not be blank"),
            Self::BlankChapterName => write!(f, "chapter name must not be blank"),
            Self::BlankCategoryName => write!(f, "category name must not be blank"),
            Self::InvalidEstimatedTime(value) => {
                write!(f, "estimated time must be a non-negative minute count, got {value}")
            }
        }
    }
}

impl Error for CatalogValidationError {}
