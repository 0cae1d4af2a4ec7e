//! Learner progress model and aggregation.
//!
//! # Responsibility
//! - Define profile, per-chapter progress and dashboard read models.
//! - Fold nested enrollment/progress rows into percentages and hints.
//!
//! # Invariants
//! - Percentages are integers in `0..=100`, rounded half up.
//! - A module with zero chapters is never complete and reports 0%.
//! - Module completion is judged on the rounded percentage: a module at
//!   100% has no `next_chapter` even if one chapter is still open.

use crate::model::catalog::{ChapterId, ContentKind, ModuleId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

const FALLBACK_DISPLAY_NAME: &str = "learner";

/// Learner profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub day_streak: u32,
    pub subscription_type: String,
    /// `YYYY-MM-DD` of the last dashboard visit.
    pub last_login_date: Option<String>,
}

impl UserProfile {
    /// Creates a profile with default free subscription.
    pub fn new(first_name: Option<String>, last_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name,
            last_name,
            day_streak: 0,
            subscription_type: "free".to_string(),
            last_login_date: None,
        }
    }

    /// First name, else last name, else a generic label.
    pub fn display_name(&self) -> &str {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
            .unwrap_or(FALLBACK_DISPLAY_NAME)
    }
}

/// One chapter of an enrolled module joined with the learner's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterProgressRow {
    pub chapter_id: ChapterId,
    pub name: String,
    pub order_index: i64,
    pub estimated_time_minutes: u32,
    pub completed: bool,
    /// Kind of the first attached content, if any.
    pub first_content: Option<ContentKind>,
}

/// Suggested next chapter for an in-progress module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextChapter {
    pub chapter_id: ChapterId,
    pub name: String,
    pub content_kind: ContentKind,
    pub estimated_time_minutes: u32,
}

/// Completion state of one module for one learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleProgress {
    pub module_id: ModuleId,
    pub title: String,
    pub total_chapters: u32,
    pub completed_chapters: u32,
    pub progress: u8,
    pub next_chapter: Option<NextChapter>,
}

impl ModuleProgress {
    /// Folds ordered chapter rows into module progress.
    ///
    /// `chapters` must already be sorted by `order_index`.
    pub fn from_rows(
        module_id: ModuleId,
        title: impl Into<String>,
        chapters: &[ChapterProgressRow],
    ) -> Self {
        let total = chapters.len() as u32;
        let completed = chapters.iter().filter(|row| row.completed).count() as u32;
        let progress = completion_percent(u64::from(completed), u64::from(total));
        let next_chapter = if progress < 100 {
            chapters
                .iter()
                .find(|row| !row.completed)
                .map(|row| NextChapter {
                    chapter_id: row.chapter_id,
                    name: row.name.clone(),
                    content_kind: row.first_content.unwrap_or(ContentKind::File),
                    estimated_time_minutes: row.estimated_time_minutes,
                })
        } else {
            None
        };

        Self {
            module_id,
            title: title.into(),
            total_chapters: total,
            completed_chapters: completed,
            progress,
            next_chapter,
        }
    }

    /// Returns whether the rounded progress reached 100%.
    pub fn is_complete(&self) -> bool {
        self.progress >= 100
    }
}

/// Catalog status of one module relative to a learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    /// Derives status from optional enrollment progress.
    ///
    /// Not enrolled or enrolled at 0% is `NotStarted`; a rounded 100% is
    /// `Completed`.
    pub fn from_progress(progress: Option<&ModuleProgress>) -> Self {
        match progress {
            None => Self::NotStarted,
            Some(progress) if progress.is_complete() => Self::Completed,
            Some(progress) if progress.progress == 0 => Self::NotStarted,
            Some(_) => Self::InProgress,
        }
    }
}

/// Catalog filter selected on the modules page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    NotStarted,
    InProgress,
    Completed,
}

impl StatusFilter {
    pub fn accepts(self, status: ProgressStatus) -> bool {
        match self {
            Self::All => true,
            Self::NotStarted => status == ProgressStatus::NotStarted,
            Self::InProgress => status == ProgressStatus::InProgress,
            Self::Completed => status == ProgressStatus::Completed,
        }
    }
}

/// Dashboard header counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DashboardSummary {
    pub courses_completed: u32,
    pub total_courses: u32,
    pub hours_learned: u32,
    pub progress_percentage: u8,
}

impl DashboardSummary {
    /// Folds every enrolled module's chapter rows.
    pub fn from_enrollments<'a, I>(enrollments: I) -> Self
    where
        I: IntoIterator<Item = &'a [ChapterProgressRow]>,
    {
        let mut courses_completed = 0_u32;
        let mut total_courses = 0_u32;
        let mut minutes_learned = 0_u64;

        for chapters in enrollments {
            total_courses += 1;
            let completed = chapters.iter().filter(|row| row.completed);
            minutes_learned += completed
                .clone()
                .map(|row| u64::from(row.estimated_time_minutes))
                .sum::<u64>();
            if !chapters.is_empty() && completed.count() == chapters.len() {
                courses_completed += 1;
            }
        }

        Self {
            courses_completed,
            total_courses,
            hours_learned: u32::try_from(round_div(minutes_learned, 60)).unwrap_or(u32::MAX),
            progress_percentage: completion_percent(
                u64::from(courses_completed),
                u64::from(total_courses),
            ),
        }
    }
}

/// Time-of-day greeting bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Greeting {
    Morning,
    Afternoon,
    Evening,
}

impl Greeting {
    /// Picks greeting for a local hour in `0..24`.
    pub fn for_hour(hour: u32) -> Self {
        match hour {
            0..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            _ => Self::Evening,
        }
    }
}

/// Returns `round(part / total * 100)`, or 0 when `total == 0`.
pub fn completion_percent(part: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    round_div(part.min(total) * 100, total) as u8
}

fn round_div(numerator: u64, denominator: u64) -> u64 {
    (numerator * 2 + denominator) / (denominator * 2)
}

#[cfg(test)]
mod tests {
    use super::{
        completion_percent, ChapterProgressRow, Greeting, ModuleProgress, ProgressStatus,
        UserProfile,
    };
    use uuid::Uuid;

    fn rows(total: usize, completed: usize) -> Vec<ChapterProgressRow> {
        (0..total)
            .map(|index| ChapterProgressRow {
                chapter_id: Uuid::new_v4(),
                name: format!("Chapter {}", index + 1),
                order_index: index as i64 + 1,
                estimated_time_minutes: 1,
                completed: index < completed,
                first_content: None,
            })
            .collect()
    }

    #[test]
    fn completion_percent_rounds_half_up() {
        assert_eq!(completion_percent(0, 0), 0);
        assert_eq!(completion_percent(1, 3), 33);
        assert_eq!(completion_percent(2, 3), 67);
        assert_eq!(completion_percent(1, 8), 13);
        assert_eq!(completion_percent(3, 3), 100);
    }

    #[test]
    fn display_name_falls_back_in_order() {
        let mut profile = UserProfile::new(None, Some("Black".to_string()));
        assert_eq!(profile.display_name(), "Black");
        profile.first_name = Some("Fischer".to_string());
        assert_eq!(profile.display_name(), "Fischer");
        profile.first_name = Some("  ".to_string());
        profile.last_name = None;
        assert_eq!(profile.display_name(), "learner");
    }

    #[test]
    fn greeting_buckets_follow_local_hour() {
        assert_eq!(Greeting::for_hour(0), Greeting::Morning);
        assert_eq!(Greeting::for_hour(11), Greeting::Morning);
        assert_eq!(Greeting::for_hour(12), Greeting::Afternoon);
        assert_eq!(Greeting::for_hour(17), Greeting::Afternoon);
        assert_eq!(Greeting::for_hour(18), Greeting::Evening);
    }

    #[test]
    fn rounded_full_progress_counts_as_complete() {
        let progress = ModuleProgress::from_rows(Uuid::new_v4(), "Rates", &rows(200, 199));
        assert_eq!(progress.completed_chapters, 199);
        assert_eq!(progress.progress, 100);
        assert!(progress.is_complete());
        assert!(progress.next_chapter.is_none());
        assert_eq!(
            ProgressStatus::from_progress(Some(&progress)),
            ProgressStatus::Completed
        );
    }

    #[test]
    fn status_follows_rounded_percentage() {
        assert_eq!(ProgressStatus::from_progress(None), ProgressStatus::NotStarted);

        let barely = ModuleProgress::from_rows(Uuid::new_v4(), "Swaps", &rows(300, 1));
        assert_eq!(barely.progress, 0);
        assert_eq!(
            ProgressStatus::from_progress(Some(&barely)),
            ProgressStatus::NotStarted
        );

        let half = ModuleProgress::from_rows(Uuid::new_v4(), "Swaps", &rows(4, 2));
        assert_eq!(
            ProgressStatus::from_progress(Some(&half)),
            ProgressStatus::InProgress
        );
        assert_eq!(half.next_chapter.unwrap().name, "Chapter 3");

        let empty = ModuleProgress::from_rows(Uuid::new_v4(), "Empty", &[]);
        assert!(!empty.is_complete());
        assert!(empty.next_chapter.is_none());
    }
}
