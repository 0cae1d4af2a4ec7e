//! Learner progress repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist profiles, module registrations and chapter completion.
//! - Load the nested enrollment -> chapter -> progress shape in one place.
//!
//! # Invariants
//! - Registration is idempotent per `(user, module)`.
//! - Chapter rows come back in `order_index ASC, chapter_uuid ASC` order.
//! - A chapter without a progress row counts as not completed.

use crate::model::catalog::{ChapterId, ContentKind, ModuleId};
use crate::model::progress::{ChapterProgressRow, UserId, UserProfile};
use crate::repo::{
    bool_to_int, ensure_schema_ready, parse_flag, parse_u32, parse_uuid, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PROGRESS_TABLES: &[&str] = &[
    "users",
    "modules",
    "chapters",
    "chapter_contents",
    "module_registrations",
    "chapter_progress",
];

/// One registration joined with its module title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub module_id: ModuleId,
    pub title: String,
    pub is_published: bool,
}

/// Repository interface for learner progress.
pub trait ProgressRepository {
    /// Inserts one profile.
    fn create_user(&self, profile: &UserProfile) -> RepoResult<()>;
    /// Loads one profile.
    fn get_user(&self, user_id: UserId) -> RepoResult<Option<UserProfile>>;
    /// Stamps `last_login_date` (`YYYY-MM-DD`).
    fn touch_last_login(&self, user_id: UserId, date: &str) -> RepoResult<()>;
    /// Registers user to module; no-op when already registered.
    fn enroll(&self, user_id: UserId, module_id: ModuleId) -> RepoResult<()>;
    /// Lists registrations of one user, in catalog order.
    fn list_enrollments(&self, user_id: UserId) -> RepoResult<Vec<Enrollment>>;
    /// Loads ordered chapter rows of one module with the user's state.
    fn chapter_progress(
        &self,
        user_id: UserId,
        module_id: ModuleId,
    ) -> RepoResult<Vec<ChapterProgressRow>>;
    /// Upserts completion flag for one chapter.
    fn set_chapter_completed(
        &self,
        user_id: UserId,
        chapter_id: ChapterId,
        completed: bool,
    ) -> RepoResult<()>;
}

/// SQLite-backed progress repository.
pub struct SqliteProgressRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProgressRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, PROGRESS_TABLES)?;
        Ok(Self { conn })
    }

    fn ensure_user_exists(&self, user_id: UserId) -> RepoResult<()> {
        if self.get_user(user_id)?.is_none() {
            return Err(RepoError::UserNotFound(user_id));
        }
        Ok(())
    }
}

impl ProgressRepository for SqliteProgressRepository<'_> {
    fn create_user(&self, profile: &UserProfile) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO users (
                user_uuid,
                first_name,
                last_name,
                day_streak,
                subscription_type,
                last_login_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                profile.id.to_string(),
                profile.first_name.as_deref(),
                profile.last_name.as_deref(),
                i64::from(profile.day_streak),
                profile.subscription_type.as_str(),
                profile.last_login_date.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn get_user(&self, user_id: UserId) -> RepoResult<Option<UserProfile>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                user_uuid,
                first_name,
                last_name,
                day_streak,
                subscription_type,
                last_login_date
             FROM users
             WHERE user_uuid = ?1;",
        )?;
        let mut rows = stmt.query([user_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn touch_last_login(&self, user_id: UserId, date: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET last_login_date = ?2 WHERE user_uuid = ?1;",
            params![user_id.to_string(), date],
        )?;
        if changed == 0 {
            return Err(RepoError::UserNotFound(user_id));
        }
        Ok(())
    }

    fn enroll(&self, user_id: UserId, module_id: ModuleId) -> RepoResult<()> {
        self.ensure_user_exists(user_id)?;
        let module_exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM modules WHERE module_uuid = ?1;",
                [module_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if module_exists.is_none() {
            return Err(RepoError::ModuleNotFound(module_id));
        }

        self.conn.execute(
            "INSERT OR IGNORE INTO module_registrations (user_uuid, module_uuid)
             VALUES (?1, ?2);",
            params![user_id.to_string(), module_id.to_string()],
        )?;
        Ok(())
    }

    fn list_enrollments(&self, user_id: UserId) -> RepoResult<Vec<Enrollment>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.module_uuid, m.title, m.is_published
             FROM module_registrations r
             INNER JOIN modules m ON m.module_uuid = r.module_uuid
             WHERE r.user_uuid = ?1
             ORDER BY m.order_index ASC, m.module_uuid ASC;",
        )?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut enrollments = Vec::new();
        while let Some(row) = rows.next()? {
            let module_uuid_text: String = row.get(0)?;
            enrollments.push(Enrollment {
                module_id: parse_uuid(&module_uuid_text, "modules.module_uuid")?,
                title: row.get(1)?,
                is_published: parse_flag(row.get(2)?, "modules.is_published")?,
            });
        }
        Ok(enrollments)
    }

    fn chapter_progress(
        &self,
        user_id: UserId,
        module_id: ModuleId,
    ) -> RepoResult<Vec<ChapterProgressRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                ch.chapter_uuid AS chapter_uuid,
                ch.name AS name,
                ch.order_index AS order_index,
                ch.estimated_time_minutes AS estimated_time_minutes,
                COALESCE(p.completed, 0) AS completed,
                (
                    SELECT (cc.video_url IS NOT NULL) * 2 + (cc.file_url IS NOT NULL)
                    FROM chapter_contents cc
                    WHERE cc.chapter_uuid = ch.chapter_uuid
                    ORDER BY cc.created_at ASC, cc.rowid ASC
                    LIMIT 1
                ) AS first_content
             FROM chapters ch
             LEFT JOIN chapter_progress p
               ON p.chapter_uuid = ch.chapter_uuid
              AND p.user_uuid = ?1
             WHERE ch.module_uuid = ?2
             ORDER BY ch.order_index ASC, ch.chapter_uuid ASC;",
        )?;
        let mut rows = stmt.query(params![user_id.to_string(), module_id.to_string()])?;
        let mut chapters = Vec::new();
        while let Some(row) = rows.next()? {
            chapters.push(parse_chapter_progress_row(row)?);
        }
        Ok(chapters)
    }

    fn set_chapter_completed(
        &self,
        user_id: UserId,
        chapter_id: ChapterId,
        completed: bool,
    ) -> RepoResult<()> {
        self.ensure_user_exists(user_id)?;
        let chapter_exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM chapters WHERE chapter_uuid = ?1;",
                [chapter_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if chapter_exists.is_none() {
            return Err(RepoError::ChapterNotFound(chapter_id));
        }

        self.conn.execute(
            "INSERT INTO chapter_progress (user_uuid, chapter_uuid, completed)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_uuid, chapter_uuid) DO UPDATE SET
                completed = excluded.completed,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                user_id.to_string(),
                chapter_id.to_string(),
                bool_to_int(completed)
            ],
        )?;
        Ok(())
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<UserProfile> {
    let user_uuid_text: String = row.get("user_uuid")?;
    Ok(UserProfile {
        id: parse_uuid(&user_uuid_text, "users.user_uuid")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        day_streak: parse_u32(row.get("day_streak")?, "users.day_streak")?,
        subscription_type: row.get("subscription_type")?,
        last_login_date: row.get("last_login_date")?,
    })
}

fn parse_chapter_progress_row(row: &Row<'_>) -> RepoResult<ChapterProgressRow> {
    let chapter_uuid_text: String = row.get("chapter_uuid")?;
    // Bit 1: first content has a video url, bit 0: it has a file url.
    let first_content = row
        .get::<_, Option<i64>>("first_content")?
        .map(|bits| ContentKind::classify(bits & 0b10 != 0, bits & 0b01 != 0));

    Ok(ChapterProgressRow {
        chapter_id: parse_uuid(&chapter_uuid_text, "chapters.chapter_uuid")?,
        name: row.get("name")?,
        order_index: row.get("order_index")?,
        estimated_time_minutes: parse_u32(
            row.get("estimated_time_minutes")?,
            "chapters.estimated_time_minutes",
        )?,
        completed: parse_flag(row.get("completed")?, "chapter_progress.completed")?,
        first_content,
    })
}
