//! Catalog repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide persistence APIs for categories, modules, chapters and their
//!   attached content rows.
//! - Keep SQL details and append-at-end ranking inside the repository.
//!
//! # Invariants
//! - Module listing is deterministic: `order_index ASC, module_uuid ASC`.
//! - Chapter listing is deterministic within one module, same ordering.
//! - New modules/chapters are appended at `max(order_index) + 1`.
//! - Deleting a module relies on `ON DELETE CASCADE` for chapters,
//!   registrations and progress rows.

use crate::model::catalog::{
    CatalogValidationError, Category, CategoryId, Chapter, ChapterId, Difficulty, Module,
    ModuleId, ModuleSummary, NewChapter, NewModule,
};
use crate::repo::{
    bool_to_int, ensure_schema_ready, parse_flag, parse_u32, parse_uuid, RepoError,
    RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

pub(crate) const MODULE_SELECT_SQL: &str = "SELECT
    m.module_uuid AS module_uuid,
    m.title AS title,
    m.description AS description,
    m.category_uuid AS category_uuid,
    c.name AS category_name,
    m.picture_url AS picture_url,
    m.notes AS notes,
    m.difficulty AS difficulty,
    m.is_published AS is_published,
    m.order_index AS order_index
FROM modules m
LEFT JOIN categories c ON c.category_uuid = m.category_uuid";

pub(crate) const CHAPTER_SELECT_SQL: &str = "SELECT
    chapter_uuid,
    module_uuid,
    name,
    order_index,
    estimated_time_minutes
FROM chapters";

const CATALOG_TABLES: &[&str] = &["categories", "modules", "chapters", "chapter_contents"];

/// Content attachment for one chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewChapterContent {
    pub video_url: Option<String>,
    pub file_url: Option<String>,
    pub quiz_id: Option<Uuid>,
}

/// Repository interface for backoffice catalog operations.
pub trait CatalogRepository {
    /// Creates one category with a unique name.
    fn create_category(&self, name: &str) -> RepoResult<Category>;
    /// Creates one unpublished module at the end of the catalog.
    fn create_module(&self, request: &NewModule) -> RepoResult<Module>;
    /// Loads one module by id.
    fn get_module(&self, module_id: ModuleId) -> RepoResult<Option<Module>>;
    /// Lists modules with chapter/registration counts.
    fn list_modules(&self, published_only: bool) -> RepoResult<Vec<ModuleSummary>>;
    /// Sets module publish state.
    fn set_published(&self, module_id: ModuleId, is_published: bool) -> RepoResult<()>;
    /// Hard-deletes one module and everything hanging off it.
    fn delete_module(&self, module_id: ModuleId) -> RepoResult<()>;
    /// Creates one chapter at the end of its module.
    fn create_chapter(&self, module_id: ModuleId, request: &NewChapter) -> RepoResult<Chapter>;
    /// Loads one chapter by id.
    fn get_chapter(&self, chapter_id: ChapterId) -> RepoResult<Option<Chapter>>;
    /// Lists chapters of one module in rank order.
    fn list_chapters(&self, module_id: ModuleId) -> RepoResult<Vec<Chapter>>;
    /// Attaches one content row to a chapter.
    fn add_chapter_content(
        &self,
        chapter_id: ChapterId,
        content: &NewChapterContent,
    ) -> RepoResult<Uuid>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, CATALOG_TABLES)?;
        Ok(Self { conn })
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn create_category(&self, name: &str) -> RepoResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogValidationError::BlankCategoryName.into());
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.conn.execute(
            "INSERT INTO categories (category_uuid, name) VALUES (?1, ?2);",
            params![category.id.to_string(), category.name.as_str()],
        )?;
        Ok(category)
    }

    fn create_module(&self, request: &NewModule) -> RepoResult<Module> {
        request.validate()?;
        if let Some(category_id) = request.category_id {
            ensure_category_exists(self.conn, category_id)?;
        }

        let module_id = Uuid::new_v4();
        let order_index: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(order_index), 0) + 1 FROM modules;",
            [],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO modules (
                module_uuid,
                title,
                description,
                category_uuid,
                picture_url,
                notes,
                difficulty,
                is_published,
                order_index
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8);",
            params![
                module_id.to_string(),
                request.title.trim(),
                request.description.as_str(),
                request.category_id.map(|value| value.to_string()),
                request.picture_url.as_deref(),
                request.notes.as_str(),
                request.difficulty.as_str(),
                order_index,
            ],
        )?;

        self.get_module(module_id)?
            .ok_or(RepoError::ModuleNotFound(module_id))
    }

    fn get_module(&self, module_id: ModuleId) -> RepoResult<Option<Module>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MODULE_SELECT_SQL} WHERE m.module_uuid = ?1;"))?;
        let mut rows = stmt.query([module_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_module_row(row)?));
        }
        Ok(None)
    }

    fn list_modules(&self, published_only: bool) -> RepoResult<Vec<ModuleSummary>> {
        let sql = format!(
            "{MODULE_SELECT_SQL}
             WHERE (?1 = 0 OR m.is_published = 1)
             ORDER BY m.order_index ASC, m.module_uuid ASC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([bool_to_int(published_only)])?;

        let mut modules = Vec::new();
        while let Some(row) = rows.next()? {
            modules.push(parse_module_row(row)?);
        }

        modules
            .into_iter()
            .map(|module| {
                let (chapter_count, registration_count) = module_counts(self.conn, module.id)?;
                Ok(ModuleSummary {
                    module,
                    chapter_count,
                    registration_count,
                })
            })
            .collect()
    }

    fn set_published(&self, module_id: ModuleId, is_published: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE modules
             SET is_published = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE module_uuid = ?1;",
            params![module_id.to_string(), bool_to_int(is_published)],
        )?;
        if changed == 0 {
            return Err(RepoError::ModuleNotFound(module_id));
        }
        Ok(())
    }

    fn delete_module(&self, module_id: ModuleId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM modules WHERE module_uuid = ?1;",
            [module_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::ModuleNotFound(module_id));
        }
        Ok(())
    }

    fn create_chapter(&self, module_id: ModuleId, request: &NewChapter) -> RepoResult<Chapter> {
        request.validate()?;
        if self.get_module(module_id)?.is_none() {
            return Err(RepoError::ModuleNotFound(module_id));
        }

        let chapter_id = Uuid::new_v4();
        let order_index: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(order_index), 0) + 1
             FROM chapters
             WHERE module_uuid = ?1;",
            [module_id.to_string()],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO chapters (
                chapter_uuid,
                module_uuid,
                name,
                order_index,
                estimated_time_minutes
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                chapter_id.to_string(),
                module_id.to_string(),
                request.name.trim(),
                order_index,
                request.estimated_time_minutes,
            ],
        )?;

        self.get_chapter(chapter_id)?
            .ok_or(RepoError::ChapterNotFound(chapter_id))
    }

    fn get_chapter(&self, chapter_id: ChapterId) -> RepoResult<Option<Chapter>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CHAPTER_SELECT_SQL} WHERE chapter_uuid = ?1;"))?;
        let mut rows = stmt.query([chapter_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_chapter_row(row)?));
        }
        Ok(None)
    }

    fn list_chapters(&self, module_id: ModuleId) -> RepoResult<Vec<Chapter>> {
        list_module_chapters(self.conn, module_id)
    }

    fn add_chapter_content(
        &self,
        chapter_id: ChapterId,
        content: &NewChapterContent,
    ) -> RepoResult<Uuid> {
        if self.get_chapter(chapter_id)?.is_none() {
            return Err(RepoError::ChapterNotFound(chapter_id));
        }
        let content_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO chapter_contents (
                content_uuid,
                chapter_uuid,
                video_url,
                file_url,
                quiz_uuid
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                content_id.to_string(),
                chapter_id.to_string(),
                content.video_url.as_deref(),
                content.file_url.as_deref(),
                content.quiz_id.map(|value| value.to_string()),
            ],
        )?;
        Ok(content_id)
    }
}

pub(crate) fn list_module_chapters(
    conn: &Connection,
    module_id: ModuleId,
) -> RepoResult<Vec<Chapter>> {
    let mut stmt = conn.prepare(&format!(
        "{CHAPTER_SELECT_SQL}
         WHERE module_uuid = ?1
         ORDER BY order_index ASC, chapter_uuid ASC;"
    ))?;
    let mut rows = stmt.query([module_id.to_string()])?;
    let mut chapters = Vec::new();
    while let Some(row) = rows.next()? {
        chapters.push(parse_chapter_row(row)?);
    }
    Ok(chapters)
}

pub(crate) fn list_all_modules(conn: &Connection) -> RepoResult<Vec<Module>> {
    let mut stmt = conn.prepare(&format!(
        "{MODULE_SELECT_SQL} ORDER BY m.order_index ASC, m.module_uuid ASC;"
    ))?;
    let mut rows = stmt.query([])?;
    let mut modules = Vec::new();
    while let Some(row) = rows.next()? {
        modules.push(parse_module_row(row)?);
    }
    Ok(modules)
}

fn module_counts(conn: &Connection, module_id: ModuleId) -> RepoResult<(u32, u32)> {
    let (chapters, registrations): (i64, i64) = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM chapters WHERE module_uuid = ?1),
            (SELECT COUNT(*) FROM module_registrations WHERE module_uuid = ?1);",
        [module_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((
        parse_u32(chapters, "chapters.count")?,
        parse_u32(registrations, "module_registrations.count")?,
    ))
}

fn ensure_category_exists(conn: &Connection, category_id: CategoryId) -> RepoResult<()> {
    let found: Option<String> = conn
        .query_row(
            "SELECT category_uuid FROM categories WHERE category_uuid = ?1;",
            [category_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(RepoError::CategoryNotFound(category_id)),
    }
}

pub(crate) fn parse_module_row(row: &Row<'_>) -> RepoResult<Module> {
    let module_uuid_text: String = row.get("module_uuid")?;
    let category_id = row
        .get::<_, Option<String>>("category_uuid")?
        .map(|value| parse_uuid(&value, "modules.category_uuid"))
        .transpose()?;

    let difficulty_text: String = row.get("difficulty")?;
    let difficulty = Difficulty::parse(&difficulty_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid difficulty `{difficulty_text}` in modules.difficulty"
        ))
    })?;

    Ok(Module {
        id: parse_uuid(&module_uuid_text, "modules.module_uuid")?,
        title: row.get("title")?,
        description: row.get("description")?,
        category_id,
        category_name: row.get("category_name")?,
        picture_url: row.get("picture_url")?,
        notes: row.get("notes")?,
        difficulty,
        is_published: parse_flag(row.get("is_published")?, "modules.is_published")?,
        order_index: row.get("order_index")?,
    })
}

pub(crate) fn parse_chapter_row(row: &Row<'_>) -> RepoResult<Chapter> {
    let chapter_uuid_text: String = row.get("chapter_uuid")?;
    let module_uuid_text: String = row.get("module_uuid")?;
    Ok(Chapter {
        id: parse_uuid(&chapter_uuid_text, "chapters.chapter_uuid")?,
        module_id: parse_uuid(&module_uuid_text, "chapters.module_uuid")?,
        name: row.get("name")?,
        order_index: row.get("order_index")?,
        estimated_time_minutes: parse_u32(
            row.get("estimated_time_minutes")?,
            "chapters.estimated_time_minutes",
        )?,
    })
}
