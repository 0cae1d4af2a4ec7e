use coursedesk_core::db::open_db_in_memory;
use coursedesk_core::model::catalog::CatalogValidationError;
use coursedesk_core::repo::catalog_repo::{NewChapterContent, SqliteCatalogRepository};
use coursedesk_core::service::catalog_service::ModuleListQuery;
use coursedesk_core::{
    CatalogService, CatalogServiceError, Difficulty, NewChapter, NewModule, RepoError,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection) -> CatalogService<SqliteCatalogRepository<'_>> {
    CatalogService::new(SqliteCatalogRepository::try_new(conn).unwrap())
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let result = SqliteCatalogRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::UninitializedConnection { .. })
    ));
}

#[test]
fn modules_are_appended_unpublished_in_catalog_order() {
    let conn = setup();
    let service = service(&conn);

    let first = service
        .create_module(&NewModule::new("  Options basics ", Difficulty::Beginner))
        .unwrap();
    let second = service
        .create_module(&NewModule::new("Exotic payoffs", Difficulty::Advanced))
        .unwrap();

    assert_eq!(first.title, "Options basics");
    assert_eq!((first.order_index, second.order_index), (1, 2));
    assert!(!first.is_published);

    let listed = service.list_modules(&ModuleListQuery::default()).unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|summary| summary.module.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

#[test]
fn blank_title_and_negative_duration_are_rejected() {
    let conn = setup();
    let service = service(&conn);

    let err = service
        .create_module(&NewModule::new("   ", Difficulty::Beginner))
        .unwrap_err();
    assert!(matches!(
        err,
        CatalogServiceError::Validation(CatalogValidationError::BlankModuleTitle)
    ));

    let module = service
        .create_module(&NewModule::new("Rates", Difficulty::Intermediate))
        .unwrap();
    let err = service
        .create_chapter(module.id, &NewChapter::new("Duration", -5))
        .unwrap_err();
    assert!(matches!(
        err,
        CatalogServiceError::Validation(CatalogValidationError::InvalidEstimatedTime(-5))
    ));
}

#[test]
fn chapter_for_missing_module_is_not_found() {
    let conn = setup();
    let missing = Uuid::new_v4();

    let err = service(&conn)
        .create_chapter(missing, &NewChapter::new("Orphan", 10))
        .unwrap_err();
    assert!(matches!(err, CatalogServiceError::ModuleNotFound(id) if id == missing));
}

#[test]
fn toggle_published_filters_learner_catalog() {
    let conn = setup();
    let service = service(&conn);
    let draft = service
        .create_module(&NewModule::new("Draft", Difficulty::Beginner))
        .unwrap();
    let live = service
        .create_module(&NewModule::new("Live", Difficulty::Beginner))
        .unwrap();

    assert!(service.toggle_published(live.id).unwrap());

    let published = service
        .list_modules(&ModuleListQuery {
            published_only: true,
            search: None,
        })
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].module.id, live.id);

    assert!(!service.toggle_published(live.id).unwrap());
    assert!(!service.get_module(draft.id).unwrap().is_published);
}

#[test]
fn search_matches_category_and_difficulty_case_insensitively() {
    let conn = setup();
    let service = service(&conn);
    let category = service.create_category("Fixed Income").unwrap();

    let mut bonds = NewModule::new("Bond ladders", Difficulty::Beginner);
    bonds.category_id = Some(category.id);
    let bonds = service.create_module(&bonds).unwrap();
    let exotic = service
        .create_module(&NewModule::new("Barrier options", Difficulty::Advanced))
        .unwrap();

    let by_category = service
        .list_modules(&ModuleListQuery {
            published_only: false,
            search: Some("fixed income".to_string()),
        })
        .unwrap();
    assert_eq!(by_category.len(), 1);
    assert_eq!(by_category[0].module.id, bonds.id);
    assert_eq!(
        by_category[0].module.category_name.as_deref(),
        Some("Fixed Income")
    );

    let by_difficulty = service
        .list_modules(&ModuleListQuery {
            published_only: false,
            search: Some("ADVANCED".to_string()),
        })
        .unwrap();
    assert_eq!(by_difficulty.len(), 1);
    assert_eq!(by_difficulty[0].module.id, exotic.id);
}

#[test]
fn summaries_count_chapters_and_registrations() {
    let conn = setup();
    let service = service(&conn);
    let module = service
        .create_module(&NewModule::new("Hedging", Difficulty::Intermediate))
        .unwrap();
    service
        .create_chapter(module.id, &NewChapter::new("Delta hedge", 20))
        .unwrap();
    service
        .create_chapter(module.id, &NewChapter::new("Gamma scalping", 30))
        .unwrap();

    let listed = service.list_modules(&ModuleListQuery::default()).unwrap();
    assert_eq!(listed[0].chapter_count, 2);
    assert_eq!(listed[0].registration_count, 0);
}

#[test]
fn chapters_are_paged_in_rank_order() {
    let conn = setup();
    let service = service(&conn);
    let module = service
        .create_module(&NewModule::new("Term structure", Difficulty::Advanced))
        .unwrap();
    for index in 1..=7 {
        service
            .create_chapter(module.id, &NewChapter::new(format!("Part {index}"), 5))
            .unwrap();
    }

    let second = service.chapter_page(module.id, 2, 5).unwrap();
    assert_eq!(second.total_pages, 2);
    assert_eq!(second.total_chapters, 7);
    let names: Vec<&str> = second
        .chapters
        .iter()
        .map(|chapter| chapter.name.as_str())
        .collect();
    assert_eq!(names, vec!["Part 6", "Part 7"]);

    let err = service.chapter_page(module.id, 0, 5).unwrap_err();
    assert!(matches!(err, CatalogServiceError::InvalidPage { page: 0, .. }));
}

#[test]
fn deleting_module_cascades_to_chapters_and_content() {
    let conn = setup();
    let service = service(&conn);
    let module = service
        .create_module(&NewModule::new("Carry trades", Difficulty::Beginner))
        .unwrap();
    let chapter = service
        .create_chapter(module.id, &NewChapter::new("Funding", 10))
        .unwrap();
    service
        .add_chapter_content(
            chapter.id,
            &NewChapterContent {
                video_url: Some("https://cdn.example/funding.mp4".to_string()),
                ..NewChapterContent::default()
            },
        )
        .unwrap();

    service.delete_module(module.id).unwrap();

    let chapters: i64 = conn
        .query_row("SELECT COUNT(*) FROM chapters;", [], |row| row.get(0))
        .unwrap();
    let contents: i64 = conn
        .query_row("SELECT COUNT(*) FROM chapter_contents;", [], |row| row.get(0))
        .unwrap();
    assert_eq!((chapters, contents), (0, 0));
    assert!(matches!(
        service.get_module(module.id),
        Err(CatalogServiceError::ModuleNotFound(_))
    ));
    assert!(matches!(
        service.delete_module(module.id),
        Err(CatalogServiceError::ModuleNotFound(_))
    ));
}
