use chrono::NaiveDate;
use coursedesk_core::db::open_db_in_memory;
use coursedesk_core::repo::catalog_repo::{
    CatalogRepository, NewChapterContent, SqliteCatalogRepository,
};
use coursedesk_core::repo::progress_repo::{ProgressRepository, SqliteProgressRepository};
use coursedesk_core::{
    CatalogQuery, ChapterId, ContentKind, Difficulty, Greeting, ModuleId, ModuleSort,
    NewChapter, NewModule, ProgressService, ProgressServiceError, ProgressStatus, StatusFilter,
    UserProfile,
};
use rusqlite::Connection;
use uuid::Uuid;

type Service<'conn> =
    ProgressService<SqliteProgressRepository<'conn>, SqliteCatalogRepository<'conn>>;

struct Fixture {
    conn: Connection,
    learner: UserProfile,
}

struct SeededModule {
    id: ModuleId,
    chapters: Vec<ChapterId>,
}

impl Fixture {
    fn new() -> Self {
        let conn = open_db_in_memory().unwrap();
        let learner = UserProfile::new(Some("Ada".to_string()), Some("Lovelace".to_string()));
        SqliteProgressRepository::try_new(&conn)
            .unwrap()
            .create_user(&learner)
            .unwrap();
        Self { conn, learner }
    }

    fn service(&self) -> Service<'_> {
        ProgressService::new(
            SqliteProgressRepository::try_new(&self.conn).unwrap(),
            SqliteCatalogRepository::try_new(&self.conn).unwrap(),
        )
    }

    fn catalog(&self) -> SqliteCatalogRepository<'_> {
        SqliteCatalogRepository::try_new(&self.conn).unwrap()
    }

    fn module(&self, title: &str, published: bool, minutes: &[i64]) -> SeededModule {
        let catalog = self.catalog();
        let module = catalog
            .create_module(&NewModule::new(title, Difficulty::Intermediate))
            .unwrap();
        catalog.set_published(module.id, published).unwrap();
        let chapters = minutes
            .iter()
            .enumerate()
            .map(|(index, minutes)| {
                catalog
                    .create_chapter(
                        module.id,
                        &NewChapter::new(format!("{title} {}", index + 1), *minutes),
                    )
                    .unwrap()
                    .id
            })
            .collect();
        SeededModule {
            id: module.id,
            chapters,
        }
    }
}

#[test]
fn module_progress_points_at_first_incomplete_chapter() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let user = fixture.learner.id;
    let options = fixture.module("Options", true, &[30, 30, 60]);
    fixture
        .catalog()
        .add_chapter_content(
            options.chapters[1],
            &NewChapterContent {
                video_url: Some("https://cdn.example/puts.mp4".to_string()),
                file_url: Some("https://cdn.example/puts.pdf".to_string()),
                quiz_id: None,
            },
        )
        .unwrap();

    service.enroll(user, options.id).unwrap();
    service
        .mark_chapter_completed(user, options.chapters[0], true)
        .unwrap();

    let progress = service.module_progress(user, options.id).unwrap();
    assert_eq!(progress.total_chapters, 3);
    assert_eq!(progress.completed_chapters, 1);
    assert_eq!(progress.progress, 33);
    let next = progress.next_chapter.unwrap();
    assert_eq!(next.chapter_id, options.chapters[1]);
    assert_eq!(next.content_kind, ContentKind::Video);
    assert_eq!(next.estimated_time_minutes, 30);
}

#[test]
fn chapter_without_content_defaults_to_file_and_quiz_only_content_is_quiz() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let user = fixture.learner.id;
    let module = fixture.module("Swaps", true, &[10, 10]);
    fixture
        .catalog()
        .add_chapter_content(
            module.chapters[1],
            &NewChapterContent {
                quiz_id: Some(Uuid::new_v4()),
                ..NewChapterContent::default()
            },
        )
        .unwrap();
    service.enroll(user, module.id).unwrap();

    let progress = service.module_progress(user, module.id).unwrap();
    assert_eq!(
        progress.next_chapter.as_ref().unwrap().content_kind,
        ContentKind::File
    );

    service
        .mark_chapter_completed(user, module.chapters[0], true)
        .unwrap();
    let progress = service.module_progress(user, module.id).unwrap();
    assert_eq!(
        progress.next_chapter.unwrap().content_kind,
        ContentKind::Quiz
    );
}

#[test]
fn completed_module_has_no_next_chapter() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let user = fixture.learner.id;
    let module = fixture.module("Basics", true, &[15]);
    service.enroll(user, module.id).unwrap();
    service
        .mark_chapter_completed(user, module.chapters[0], true)
        .unwrap();

    let progress = service.module_progress(user, module.id).unwrap();
    assert_eq!(progress.progress, 100);
    assert!(progress.is_complete());
    assert!(progress.next_chapter.is_none());

    service
        .mark_chapter_completed(user, module.chapters[0], false)
        .unwrap();
    let progress = service.module_progress(user, module.id).unwrap();
    assert_eq!(progress.progress, 0);
    assert!(progress.next_chapter.is_some());
}

#[test]
fn dashboard_summary_aggregates_all_registrations() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let user = fixture.learner.id;
    let options = fixture.module("Options", true, &[30, 30, 60]);
    let futures = fixture.module("Futures", true, &[90]);
    let empty = fixture.module("Empty", true, &[]);

    for module in [&options, &futures, &empty] {
        service.enroll(user, module.id).unwrap();
    }
    service
        .mark_chapter_completed(user, options.chapters[0], true)
        .unwrap();
    service
        .mark_chapter_completed(user, futures.chapters[0], true)
        .unwrap();

    let summary = service.dashboard_summary(user).unwrap();
    assert_eq!(summary.total_courses, 3);
    assert_eq!(summary.courses_completed, 1);
    assert_eq!(summary.hours_learned, 2);
    assert_eq!(summary.progress_percentage, 33);

    let in_progress: Vec<ModuleId> = service
        .enrolled_in_progress(user)
        .unwrap()
        .into_iter()
        .map(|progress| progress.module_id)
        .collect();
    assert_eq!(in_progress, vec![options.id, empty.id]);
}

#[test]
fn dashboard_without_registrations_is_zeroed() {
    let fixture = Fixture::new();
    let summary = fixture.service().dashboard_summary(fixture.learner.id).unwrap();
    assert_eq!(summary.total_courses, 0);
    assert_eq!(summary.progress_percentage, 0);
    assert_eq!(summary.hours_learned, 0);
}

#[test]
fn enroll_is_idempotent() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let module = fixture.module("Rates", true, &[5]);

    service.enroll(fixture.learner.id, module.id).unwrap();
    service.enroll(fixture.learner.id, module.id).unwrap();

    let summaries = fixture.catalog().list_modules(false).unwrap();
    assert_eq!(summaries[0].registration_count, 1);
    assert_eq!(
        service.dashboard_summary(fixture.learner.id).unwrap().total_courses,
        1
    );
}

#[test]
fn filter_modules_classifies_published_catalog() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let user = fixture.learner.id;
    let done = fixture.module("Credit", true, &[10]);
    let started = fixture.module("Equity", true, &[10, 10]);
    let enrolled_only = fixture.module("Commodities", true, &[10]);
    let untouched = fixture.module("Currencies", true, &[10]);
    let draft = fixture.module("Crypto", false, &[10]);

    for module in [&done, &started, &enrolled_only, &draft] {
        service.enroll(user, module.id).unwrap();
    }
    service
        .mark_chapter_completed(user, done.chapters[0], true)
        .unwrap();
    service
        .mark_chapter_completed(user, started.chapters[0], true)
        .unwrap();

    let ids = |status: StatusFilter, search: Option<&str>| -> Vec<ModuleId> {
        let query = CatalogQuery {
            status,
            search: search.map(str::to_string),
            ..CatalogQuery::default()
        };
        service
            .filter_modules(user, &query)
            .unwrap()
            .into_iter()
            .map(|entry| entry.summary.module.id)
            .collect()
    };

    assert_eq!(
        ids(StatusFilter::All, None),
        vec![done.id, started.id, enrolled_only.id, untouched.id]
    );
    assert_eq!(ids(StatusFilter::Completed, None), vec![done.id]);
    assert_eq!(ids(StatusFilter::InProgress, None), vec![started.id]);
    assert_eq!(
        ids(StatusFilter::NotStarted, None),
        vec![enrolled_only.id, untouched.id]
    );
    assert_eq!(ids(StatusFilter::All, Some("equ")), vec![started.id]);

    let entries = service
        .filter_modules(
            user,
            &CatalogQuery {
                status: StatusFilter::InProgress,
                ..CatalogQuery::default()
            },
        )
        .unwrap();
    assert_eq!(entries[0].status, ProgressStatus::InProgress);
    assert_eq!(entries[0].progress.as_ref().unwrap().progress, 50);
}

#[test]
fn filter_modules_sorts_by_name_and_difficulty() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let catalog = fixture.catalog();
    let mut created = Vec::new();
    for (title, difficulty) in [
        ("volatility surfaces", Difficulty::Advanced),
        ("Bond basics", Difficulty::Beginner),
        ("Carry and roll", Difficulty::Intermediate),
        ("asset swaps", Difficulty::Beginner),
    ] {
        let module = catalog
            .create_module(&NewModule::new(title, difficulty))
            .unwrap();
        catalog.set_published(module.id, true).unwrap();
        created.push(module.title);
    }

    let titles = |sort: ModuleSort| -> Vec<String> {
        service
            .filter_modules(
                fixture.learner.id,
                &CatalogQuery {
                    sort,
                    ..CatalogQuery::default()
                },
            )
            .unwrap()
            .into_iter()
            .map(|entry| entry.summary.module.title)
            .collect()
    };

    assert_eq!(titles(ModuleSort::CatalogOrder), created);
    assert_eq!(
        titles(ModuleSort::Name),
        vec!["asset swaps", "Bond basics", "Carry and roll", "volatility surfaces"]
    );
    assert_eq!(
        titles(ModuleSort::Difficulty),
        vec!["Bond basics", "asset swaps", "Carry and roll", "volatility surfaces"]
    );
}

#[test]
fn module_rounding_to_full_progress_leaves_continue_learning() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let user = fixture.learner.id;
    let long = fixture.module("Long haul", true, &[1; 200]);
    service.enroll(user, long.id).unwrap();
    for chapter in &long.chapters[..199] {
        service.mark_chapter_completed(user, *chapter, true).unwrap();
    }

    let progress = service.module_progress(user, long.id).unwrap();
    assert_eq!(progress.completed_chapters, 199);
    assert_eq!(progress.progress, 100);
    assert!(progress.next_chapter.is_none());
    assert!(service.enrolled_in_progress(user).unwrap().is_empty());

    let completed = service
        .filter_modules(
            user,
            &CatalogQuery {
                status: StatusFilter::Completed,
                ..CatalogQuery::default()
            },
        )
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].summary.module.id, long.id);

    // Dashboard completion still requires every chapter.
    let summary = service.dashboard_summary(user).unwrap();
    assert_eq!(summary.courses_completed, 0);
}

#[test]
fn dashboard_greets_and_stamps_last_login() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let now = NaiveDate::from_ymd_opt(2026, 10, 16)
        .unwrap()
        .and_hms_opt(19, 5, 0)
        .unwrap();

    let dashboard = service.dashboard(fixture.learner.id, now).unwrap();

    assert_eq!(dashboard.display_name, "Ada");
    assert_eq!(dashboard.greeting, Greeting::Evening);
    assert_eq!(dashboard.subscription_type, "free");
    let profile = service.profile(fixture.learner.id).unwrap();
    assert_eq!(profile.last_login_date.as_deref(), Some("2026-10-16"));
}

#[test]
fn unknown_user_and_module_are_reported() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let module = fixture.module("Rates", true, &[5]);
    let stranger = Uuid::new_v4();

    assert!(matches!(
        service.dashboard_summary(stranger),
        Err(ProgressServiceError::UserNotFound(id)) if id == stranger
    ));
    assert!(matches!(
        service.enroll(stranger, module.id),
        Err(ProgressServiceError::UserNotFound(_))
    ));

    let missing = Uuid::new_v4();
    assert!(matches!(
        service.enroll(fixture.learner.id, missing),
        Err(ProgressServiceError::ModuleNotFound(id)) if id == missing
    ));
    assert!(matches!(
        service.mark_chapter_completed(fixture.learner.id, missing, true),
        Err(ProgressServiceError::ChapterNotFound(_))
    ));
}
