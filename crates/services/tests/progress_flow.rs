mod support;

use std::sync::Arc;

use cacao_core::model::{CourseId, CourseProgress, ProgressTotals, Session};
use services::ProgressService;
use storage::repository::{InMemoryRepository, ProgressCache};

use support::{Backend, FakeApi, course, learner, progress};

fn service(api: &Arc<FakeApi>, repo: &InMemoryRepository) -> ProgressService {
    ProgressService::new(api.clone(), Arc::new(repo.clone()))
}

#[tokio::test]
async fn failed_fetch_falls_back_to_cache_then_not_started() {
    let catalog = vec![course("a", 2, 0.0), course("b", 2, 0.0), course("c", 2, 0.0)];
    let api = FakeApi::new(Backend {
        progress: [(CourseId::new("a"), progress("a", 50.0, 1))].into(),
        failing_progress: [CourseId::new("b"), CourseId::new("c")].into(),
        ..Backend::default()
    });
    let repo = InMemoryRepository::new();
    let session = learner();
    let cached_b = progress("b", 100.0, 2);
    repo.store_progress(&session.user_key(), &cached_b).await.unwrap();

    let aggregated = service(&api, &repo).aggregate(&session, &catalog).await;

    assert_eq!(aggregated.entries[0], progress("a", 50.0, 1));
    assert_eq!(aggregated.entries[1], cached_b);
    assert_eq!(aggregated.entries[2], CourseProgress::not_started(CourseId::new("c")));
    assert_eq!(aggregated.failed, 2);
    assert!(!aggregated.unauthorized);
    assert_eq!(api.calls("course_progress"), 3);
}

#[tokio::test]
async fn successful_fetch_is_written_back() {
    let catalog = vec![course("a", 2, 0.0)];
    let api = FakeApi::new(Backend {
        progress: [(CourseId::new("a"), progress("a", 50.0, 1))].into(),
        ..Backend::default()
    });
    let repo = InMemoryRepository::new();
    let session = learner();

    service(&api, &repo).aggregate(&session, &catalog).await;

    let cached = repo
        .cached_progress(&session.user_key(), &CourseId::new("a"))
        .await
        .unwrap();
    assert_eq!(cached, Some(progress("a", 50.0, 1)));

    api.with(|b| {
        b.failing_progress.insert(CourseId::new("a"));
    });
    let again = service(&api, &repo).aggregate(&session, &catalog).await;
    assert_eq!(again.entries[0], progress("a", 50.0, 1));
}

#[tokio::test]
async fn any_completion_signal_completes_a_course() {
    // A: every lesson done but the catalog still says 40%.
    // B: the API says 100% but no lessons are recorded.
    let catalog = vec![course("a", 4, 40.0), course("b", 3, 0.0)];
    let api = FakeApi::new(Backend {
        progress: [
            (CourseId::new("a"), progress("a", 75.0, 4)),
            (CourseId::new("b"), progress("b", 100.0, 0)),
        ]
        .into(),
        ..Backend::default()
    });
    let repo = InMemoryRepository::new();

    let aggregated = service(&api, &repo).aggregate(&learner(), &catalog).await;
    let totals = ProgressTotals::collect(&catalog, &aggregated.entries);

    assert_eq!(totals.completed_courses, 2);
    assert_eq!(totals.in_progress_courses, 0);
    assert_eq!(totals.completion_percentage, 100);
}

#[tokio::test]
async fn guests_get_defaults_without_requests() {
    let catalog = vec![course("a", 2, 0.0), course("b", 1, 0.0)];
    let api = FakeApi::new(Backend::default());
    let repo = InMemoryRepository::new();

    let aggregated = service(&api, &repo).aggregate(&Session::guest(), &catalog).await;

    assert_eq!(aggregated.entries.len(), 2);
    assert!(aggregated.entries.iter().all(|p| !p.is_started()));
    assert_eq!(api.calls("course_progress"), 0);
}

#[tokio::test]
async fn rejected_token_is_reported() {
    let catalog = vec![course("a", 2, 0.0)];
    let api = FakeApi::new(Backend {
        unauthorized: true,
        ..Backend::default()
    });
    let repo = InMemoryRepository::new();

    let aggregated = service(&api, &repo).aggregate(&learner(), &catalog).await;

    assert!(aggregated.unauthorized);
    assert_eq!(aggregated.failed, 1);
}
