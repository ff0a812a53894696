// tests/exam_tests.rs

mod common;

use std::{collections::HashSet, path::PathBuf};

use common::TestApp;
use exam_backend::{
    clients::storage::UploadFile,
    error::AppError,
    models::{exam::ExamStatus, exam_answer::AnswerStatus, question::QuestionType},
    repository::{answer as answer_repo, exam as exam_repo, report as report_repo, survey as survey_repo},
    services::exam as exam_service,
};

const USER: i64 = 11;

async fn new_survey(app: &TestApp, level: i64, topics: &[i64]) -> i64 {
    let mut tx = app.state.pool.begin().await.unwrap();
    let survey = survey_repo::insert(&mut tx, USER, level, topics).await.unwrap();
    tx.commit().await.unwrap();
    survey.id
}

fn audio(name: &str) -> UploadFile {
    UploadFile {
        file_name: name.to_string(),
        content_type: Some("audio/webm".to_string()),
        bytes: vec![1, 2, 3, 4],
    }
}

/// Maps a public storage URL back to the file under the test's upload dir.
fn stored_path(app: &TestApp, url: &str) -> PathBuf {
    let relative = url
        .strip_prefix("http://files.test/")
        .expect("URL outside the test storage");
    app.storage_dir.path().join(relative)
}

async fn answer_is(app: &TestApp, exam_id: i64, order: i64, status: AnswerStatus) -> bool {
    let mut conn = app.state.pool.acquire().await.unwrap();
    answer_repo::find(&mut conn, exam_id, order)
        .await
        .unwrap()
        .is_some_and(|a| a.status == status)
}

async fn report_exists(app: &TestApp, exam_id: i64) -> bool {
    let mut conn = app.state.pool.acquire().await.unwrap();
    report_repo::find(&mut conn, exam_id).await.unwrap().is_some()
}

#[tokio::test]
async fn start_exam_drafts_the_first_seven_questions() {
    // Arrange
    let app = common::fake_app().await;
    let seeded = common::seed_content(&app.state.pool, 4).await;
    let survey_id = new_survey(&app, 4, &seeded.topics).await;

    // Act
    let view = exam_service::start_exam(&app.state, USER, survey_id).await.unwrap();

    // Assert
    assert_eq!(view.questions.len(), 7);
    assert_eq!(view.status, ExamStatus::InProgress);
    assert!(!view.completed);
    let orders: Vec<i64> = view.questions.iter().map(|q| q.order).collect();
    assert_eq!(orders, (1..=7).collect::<Vec<_>>());
    assert_eq!(view.questions[0].question_type, QuestionType::Intro);
    assert!(view.questions[1..].iter().all(|q| q.level == 4));

    let mut conn = app.state.pool.acquire().await.unwrap();
    let exam = exam_repo::find(&mut conn, view.id).await.unwrap().unwrap();
    let topics: Vec<i64> = exam.question_sets.iter().filter_map(|qs| qs.topic_id).collect();
    assert_eq!(topics.len(), 2);
    assert_eq!(topics.iter().collect::<HashSet<_>>().len(), 2);
}

#[tokio::test]
async fn start_exam_without_known_topics_is_rejected() {
    let app = common::fake_app().await;
    common::seed_content(&app.state.pool, 1).await;
    let survey_id = new_survey(&app, 3, &[999]).await;

    let result = exam_service::start_exam(&app.state, USER, survey_id).await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn start_exam_with_foreign_survey_is_not_found() {
    let app = common::fake_app().await;
    let seeded = common::seed_content(&app.state.pool, 2).await;
    let survey_id = new_survey(&app, 3, &seeded.topics).await;

    let result = exam_service::start_exam(&app.state, USER + 1, survey_id).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn adjusting_difficulty_drafts_the_remaining_questions_once() {
    // Arrange
    let app = common::fake_app().await;
    let seeded = common::seed_content(&app.state.pool, 5).await;
    let survey_id = new_survey(&app, 4, &seeded.topics).await;
    let view = exam_service::start_exam(&app.state, USER, survey_id).await.unwrap();

    // Act
    let batch = exam_service::adjust_difficulty(&app.state, USER, view.id, 5)
        .await
        .unwrap();

    // Assert
    assert_eq!(batch.adjusted_difficulty, Some(5));
    assert_eq!(batch.questions.len(), 8);
    assert_eq!(batch.questions[0].order, 8);
    assert_eq!(batch.questions.last().unwrap().order, 15);
    assert!(batch.questions.iter().all(|q| q.level == 5));

    let mut conn = app.state.pool.acquire().await.unwrap();
    let exam = exam_repo::find(&mut conn, view.id).await.unwrap().unwrap();
    assert_eq!(exam.question_count(), 15);
    // Five topics, five topic-bound sets: none repeats.
    assert_eq!(exam.used_topics().len(), 5);
    drop(conn);

    let again = exam_service::adjust_difficulty(&app.state, USER, view.id, 6).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn out_of_range_adjustment_falls_back_to_initial_level() {
    // Arrange
    let app = common::fake_app().await;
    let seeded = common::seed_content(&app.state.pool, 3).await;
    let survey_id = new_survey(&app, 2, &seeded.topics).await;
    let view = exam_service::start_exam(&app.state, USER, survey_id).await.unwrap();

    // Act
    let batch = exam_service::adjust_difficulty(&app.state, USER, view.id, 9)
        .await
        .unwrap();

    // Assert
    assert_eq!(batch.adjusted_difficulty, None);
    assert_eq!(batch.questions.len(), 5);
    assert!(batch.questions.iter().all(|q| q.level == 2));
}

#[tokio::test]
async fn completing_twice_is_a_conflict() {
    // Arrange
    let app = common::fake_app().await;
    let seeded = common::seed_content(&app.state.pool, 2).await;
    let survey_id = new_survey(&app, 3, &seeded.topics).await;
    let view = exam_service::start_exam(&app.state, USER, survey_id).await.unwrap();

    // Act
    let completed = exam_service::complete_exam(&app.state, USER, view.id).await.unwrap();
    let again = exam_service::complete_exam(&app.state, USER, view.id).await;

    // Assert
    assert!(completed.completed);
    assert!(completed.end_at.is_some());
    assert!(matches!(again, Err(AppError::Conflict(_))));

    let late = exam_service::submit_answer(&app.state, USER, view.id, 1, audio("a.webm"), "hi".into()).await;
    assert!(matches!(late, Err(AppError::Conflict(_))));
    let adjust = exam_service::adjust_difficulty(&app.state, USER, view.id, 4).await;
    assert!(matches!(adjust, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn submit_answer_validates_input() {
    let app = common::fake_app().await;
    let seeded = common::seed_content(&app.state.pool, 2).await;
    let survey_id = new_survey(&app, 3, &seeded.topics).await;
    let view = exam_service::start_exam(&app.state, USER, survey_id).await.unwrap();

    let blank = exam_service::submit_answer(&app.state, USER, view.id, 1, audio("a.webm"), "  ".into()).await;
    assert!(matches!(blank, Err(AppError::BadRequest(_))));

    let missing = exam_service::submit_answer(&app.state, USER, view.id, 42, audio("a.webm"), "hi".into()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let foreign = exam_service::submit_answer(&app.state, USER + 1, view.id, 1, audio("a.webm"), "hi".into()).await;
    assert!(matches!(foreign, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn submitted_answer_is_graded_and_resubmission_replaces_audio() {
    // Arrange
    let app = common::fake_app().await;
    let seeded = common::seed_content(&app.state.pool, 2).await;
    let survey_id = new_survey(&app, 3, &seeded.topics).await;
    let view = exam_service::start_exam(&app.state, USER, survey_id).await.unwrap();

    // Act
    let first = exam_service::submit_answer(&app.state, USER, view.id, 1, audio("first.webm"), "My name is Kim".into())
        .await
        .unwrap();
    let first_url = first.audio_url.clone().unwrap();
    assert_eq!(first.status, AnswerStatus::Analyzing);
    assert!(stored_path(&app, &first_url).exists());

    let graded = common::eventually(|| answer_is(&app, view.id, 1, AnswerStatus::Completed)).await;
    assert!(graded);

    let second = exam_service::submit_answer(&app.state, USER, view.id, 1, audio("second.webm"), "I am Kim".into())
        .await
        .unwrap();

    // Assert
    let second_url = second.audio_url.clone().unwrap();
    assert_ne!(first_url, second_url);
    assert!(!stored_path(&app, &first_url).exists());
    assert!(stored_path(&app, &second_url).exists());

    assert!(common::eventually(|| answer_is(&app, view.id, 1, AnswerStatus::Completed)).await);
    let mut conn = app.state.pool.acquire().await.unwrap();
    let stored = answer_repo::find(&mut conn, view.id, 1).await.unwrap().unwrap();
    assert_eq!(stored.stt_script.as_deref(), Some("I am Kim"));
    assert!(stored.scores.is_some());
}

#[tokio::test]
async fn completing_a_graded_exam_produces_a_report() {
    // Arrange
    let app = common::fake_app().await;
    let seeded = common::seed_content(&app.state.pool, 2).await;
    let survey_id = new_survey(&app, 3, &seeded.topics).await;
    let view = exam_service::start_exam(&app.state, USER, survey_id).await.unwrap();

    for order in 1..=7 {
        exam_service::submit_answer(&app.state, USER, view.id, order, audio("a.webm"), "Some answer".into())
            .await
            .unwrap();
    }
    for order in 1..=7 {
        assert!(common::eventually(|| answer_is(&app, view.id, order, AnswerStatus::Completed)).await);
    }

    let early = exam_service::get_report(&app.state, USER, view.id).await;
    assert!(matches!(early, Err(AppError::NotFound(_))));

    // Act
    exam_service::complete_exam(&app.state, USER, view.id).await.unwrap();

    // Assert
    let ready = common::eventually(|| report_exists(&app, view.id)).await;
    assert!(ready);

    let report = exam_service::get_report(&app.state, USER, view.id).await.unwrap();
    assert_eq!(report.exam_id, view.id);
    assert!(!report.grade.is_empty());

    let exam = exam_service::get_exam(&app.state, USER, view.id).await.unwrap();
    assert_eq!(exam.status, ExamStatus::Completed);
    assert_eq!(exam.answers.len(), 7);
}

#[tokio::test]
async fn completing_with_unanswered_questions_produces_no_report() {
    // Arrange
    let app = common::fake_app().await;
    let seeded = common::seed_content(&app.state.pool, 2).await;
    let survey_id = new_survey(&app, 3, &seeded.topics).await;
    let view = exam_service::start_exam(&app.state, USER, survey_id).await.unwrap();

    exam_service::submit_answer(&app.state, USER, view.id, 1, audio("a.webm"), "Some answer".into())
        .await
        .unwrap();
    assert!(common::eventually(|| answer_is(&app, view.id, 1, AnswerStatus::Completed)).await);

    // Act
    let completed = exam_service::complete_exam(&app.state, USER, view.id).await.unwrap();

    // Assert
    assert!(completed.completed);
    assert!(!common::eventually(|| report_exists(&app, view.id)).await);
    let exam = exam_service::get_exam(&app.state, USER, view.id).await.unwrap();
    assert_eq!(exam.status, ExamStatus::InProgress);
    assert_eq!(exam.answers.len(), 1);
}
