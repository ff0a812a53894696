// tests/grading_tests.rs

mod common;

use std::sync::Arc;

use sqlx::Executor;

use common::{ScriptedAi, TestApp};
use exam_backend::{
    error::AppError,
    models::{
        exam::ExamStatus,
        exam_answer::{AnswerStatus, ExamAnswer},
        practice::{CreatePracticeRequest, FeedbackStatus, PracticeFeedbackResult},
        question::QuestionType,
    },
    repository::{
        answer as answer_repo, exam as exam_repo,
        practice::{self as practice_repo, NewPracticeAnswer},
        report as report_repo, survey as survey_repo,
    },
    services::{admin, exam as exam_service, grading, practice as practice_service},
};

const USER: i64 = 7;
const EXAM_QUESTIONS: i64 = 7;

async fn new_survey(app: &TestApp, level: i64, topics: &[i64]) -> i64 {
    let mut tx = app.state.pool.begin().await.unwrap();
    let survey = survey_repo::insert(&mut tx, USER, level, topics).await.unwrap();
    tx.commit().await.unwrap();
    survey.id
}

async fn started_exam(app: &TestApp) -> i64 {
    let seeded = common::seed_content(&app.state.pool, 3).await;
    let survey_id = new_survey(app, 4, &seeded.topics).await;
    let view = exam_service::start_exam(&app.state, USER, survey_id).await.unwrap();
    view.id
}

/// Stores graded answers for `orders`, each scoring 75 in every category.
async fn grade_orders(app: &TestApp, exam_id: i64, orders: std::ops::RangeInclusive<i64>) {
    let mut tx = app.state.pool.begin().await.unwrap();
    for order in orders {
        let mut answer = ExamAnswer::new(exam_id, order);
        answer.upload_voice(format!("http://files.test/exam/{}.webm", order));
        answer.start_transcription();
        answer.complete_transcription(format!("answer {}", order));
        answer.finalize_analysis(common::analysis("seed", 75, 1));
        answer_repo::save(&mut tx, &answer).await.unwrap();
    }
    tx.commit().await.unwrap();
}

/// Stores transcribed answers for `orders` that are still waiting on the AI.
async fn analyzing_orders(app: &TestApp, exam_id: i64, orders: std::ops::RangeInclusive<i64>) {
    let mut tx = app.state.pool.begin().await.unwrap();
    for order in orders {
        let mut answer = ExamAnswer::new(exam_id, order);
        answer.complete_transcription(format!("answer {}", order));
        answer_repo::save(&mut tx, &answer).await.unwrap();
    }
    tx.commit().await.unwrap();
}

/// An exam with all seven drafted questions answered and graded.
async fn graded_exam(app: &TestApp) -> i64 {
    let exam_id = started_exam(app).await;
    grade_orders(app, exam_id, 1..=EXAM_QUESTIONS).await;
    exam_id
}

async fn report_exists(app: &TestApp, exam_id: i64) -> bool {
    let mut conn = app.state.pool.acquire().await.unwrap();
    report_repo::find(&mut conn, exam_id).await.unwrap().is_some()
}

async fn practice_answer(app: &TestApp) -> i64 {
    let seeded = common::seed_content(&app.state.pool, 1).await;
    let survey_id = new_survey(app, 3, &seeded.topics).await;
    let practice = practice_service::create_practice(
        &app.state,
        USER,
        &CreatePracticeRequest {
            survey_id,
            topic_id: seeded.topics[0],
            question_type: QuestionType::Combo2,
        },
    )
    .await
    .unwrap();

    let mut tx = app.state.pool.begin().await.unwrap();
    let id = practice_repo::insert_answer(
        &mut tx,
        &NewPracticeAnswer {
            practice_id: practice.practice.id,
            question_id: practice.questions[0].id,
            korean_script: Some("저는 주말에 등산을 가요".into()),
            english_script: Some("I go hiking on weekend".into()),
            audio_url: None,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    id
}

#[tokio::test]
async fn report_recreation_gives_up_after_three_attempts() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    let app = common::test_app(ai.clone()).await;
    let exam_id = graded_exam(&app).await;

    // Act
    let err = admin::recreate_report(&app.state, exam_id).await.unwrap_err();

    // Assert
    assert_eq!(ai.exam_calls(), 3);
    match err {
        AppError::System {
            user_message,
            operator_message,
            ..
        } => {
            assert!(operator_message.contains(&format!("ExamId={}", exam_id)));
            assert!(operator_message.contains("Attempts=3"));
            assert!(!user_message.contains("ExamId"));
        }
        other => panic!("expected a system error, got {:?}", other),
    }

    let mut conn = app.state.pool.acquire().await.unwrap();
    let exam = exam_repo::find(&mut conn, exam_id).await.unwrap().unwrap();
    assert_eq!(exam.status, ExamStatus::AnalyzingFailed);
    assert_eq!(report_repo::count_for_exam(&mut conn, exam_id).await.unwrap(), 0);
}

#[tokio::test]
async fn report_recreation_stops_at_first_success() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    ai.push_exam(Err(common::server_error()));
    ai.push_exam(Ok(common::exam_total("second", "IH")));
    let app = common::test_app(ai.clone()).await;
    let exam_id = graded_exam(&app).await;

    // Act
    let report = admin::recreate_report(&app.state, exam_id).await.unwrap();

    // Assert
    assert_eq!(ai.exam_calls(), 2);
    assert_eq!(report.comment, "second");

    let mut conn = app.state.pool.acquire().await.unwrap();
    let stored = report_repo::find(&mut conn, exam_id).await.unwrap().unwrap();
    assert_eq!(stored.comment, "second");
    assert_eq!(stored.predicted_level.as_deref(), Some("IH"));
    assert_eq!(stored.total_score, 75.0);
    assert_eq!(stored.grade, "IM3");

    let exam = exam_repo::find(&mut conn, exam_id).await.unwrap().unwrap();
    assert_eq!(exam.status, ExamStatus::Completed);
}

#[tokio::test]
async fn recreating_twice_keeps_only_the_latest_report() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    ai.push_exam(Ok(common::exam_total("first", "IM1")));
    ai.push_exam(Ok(common::exam_total("second", "IH")));
    let app = common::test_app(ai.clone()).await;
    let exam_id = graded_exam(&app).await;

    // Act
    admin::recreate_report(&app.state, exam_id).await.unwrap();
    admin::recreate_report(&app.state, exam_id).await.unwrap();

    // Assert
    let mut conn = app.state.pool.acquire().await.unwrap();
    assert_eq!(report_repo::count_for_exam(&mut conn, exam_id).await.unwrap(), 1);
    let stored = report_repo::find(&mut conn, exam_id).await.unwrap().unwrap();
    assert_eq!(stored.comment, "second");
    assert_eq!(stored.strengths, vec!["strength second".to_string()]);
    assert_eq!(stored.improvements, vec!["improvement second".to_string()]);
}

#[tokio::test]
async fn report_requires_every_answer_completed() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    ai.push_exam(Ok(common::exam_total("first", "IM1")));
    let app = common::test_app(ai.clone()).await;
    let exam_id = graded_exam(&app).await;
    admin::recreate_report(&app.state, exam_id).await.unwrap();

    let mut tx = app.state.pool.begin().await.unwrap();
    answer_repo::update_status(&mut tx, exam_id, 2, AnswerStatus::Analyzing)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    // Act
    let result = admin::recreate_report(&app.state, exam_id).await;

    // Assert
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(ai.exam_calls(), 1);
    let mut conn = app.state.pool.acquire().await.unwrap();
    // The previous report survives a rejected regeneration.
    assert_eq!(report_repo::count_for_exam(&mut conn, exam_id).await.unwrap(), 1);
}

#[tokio::test]
async fn report_recreation_for_unknown_exam_is_not_found() {
    let ai = Arc::new(ScriptedAi::new());
    let app = common::test_app(ai.clone()).await;

    let result = admin::recreate_report(&app.state, 404).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(ai.exam_calls(), 0);
}

#[tokio::test]
async fn exhausted_background_recreation_raises_an_alert() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    let app = common::test_app(ai.clone()).await;
    let exam_id = graded_exam(&app).await;

    // Act
    admin::request_report_recreation(&app.state, exam_id).await.unwrap();

    // Assert
    let alarm = app.alarm.clone();
    assert!(
        common::eventually(|| {
            let alarm = alarm.clone();
            async move { !alarm.alerts.lock().unwrap().is_empty() }
        })
        .await
    );
    let alerts = app.alarm.alerts.lock().unwrap().clone();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].0, "Exam report generation failed");
    assert!(alerts[0].1.contains(&format!("ExamId={}", exam_id)));
    assert_eq!(ai.exam_calls(), 3);
}

#[tokio::test]
async fn answer_reanalysis_retries_then_replaces_feedback() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    ai.push_question(Err(common::server_error()));
    ai.push_question(Ok(common::analysis("re", 90, 2)));
    let app = common::test_app(ai.clone()).await;
    let exam_id = graded_exam(&app).await;

    // Act
    let answer = admin::reanalyze_answer(&app.state, exam_id, 1).await.unwrap();

    // Assert
    assert_eq!(ai.question_calls(), 2);
    assert_eq!(answer.status, AnswerStatus::Completed);

    let mut conn = app.state.pool.acquire().await.unwrap();
    let stored = answer_repo::find(&mut conn, exam_id, 1).await.unwrap().unwrap();
    assert_eq!(stored.status, AnswerStatus::Completed);
    assert_eq!(stored.scores.unwrap().grammar, 90);
    assert_eq!(stored.sentence_feedbacks.len(), 2);
    assert_eq!(stored.improved_answer.as_deref(), Some("improved re"));
}

#[tokio::test]
async fn answer_reanalysis_exhaustion_marks_analyzing_failed() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    let app = common::test_app(ai.clone()).await;
    let exam_id = graded_exam(&app).await;

    // Act
    let err = admin::reanalyze_answer(&app.state, exam_id, 1).await.unwrap_err();

    // Assert
    assert!(matches!(err, AppError::System { .. }));
    assert_eq!(ai.question_calls(), 3);
    let mut conn = app.state.pool.acquire().await.unwrap();
    let stored = answer_repo::find(&mut conn, exam_id, 1).await.unwrap().unwrap();
    assert_eq!(stored.status, AnswerStatus::AnalyzingFailed);
}

#[tokio::test]
async fn live_practice_failure_leaves_no_feedback() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    ai.push_feedback(Err(common::server_error()));
    let app = common::test_app(ai.clone()).await;
    let answer_id = practice_answer(&app).await;

    // Act
    grading::grade_practice_answer(&app.state, answer_id).await;

    // Assert
    assert_eq!(ai.feedback_calls(), 1);
    let mut conn = app.state.pool.acquire().await.unwrap();
    let answer = practice_repo::find_answer(&mut conn, answer_id).await.unwrap().unwrap();
    assert_eq!(answer.feedback_status, FeedbackStatus::Failed);
    assert!(answer.improved_answer.is_none());
    assert!(answer.logic_feedback.is_none());
    assert!(answer.feedbacks.is_empty());

    let view = PracticeFeedbackResult::from(answer);
    assert!(view.feedback.is_none());
}

#[tokio::test]
async fn live_practice_success_replaces_sentence_feedback() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    ai.push_feedback(Ok(common::practice_feedback("first", 3)));
    ai.push_feedback(Ok(common::practice_feedback("second", 1)));
    let app = common::test_app(ai.clone()).await;
    let answer_id = practice_answer(&app).await;
    grading::grade_practice_answer(&app.state, answer_id).await;

    // Act
    grading::grade_practice_answer(&app.state, answer_id).await;

    // Assert
    let mut conn = app.state.pool.acquire().await.unwrap();
    let answer = practice_repo::find_answer(&mut conn, answer_id).await.unwrap().unwrap();
    assert_eq!(answer.feedback_status, FeedbackStatus::Completed);
    assert_eq!(answer.feedbacks.len(), 1);
    assert_eq!(
        answer.feedbacks[0].target_sentence.as_deref(),
        Some("second sentence 0")
    );
    assert_eq!(answer.improved_answer.as_deref(), Some("improved second"));
}

#[tokio::test]
async fn live_exam_answer_failure_is_terminal() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    let app = common::test_app(ai.clone()).await;
    let exam_id = started_exam(&app).await;

    let mut tx = app.state.pool.begin().await.unwrap();
    let mut answer = ExamAnswer::new(exam_id, 1);
    answer.complete_transcription("hello".into());
    answer_repo::save(&mut tx, &answer).await.unwrap();
    tx.commit().await.unwrap();

    // Act
    grading::grade_exam_answer(&app.state, exam_id, 1).await;

    // Assert
    assert_eq!(ai.question_calls(), 1);
    let mut conn = app.state.pool.acquire().await.unwrap();
    let stored = answer_repo::find(&mut conn, exam_id, 1).await.unwrap().unwrap();
    assert_eq!(stored.status, AnswerStatus::Failed);
    assert!(stored.scores.is_none());
    assert!(stored.sentence_feedbacks.is_empty());
}

#[tokio::test]
async fn report_needs_an_answer_for_every_drafted_question() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    ai.push_exam(Ok(common::exam_total("partial", "IM1")));
    let app = common::test_app(ai.clone()).await;
    let exam_id = started_exam(&app).await;
    grade_orders(&app, exam_id, 1..=1).await;

    // Act
    exam_service::complete_exam(&app.state, USER, exam_id).await.unwrap();
    let result = admin::recreate_report(&app.state, exam_id).await;

    // Assert
    match result {
        Err(AppError::Conflict(msg)) => assert!(msg.contains("[2, 3, 4, 5, 6, 7]")),
        other => panic!("expected a conflict, got {:?}", other),
    }
    assert!(!common::eventually(|| report_exists(&app, exam_id)).await);
    assert_eq!(ai.exam_calls(), 0);

    let mut conn = app.state.pool.acquire().await.unwrap();
    let exam = exam_repo::find(&mut conn, exam_id).await.unwrap().unwrap();
    assert_eq!(exam.status, ExamStatus::InProgress);
}

#[tokio::test]
async fn report_store_failure_marks_exam_failed_and_alerts() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    ai.push_exam(Ok(common::exam_total("lost", "IH")));
    ai.push_exam(Ok(common::exam_total("lost again", "IH")));
    let app = common::test_app(ai.clone()).await;
    let exam_id = graded_exam(&app).await;
    app.state
        .pool
        .execute(
            "CREATE TRIGGER reject_reports BEFORE INSERT ON exam_reports \
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .await
        .unwrap();

    // Act
    let err = admin::recreate_report(&app.state, exam_id).await.unwrap_err();

    // Assert
    assert_eq!(ai.exam_calls(), 1);
    match err {
        AppError::System {
            title,
            operator_message,
            ..
        } => {
            assert_eq!(title, "Exam report generation failed");
            assert!(operator_message.contains("Attempts=1"));
            assert!(operator_message.contains("storing the result failed"));
        }
        other => panic!("expected a system error, got {:?}", other),
    }
    {
        let mut conn = app.state.pool.acquire().await.unwrap();
        let exam = exam_repo::find(&mut conn, exam_id).await.unwrap().unwrap();
        assert_eq!(exam.status, ExamStatus::AnalyzingFailed);
        assert_eq!(report_repo::count_for_exam(&mut conn, exam_id).await.unwrap(), 0);
    }

    admin::request_report_recreation(&app.state, exam_id).await.unwrap();
    let alarm = app.alarm.clone();
    assert!(
        common::eventually(|| {
            let alarm = alarm.clone();
            async move { !alarm.alerts.lock().unwrap().is_empty() }
        })
        .await
    );
    assert_eq!(app.alarm.alerts.lock().unwrap().len(), 1);
    assert_eq!(ai.exam_calls(), 2);
}

#[tokio::test]
async fn answer_store_failure_marks_analyzing_failed() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    ai.push_question(Ok(common::analysis("re", 90, 1)));
    let app = common::test_app(ai.clone()).await;
    let exam_id = graded_exam(&app).await;
    app.state
        .pool
        .execute(
            "CREATE TRIGGER reject_feedback BEFORE INSERT ON exam_sentence_feedback \
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .await
        .unwrap();

    // Act
    let err = admin::reanalyze_answer(&app.state, exam_id, 1).await.unwrap_err();

    // Assert
    assert_eq!(ai.question_calls(), 1);
    match err {
        AppError::System { operator_message, .. } => {
            assert!(operator_message.contains("QuestionOrder=1"));
            assert!(operator_message.contains("storing the result failed"));
        }
        other => panic!("expected a system error, got {:?}", other),
    }
    let mut conn = app.state.pool.acquire().await.unwrap();
    let stored = answer_repo::find(&mut conn, exam_id, 1).await.unwrap().unwrap();
    assert_eq!(stored.status, AnswerStatus::AnalyzingFailed);
    assert_eq!(stored.scores.unwrap().grammar, 75);
}

#[tokio::test]
async fn report_waits_for_the_last_analyzing_answer() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    for order in 1..=EXAM_QUESTIONS {
        ai.push_question(Ok(common::analysis(&format!("q{}", order), 75, 1)));
    }
    ai.push_exam(Ok(common::exam_total("done", "IM3")));
    let app = common::test_app(ai.clone()).await;
    let exam_id = started_exam(&app).await;
    analyzing_orders(&app, exam_id, 1..=EXAM_QUESTIONS).await;
    exam_service::complete_exam(&app.state, USER, exam_id).await.unwrap();

    // Act
    for order in 1..EXAM_QUESTIONS {
        grading::grade_exam_answer(&app.state, exam_id, order).await;
    }

    // Assert
    assert!(!report_exists(&app, exam_id).await);
    assert_eq!(ai.exam_calls(), 0);

    grading::grade_exam_answer(&app.state, exam_id, EXAM_QUESTIONS).await;
    assert!(common::eventually(|| report_exists(&app, exam_id)).await);
    assert_eq!(ai.exam_calls(), 1);

    let mut conn = app.state.pool.acquire().await.unwrap();
    let exam = exam_repo::find(&mut conn, exam_id).await.unwrap().unwrap();
    assert_eq!(exam.status, ExamStatus::Completed);
}

#[tokio::test]
async fn failed_answer_holds_back_the_report_without_alerting() {
    // Arrange
    let ai = Arc::new(ScriptedAi::new());
    for order in 1..EXAM_QUESTIONS {
        ai.push_question(Ok(common::analysis(&format!("q{}", order), 75, 1)));
    }
    // The last question finds an empty queue and fails.
    let app = common::test_app(ai.clone()).await;
    let exam_id = started_exam(&app).await;
    analyzing_orders(&app, exam_id, 1..=EXAM_QUESTIONS).await;
    exam_service::complete_exam(&app.state, USER, exam_id).await.unwrap();

    // Act
    for order in 1..=EXAM_QUESTIONS {
        grading::grade_exam_answer(&app.state, exam_id, order).await;
    }

    // Assert
    assert!(!common::eventually(|| report_exists(&app, exam_id)).await);
    assert_eq!(ai.exam_calls(), 0);
    assert!(app.alarm.alerts.lock().unwrap().is_empty());

    let mut conn = app.state.pool.acquire().await.unwrap();
    let last = answer_repo::find(&mut conn, exam_id, EXAM_QUESTIONS).await.unwrap().unwrap();
    assert_eq!(last.status, AnswerStatus::Failed);
    let exam = exam_repo::find(&mut conn, exam_id).await.unwrap().unwrap();
    assert_eq!(exam.status, ExamStatus::InProgress);
}
