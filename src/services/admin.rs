// src/services/admin.rs

//! Operator-driven regeneration with bounded retries.
//!
//! Every AI failure consumes one of `ADMIN_MAX_ATTEMPTS` attempts, with a
//! linear pause between attempts. Exhaustion, or a failure to store a result
//! the AI did return, leaves the target in its failed state and raises
//! `AppError::System`, which background callers forward to the alert channel.

use std::time::Duration;

use crate::{
    clients::ai::{AiError, AnswerSummary},
    config::ADMIN_MAX_ATTEMPTS,
    error::AppError,
    models::{
        exam::{Exam, ExamStatus},
        exam_answer::{AnswerStatus, ExamAnswer},
        report::ExamReport,
    },
    repository::{answer as answer_repo, exam as exam_repo, report as report_repo},
    services::{grading, report},
    state::AppState,
};

const USER_MESSAGE: &str = "Analysis is temporarily unavailable. Please try again later.";

const REPORT_FAILED: &str = "Exam report generation failed";
const ANSWER_FAILED: &str = "Answer analysis failed";

fn summarize(answer: &ExamAnswer) -> AnswerSummary {
    AnswerSummary {
        question_order: answer.question_order,
        stt_script: answer.stt_script.clone(),
        improved_answer: answer.improved_answer.clone(),
        grammar_score: answer.scores.map(|s| s.grammar),
        vocab_score: answer.scores.map(|s| s.vocab),
        logic_score: answer.scores.map(|s| s.logic),
        fluency_score: answer.scores.map(|s| s.fluency),
        relevance_score: answer.scores.map(|s| s.relevance),
        logic_feedback: answer.feedback.logic.clone(),
    }
}

async fn pause_before_retry(state: &AppState, attempt: u32) {
    if attempt < ADMIN_MAX_ATTEMPTS && state.config.ai_retry_backoff_ms > 0 {
        let delay = state.config.ai_retry_backoff_ms * u64::from(attempt);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

/// Why a regeneration gave up, rendered into the operator diagnostic.
struct Failure {
    attempts: u32,
    retryable: bool,
    reason: String,
}

impl Failure {
    fn exhausted(last_error: Option<&AiError>) -> Self {
        let (retryable, reason) = match last_error {
            Some(e) => (e.is_retryable(), e.to_string()),
            None => (false, "no attempt was made".to_string()),
        };
        Self {
            attempts: ADMIN_MAX_ATTEMPTS,
            retryable,
            reason,
        }
    }

    fn store(attempts: u32, err: &AppError) -> Self {
        Self {
            attempts,
            retryable: false,
            reason: format!("storing the result failed: {}", err),
        }
    }

    fn into_system(self, title: &str, target: String) -> AppError {
        AppError::System {
            title: title.to_string(),
            user_message: USER_MESSAGE.to_string(),
            operator_message: format!(
                "{}, Attempts={}, Retryable={}, Reason={}",
                target, self.attempts, self.retryable, self.reason
            ),
        }
    }
}

/// A report needs every drafted question answered and every answer graded.
fn ensure_reportable(exam: &Exam, answers: &[ExamAnswer]) -> Result<(), AppError> {
    let missing = exam.unanswered_orders(answers);
    if answers.is_empty() || !missing.is_empty() {
        return Err(AppError::Conflict(format!(
            "Exam {} has unanswered questions {:?}",
            exam.id, missing
        )));
    }
    if answers.iter().any(|a| a.status != AnswerStatus::Completed) {
        return Err(AppError::Conflict(format!(
            "Exam {} has answers that are not graded yet",
            exam.id
        )));
    }
    Ok(())
}

/// Deletes the exam's report and builds a fresh one.
///
/// Requires an answer for every drafted question, all `COMPLETED`; otherwise
/// `Conflict`, before anything is deleted.
pub async fn recreate_report(state: &AppState, exam_id: i64) -> Result<ExamReport, AppError> {
    let answers = {
        let mut tx = state.pool.begin().await?;
        let exam = exam_repo::find(&mut tx, exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", exam_id)))?;

        let answers = answer_repo::list_for_exam(&mut tx, exam_id).await?;
        ensure_reportable(&exam, &answers)?;

        if report_repo::delete(&mut tx, exam_id).await? {
            tracing::info!(exam_id, "Deleted previous report");
        }
        exam_repo::update_status(&mut tx, exam_id, ExamStatus::Analyzing).await?;
        tx.commit().await?;
        answers
    };

    let target = format!("ExamId={}", exam_id);
    let summaries: Vec<AnswerSummary> = answers.iter().map(summarize).collect();
    let mut last_error = None;

    for attempt in 1..=ADMIN_MAX_ATTEMPTS {
        match state.ai.analyze_exam(&summaries).await {
            Ok(total) => {
                let report = report::aggregate(exam_id, &answers, &total);

                return match store_report(state, &report).await {
                    Ok(()) => {
                        tracing::info!(exam_id, attempt, grade = %report.grade, "Exam report recreated");
                        Ok(report)
                    }
                    Err(e) => {
                        tracing::error!(exam_id, attempt, "Could not store the exam report: {}", e);
                        mark_exam_failed(state, exam_id).await;
                        Err(Failure::store(attempt, &e).into_system(REPORT_FAILED, target))
                    }
                };
            }
            Err(e) => {
                tracing::warn!(
                    exam_id,
                    attempt,
                    retryable = e.is_retryable(),
                    "Exam-total analysis failed: {}",
                    e
                );
                last_error = Some(e);
                pause_before_retry(state, attempt).await;
            }
        }
    }

    mark_exam_failed(state, exam_id).await;
    Err(Failure::exhausted(last_error.as_ref()).into_system(REPORT_FAILED, target))
}

async fn store_report(state: &AppState, report: &ExamReport) -> Result<(), AppError> {
    let mut tx = state.pool.begin().await?;
    report_repo::delete(&mut tx, report.exam_id).await?;
    report_repo::insert(&mut tx, report).await?;
    exam_repo::update_status(&mut tx, report.exam_id, ExamStatus::Completed).await?;
    tx.commit().await?;
    Ok(())
}

/// Best effort; the caller's error is what surfaces.
async fn mark_exam_failed(state: &AppState, exam_id: i64) {
    let result = async {
        let mut tx = state.pool.begin().await?;
        exam_repo::update_status(&mut tx, exam_id, ExamStatus::AnalyzingFailed).await?;
        tx.commit().await?;
        Ok::<_, AppError>(())
    }
    .await;

    if let Err(e) = result {
        tracing::error!(exam_id, "Could not mark exam analysis as failed: {}", e);
    }
}

/// Re-runs the per-question analysis of one answer, replacing its feedback.
pub async fn reanalyze_answer(
    state: &AppState,
    exam_id: i64,
    question_order: i64,
) -> Result<ExamAnswer, AppError> {
    let (request, mut answer) = {
        let mut conn = state.pool.acquire().await?;
        let exam = exam_repo::find(&mut conn, exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", exam_id)))?;
        let answer = answer_repo::find(&mut conn, exam_id, question_order)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Answer {} of exam {} not found", question_order, exam_id))
            })?;
        (grading::question_request(&exam, &answer)?, answer)
    };

    answer.begin_reanalysis();
    let mut tx = state.pool.begin().await?;
    answer_repo::update_status(&mut tx, exam_id, question_order, answer.status).await?;
    tx.commit().await?;

    let target = format!("ExamId={}, QuestionOrder={}", exam_id, question_order);
    let mut last_error = None;

    for attempt in 1..=ADMIN_MAX_ATTEMPTS {
        match state.ai.analyze_question(&request).await {
            Ok(analysis) => {
                answer.finalize_analysis(analysis);

                return match store_answer(state, &answer).await {
                    Ok(()) => {
                        tracing::info!(exam_id, question_order, attempt, "Answer re-analysis completed");
                        Ok(answer)
                    }
                    Err(e) => {
                        tracing::error!(exam_id, question_order, attempt, "Could not store the analysis: {}", e);
                        mark_answer_failed(state, &mut answer).await;
                        Err(Failure::store(attempt, &e).into_system(ANSWER_FAILED, target))
                    }
                };
            }
            Err(e) => {
                tracing::warn!(
                    exam_id,
                    question_order,
                    attempt,
                    retryable = e.is_retryable(),
                    "Answer re-analysis failed: {}",
                    e
                );
                last_error = Some(e);
                pause_before_retry(state, attempt).await;
            }
        }
    }

    mark_answer_failed(state, &mut answer).await;
    Err(Failure::exhausted(last_error.as_ref()).into_system(ANSWER_FAILED, target))
}

async fn store_answer(state: &AppState, answer: &ExamAnswer) -> Result<(), AppError> {
    let mut tx = state.pool.begin().await?;
    answer_repo::save(&mut tx, answer).await?;
    tx.commit().await?;
    Ok(())
}

/// Best effort; the caller's error is what surfaces.
async fn mark_answer_failed(state: &AppState, answer: &mut ExamAnswer) {
    answer.mark_analyzing_failed();
    let (exam_id, question_order, status) = (answer.exam_id, answer.question_order, answer.status);

    let result = async {
        let mut tx = state.pool.begin().await?;
        answer_repo::update_status(&mut tx, exam_id, question_order, status).await?;
        tx.commit().await?;
        Ok::<_, AppError>(())
    }
    .await;

    if let Err(e) = result {
        tracing::error!(exam_id, question_order, "Could not mark answer analysis as failed: {}", e);
    }
}

async fn report_background_error(state: &AppState, err: AppError) {
    match err {
        AppError::System {
            title,
            operator_message,
            ..
        } => {
            tracing::error!("{}: {}", title, operator_message);
            state.alarm.notify(&title, &operator_message).await;
        }
        AppError::Conflict(msg) => tracing::warn!("Regeneration skipped: {}", msg),
        other => tracing::error!("Regeneration aborted: {}", other),
    }
}

/// Queues `recreate_report` on the background runner.
pub fn spawn_report_recreation(state: &AppState, exam_id: i64) {
    let task_state = state.clone();
    state.runner.spawn("exam_report", async move {
        if let Err(e) = recreate_report(&task_state, exam_id).await {
            report_background_error(&task_state, e).await;
        }
    });
}

/// Queues `reanalyze_answer`; a success may complete the exam's report.
pub fn spawn_answer_reanalysis(state: &AppState, exam_id: i64, question_order: i64) {
    let task_state = state.clone();
    state.runner.spawn("answer_reanalysis", async move {
        match reanalyze_answer(&task_state, exam_id, question_order).await {
            Ok(_) => schedule_report_if_ready(&task_state, exam_id).await,
            Err(e) => report_background_error(&task_state, e).await,
        }
    });
}

/// Validates the exam exists, then queues its report recreation.
pub async fn request_report_recreation(state: &AppState, exam_id: i64) -> Result<(), AppError> {
    let mut conn = state.pool.acquire().await?;
    exam_repo::find(&mut conn, exam_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", exam_id)))?;
    drop(conn);

    spawn_report_recreation(state, exam_id);
    Ok(())
}

/// Validates the answer exists, then queues its re-analysis.
pub async fn request_answer_reanalysis(
    state: &AppState,
    exam_id: i64,
    question_order: i64,
) -> Result<(), AppError> {
    let mut conn = state.pool.acquire().await?;
    answer_repo::find(&mut conn, exam_id, question_order)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Answer {} of exam {} not found", question_order, exam_id))
        })?;
    drop(conn);

    spawn_answer_reanalysis(state, exam_id, question_order);
    Ok(())
}

/// Queues report generation once a completed exam has a `COMPLETED` answer
/// for every drafted question. Failed answers hold the report back until an
/// operator re-analysis succeeds.
pub async fn schedule_report_if_ready(state: &AppState, exam_id: i64) {
    match report_ready(state, exam_id).await {
        Ok(true) => {
            tracing::info!(exam_id, "All answers settled, scheduling report");
            spawn_report_recreation(state, exam_id);
        }
        Ok(false) => {}
        Err(e) => tracing::error!(exam_id, "Could not check report readiness: {}", e),
    }
}

async fn report_ready(state: &AppState, exam_id: i64) -> Result<bool, AppError> {
    let mut conn = state.pool.acquire().await?;
    let Some(exam) = exam_repo::find(&mut conn, exam_id).await? else {
        return Ok(false);
    };
    if !exam.is_completed() {
        return Ok(false);
    }
    let answers = answer_repo::list_for_exam(&mut conn, exam_id).await?;

    let settled = exam.unanswered_orders(&answers).is_empty()
        && answers.iter().all(|a| a.status.is_terminal());
    let reportable = ensure_reportable(&exam, &answers).is_ok();
    if settled && !reportable {
        tracing::warn!(exam_id, "Exam has failed answers, report waits for re-analysis");
    }
    Ok(reportable)
}
