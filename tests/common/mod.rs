// tests/common/mod.rs

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use exam_backend::{
    clients::{
        ai::{AiClient, AiError, AnswerSummary, ExamTotalAnalysis, FakeAiClient, FeedbackRequest, QuestionAnalysisRequest},
        alarm::AlarmService,
        storage::LocalFileStorage,
    },
    config::Config,
    models::{
        exam_answer::{AnswerAnalysis, AnswerScores, CategoryFeedback, SentenceFeedback},
        practice::{PracticeFeedback, PracticeSentenceFeedback},
        question::{CreateQuestionRequest, QuestionType},
    },
    repository::content,
    state::AppState,
};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use tempfile::TempDir;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

/// Single-connection in-memory database with the schema applied.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    pool
}

pub fn test_config(storage_dir: &str) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        ai_base_url: None,
        ai_timeout_secs: 5,
        ai_retry_backoff_ms: 0,
        storage_dir: storage_dir.to_string(),
        storage_public_url: "http://files.test".to_string(),
        alarm_webhook_url: None,
        grading_concurrency: 4,
    }
}

/// Records every alert it receives.
#[derive(Default)]
pub struct RecordingAlarm {
    pub alerts: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl AlarmService for RecordingAlarm {
    async fn notify(&self, title: &str, body: &str) {
        self.alerts
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}

pub struct TestApp {
    pub state: AppState,
    pub alarm: Arc<RecordingAlarm>,
    // Keeps the upload directory alive for the test.
    pub storage_dir: TempDir,
}

pub async fn test_app(ai: Arc<dyn AiClient>) -> TestApp {
    let storage_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let dir = storage_dir.path().to_string_lossy().to_string();
    let config = test_config(&dir);
    let alarm = Arc::new(RecordingAlarm::default());
    let storage = Arc::new(LocalFileStorage::new(&dir, &config.storage_public_url));

    let state = AppState::new(test_pool().await, config, ai, storage, alarm.clone());
    TestApp {
        state,
        alarm,
        storage_dir,
    }
}

pub async fn fake_app() -> TestApp {
    test_app(Arc::new(FakeAiClient)).await
}

pub fn analysis(tag: &str, score: i64, sentences: usize) -> AnswerAnalysis {
    AnswerAnalysis {
        scores: AnswerScores {
            grammar: score,
            vocab: score,
            logic: score,
            fluency: score,
            relevance: score,
        },
        improved_answer: Some(format!("improved {}", tag)),
        feedback: CategoryFeedback {
            logic: Some(format!("logic {}", tag)),
            fluency: Some(format!("fluency {}", tag)),
            relevance: Some(format!("relevance {}", tag)),
        },
        sentences: (0..sentences)
            .map(|i| SentenceFeedback {
                target_sentence: Some(format!("{} sentence {}", tag, i)),
                target_segment: None,
                corrected_segment: None,
                comment: Some(tag.to_string()),
                sentence_order: Some(i as i64 + 1),
            })
            .collect(),
    }
}

pub fn practice_feedback(tag: &str, sentences: usize) -> PracticeFeedback {
    PracticeFeedback {
        improved_answer: Some(format!("improved {}", tag)),
        relevance_feedback: Some(format!("relevance {}", tag)),
        logic_feedback: Some(format!("logic {}", tag)),
        fluency_feedback: Some(format!("fluency {}", tag)),
        sentences: (0..sentences)
            .map(|i| PracticeSentenceFeedback {
                target_sentence: Some(format!("{} sentence {}", tag, i)),
                target_segment: None,
                improved_segment: None,
                comment: Some(tag.to_string()),
                sentence_order: Some(i as i64 + 1),
                sentence_score: Some(80),
            })
            .collect(),
    }
}

pub fn exam_total(comment: &str, level: &str) -> ExamTotalAnalysis {
    ExamTotalAnalysis {
        predicted_level: level.to_string(),
        overall_evaluation: Some(comment.to_string()),
        strengths: vec![format!("strength {}", comment)],
        improvements: vec![format!("improvement {}", comment)],
    }
}

pub fn server_error() -> AiError {
    AiError::Status {
        status: 503,
        body: "unavailable".to_string(),
    }
}

/// AI client replaying scripted results. An exhausted script answers 503.
#[derive(Default)]
pub struct ScriptedAi {
    feedback: Mutex<VecDeque<Result<PracticeFeedback, AiError>>>,
    questions: Mutex<VecDeque<Result<AnswerAnalysis, AiError>>>,
    exams: Mutex<VecDeque<Result<ExamTotalAnalysis, AiError>>>,
    pub feedback_calls: AtomicUsize,
    pub question_calls: AtomicUsize,
    pub exam_calls: AtomicUsize,
}

impl ScriptedAi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_feedback(&self, result: Result<PracticeFeedback, AiError>) {
        self.feedback.lock().unwrap().push_back(result);
    }

    pub fn push_question(&self, result: Result<AnswerAnalysis, AiError>) {
        self.questions.lock().unwrap().push_back(result);
    }

    pub fn push_exam(&self, result: Result<ExamTotalAnalysis, AiError>) {
        self.exams.lock().unwrap().push_back(result);
    }

    pub fn exam_calls(&self) -> usize {
        self.exam_calls.load(Ordering::SeqCst)
    }

    pub fn question_calls(&self) -> usize {
        self.question_calls.load(Ordering::SeqCst)
    }

    pub fn feedback_calls(&self) -> usize {
        self.feedback_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiClient for ScriptedAi {
    async fn request_feedback(&self, _request: &FeedbackRequest) -> Result<PracticeFeedback, AiError> {
        self.feedback_calls.fetch_add(1, Ordering::SeqCst);
        self.feedback.lock().unwrap().pop_front().unwrap_or_else(|| Err(server_error()))
    }

    async fn analyze_question(
        &self,
        _request: &QuestionAnalysisRequest,
    ) -> Result<AnswerAnalysis, AiError> {
        self.question_calls.fetch_add(1, Ordering::SeqCst);
        self.questions.lock().unwrap().pop_front().unwrap_or_else(|| Err(server_error()))
    }

    async fn analyze_exam(&self, _answers: &[AnswerSummary]) -> Result<ExamTotalAnalysis, AiError> {
        self.exam_calls.fetch_add(1, Ordering::SeqCst);
        self.exams.lock().unwrap().pop_front().unwrap_or_else(|| Err(server_error()))
    }
}

/// Ids of the seeded content.
pub struct SeededContent {
    pub topics: Vec<i64>,
}

fn questions(n: usize, label: &str) -> Vec<CreateQuestionRequest> {
    (0..n)
        .map(|i| CreateQuestionRequest {
            question_text: format!("{} question {}", label, i + 1),
            audio_url: format!("http://audio.test/{}/{}.mp3", label, i + 1),
        })
        .collect()
}

/// One intro set plus one set per (topic, level, type).
pub async fn seed_content(pool: &SqlitePool, topic_count: usize) -> SeededContent {
    let mut tx = pool.begin().await.unwrap();

    content::insert_question_set(&mut tx, 1, None, QuestionType::Intro, &questions(1, "intro"))
        .await
        .unwrap();

    let mut topics = Vec::with_capacity(topic_count);
    for t in 0..topic_count {
        let topic = content::insert_topic(&mut tx, &format!("topic {}", t), Some("hobby"))
            .await
            .unwrap();
        for level in 1..=6 {
            for qt in QuestionType::ALL.into_iter().skip(1) {
                let label = format!("t{}-l{}-{:?}", topic.id, level, qt);
                content::insert_question_set(
                    &mut tx,
                    level,
                    Some(topic.id),
                    qt,
                    &questions(qt.expected_count(), &label),
                )
                .await
                .unwrap();
            }
        }
        topics.push(topic.id);
    }

    tx.commit().await.unwrap();
    SeededContent { topics }
}

/// Polls `check` until it returns true or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
