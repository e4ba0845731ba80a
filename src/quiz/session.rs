use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::thread_rng;
use teloxide::types::{ChatId, UserId};
use tokio::sync::Mutex;

use super::timer::QuestionTimer;
use super::{letter, Answer, Question, QuizConfig};

pub type DeliveryError = Box<dyn std::error::Error + Send + Sync>;

/// Outbound seam to whatever delivers messages to the user. The Telegram
/// implementation lives in `crate::telegram`; tests use a recording mock.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn present_question(&self, chat: ChatId, card: &QuestionCard) -> Result<(), DeliveryError>;
    async fn notify(&self, chat: ChatId, text: &str) -> Result<(), DeliveryError>;
}

/// Everything the transport needs to render one presented question.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionCard {
    pub title: String,
    pub number: usize,
    pub total: usize,
    pub prompt: String,
    pub options: Vec<String>,
    pub qid: u64,
    pub timeout: Duration,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("cannot start a quiz with no questions")]
    Empty,
}

/// What `resolve` did with an incoming answer or timeout event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The event closed the open question and the session advanced.
    Applied,
    /// The event carried a qid that is no longer current; nothing changed.
    Stale,
    /// The user has no session.
    NoSession,
}

/// The shuffled view of the open question. The correct option is the
/// position of the flagged record, never a text lookup.
struct Current {
    answers: Vec<Answer>,
}

impl Current {
    fn correct_index(&self) -> usize {
        // every presented question carries exactly one flagged record
        self.answers.iter().position(|a| a.is_correct).unwrap_or(0)
    }
}

struct Session {
    title: String,
    chat: ChatId,
    questions: Vec<Question>,
    index: usize,
    qid: u64,
    correct: u32,
    current: Option<Current>,
    timer: QuestionTimer,
}

impl Session {
    fn new(title: String, chat: ChatId, questions: Vec<Question>) -> Self {
        Self {
            title,
            chat,
            questions,
            index: 0,
            qid: 0,
            correct: 0,
            current: None,
            timer: QuestionTimer::default(),
        }
    }
}

enum Outgoing {
    Card(ChatId, QuestionCard),
    Notice(ChatId, String),
}

/// The per-user quiz engine: at most one session per user, advanced only
/// through `start`/`resolve`/`stop`. All mutation runs under one lock; the
/// messages produced inside the critical section are delivered after it is
/// released, so no I/O happens while the lock is held. A timer firing and an
/// answer arriving for the same question both funnel into `resolve`, and the
/// qid fence makes whichever comes second a no-op.
pub struct QuizEngine {
    transport: Arc<dyn Transport>,
    config: QuizConfig,
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl QuizEngine {
    pub fn new(transport: Arc<dyn Transport>, config: QuizConfig) -> Arc<Self> {
        Arc::new(Self {
            transport,
            config,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    /// Starts a session, replacing (and thereby cancelling, timer included)
    /// any previous one for this user, and presents the first question.
    pub async fn start(
        self: &Arc<Self>,
        user: UserId,
        chat: ChatId,
        title: String,
        questions: Vec<Question>,
    ) -> Result<(), SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        let mut outbox = Vec::new();
        {
            let mut sessions = self.sessions.lock().await;
            let mut session = Session::new(title, chat, questions);
            self.present_next(user, &mut session, &mut outbox);
            sessions.insert(user, session);
        }
        self.deliver(outbox).await;
        Ok(())
    }

    /// Closes the open question, for both answer events (`choice = Some`)
    /// and timeouts (`choice = None`). An out-of-range choice counts as a
    /// miss. Stale events leave the session untouched and emit nothing.
    pub async fn resolve(
        self: &Arc<Self>,
        user: UserId,
        qid: u64,
        choice: Option<usize>,
    ) -> ResolveOutcome {
        let mut outbox = Vec::new();
        {
            let mut sessions = self.sessions.lock().await;
            let Some(session) = sessions.get_mut(&user) else {
                return ResolveOutcome::NoSession;
            };
            if qid != session.qid {
                return ResolveOutcome::Stale;
            }
            let Some(current) = session.current.take() else {
                return ResolveOutcome::Stale;
            };
            // a timeout resolution runs on the timer's own task, which must
            // not abort itself; the fired handle is dropped instead
            match choice {
                Some(_) => session.timer.disarm(),
                None => session.timer.forget(),
            }

            let correct_index = current.correct_index();
            let correct_text = &current.answers[correct_index].text;
            match choice {
                Some(chosen) if chosen == correct_index => {
                    session.correct += 1;
                    outbox.push(Outgoing::Notice(
                        session.chat,
                        format!("✅ Правильно! ({}. {})", letter(correct_index), correct_text),
                    ));
                }
                Some(chosen) => {
                    let text = match current.answers.get(chosen) {
                        Some(answer) => format!(
                            "❌ Неправильно.\nТвоя відповідь: {}. {}\n✅ Правильна: {}. {}",
                            letter(chosen),
                            answer.text,
                            letter(correct_index),
                            correct_text,
                        ),
                        None => format!(
                            "❌ Неправильно.\n✅ Правильна: {}. {}",
                            letter(correct_index),
                            correct_text,
                        ),
                    };
                    outbox.push(Outgoing::Notice(session.chat, text));
                }
                None => {
                    outbox.push(Outgoing::Notice(
                        session.chat,
                        format!(
                            "⏰ Час вичерпано.\n✅ Правильна відповідь: {}. {}",
                            letter(correct_index),
                            correct_text,
                        ),
                    ));
                    outbox.push(Outgoing::Notice(
                        session.chat,
                        "➡️ Наступне питання…".to_string(),
                    ));
                }
            }

            session.index += 1;
            let finished = self.present_next(user, session, &mut outbox);
            if finished {
                sessions.remove(&user);
            }
        }
        self.deliver(outbox).await;
        ResolveOutcome::Applied
    }

    /// Destroys the user's session, if any; its timer is disarmed on drop.
    /// No summary is emitted.
    pub async fn stop(&self, user: UserId) -> bool {
        self.sessions.lock().await.remove(&user).is_some()
    }

    /// Shuffles and presents the question at `session.index`, or emits the
    /// score summary when the list is exhausted. Returns true on exhaustion
    /// so the caller removes the session from the store.
    fn present_next(
        self: &Arc<Self>,
        user: UserId,
        session: &mut Session,
        outbox: &mut Vec<Outgoing>,
    ) -> bool {
        let total = session.questions.len();
        if session.index == total {
            outbox.push(Outgoing::Notice(
                session.chat,
                format!(
                    "🏁 Тест завершено!\n✅ {}/{} ({}%)",
                    session.correct,
                    total,
                    percentage(session.correct, total),
                ),
            ));
            return true;
        }

        let question = &session.questions[session.index];
        let mut answers = question.answers();
        answers.shuffle(&mut thread_rng());

        session.qid += 1;
        let qid = session.qid;
        let card = QuestionCard {
            title: session.title.clone(),
            number: session.index + 1,
            total,
            prompt: question.prompt.clone(),
            options: answers.iter().map(|a| a.text.clone()).collect(),
            qid,
            timeout: self.config.question_timeout,
        };
        session.current = Some(Current { answers });

        let engine = Arc::clone(self);
        session.timer.arm(self.config.question_timeout, async move {
            engine.resolve(user, qid, None).await;
        });

        outbox.push(Outgoing::Card(session.chat, card));
        false
    }

    async fn deliver(&self, outbox: Vec<Outgoing>) {
        for item in outbox {
            let sent = match item {
                Outgoing::Card(chat, card) => self.transport.present_question(chat, &card).await,
                Outgoing::Notice(chat, text) => self.transport.notify(chat, &text).await,
            };
            if let Err(err) = sent {
                log::warn!("failed to deliver quiz message: {err}");
            }
        }
    }
}

/// Score percentage with one decimal, e.g. "66.7".
pub fn percentage(correct: u32, total: usize) -> String {
    if total == 0 {
        return "0.0".to_string();
    }
    format!("{:.1}", 100.0 * correct as f64 / total as f64)
}
