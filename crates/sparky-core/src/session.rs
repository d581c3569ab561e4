//! Per-workshop conversation with Sparky.
//!
//! Guided questions are asked one at a time; answering the last one triggers a
//! single suggestion request. Only one user message is processed at a time,
//! and results that arrive after the user navigated away are discarded.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use sparky_schema::{ChatMessage, Suggestion, WorkshopState, WorkshopStep};

use crate::error::{PipelineError, PipelineResult};
use crate::orchestrator::SuggestionOrchestrator;
use crate::prompts::GuidedAnswer;
use crate::templates::guided_questions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    AwaitingQuestion,
    AwaitingAnswer,
    GeneratingSuggestion,
    SuggestionReady,
}

/// What processing a user message produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionReply {
    /// Reply to a free-form question (an apology if the model failed).
    Answered(ChatMessage),
    /// The next guided question for the step.
    NextQuestion(ChatMessage),
    /// The question sequence is complete and suggestions are ready.
    Suggestions {
        message: ChatMessage,
        suggestions: Vec<Suggestion>,
    },
    /// The user left the step while the reply was being produced.
    Discarded,
}

#[derive(Debug)]
struct SessionState {
    step: WorkshopStep,
    phase: ConversationPhase,
    next_question: usize,
    answers: Vec<GuidedAnswer>,
    messages: Vec<ChatMessage>,
    pending: Vec<Suggestion>,
    busy: bool,
    epoch: u64,
}

pub struct ConversationSession {
    orchestrator: Arc<SuggestionOrchestrator>,
    state: Mutex<SessionState>,
}

/// Clears the busy flag when processing ends, unless the session moved on.
struct BusyGuard<'a> {
    session: &'a ConversationSession,
    epoch: u64,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.session.lock();
        if state.epoch == self.epoch {
            state.busy = false;
        }
    }
}

impl ConversationSession {
    pub fn new(orchestrator: Arc<SuggestionOrchestrator>) -> Self {
        Self {
            orchestrator,
            state: Mutex::new(SessionState {
                step: WorkshopStep::Welcome,
                phase: ConversationPhase::AwaitingQuestion,
                next_question: 0,
                answers: Vec::new(),
                messages: Vec::new(),
                pending: Vec::new(),
                busy: false,
                epoch: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces the message log with a persisted history.
    pub fn restore(&self, messages: Vec<ChatMessage>) {
        let mut state = self.lock();
        tracing::debug!(count = messages.len(), "restoring conversation history");
        state.messages = messages;
    }

    /// Enters `step`, discarding anything in flight, and asks its first guided question.
    pub fn start_step(&self, step: WorkshopStep) -> Option<ChatMessage> {
        let mut state = self.lock();
        state.epoch += 1;
        state.busy = false;
        state.step = step;
        state.pending.clear();
        state.answers.clear();
        state.next_question = 0;
        state.phase = ConversationPhase::AwaitingQuestion;
        tracing::info!(%step, epoch = state.epoch, "conversation step started");
        Self::ask_next_question(&mut state)
    }

    /// Leaves the conversation; late replies are dropped.
    pub fn close(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        state.busy = false;
        state.phase = ConversationPhase::AwaitingQuestion;
        tracing::info!(epoch = state.epoch, "conversation closed");
    }

    pub fn current_step(&self) -> WorkshopStep {
        self.lock().step
    }

    pub fn phase(&self) -> ConversationPhase {
        self.lock().phase
    }

    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    pub fn pending_suggestions(&self) -> Vec<Suggestion> {
        self.lock().pending.clone()
    }

    /// Messages for `step`, or the whole log when `all` is set.
    pub fn history(&self, step: WorkshopStep, all: bool) -> Vec<ChatMessage> {
        let state = self.lock();
        state
            .messages
            .iter()
            .filter(|m| all || m.step_context == Some(step.number()))
            .cloned()
            .collect()
    }

    pub fn accept_suggestion(&self, suggestion_id: &str) -> Option<Suggestion> {
        self.take_suggestion(suggestion_id, "accepted")
    }

    pub fn dismiss_suggestion(&self, suggestion_id: &str) -> Option<Suggestion> {
        self.take_suggestion(suggestion_id, "dismissed")
    }

    fn take_suggestion(&self, suggestion_id: &str, action: &str) -> Option<Suggestion> {
        let mut state = self.lock();
        let index = state.pending.iter().position(|s| s.id == suggestion_id)?;
        let suggestion = state.pending.remove(index);
        if state.phase == ConversationPhase::SuggestionReady {
            state.phase = ConversationPhase::AwaitingQuestion;
        }
        tracing::info!(suggestion_id, action, "suggestion resolved");
        Some(suggestion)
    }

    /// Processes one user message against the current step.
    ///
    /// Fails only with [`PipelineError::Busy`] when a previous message is
    /// still being processed.
    pub async fn send_message(
        &self,
        text: &str,
        workshop: &WorkshopState,
    ) -> PipelineResult<SessionReply> {
        let (step, epoch, phase, history) = {
            let mut state = self.lock();
            if state.busy {
                return Err(PipelineError::Busy);
            }
            state.busy = true;
            let history: Vec<ChatMessage> = state.messages.clone();
            let step = state.step;
            state.messages.push(ChatMessage::user(text, step));
            if state.phase == ConversationPhase::AwaitingAnswer {
                let asked = state.next_question.checked_sub(1);
                if let Some(question) = asked.and_then(|i| guided_questions(step).get(i)) {
                    state.answers.push(GuidedAnswer::new(*question, text));
                }
            }
            (step, state.epoch, state.phase, history)
        };
        let _guard = BusyGuard {
            session: self,
            epoch,
        };

        if phase == ConversationPhase::AwaitingAnswer {
            return Ok(self.handle_answer(step, epoch, workshop).await);
        }

        if phase == ConversationPhase::SuggestionReady {
            self.lock().phase = ConversationPhase::AwaitingQuestion;
        }
        let answer = self
            .orchestrator
            .answer_question(step, text, &history, workshop)
            .await;

        let mut state = self.lock();
        if state.epoch != epoch {
            tracing::info!(%step, "discarding stale chat answer");
            return Ok(SessionReply::Discarded);
        }
        let message = ChatMessage::assistant(answer, step);
        state.messages.push(message.clone());
        Ok(SessionReply::Answered(message))
    }

    async fn handle_answer(
        &self,
        step: WorkshopStep,
        epoch: u64,
        workshop: &WorkshopState,
    ) -> SessionReply {
        let answers = {
            let mut state = self.lock();
            if let Some(question) = Self::ask_next_question(&mut state) {
                return SessionReply::NextQuestion(question);
            }
            state.phase = ConversationPhase::GeneratingSuggestion;
            std::mem::take(&mut state.answers)
        };

        let Some(suggestion_type) = step.suggestion_types().first().copied() else {
            let mut state = self.lock();
            state.phase = ConversationPhase::AwaitingQuestion;
            let message = ChatMessage::assistant("Thanks! Let's keep going.", step);
            state.messages.push(message.clone());
            return SessionReply::Answered(message);
        };

        tracing::info!(
            %step,
            %suggestion_type,
            "question sequence complete, generating suggestions"
        );
        let suggestions = self
            .orchestrator
            .get_suggestions_with_answers(step.number(), suggestion_type, workshop, &answers)
            .await;

        let mut state = self.lock();
        if state.epoch != epoch {
            tracing::info!(%step, "discarding stale suggestions");
            return SessionReply::Discarded;
        }
        state.pending = suggestions.clone();
        state.phase = ConversationPhase::SuggestionReady;
        let message = ChatMessage::assistant(
            format!(
                "Thanks! Here are some ideas for {}. Accept the ones that fit, or ask me anything.",
                step.title()
            ),
            step,
        );
        state.messages.push(message.clone());
        SessionReply::Suggestions {
            message,
            suggestions,
        }
    }

    fn ask_next_question(state: &mut SessionState) -> Option<ChatMessage> {
        let question = guided_questions(state.step).get(state.next_question)?;
        state.next_question += 1;
        state.phase = ConversationPhase::AwaitingAnswer;
        let message = ChatMessage::assistant(*question, state.step);
        state.messages.push(message.clone());
        Some(message)
    }
}
