use serde::Serialize;
use sparky_provider::LlmMessage;
use sparky_schema::{
    ChatMessage, MessageRole, RecordSource, SuggestionType, WorkshopState, WorkshopStep,
};

use crate::config::{ModelConfig, WorkshopConfig};
use crate::responses::ResponseShape;
use crate::templates::{
    template, CHAT_GUIDANCE, JSON_ONLY_INSTRUCTION, PAIN_EXTRACTION_FORMAT,
    PAIN_EXTRACTION_SYSTEM, SPARKY_PERSONA,
};

/// Everything needed for one completion call, plus the shape of the expected answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptSpec {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub model: String,
    pub shape: ResponseShape,
}

/// Multi-turn variant used for free-form questions.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    pub system_prompt: String,
    pub messages: Vec<LlmMessage>,
    pub temperature: f32,
    pub model: String,
}

/// The founder's reply to one of Sparky's guided questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidedAnswer {
    pub question: String,
    pub answer: String,
}

impl GuidedAnswer {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    model: ModelConfig,
    history_window: usize,
}

impl PromptBuilder {
    pub fn new(config: &WorkshopConfig) -> Self {
        Self {
            model: config.model.clone(),
            history_window: config.session.history_window,
        }
    }

    /// Prompt for `suggestion_type` on step number `step`.
    ///
    /// `None` when the step number is unknown, the step has no suggestions,
    /// or the type belongs to another step.
    pub fn build_prompt(
        &self,
        step: u8,
        suggestion_type: SuggestionType,
        state: &WorkshopState,
    ) -> Option<PromptSpec> {
        self.build_prompt_with_answers(step, suggestion_type, state, &[])
    }

    /// [`build_prompt`](Self::build_prompt) with the founder's answers to the
    /// step's guided questions added to the context.
    pub fn build_prompt_with_answers(
        &self,
        step: u8,
        suggestion_type: SuggestionType,
        state: &WorkshopState,
        answers: &[GuidedAnswer],
    ) -> Option<PromptSpec> {
        let step = WorkshopStep::from_number(step)?;
        if suggestion_type.step() != step {
            tracing::debug!(%step, %suggestion_type, "suggestion type not offered on this step");
            return None;
        }

        let tpl = template(suggestion_type);
        let refine = has_user_input(suggestion_type, state);
        let shape = ResponseShape::for_type(suggestion_type);

        let mut system_prompt = format!("{SPARKY_PERSONA}\n\n{}", tpl.system);
        if shape.expects_json() {
            system_prompt = json_only(&system_prompt);
        }

        let lead = if refine { tpl.refine } else { tpl.brainstorm };
        let user_prompt = format!(
            "{lead}\n\n{}\n\n{}",
            context_for(suggestion_type, state, answers),
            tpl.output
        );

        let temps = &self.model.temperatures;
        Some(PromptSpec {
            system_prompt,
            user_prompt,
            temperature: if refine { temps.refine } else { temps.suggestion },
            model: self.model.suggestion_model().to_string(),
            shape,
        })
    }

    /// Sparky's answer to a free-form question on `step`, with recent step history.
    pub fn chat(
        &self,
        step: WorkshopStep,
        question: &str,
        history: &[ChatMessage],
        state: &WorkshopState,
    ) -> ChatPrompt {
        let recent = history
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .filter(|m| m.step_context.is_none() || m.step_context == Some(step.number()));
        let skip = recent.clone().count().saturating_sub(self.history_window);

        let mut messages: Vec<LlmMessage> = recent
            .skip(skip)
            .map(|m| match m.role {
                MessageRole::Assistant => LlmMessage::assistant(m.content.clone()),
                _ => LlmMessage::user(m.content.clone()),
            })
            .collect();

        let context = match step.suggestion_types().first() {
            Some(primary) => context_for(*primary, state, &[]),
            None => overview(state),
        };
        messages.push(LlmMessage::user(format!(
            "{}\n\n---\nCurrent workshop step: {step}\n{context}",
            question.trim()
        )));

        ChatPrompt {
            system_prompt: format!("{SPARKY_PERSONA}\n\n{CHAT_GUIDANCE}"),
            messages,
            temperature: self.model.temperatures.chat,
            model: self.model.default_model.clone(),
        }
    }

    /// Structured extraction of pains from (preprocessed) painstorming text.
    pub fn painstorming_extraction(&self, text: &str, canonical_segments: &[String]) -> PromptSpec {
        let segments = if canonical_segments.is_empty() {
            "none given".to_string()
        } else {
            canonical_segments.join(", ")
        };
        PromptSpec {
            system_prompt: json_only(PAIN_EXTRACTION_SYSTEM),
            user_prompt: format!(
                "Known buyer segments: {segments}\n\n{PAIN_EXTRACTION_FORMAT}\n\nText:\n{}",
                text.trim()
            ),
            temperature: self.model.temperatures.structured,
            model: self.model.default_model.clone(),
            shape: ResponseShape::Painstorming,
        }
    }
}

/// `system` with the JSON-only instruction appended once.
pub fn json_only(system: &str) -> String {
    if system.contains(JSON_ONLY_INSTRUCTION) {
        system.to_string()
    } else if system.trim().is_empty() {
        JSON_ONLY_INSTRUCTION.to_string()
    } else {
        format!("{}\n\n{JSON_ONLY_INSTRUCTION}", system.trim_end())
    }
}

/// Whether the founder already wrote something for the step this type feeds.
pub fn has_user_input(suggestion_type: SuggestionType, state: &WorkshopState) -> bool {
    let by_user = |source: RecordSource| source == RecordSource::User;
    match suggestion_type {
        SuggestionType::BigIdea => !state.big_idea.description.trim().is_empty(),
        SuggestionType::UnderlyingGoal => !state.underlying_goal.business_goal.trim().is_empty(),
        SuggestionType::AntiGoals => state.anti_goals.iter().any(|g| by_user(g.source)),
        SuggestionType::TriggerEvents => state.trigger_events.iter().any(|t| by_user(t.source)),
        SuggestionType::Jobs => state.jobs.iter().any(|j| by_user(j.source)),
        SuggestionType::TargetBuyers => state.target_buyers.iter().any(|b| by_user(b.source)),
        SuggestionType::Pains => state.pains.iter().any(|p| by_user(p.source)),
        SuggestionType::ProblemUp => !state.problem_up.narrowed_problem.trim().is_empty(),
        SuggestionType::OfferConcepts => state.offers.iter().any(|o| by_user(o.source)),
        SuggestionType::NextSteps => !state.next_steps.is_empty(),
    }
}

#[derive(Default)]
struct Context {
    lines: Vec<String>,
}

impl Context {
    fn text(&mut self, label: &str, value: &str) -> &mut Self {
        let value = value.trim();
        if !value.is_empty() {
            self.lines.push(format!("{label}: {value}"));
        }
        self
    }

    fn list<I, S>(&mut self, label: &str, items: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items: Vec<String> = items
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !items.is_empty() {
            self.lines.push(format!("{label}:\n- {}", items.join("\n- ")));
        }
        self
    }

    fn answers(&mut self, answers: &[GuidedAnswer]) -> &mut Self {
        let pairs: Vec<String> = answers
            .iter()
            .filter(|a| !a.answer.trim().is_empty())
            .map(|a| format!("Q: {}\nA: {}", a.question.trim(), a.answer.trim()))
            .collect();
        if !pairs.is_empty() {
            self.lines
                .push(format!("Answers to Sparky's questions:\n{}", pairs.join("\n")));
        }
        self
    }

    fn finish(&self) -> String {
        if self.lines.is_empty() {
            "Workshop context: nothing has been filled in yet.".to_string()
        } else {
            format!("Workshop context:\n{}", self.lines.join("\n"))
        }
    }
}

fn idea_and_goal(ctx: &mut Context, state: &WorkshopState) {
    ctx.text("Business idea", &state.big_idea.description)
        .text("Intended customers", &state.big_idea.target_customers)
        .text("Underlying goal", &state.underlying_goal.business_goal)
        .text("Constraints", &state.underlying_goal.constraints);
}

fn job_lines(state: &WorkshopState) -> Vec<String> {
    state
        .jobs
        .iter()
        .map(|j| {
            if j.is_overarching {
                format!("{} (overarching)", j.description)
            } else {
                j.description.clone()
            }
        })
        .collect()
}

fn overarching_job(state: &WorkshopState) -> &str {
    state
        .overarching_job()
        .map(|j| j.description.as_str())
        .unwrap_or_default()
}

fn pain_lines(state: &WorkshopState) -> Vec<String> {
    state
        .pains
        .iter()
        .map(|p| {
            let fire = if p.is_fire { ", FIRE" } else { "" };
            format!("[{}] {} ({}{fire})", p.buyer_segment, p.description, p.pain_type.as_str())
        })
        .collect()
}

fn context_for(
    suggestion_type: SuggestionType,
    state: &WorkshopState,
    answers: &[GuidedAnswer],
) -> String {
    let mut ctx = Context::default();
    match suggestion_type {
        SuggestionType::BigIdea => {
            ctx.text("Website summary", state.website_summary.as_deref().unwrap_or_default())
                .text("Current idea", &state.big_idea.description)
                .text("Intended customers", &state.big_idea.target_customers);
        }
        SuggestionType::UnderlyingGoal => {
            idea_and_goal(&mut ctx, state);
        }
        SuggestionType::AntiGoals => {
            idea_and_goal(&mut ctx, state);
            ctx.list(
                "Anti-goals so far",
                state
                    .anti_goals
                    .iter()
                    .map(|g| format!("{}: {}", g.category, g.description)),
            );
        }
        SuggestionType::TriggerEvents => {
            idea_and_goal(&mut ctx, state);
            ctx.list("Events so far", state.trigger_events.iter().map(|t| &t.description));
        }
        SuggestionType::Jobs => {
            idea_and_goal(&mut ctx, state);
            ctx.list("Trigger events", state.trigger_events.iter().map(|t| &t.description))
                .list("Statements so far", job_lines(state));
        }
        SuggestionType::TargetBuyers => {
            idea_and_goal(&mut ctx, state);
            ctx.text("Overarching job", overarching_job(state))
                .list("Jobs", job_lines(state))
                .list("Markets", state.markets.iter().map(|m| &m.name))
                .list(
                    "Segments so far",
                    state.target_buyers.iter().map(|b| format!("{}: {}", b.name, b.description)),
                );
        }
        SuggestionType::Pains => {
            let segments = state.buyer_segment_names();
            ctx.text("Business idea", &state.big_idea.description)
                .text("Overarching job", overarching_job(state))
                .list("Jobs", job_lines(state))
                .list("Trigger events", state.trigger_events.iter().map(|t| &t.description))
                .list("Pains so far", pain_lines(state));
            if segments.is_empty() {
                ctx.text(
                    "Buyer segments",
                    "none chosen yet; infer the two most likely segments and name them",
                );
            } else {
                ctx.list("Buyer segments (use these names exactly)", &segments);
            }
        }
        SuggestionType::ProblemUp => {
            ctx.text("Business idea", &state.big_idea.description)
                .list("Chosen buyers", &state.problem_up.selected_buyers)
                .list("Pains", pain_lines(state))
                .list("Problems noted", state.problems.iter().map(|p| &p.description))
                .list(
                    "Selected pains",
                    state.selected_pains().iter().map(|p| &p.description),
                )
                .text("Narrowed problem so far", &state.problem_up.narrowed_problem);
        }
        SuggestionType::OfferConcepts => {
            idea_and_goal(&mut ctx, state);
            ctx.list("Buyer segments", state.buyer_segment_names())
                .text("Focused problem", &state.problem_up.narrowed_problem)
                .list(
                    "Pains to solve",
                    state.selected_pains().iter().map(|p| &p.description),
                )
                .list(
                    "Offers so far",
                    state.offers.iter().map(|o| format!("{}: {}", o.name, o.description)),
                );
        }
        SuggestionType::NextSteps => {
            ctx.text("Business idea", &state.big_idea.description)
                .text("Focused problem", &state.problem_up.narrowed_problem)
                .list(
                    "Offers",
                    state.offers.iter().map(|o| format!("{}: {}", o.name, o.description)),
                )
                .list("Planned steps", &state.next_steps);
        }
    }
    ctx.answers(answers).finish()
}

fn overview(state: &WorkshopState) -> String {
    let mut ctx = Context::default();
    idea_and_goal(&mut ctx, state);
    ctx.list("Buyer segments", state.buyer_segment_names())
        .text("Focused problem", &state.problem_up.narrowed_problem)
        .list("Offers", state.offers.iter().map(|o| &o.name));
    ctx.finish()
}
