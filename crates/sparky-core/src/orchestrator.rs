use std::sync::Arc;

use sparky_schema::{
    BuyerSegmentPainMap, ChatMessage, Suggestion, SuggestionType, WorkshopState, WorkshopStep,
};

use crate::config::{ExtractorKind, WorkshopConfig};
use crate::error::PipelineResult;
use crate::fallback::fallback_suggestions;
use crate::gateway::ModelGateway;
use crate::painstorming::{
    HeuristicPainExtractor, ModelPainExtractor, PainExtractor, PainstormingParser,
};
use crate::prompts::{GuidedAnswer, PromptBuilder};
use crate::templates::CHAT_APOLOGY;

/// Website summary plus the big-idea suggestions generated from it.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlBrainstorm {
    pub summary: String,
    pub suggestions: Vec<Suggestion>,
}

pub struct SuggestionOrchestrator {
    gateway: Arc<ModelGateway>,
    prompts: PromptBuilder,
    pains: PainstormingParser,
}

impl SuggestionOrchestrator {
    pub fn new(
        gateway: Arc<ModelGateway>,
        prompts: PromptBuilder,
        pains: PainstormingParser,
    ) -> Self {
        Self {
            gateway,
            prompts,
            pains,
        }
    }

    pub fn from_config(config: &WorkshopConfig) -> Self {
        Self::with_gateway(config, Arc::new(ModelGateway::from_config(config)))
    }

    /// Wires prompts and the pain parser from `config` around an existing gateway.
    pub fn with_gateway(config: &WorkshopConfig, gateway: Arc<ModelGateway>) -> Self {
        let prompts = PromptBuilder::new(config);
        let extractor: Arc<dyn PainExtractor> = match config.painstorming.extractor {
            ExtractorKind::Model => {
                Arc::new(ModelPainExtractor::new(gateway.clone(), prompts.clone()))
            }
            ExtractorKind::Heuristic => Arc::new(HeuristicPainExtractor),
        };
        let pains = PainstormingParser::new(extractor, config.painstorming.reconcile_policy());
        Self::new(gateway, prompts, pains)
    }

    /// Suggestions for `suggestion_type` on `step`. Never fails.
    ///
    /// An empty list means no prompt exists for the combination; any failure
    /// along the way degrades to the static suggestions for the type.
    pub async fn get_suggestions(
        &self,
        step: u8,
        suggestion_type: SuggestionType,
        state: &WorkshopState,
    ) -> Vec<Suggestion> {
        self.get_suggestions_with_answers(step, suggestion_type, state, &[])
            .await
    }

    /// [`get_suggestions`](Self::get_suggestions) informed by answers to the
    /// step's guided questions.
    pub async fn get_suggestions_with_answers(
        &self,
        step: u8,
        suggestion_type: SuggestionType,
        state: &WorkshopState,
        answers: &[GuidedAnswer],
    ) -> Vec<Suggestion> {
        match self
            .try_get_suggestions_with_answers(step, suggestion_type, state, answers)
            .await
        {
            Ok(suggestions) => suggestions,
            Err(err) => {
                tracing::warn!(
                    step,
                    suggestion_type = %suggestion_type,
                    "suggestion generation failed, using fallbacks: {err}"
                );
                fallback_suggestions(suggestion_type)
            }
        }
    }

    /// Like [`get_suggestions`](Self::get_suggestions) but surfaces the failure.
    pub async fn try_get_suggestions(
        &self,
        step: u8,
        suggestion_type: SuggestionType,
        state: &WorkshopState,
    ) -> PipelineResult<Vec<Suggestion>> {
        self.try_get_suggestions_with_answers(step, suggestion_type, state, &[])
            .await
    }

    pub async fn try_get_suggestions_with_answers(
        &self,
        step: u8,
        suggestion_type: SuggestionType,
        state: &WorkshopState,
        answers: &[GuidedAnswer],
    ) -> PipelineResult<Vec<Suggestion>> {
        let Some(spec) = self
            .prompts
            .build_prompt_with_answers(step, suggestion_type, state, answers)
        else {
            return Ok(Vec::new());
        };

        let raw = self.gateway.complete_spec(&spec).await?;
        let segments = state.buyer_segment_names();
        let payload = spec
            .shape
            .decode(&raw, &self.pains, &segments)
            .await?
            .validate()?;

        let suggestions: Vec<Suggestion> = payload
            .into_contents()
            .into_iter()
            .map(|content| Suggestion::new(content, suggestion_type))
            .collect();
        tracing::info!(
            step,
            suggestion_type = %suggestion_type,
            count = suggestions.len(),
            "suggestions generated"
        );
        Ok(suggestions)
    }

    /// Sparky's reply to a free-form question; an apology if the model is unreachable.
    pub async fn answer_question(
        &self,
        step: WorkshopStep,
        question: &str,
        history: &[ChatMessage],
        state: &WorkshopState,
    ) -> String {
        let prompt = self.prompts.chat(step, question, history, state);
        match self.gateway.converse(&prompt).await {
            Ok(answer) => answer.trim().to_string(),
            Err(err) => {
                tracing::warn!(%step, "chat answer failed: {err}");
                CHAT_APOLOGY.to_string()
            }
        }
    }

    /// Summarizes a website and brainstorms big ideas with that summary as context.
    pub async fn brainstorm_from_url(
        &self,
        url: &str,
        state: &WorkshopState,
    ) -> PipelineResult<UrlBrainstorm> {
        let summary = self.gateway.summarize_url(url).await?;
        let mut snapshot = state.clone();
        snapshot.website_summary = Some(summary.clone());

        let suggestions = self
            .get_suggestions(
                WorkshopStep::BigIdea.number(),
                SuggestionType::BigIdea,
                &snapshot,
            )
            .await;
        Ok(UrlBrainstorm {
            summary,
            suggestions,
        })
    }

    pub async fn parse_painstorming(
        &self,
        text: &str,
        canonical_segments: &[String],
    ) -> PipelineResult<BuyerSegmentPainMap> {
        self.pains.parse(text, canonical_segments).await
    }
}
