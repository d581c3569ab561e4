//! Closed set of answer shapes a step prompt can ask for, with typed payloads.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sparky_schema::{BuyerSegmentPainMap, SuggestionType, OVERLAPPING_SEGMENT};

use crate::error::{PipelineError, PipelineResult};
use crate::json_extract::{null_as_default, parse_json};
use crate::painstorming::PainstormingParser;

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•+]|\d+[.)]|\(\d+\))\s+").expect("valid list marker regex")
});

const JOB_PREFIX: &str = "help me";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// Numbered or bulleted list, or `{"suggestions": [...]}`.
    List,
    AntiGoals,
    Jobs,
    TargetBuyers,
    /// Free-form painstorming text, routed through the pain parser.
    Painstorming,
    ProblemUp,
    Offers,
}

impl ResponseShape {
    pub fn for_type(suggestion_type: SuggestionType) -> Self {
        match suggestion_type {
            SuggestionType::BigIdea
            | SuggestionType::UnderlyingGoal
            | SuggestionType::TriggerEvents
            | SuggestionType::NextSteps => Self::List,
            SuggestionType::AntiGoals => Self::AntiGoals,
            SuggestionType::Jobs => Self::Jobs,
            SuggestionType::TargetBuyers => Self::TargetBuyers,
            SuggestionType::Pains => Self::Painstorming,
            SuggestionType::ProblemUp => Self::ProblemUp,
            SuggestionType::OfferConcepts => Self::Offers,
        }
    }

    /// Shapes whose prompt demands a bare JSON object.
    pub fn expects_json(self) -> bool {
        !matches!(self, Self::List | Self::Painstorming)
    }

    /// Decodes raw model text into the typed payload for this shape.
    pub async fn decode(
        self,
        raw: &str,
        pains: &PainstormingParser,
        canonical_segments: &[String],
    ) -> PipelineResult<StepPayload> {
        match self {
            Self::List => Ok(StepPayload::List(parse_list(raw))),
            Self::AntiGoals => parse_json(raw).map(StepPayload::AntiGoals),
            Self::Jobs => parse_json(raw).map(StepPayload::Jobs),
            Self::TargetBuyers => parse_json(raw).map(StepPayload::TargetBuyers),
            Self::ProblemUp => parse_json(raw).map(StepPayload::ProblemUp),
            Self::Offers => parse_json(raw).map(StepPayload::Offers),
            Self::Painstorming => pains
                .parse(raw, canonical_segments)
                .await
                .map(StepPayload::Pains),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiGoalsPayload {
    #[serde(deserialize_with = "null_as_default")]
    pub market: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub offer: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub delivery: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub lifestyle: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub values: Vec<String>,
}

impl AntiGoalsPayload {
    pub const CATEGORIES: [&'static str; 5] =
        ["Market", "Offer", "Delivery", "Lifestyle", "Values"];

    fn categories(&self) -> [(&'static str, &Vec<String>); 5] {
        [
            ("Market", &self.market),
            ("Offer", &self.offer),
            ("Delivery", &self.delivery),
            ("Lifestyle", &self.lifestyle),
            ("Values", &self.values),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobsPayload {
    pub overarching_job_statement: String,
    pub supporting_job_statements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedIdea {
    pub name: String,
    pub description: String,
}

impl NamedIdea {
    fn to_content(&self) -> String {
        let name = self.name.trim();
        let description = self.description.trim();
        match (name.is_empty(), description.is_empty()) {
            (false, false) => format!("{name}: {description}"),
            (false, true) => name.to_string(),
            _ => description.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TargetBuyersPayload {
    pub target_buyers: Vec<NamedIdea>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProblemUpPayload {
    pub focused_problems: Vec<String>,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffersPayload {
    pub offers: Vec<NamedIdea>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepPayload {
    List(Vec<String>),
    AntiGoals(AntiGoalsPayload),
    Jobs(JobsPayload),
    TargetBuyers(TargetBuyersPayload),
    Pains(BuyerSegmentPainMap),
    ProblemUp(ProblemUpPayload),
    Offers(OffersPayload),
}

impl StepPayload {
    /// Drops blank or malformed entries; fails if nothing usable remains.
    pub fn validate(self) -> PipelineResult<Self> {
        let payload = match self {
            Self::List(items) => Self::List(non_blank(items)),
            Self::AntiGoals(mut goals) => {
                for list in [
                    &mut goals.market,
                    &mut goals.offer,
                    &mut goals.delivery,
                    &mut goals.lifestyle,
                    &mut goals.values,
                ] {
                    *list = non_blank(std::mem::take(list));
                }
                Self::AntiGoals(goals)
            }
            Self::Jobs(jobs) => {
                let overarching = jobs.overarching_job_statement.trim().to_string();
                let overarching = if is_job_statement(&overarching) {
                    overarching
                } else {
                    if !overarching.is_empty() {
                        tracing::debug!(
                            statement = %overarching,
                            "dropping malformed overarching job"
                        );
                    }
                    String::new()
                };
                let supporting = non_blank(jobs.supporting_job_statements)
                    .into_iter()
                    .filter(|s| {
                        let ok = is_job_statement(s);
                        if !ok {
                            tracing::debug!(statement = %s, "dropping malformed job statement");
                        }
                        ok
                    })
                    .collect();
                Self::Jobs(JobsPayload {
                    overarching_job_statement: overarching,
                    supporting_job_statements: supporting,
                })
            }
            Self::TargetBuyers(buyers) => Self::TargetBuyers(TargetBuyersPayload {
                target_buyers: buyers
                    .target_buyers
                    .into_iter()
                    .filter(|b| !b.name.trim().is_empty())
                    .collect(),
            }),
            Self::ProblemUp(problem) => Self::ProblemUp(ProblemUpPayload {
                focused_problems: non_blank(problem.focused_problems),
                rationale: problem.rationale.filter(|r| !r.trim().is_empty()),
            }),
            Self::Offers(offers) => Self::Offers(OffersPayload {
                offers: offers
                    .offers
                    .into_iter()
                    .filter(|o| !o.name.trim().is_empty() || !o.description.trim().is_empty())
                    .collect(),
            }),
            pains @ Self::Pains(_) => pains,
        };

        if payload.is_empty() {
            return Err(PipelineError::Validation("model returned no usable items".into()));
        }
        Ok(payload)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::List(items) => items.is_empty(),
            Self::AntiGoals(goals) => goals.categories().iter().all(|(_, items)| items.is_empty()),
            Self::Jobs(jobs) => {
                jobs.overarching_job_statement.is_empty()
                    && jobs.supporting_job_statements.is_empty()
            }
            Self::TargetBuyers(buyers) => buyers.target_buyers.is_empty(),
            Self::Pains(map) => map.is_empty(),
            Self::ProblemUp(problem) => problem.focused_problems.is_empty(),
            Self::Offers(offers) => offers.offers.is_empty(),
        }
    }

    /// Flattens the payload into suggestion contents, in display order.
    pub fn into_contents(self) -> Vec<String> {
        match self {
            Self::List(items) => items,
            Self::AntiGoals(goals) => goals
                .categories()
                .iter()
                .flat_map(|(category, items)| {
                    items.iter().map(move |item| format!("{category}: {item}"))
                })
                .collect(),
            Self::Jobs(jobs) => std::iter::once(jobs.overarching_job_statement)
                .filter(|s| !s.is_empty())
                .chain(jobs.supporting_job_statements)
                .collect(),
            Self::TargetBuyers(buyers) => {
                buyers.target_buyers.iter().map(NamedIdea::to_content).collect()
            }
            Self::Pains(map) => map
                .iter()
                .map(|pain| {
                    let fire = if pain.is_fire { " (FIRE)" } else { "" };
                    if pain.buyer_segment == OVERLAPPING_SEGMENT {
                        format!("{} [{}]{fire}", pain.description, pain.pain_type.as_str())
                    } else {
                        format!(
                            "{}: {} [{}]{fire}",
                            pain.buyer_segment,
                            pain.description,
                            pain.pain_type.as_str()
                        )
                    }
                })
                .collect(),
            Self::ProblemUp(problem) => problem.focused_problems,
            Self::Offers(offers) => offers.offers.iter().map(NamedIdea::to_content).collect(),
        }
    }
}

fn non_blank(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_job_statement(statement: &str) -> bool {
    statement
        .get(..JOB_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(JOB_PREFIX))
}

/// Items from a `{"suggestions": [...]}` object or a markdown list.
///
/// Without list markers, every non-blank line that is not a heading or a
/// lead-in ending in `:` counts as an item.
pub fn parse_list(raw: &str) -> Vec<String> {
    if raw.contains('{') {
        if let Ok(items) = parse_json::<SuggestionsEnvelope>(raw).map(SuggestionsEnvelope::items) {
            if !items.is_empty() {
                return items;
            }
        }
    }

    let marked: Vec<String> = raw
        .lines()
        .filter(|line| LIST_MARKER.is_match(line))
        .map(|line| clean_item(&LIST_MARKER.replace(line, "")))
        .filter(|item| !item.is_empty())
        .collect();
    if !marked.is_empty() {
        return marked;
    }

    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.ends_with(':'))
        .map(clean_item)
        .filter(|item| !item.is_empty())
        .collect()
}

fn clean_item(item: &str) -> String {
    let item = item.replace("**", "");
    item.trim()
        .trim_matches(|c| c == '"' || c == '“' || c == '”')
        .trim()
        .to_string()
}

#[derive(Debug, Deserialize)]
struct SuggestionsEnvelope {
    #[serde(default)]
    suggestions: Vec<Value>,
}

impl SuggestionsEnvelope {
    fn items(self) -> Vec<String> {
        self.suggestions
            .into_iter()
            .filter_map(|value| match value {
                Value::String(s) => Some(s),
                Value::Object(map) => ["content", "description", "text", "suggestion"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str).map(str::to_string)),
                _ => None,
            })
            .map(|s| clean_item(&s))
            .filter(|s| !s.is_empty())
            .collect()
    }
}
