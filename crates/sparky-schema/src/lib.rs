mod workshop;

pub use workshop::*;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Bucket name for pains that are not attributable to a single buyer segment.
pub const OVERLAPPING_SEGMENT: &str = "Overlapping";

/// The eleven screens of the workshop wizard, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WorkshopStep {
    Welcome = 1,
    BigIdea = 2,
    UnderlyingGoal = 3,
    TriggerEvents = 4,
    Jobs = 5,
    TargetBuyers = 6,
    Painstorming = 7,
    ProblemUp = 8,
    RefineIdea = 9,
    NextSteps = 10,
    Summary = 11,
}

impl WorkshopStep {
    pub const ALL: [WorkshopStep; 11] = [
        Self::Welcome,
        Self::BigIdea,
        Self::UnderlyingGoal,
        Self::TriggerEvents,
        Self::Jobs,
        Self::TargetBuyers,
        Self::Painstorming,
        Self::ProblemUp,
        Self::RefineIdea,
        Self::NextSteps,
        Self::Summary,
    ];

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.number() == number)
    }

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Welcome => "Welcome",
            Self::BigIdea => "Big Idea",
            Self::UnderlyingGoal => "Underlying Goal",
            Self::TriggerEvents => "Trigger Events",
            Self::Jobs => "Jobs",
            Self::TargetBuyers => "Target Buyers",
            Self::Painstorming => "Painstorming",
            Self::ProblemUp => "Problem Up",
            Self::RefineIdea => "Refine Idea",
            Self::NextSteps => "Next Steps",
            Self::Summary => "Summary",
        }
    }

    /// Suggestion types offered on this step, primary first. Empty for steps
    /// without a suggestion affordance.
    pub fn suggestion_types(self) -> &'static [SuggestionType] {
        match self {
            Self::Welcome | Self::Summary => &[],
            Self::BigIdea => &[SuggestionType::BigIdea],
            Self::UnderlyingGoal => &[SuggestionType::UnderlyingGoal, SuggestionType::AntiGoals],
            Self::TriggerEvents => &[SuggestionType::TriggerEvents],
            Self::Jobs => &[SuggestionType::Jobs],
            Self::TargetBuyers => &[SuggestionType::TargetBuyers],
            Self::Painstorming => &[SuggestionType::Pains],
            Self::ProblemUp => &[SuggestionType::ProblemUp],
            Self::RefineIdea => &[SuggestionType::OfferConcepts],
            Self::NextSteps => &[SuggestionType::NextSteps],
        }
    }
}

impl TryFrom<u8> for WorkshopStep {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_number(value).ok_or_else(|| format!("unknown workshop step: {value}"))
    }
}

impl From<WorkshopStep> for u8 {
    fn from(step: WorkshopStep) -> Self {
        step.number()
    }
}

impl fmt::Display for WorkshopStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.title())
    }
}

/// Closed vocabulary of suggestion kinds the host UI can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionType {
    BigIdea,
    UnderlyingGoal,
    AntiGoals,
    TriggerEvents,
    Jobs,
    TargetBuyers,
    Pains,
    ProblemUp,
    OfferConcepts,
    NextSteps,
}

impl SuggestionType {
    pub const ALL: [SuggestionType; 10] = [
        Self::BigIdea,
        Self::UnderlyingGoal,
        Self::AntiGoals,
        Self::TriggerEvents,
        Self::Jobs,
        Self::TargetBuyers,
        Self::Pains,
        Self::ProblemUp,
        Self::OfferConcepts,
        Self::NextSteps,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigIdea => "big-idea",
            Self::UnderlyingGoal => "underlying-goal",
            Self::AntiGoals => "anti-goals",
            Self::TriggerEvents => "trigger-events",
            Self::Jobs => "jobs",
            Self::TargetBuyers => "target-buyers",
            Self::Pains => "pains",
            Self::ProblemUp => "problem-up",
            Self::OfferConcepts => "offer-concepts",
            Self::NextSteps => "next-steps",
        }
    }

    /// The step whose screen offers this suggestion type.
    pub fn step(&self) -> WorkshopStep {
        match self {
            Self::BigIdea => WorkshopStep::BigIdea,
            Self::UnderlyingGoal | Self::AntiGoals => WorkshopStep::UnderlyingGoal,
            Self::TriggerEvents => WorkshopStep::TriggerEvents,
            Self::Jobs => WorkshopStep::Jobs,
            Self::TargetBuyers => WorkshopStep::TargetBuyers,
            Self::Pains => WorkshopStep::Painstorming,
            Self::ProblemUp => WorkshopStep::ProblemUp,
            Self::OfferConcepts => WorkshopStep::RefineIdea,
            Self::NextSteps => WorkshopStep::NextSteps,
        }
    }
}

impl fmt::Display for SuggestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuggestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown suggestion type: {s}"))
    }
}

/// A single AI-proposed candidate value, not yet accepted into the workshop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
}

impl Suggestion {
    pub fn new(content: impl Into<String>, suggestion_type: SuggestionType) -> Self {
        Self {
            id: format!("suggestion_{}", Uuid::new_v4()),
            content: content.into(),
            suggestion_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_context: Option<u8>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>, step: Option<WorkshopStep>) -> Self {
        Self {
            id: format!("msg_{}", Uuid::new_v4()),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            step_context: step.map(WorkshopStep::number),
        }
    }

    pub fn user(content: impl Into<String>, step: WorkshopStep) -> Self {
        Self::new(MessageRole::User, content, Some(step))
    }

    pub fn assistant(content: impl Into<String>, step: WorkshopStep) -> Self {
        Self::new(MessageRole::Assistant, content, Some(step))
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content, None)
    }
}

/// Who created a workshop record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    #[default]
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PainType {
    Functional,
    Emotional,
    Social,
    Anticipated,
    #[default]
    Unknown,
}

impl PainType {
    /// Lenient mapping from model output ("Emotional Problems", "SOCIAL", ...).
    pub fn from_label(label: &str) -> Self {
        let lower = label.trim().to_lowercase();
        if lower.starts_with("functional") {
            Self::Functional
        } else if lower.starts_with("emotional") {
            Self::Emotional
        } else if lower.starts_with("social") {
            Self::Social
        } else if lower.starts_with("anticipated") {
            Self::Anticipated
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Functional => "functional",
            Self::Emotional => "emotional",
            Self::Social => "social",
            Self::Anticipated => "anticipated",
            Self::Unknown => "unknown",
        }
    }
}

impl<'de> Deserialize<'de> for PainType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Self::from_label).unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pain {
    pub id: String,
    pub description: String,
    #[serde(rename = "type", default)]
    pub pain_type: PainType,
    #[serde(default)]
    pub is_fire: bool,
    pub buyer_segment: String,
    #[serde(default)]
    pub source: RecordSource,
}

/// Pains grouped by reconciled buyer segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerSegmentPainMap {
    #[serde(default)]
    pub buyer_segment_pains: BTreeMap<String, Vec<Pain>>,
    #[serde(default)]
    pub overlapping_pains: Vec<Pain>,
}

impl BuyerSegmentPainMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts into the bucket named by `pain.buyer_segment`. A pain whose
    /// description already exists in that bucket is merged into the existing
    /// record instead (FIRE flag OR-ed, unknown type upgraded); returns false.
    pub fn insert(&mut self, pain: Pain) -> bool {
        let bucket = if pain.buyer_segment == OVERLAPPING_SEGMENT {
            &mut self.overlapping_pains
        } else {
            self.buyer_segment_pains
                .entry(pain.buyer_segment.clone())
                .or_default()
        };

        let key = pain.description.trim();
        if let Some(existing) = bucket.iter_mut().find(|p| p.description.trim() == key) {
            existing.is_fire |= pain.is_fire;
            if existing.pain_type == PainType::Unknown {
                existing.pain_type = pain.pain_type;
            }
            return false;
        }
        bucket.push(pain);
        true
    }

    pub fn bucket_len(&self, segment: &str) -> usize {
        if segment == OVERLAPPING_SEGMENT {
            self.overlapping_pains.len()
        } else {
            self.buyer_segment_pains.get(segment).map_or(0, Vec::len)
        }
    }

    pub fn pains_for(&self, segment: &str) -> &[Pain] {
        if segment == OVERLAPPING_SEGMENT {
            &self.overlapping_pains
        } else {
            self.buyer_segment_pains
                .get(segment)
                .map(Vec::as_slice)
                .unwrap_or(&[])
        }
    }

    pub fn segments(&self) -> Vec<&str> {
        self.buyer_segment_pains.keys().map(String::as_str).collect()
    }

    /// All pains, segment buckets first (alphabetical), overlapping last.
    pub fn iter(&self) -> impl Iterator<Item = &Pain> {
        self.buyer_segment_pains
            .values()
            .flatten()
            .chain(self.overlapping_pains.iter())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
