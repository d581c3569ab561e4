use serde::{Deserialize, Serialize};

use crate::{ChatMessage, Pain, RecordSource};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BigIdea {
    pub description: String,
    pub target_customers: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UnderlyingGoal {
    pub business_goal: String,
    pub constraints: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AntiGoal {
    pub id: String,
    pub category: String,
    pub description: String,
    pub source: RecordSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TriggerEvent {
    pub id: String,
    pub description: String,
    pub source: RecordSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub description: String,
    pub is_overarching: bool,
    pub source: RecordSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Market {
    pub id: String,
    pub name: String,
    pub source: RecordSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Buyer {
    pub id: String,
    pub name: String,
    pub description: String,
    pub source: RecordSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub description: String,
    pub source: RecordSource,
}

/// The focused subset chosen on the Problem Up step (ids into pains/buyers).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProblemUp {
    pub selected_pains: Vec<String>,
    pub selected_buyers: Vec<String>,
    pub narrowed_problem: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Offer {
    pub id: String,
    pub name: String,
    pub description: String,
    pub source: RecordSource,
}

/// Snapshot of the host application's workshop document. The pipeline reads
/// it and never writes back; accepted suggestions are recorded by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkshopState {
    pub big_idea: BigIdea,
    pub underlying_goal: UnderlyingGoal,
    pub anti_goals: Vec<AntiGoal>,
    pub trigger_events: Vec<TriggerEvent>,
    pub jobs: Vec<Job>,
    pub markets: Vec<Market>,
    pub target_buyers: Vec<Buyer>,
    pub pains: Vec<Pain>,
    pub problems: Vec<Problem>,
    pub problem_up: ProblemUp,
    pub offers: Vec<Offer>,
    pub next_steps: Vec<String>,
    pub chat_history: Vec<ChatMessage>,
    pub website_summary: Option<String>,
}

impl WorkshopState {
    /// Canonical buyer segment names: target buyers, or markets when no
    /// buyers have been named yet.
    pub fn buyer_segment_names(&self) -> Vec<String> {
        let from_buyers: Vec<String> = self
            .target_buyers
            .iter()
            .map(|b| b.name.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        if !from_buyers.is_empty() {
            return from_buyers;
        }
        self.markets
            .iter()
            .map(|m| m.name.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect()
    }

    pub fn overarching_job(&self) -> Option<&Job> {
        self.jobs
            .iter()
            .find(|j| j.is_overarching)
            .or_else(|| self.jobs.first())
    }

    pub fn fire_pains(&self) -> impl Iterator<Item = &Pain> {
        self.pains.iter().filter(|p| p.is_fire)
    }

    /// Pains picked on the Problem Up step, or every FIRE pain when nothing
    /// has been selected.
    pub fn selected_pains(&self) -> Vec<&Pain> {
        if self.problem_up.selected_pains.is_empty() {
            return self.fire_pains().collect();
        }
        self.pains
            .iter()
            .filter(|p| self.problem_up.selected_pains.contains(&p.id))
            .collect()
    }
}
