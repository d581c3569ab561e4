//! Deterministic responder for local development and tests.
//!
//! Responses are keyed off phrases in the system prompt. Never register this
//! transport in a production environment.

use anyhow::Result;
use async_trait::async_trait;

use crate::{LlmProvider, LlmRequest, LlmResponse};

const EXTRACTION: &str = r#"{
  "buyerSegmentPains": {
    "Example Segment": [
      {"description": "Spends hours every week on admin work", "type": "functional", "isFire": true},
      {"description": "Worries about falling behind competitors", "type": "emotional", "isFire": false}
    ]
  },
  "overlappingPains": [
    {"description": "Hard to predict monthly income", "type": "anticipated", "isFire": false}
  ]
}"#;

const ANTI_GOALS: &str = r#"{
  "market": ["Selling to enterprise procurement departments"],
  "offer": ["Custom one-off projects that cannot be productized"],
  "delivery": ["Anything that requires being on call at weekends"],
  "lifestyle": ["Working more than 45 hours a week"],
  "values": ["Growth tactics that rely on pressure selling"]
}"#;

const JOBS: &str = r#"{
  "overarchingJobStatement": "Help me grow my business without working longer hours",
  "supportingJobStatements": [
    "Help me find qualified leads every week",
    "Help me turn enquiries into paying customers",
    "Help me deliver my service consistently"
  ]
}"#;

const TRIGGER_EVENTS: &str = "1. Losing a major client unexpectedly\n\
2. Hiring the first employee\n\
3. A competitor launching a cheaper alternative\n\
4. Missing a tax deadline\n\
5. Being asked for a referral they cannot fulfil";

const PAINSTORMING: &str = "## Target Buyer Segment: Example Segment\n\
### Functional Problems\n\
- Spends hours every week on admin work\n\
### Emotional Problems\n\
- Worries about falling behind competitors\n\
### FIRE Problems\n\
- Spends hours every week on admin work";

const PROBLEM_UP: &str = r#"{
  "focusedProblems": [
    "Spends hours every week on admin work",
    "Hard to predict monthly income"
  ],
  "rationale": "Both pains are frequent, intense and expensive for the same buyers."
}"#;

const OFFERS: &str = r#"{
  "offers": [
    {"name": "Admin Autopilot", "description": "A done-for-you weekly admin service."},
    {"name": "Cash Flow Clinic", "description": "A monthly forecasting session with templates."}
  ]
}"#;

const NEXT_STEPS: &str = "1. Interview five people from the chosen buyer segment\n\
2. Write a one-page offer description\n\
3. Pre-sell the offer to three prospects\n\
4. Set a launch date";

const TARGET_BUYERS: &str = r#"{
  "targetBuyers": [
    {"name": "Solo Consultants", "description": "Independent advisers billing by the day."},
    {"name": "Small Agencies", "description": "Teams of 2-10 delivering client projects."}
  ]
}"#;

const UNDERLYING_GOAL: &str = r#"{
  "suggestions": [
    "Replace my salary within 12 months",
    "Build a business that runs without me for four weeks a year"
  ]
}"#;

const BIG_IDEA: &str = "1. A subscription bookkeeping service for freelancers\n\
2. An online course that teaches agencies to productize their services\n\
3. A matchmaking platform for local tradespeople";

/// Ordered most-specific first; the first phrase found in the system prompt wins.
const RESPONSES: &[(&str, &str)] = &[
    ("extract the pains", EXTRACTION),
    ("anti-goals", ANTI_GOALS),
    ("job statements", JOBS),
    ("trigger events", TRIGGER_EVENTS),
    ("painstorming", PAINSTORMING),
    ("problem up", PROBLEM_UP),
    ("offer concepts", OFFERS),
    ("next steps", NEXT_STEPS),
    ("target buyers", TARGET_BUYERS),
    ("underlying goal", UNDERLYING_GOAL),
    ("big idea", BIG_IDEA),
];

#[derive(Debug, Clone, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn respond(system: &str, user: &str, model: &str) -> String {
        let system = system.to_lowercase();
        RESPONSES
            .iter()
            .find(|(needle, _)| system.contains(needle))
            .map(|(_, body)| body.to_string())
            .unwrap_or_else(|| {
                let first_line = user.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
                format!(
                    "[mock:{model}] Good question! Here is a thought on \"{}\".",
                    first_line.trim()
                )
            })
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let system = request.system.as_deref().unwrap_or_default();
        let user = request.last_user_text().unwrap_or_default();
        let text = Self::respond(system, user, &request.model);
        tracing::debug!(model = %request.model, "mock transport answered");
        Ok(LlmResponse::text(text))
    }
}
