//! Prompt text for every suggestion type plus the guided questions per step.
//!
//! Each system prompt names its task in plain words ("job statements",
//! "offer concepts", ...). The persona and the JSON-only instruction stay
//! free of those task names; upstream workshop context always goes into the
//! user prompt.

use sparky_schema::{SuggestionType, WorkshopStep};

pub const SPARKY_PERSONA: &str = "You are Sparky, an upbeat and practical business coach who guides \
founders through the Buyer Breakthrough Workshop. You write in plain, concrete language, avoid \
jargon and keep every idea specific to the founder's situation.";

pub const CHAT_GUIDANCE: &str = "Answer the founder's question in at most three short paragraphs. \
Ground the answer in the workshop context you are given. If the question is unrelated to building \
their business, steer gently back to the current exercise.";

pub const JSON_ONLY_INSTRUCTION: &str = "Respond with a single JSON object only. Do not wrap it in \
markdown fences and do not add any commentary before or after it.";

pub const CHAT_APOLOGY: &str = "Sorry, I couldn't come up with an answer just now. Please try asking \
again in a moment.";

pub const PAIN_EXTRACTION_SYSTEM: &str = "Extract the pains from the text below into structured \
data. Group them by buyer segment, using the segment labels exactly as they appear in the headers. \
Pains that apply to every segment belong in overlappingPains. For each pain give a short \
description, its type (functional, emotional, social or anticipated) and isFire: true when the text \
marks it as FIRE (frequent, intense, recurring, expensive).";

pub const PAIN_EXTRACTION_FORMAT: &str = r#"Output format:
{"buyerSegmentPains": {"<segment>": [{"description": "...", "type": "functional", "isFire": false}]}, "overlappingPains": []}"#;

/// Prompt pieces for one suggestion type.
#[derive(Debug, Clone, Copy)]
pub struct StepTemplate {
    pub suggestion_type: SuggestionType,
    pub system: &'static str,
    /// Lead-in when the founder has not written anything for the step yet.
    pub brainstorm: &'static str,
    /// Lead-in when there is founder input to improve on.
    pub refine: &'static str,
    /// Output contract appended to the user prompt.
    pub output: &'static str,
}

const TEMPLATES: [StepTemplate; 10] = [
    StepTemplate {
        suggestion_type: SuggestionType::BigIdea,
        system: "Help the founder shape their big idea: one sentence describing what they sell \
and who it is for.",
        brainstorm: "Suggest three distinct business ideas that fit the context below.",
        refine: "Suggest three sharper rewrites of the founder's current idea, each keeping its core.",
        output: "Return a numbered list of exactly three ideas, one sentence each.",
    },
    StepTemplate {
        suggestion_type: SuggestionType::UnderlyingGoal,
        system: "Help the founder name the underlying goal behind the business: the personal or \
financial outcome it has to deliver for them.",
        brainstorm: "Suggest three underlying goals that would make this business worth building.",
        refine: "Suggest three clearer, measurable versions of the founder's stated goal.",
        output: r#"Return {"suggestions": ["...", "...", "..."]}."#,
    },
    StepTemplate {
        suggestion_type: SuggestionType::AntiGoals,
        system: "Help the founder list anti-goals: outcomes they refuse to accept while building \
the business. Cover the five categories Market, Offer, Delivery, Lifestyle and Values.",
        brainstorm: "Suggest one or two items for each category, based on the context below.",
        refine: "Suggest items for the categories the founder has not covered yet and sharpen the rest.",
        output: r#"Return {"market": [], "offer": [], "delivery": [], "lifestyle": [], "values": []} with every key present."#,
    },
    StepTemplate {
        suggestion_type: SuggestionType::TriggerEvents,
        system: "Help the founder find trigger events: specific moments in a buyer's life or \
business that make them start looking for a solution right now.",
        brainstorm: "Suggest five trigger events for the buyers of this business.",
        refine: "Suggest five more trigger events that differ from the ones already listed.",
        output: "Return a numbered list of five short, concrete events.",
    },
    StepTemplate {
        suggestion_type: SuggestionType::Jobs,
        system: "Help the founder write job statements in the Jobs-to-be-Done style. Every \
statement follows the pattern \"Help me [VERB] my [OBJECT] [CONTEXT]\" and starts with \"Help me\".",
        brainstorm: "Write one overarching statement and three to five supporting statements.",
        refine: "Improve the founder's statements and fill gaps with new supporting statements.",
        output: r#"Return {"overarchingJobStatement": "Help me ...", "supportingJobStatements": ["Help me ...", "..."]}."#,
    },
    StepTemplate {
        suggestion_type: SuggestionType::TargetBuyers,
        system: "Help the founder choose target buyers: distinct, reachable segments of people or \
companies who have the job to be done and can pay for it.",
        brainstorm: "Suggest three to five buyer segments.",
        refine: "Suggest segments that complement or narrow the ones the founder listed.",
        output: r#"Return {"targetBuyers": [{"name": "...", "description": "..."}]}."#,
    },
    StepTemplate {
        suggestion_type: SuggestionType::Pains,
        system: "Run a painstorming session. For each buyer segment list the problems it faces \
under the headings Functional Problems, Emotional Problems, Social Problems and Anticipated \
Problems, then repeat the most urgent ones under FIRE Problems (frequent, intense, recurring, \
expensive).",
        brainstorm: "Painstorm every segment listed below.",
        refine: "Add problems the founder has missed for each segment listed below.",
        output: "Start each segment with a line \"## Target Buyer Segment: <name>\" using the exact \
segment name, then the headings, then one bullet per problem.",
    },
    StepTemplate {
        suggestion_type: SuggestionType::ProblemUp,
        system: "Help the founder problem up: narrow the pain list down to the few problems worth \
building an offer around, favouring FIRE pains shared by the chosen buyers.",
        brainstorm: "Pick the two or three problems to focus on.",
        refine: "Tighten the founder's narrowed problem and say which pains it covers.",
        output: r#"Return {"focusedProblems": ["...", "..."], "rationale": "..."}."#,
    },
    StepTemplate {
        suggestion_type: SuggestionType::OfferConcepts,
        system: "Help the founder draft offer concepts: named, concrete offers that solve the \
focused problems for the chosen buyers.",
        brainstorm: "Suggest three offer concepts.",
        refine: "Suggest improved versions of the founder's offers and one new alternative.",
        output: r#"Return {"offers": [{"name": "...", "description": "..."}]}."#,
    },
    StepTemplate {
        suggestion_type: SuggestionType::NextSteps,
        system: "Help the founder plan next steps: small actions they can finish in the coming two \
weeks to validate the offer with real buyers.",
        brainstorm: "Suggest four next actions.",
        refine: "Suggest actions that complement the ones the founder already planned.",
        output: "Return a numbered list of four actions, each starting with a verb.",
    },
];

pub fn template(suggestion_type: SuggestionType) -> &'static StepTemplate {
    let index = SuggestionType::ALL
        .iter()
        .position(|t| *t == suggestion_type)
        .unwrap_or_default();
    &TEMPLATES[index]
}

/// Guided questions asked, in order, before suggestions are generated for a step.
pub fn guided_questions(step: WorkshopStep) -> &'static [&'static str] {
    match step {
        WorkshopStep::Welcome | WorkshopStep::Summary => &[],
        WorkshopStep::BigIdea => &[
            "In one sentence, what do you want to sell?",
            "Who do you picture buying it?",
        ],
        WorkshopStep::UnderlyingGoal => &[
            "What does this business need to give you, personally or financially?",
            "What would you refuse to do to get there?",
        ],
        WorkshopStep::TriggerEvents => &[
            "Think of a recent customer. What happened right before they reached out?",
            "What changes in their world make the problem impossible to ignore?",
        ],
        WorkshopStep::Jobs => &[
            "What is the big thing your buyers are trying to get done?",
            "What smaller tasks do they have to handle along the way?",
        ],
        WorkshopStep::TargetBuyers => &[
            "Which kinds of people or companies have this job most often?",
            "Which of them can you reach easily, and which can afford to pay?",
        ],
        WorkshopStep::Painstorming => &[
            "What frustrates your buyers most about how they handle this today?",
            "Which of those problems cost them real time or money every week?",
        ],
        WorkshopStep::ProblemUp => &["Which pains come up again and again across your buyers?"],
        WorkshopStep::RefineIdea => &[
            "Knowing these problems, how could you package a solution?",
            "What would make it a no-brainer to buy?",
        ],
        WorkshopStep::NextSteps => {
            &["What is the smallest step you could take this week to test the offer?"]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASK_PHRASES: [&str; 11] = [
        "extract the pains",
        "anti-goals",
        "job statements",
        "trigger events",
        "painstorming",
        "problem up",
        "offer concepts",
        "next steps",
        "target buyers",
        "underlying goal",
        "big idea",
    ];

    #[test]
    fn every_type_has_its_own_template() {
        for ty in SuggestionType::ALL {
            assert_eq!(template(ty).suggestion_type, ty);
        }
    }

    #[test]
    fn shared_text_mentions_no_task_phrase() {
        for text in [SPARKY_PERSONA, CHAT_GUIDANCE, JSON_ONLY_INSTRUCTION] {
            let lower = text.to_lowercase();
            for phrase in TASK_PHRASES {
                assert!(!lower.contains(phrase), "{phrase:?} in {text:?}");
            }
        }
    }

    #[test]
    fn each_system_prompt_leads_with_its_own_task_phrase() {
        for ty in SuggestionType::ALL {
            let lower = template(ty).system.to_lowercase();
            let first = TASK_PHRASES.iter().find(|p| lower.contains(*p)).copied();
            let expected = match ty {
                SuggestionType::BigIdea => "big idea",
                SuggestionType::UnderlyingGoal => "underlying goal",
                SuggestionType::AntiGoals => "anti-goals",
                SuggestionType::TriggerEvents => "trigger events",
                SuggestionType::Jobs => "job statements",
                SuggestionType::TargetBuyers => "target buyers",
                SuggestionType::Pains => "painstorming",
                SuggestionType::ProblemUp => "problem up",
                SuggestionType::OfferConcepts => "offer concepts",
                SuggestionType::NextSteps => "next steps",
            };
            assert_eq!(first, Some(expected), "{ty}");
        }
        assert!(PAIN_EXTRACTION_SYSTEM.to_lowercase().starts_with("extract the pains"));
    }

    #[test]
    fn templated_steps_have_questions() {
        for step in WorkshopStep::ALL {
            let has_types = !step.suggestion_types().is_empty();
            assert_eq!(!guided_questions(step).is_empty(), has_types, "{step}");
        }
    }
}
