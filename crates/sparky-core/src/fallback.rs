use sparky_schema::{Suggestion, SuggestionType};

/// Canned suggestions shown when the model cannot be reached or its answer is unusable.
pub fn fallback_contents(suggestion_type: SuggestionType) -> &'static [&'static str] {
    match suggestion_type {
        SuggestionType::BigIdea => &[
            "A done-for-you service that removes a tedious task your past clients complain about",
            "A productized version of the work you already do, sold at a fixed price",
            "A short online program that teaches your expertise to people just starting out",
        ],
        SuggestionType::UnderlyingGoal => &[
            "Replace my current income within the next 12 months",
            "Build a business that gives me control over my schedule",
            "Create a reliable second income stream without hiring staff",
        ],
        SuggestionType::AntiGoals => &[
            "Market: Selling to buyers who need months of procurement approval",
            "Offer: Custom one-off projects that cannot be repeated",
            "Delivery: Being available around the clock for support",
            "Lifestyle: Working evenings and weekends to keep up",
            "Values: Winning customers with pressure or false urgency",
        ],
        SuggestionType::TriggerEvents => &[
            "Losing a key customer or contract",
            "Hiring their first employee",
            "A new regulation or deadline that affects them",
            "A sudden jump in demand they cannot handle",
            "A competitor launching something they cannot match",
        ],
        SuggestionType::Jobs => &[
            "Help me grow my business without working longer hours",
            "Help me find customers who value my work",
            "Help me deliver consistent results for every client",
        ],
        SuggestionType::TargetBuyers => &[
            "Solo service providers who are fully booked and want to scale",
            "Small teams of two to ten people without dedicated operations staff",
            "Established businesses entering a new market",
        ],
        SuggestionType::Pains => &[
            "Spends too much time on repetitive admin work [functional]",
            "Worries about where the next customer will come from [emotional]",
            "Feels judged by peers for not growing faster [social]",
            "Fears a slow season will wipe out savings [anticipated]",
        ],
        SuggestionType::ProblemUp => &[
            "Focus on the pain your buyers mention most often and pay to fix today",
            "Pick the problem that is frequent, intense and expensive for one segment",
        ],
        SuggestionType::OfferConcepts => &[
            "Starter Package: a fixed-scope, fixed-price entry offer",
            "Done-With-You Program: guided implementation over six weeks",
            "Ongoing Membership: monthly support with templates and office hours",
        ],
        SuggestionType::NextSteps => &[
            "Interview five potential buyers about their biggest problem",
            "Write a one-page description of your offer",
            "Share the offer with ten people in your network and ask for feedback",
            "Set a date to make your first sales pitch",
        ],
    }
}

pub fn fallback_suggestions(suggestion_type: SuggestionType) -> Vec<Suggestion> {
    fallback_contents(suggestion_type)
        .iter()
        .map(|content| Suggestion::new(*content, suggestion_type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_fallbacks_with_unique_ids() {
        for ty in SuggestionType::ALL {
            let suggestions = fallback_suggestions(ty);
            assert!(!suggestions.is_empty(), "{ty}");
            assert!(suggestions.iter().all(|s| s.suggestion_type == ty));
            let mut ids: Vec<&str> = suggestions.iter().map(|s| s.id.as_str()).collect();
            ids.dedup();
            assert_eq!(ids.len(), suggestions.len());
        }
    }

    #[test]
    fn job_fallbacks_follow_statement_pattern() {
        assert!(fallback_contents(SuggestionType::Jobs)
            .iter()
            .all(|s| s.starts_with("Help me")));
    }
}
