//! Rule-based filter run before any model call.
//!
//! Rules are applied in order and the first failing rule decides the
//! outcome: length, general-knowledge openers, data keywords, generic
//! definitional questions.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};

pub const MIN_QUESTION_LEN: usize = 10;
pub const MAX_QUESTION_LEN: usize = 500;

const DATA_SUGGESTION: &str = "Ask about your application data, for example \
\"How many leads were created this month?\" or \"Show opportunities by stage\".";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl QuestionCheck {
    fn accept() -> Self {
        Self {
            valid: true,
            reason: None,
            suggestion: None,
        }
    }

    fn reject(reason: &str, suggestion: Option<&str>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.to_string()),
            suggestion: suggestion.map(str::to_string),
        }
    }
}

static GENERAL_KNOWLEDGE_OPENERS: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)^(how\s+do\s+i|how\s+can\s+i|how\s+to|how\s+does|explain|who\s+is|who\s+was|who\s+are|define|definition\s+of|tell\s+me\s+about|tell\s+me\s+a|write|translate|summari[sz]e\s+the\s+(book|article|text)|can\s+you\s+explain|what\s+does\s+\S+\s+mean|what\s+is\s+the\s+meaning|why\s+do|why\s+does|is\s+it\s+true|give\s+me\s+a\s+recipe|recommend\s+a|help\s+me\s+write|compose|generate\s+a\s+(poem|story|essay))\b",
    )
});

static DATA_KEYWORDS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        // query verbs
        r"(?i)\b(show|list|count|sum|total|average|avg|mean|top|bottom|how\s+many|how\s+much|find|get|display|compare|rank|highest|lowest|most|least|maximum|minimum|max|min|trend|breakdown|distribution|percentage|ratio|number\s+of)\b",
        // data nouns
        r"(?i)\b(sales?|revenue|projects?|tasks?|leads?|opportunit(y|ies)|accounts?|contacts?|customers?|clients?|deals?|pipeline|invoices?|orders?|employees?|candidates?|applicants?|jobs?|tickets?|incidents?|assets?|budgets?|costs?|expenses?|hours|timesheets?|resources?|portfolios?|milestones?|users?|teams?|departments?|records?|rows?|status|stage|owner|amount|value|rate)\b",
        // relational / filter keywords
        r"(?i)\b(by|where|group\s+by|from|between|per|each|greater\s+than|less\s+than|more\s+than|fewer\s+than|above|below|filter|grouped|sorted|order\s+by)\b",
        // temporal tokens
        r"(?i)\b(year|month|quarter|week|day|today|yesterday|ytd|mtd|annual|monthly|weekly|daily|last|this|since|before|after|(19|20)\d{2})\b",
        // visualization nouns
        r"(?i)\b(chart|graph|plot|dashboard|report|table|visuali[sz]ation|kpi|metrics?)\b",
    ])
    .expect("keyword family patterns are valid regex literals")
});

static GENERIC_DEFINITION: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)^(what|how|why)\s+(is|are|do|does)\s+(a|an|the)\s+\w+\s+(that|which|who)\b")
});

static GENERAL_TOPICS: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\b(meaning\s+of\s+life|capital\s+of|weather|recipe|artificial\s+intelligence|machine\s+learning|history\s+of|stock\s+price|tell\s+a\s+joke|a\s+joke|poem|song\s+lyrics|world\s+war|solar\s+system|programming\s+language|python\s+code|javascript|the\s+universe|climate\s+change)\b",
    )
});

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("classifier pattern is a valid regex literal")
}

/// Decide whether free text is a question about application data.
pub fn is_question_suitable(question: &str) -> QuestionCheck {
    let trimmed = question.trim();
    let length = trimmed.chars().count();

    if length < MIN_QUESTION_LEN {
        return QuestionCheck::reject(
            "Question is too short",
            Some("Describe the data you want to see in a full sentence."),
        );
    }
    if length > MAX_QUESTION_LEN {
        return QuestionCheck::reject(
            "Question is too long",
            Some("Keep the question under 500 characters and focus on one data request."),
        );
    }

    if GENERAL_KNOWLEDGE_OPENERS.is_match(trimmed) {
        return QuestionCheck::reject(
            "This looks like a general knowledge question, not a data question",
            Some(DATA_SUGGESTION),
        );
    }

    if !DATA_KEYWORDS.is_match(trimmed) {
        return QuestionCheck::reject(
            "The question does not reference any application data",
            Some(DATA_SUGGESTION),
        );
    }

    if GENERIC_DEFINITION.is_match(trimmed) || GENERAL_TOPICS.is_match(trimmed) {
        return QuestionCheck::reject(
            "This looks like a general knowledge question, not a data question",
            Some(DATA_SUGGESTION),
        );
    }

    QuestionCheck::accept()
}
