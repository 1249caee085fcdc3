//! Ordered, first-match-wins classification of free-text messages.

use serde::{Deserialize, Serialize};

use crate::keywords::extract_keywords;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Thanks,
    Help,
    Register,
    Search,
    Unknown,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Thanks => "thanks",
            Self::Help => "help",
            Self::Register => "register",
            Self::Search => "search",
            Self::Unknown => "unknown",
        }
    }
}

/// Which rule produced an intent, for logging. Serialize-only: phrases borrow the rule tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentRule {
    Phrase(&'static str),
    KeywordFallback,
    NoMatch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub intent: Intent,
    pub rule: IntentRule,
}

pub const GREETING_PHRASES: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "sup",
    "what's up",
    "whatsup",
];
pub const THANKS_PHRASES: &[&str] = &["thank", "thanks", "appreciate", "grateful"];
pub const HELP_PHRASES: &[&str] =
    &["what can you do", "how does this work", "what is this", "help me", "what do you do"];
pub const REGISTER_PHRASES: &[&str] = &[
    "register",
    "sign up",
    "create account",
    "add my business",
    "list my business",
    "become vendor",
];
pub const SEARCH_PHRASES: &[&str] =
    &["need", "want", "looking", "find", "where", "who", "buy", "get", "order", "search"];

const PHRASE_RULES: &[(Intent, &[&str])] = &[
    (Intent::Greeting, GREETING_PHRASES),
    (Intent::Thanks, THANKS_PHRASES),
    (Intent::Help, HELP_PHRASES),
    (Intent::Register, REGISTER_PHRASES),
    (Intent::Search, SEARCH_PHRASES),
];

/// Phrases are plain substring matches against the whole lowercased message, so a short
/// phrase such as `hi` also fires inside longer words.
pub fn classify(text: &str) -> Classification {
    let lowered = text.to_lowercase();

    for (intent, phrases) in PHRASE_RULES {
        if let Some(phrase) = phrases.iter().find(|phrase| lowered.contains(*phrase)) {
            return Classification { intent: *intent, rule: IntentRule::Phrase(phrase) };
        }
    }

    if !extract_keywords(&lowered).is_empty() {
        return Classification { intent: Intent::Search, rule: IntentRule::KeywordFallback };
    }

    Classification { intent: Intent::Unknown, rule: IntentRule::NoMatch }
}
