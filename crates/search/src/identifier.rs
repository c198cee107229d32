//! Recovering the function name a free-text question is about.

use once_cell::sync::Lazy;
use regex::Regex;

/// Optionally dotted identifier token
const TOKEN: &str = r"[\p{L}_]\w*(?:\.[\p{L}_]\w*)*";

/// Relation verbs and verb phrases around which a name is expected
const RELATION_VERBS: &str = r"calls|invokes|uses|affects|imports|depends\s+on|called\s+by|invoked\s+by|used\s+by|imported\s+by|callers\s+of|callees\s+of";

/// Words never returned as identifiers.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "any", "are", "by", "call", "called", "callees", "callers", "calls",
    "chain", "class", "code", "depends", "describe", "do", "does", "explain", "find", "flow",
    "for", "from", "function", "functions", "give", "graph", "how", "impact", "imports", "in",
    "invokes", "is", "it", "its", "list", "me", "method", "methods", "of", "on", "or",
    "please", "sequence", "show", "tell", "that", "the", "this", "to", "uses", "what", "when",
    "where", "which", "who", "why", "with", "work", "works",
];

static CALL_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"({TOKEN})\s*\(\s*\)")).expect("valid regex"));

static AFTER_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{RELATION_VERBS})\s+({TOKEN})")).expect("valid regex")
});

static BEFORE_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)({TOKEN})\s+(?:{RELATION_VERBS})\b")).expect("valid regex")
});

static TRAILING: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"({TOKEN})[\s?!.]*$")).expect("valid regex"));

static ANY_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(TOKEN).expect("valid regex"));

pub struct IdentifierExtractor;

impl IdentifierExtractor {
    /// First valid candidate from the layered heuristics, or `None` when no
    /// graph query can be resolved from `text`.
    #[must_use]
    pub fn extract(text: &str) -> Option<String> {
        let layered = [&*CALL_MARKER, &*AFTER_VERB, &*BEFORE_VERB, &*TRAILING];
        for layer in layered {
            let found = layer
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .find_map(|m| Self::candidate(m.as_str()));
            if found.is_some() {
                return found;
            }
        }

        let tokens: Vec<&str> = ANY_TOKEN.find_iter(text).map(|m| m.as_str()).collect();
        tokens
            .into_iter()
            .rev()
            .find_map(Self::candidate)
    }

    /// Trailing member of a dotted token, if it is a usable identifier.
    fn candidate(token: &str) -> Option<String> {
        let name = token.rsplit('.').next().unwrap_or(token);
        Self::is_valid(name).then(|| name.to_string())
    }

    fn is_valid(name: &str) -> bool {
        name.chars().count() >= 2
            && name.chars().any(char::is_alphabetic)
            && name.chars().all(|c| c.is_alphanumeric() || c == '_')
            && !STOP_WORDS.contains(&name.to_lowercase().as_str())
    }
}
