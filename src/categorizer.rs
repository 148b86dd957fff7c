// 🏷️ Categorizer - Keyword rules as data
// Maps a free-text description to a category label. First matching rule wins.

use serde::{Deserialize, Serialize};

/// Label used when no rule matches
pub const FALLBACK_CATEGORY: &str = "Other";

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Rule ID for tracking
    pub id: String,

    /// Substrings to look for (case-insensitive)
    pub keywords: Vec<String>,

    /// Category to assign
    pub category: String,
}

impl KeywordRule {
    pub fn new(id: &str, keywords: &[&str], category: &str) -> Self {
        KeywordRule {
            id: id.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            category: category.to_string(),
        }
    }

    /// Check if any keyword occurs in the (already lowercased) text
    fn matches_lowered(&self, text_lower: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && text_lower.contains(&keyword.to_lowercase()))
    }

    pub fn matches(&self, text: &str) -> bool {
        self.matches_lowered(&text.to_lowercase())
    }
}

// ============================================================================
// RULE ENGINE
// ============================================================================

/// Ordered rule table. Order is significant: "gas station food" is Food & Dining.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<KeywordRule>,
}

impl RuleEngine {
    /// Create engine from a list of rules (kept in the given order)
    pub fn from_rules(rules: Vec<KeywordRule>) -> Self {
        RuleEngine { rules }
    }

    /// The fixed table used by the transaction store
    pub fn builtin() -> Self {
        RuleEngine::from_rules(vec![
            KeywordRule::new("food", &["grocery", "food", "restaurant", "cafe"], "Food & Dining"),
            KeywordRule::new("transport", &["gas", "uber", "taxi", "transport"], "Transportation"),
            KeywordRule::new("shopping", &["amazon", "shopping", "store"], "Shopping"),
            KeywordRule::new("entertainment", &["netflix", "spotify", "entertainment"], "Entertainment"),
            KeywordRule::new("income", &["salary", "paycheck", "income"], "Income"),
            KeywordRule::new("housing", &["rent", "mortgage", "utilities"], "Housing"),
            KeywordRule::new("health", &["doctor", "hospital", "pharmacy"], "Healthcare"),
        ])
    }

    /// Rule that fires for this description, if any
    pub fn matching_rule(&self, description: &str) -> Option<&KeywordRule> {
        let lowered = description.to_lowercase();
        self.rules.iter().find(|rule| rule.matches_lowered(&lowered))
    }

    /// Category for a description; "Other" when nothing matches
    pub fn categorize(&self, description: &str) -> String {
        self.matching_rule(description)
            .map(|rule| rule.category.clone())
            .unwrap_or_else(|| FALLBACK_CATEGORY.to_string())
    }

    /// Explicit category wins; the heuristic only fills an empty one
    pub fn resolve(&self, explicit: Option<&str>, description: &str) -> String {
        match explicit.map(str::trim) {
            Some(category) if !category.is_empty() => category.to_string(),
            _ => self.categorize(description),
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Categorize with the built-in table
pub fn categorize(description: &str) -> String {
    RuleEngine::builtin().categorize(description)
}

// ============================================================================
// TESTS
// ============================================================================
