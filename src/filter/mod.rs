// Research-content filter: a conjunction of independent rules.
//
// Each rule is a pure predicate over a SourcePost. A post qualifies only if
// every rule accepts it. New rules are added here (or built by the caller)
// without touching the relay loop.

pub mod rules;

use anyhow::Result;

use crate::source::models::SourcePost;

pub use rules::{CategoryAboutRule, ExcludedPatternsRule, ExcludedPhrasesRule, NonEmptyTitleRule};

/// Title phrases that mark forum housekeeping threads.
pub const DEFAULT_EXCLUDED_PHRASES: [&str; 4] = [
    "read this before posting",
    "read before posting",
    "posting guidelines",
    "posting rules",
];

/// One filter rule. Implementations must be deterministic and side-effect
/// free: the same post always gets the same answer.
pub trait Rule: Send + Sync {
    /// Stable rule name, used in skip logs.
    fn name(&self) -> &'static str;

    fn accepts(&self, post: &SourcePost) -> bool;
}

/// Configurable parts of the rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    pub excluded_phrases: Vec<String>,
    /// Regular expressions matched against the title.
    pub excluded_patterns: Vec<String>,
    /// Apply phrases and patterns to the listing excerpt too.
    pub match_excerpt: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            excluded_phrases: DEFAULT_EXCLUDED_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            excluded_patterns: Vec::new(),
            match_excerpt: false,
        }
    }
}

/// All-must-pass rule set.
#[derive(Default)]
pub struct Filter {
    rules: Vec<Box<dyn Rule>>,
}

impl Filter {
    /// A filter with no rules accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// The standard rule set. Fails only if an exclusion pattern is not a
    /// valid regular expression.
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        let mut filter = Self::new()
            .with_rule(NonEmptyTitleRule)
            .with_rule(CategoryAboutRule)
            .with_rule(
                ExcludedPhrasesRule::new(&config.excluded_phrases)
                    .matching_excerpt(config.match_excerpt),
            );

        if !config.excluded_patterns.is_empty() {
            filter = filter.with_rule(
                ExcludedPatternsRule::new(&config.excluded_patterns)?
                    .matching_excerpt(config.match_excerpt),
            );
        }

        Ok(filter)
    }

    pub fn accepts(&self, post: &SourcePost) -> bool {
        self.first_rejection(post).is_none()
    }

    /// Name of the first rule that rejects `post`, if any.
    pub fn first_rejection(&self, post: &SourcePost) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| !rule.accepts(post))
            .map(|rule| rule.name())
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}
