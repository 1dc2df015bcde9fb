// Built-in filter rules.

use anyhow::{Context, Result};
use regex_lite::Regex;

use super::Rule;
use crate::source::models::SourcePost;

/// Rejects posts whose title is empty or whitespace.
pub struct NonEmptyTitleRule;

impl Rule for NonEmptyTitleRule {
    fn name(&self) -> &'static str {
        "non-empty-title"
    }

    fn accepts(&self, post: &SourcePost) -> bool {
        !post.title.trim().is_empty()
    }
}

/// Rejects Discourse's auto-created "About the X category" threads.
pub struct CategoryAboutRule;

impl Rule for CategoryAboutRule {
    fn name(&self) -> &'static str {
        "category-about"
    }

    fn accepts(&self, post: &SourcePost) -> bool {
        let title = post.title.trim().to_lowercase();
        !(title.starts_with("about the ") && title.ends_with(" category"))
    }
}

/// The text an exclusion rule searches: the title, plus the listing
/// excerpt when `with_excerpt` is set.
fn searched_text(post: &SourcePost, with_excerpt: bool) -> impl Iterator<Item = &str> {
    let excerpt = post.raw_excerpt.as_deref().filter(|_| with_excerpt);
    std::iter::once(post.title.as_str()).chain(excerpt)
}

/// Rejects titles containing any of the configured phrases, ignoring case.
pub struct ExcludedPhrasesRule {
    phrases: Vec<String>,
    match_excerpt: bool,
}

impl ExcludedPhrasesRule {
    pub fn new(phrases: &[String]) -> Self {
        Self {
            phrases: phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            match_excerpt: false,
        }
    }

    /// Also reject posts whose excerpt contains a phrase.
    pub fn matching_excerpt(mut self, enabled: bool) -> Self {
        self.match_excerpt = enabled;
        self
    }
}

impl Rule for ExcludedPhrasesRule {
    fn name(&self) -> &'static str {
        "excluded-phrase"
    }

    fn accepts(&self, post: &SourcePost) -> bool {
        searched_text(post, self.match_excerpt).all(|text| {
            let text = text.to_lowercase();
            !self.phrases.iter().any(|p| text.contains(p.as_str()))
        })
    }
}

/// Rejects titles matching any of the configured regular expressions.
pub struct ExcludedPatternsRule {
    patterns: Vec<Regex>,
    match_excerpt: bool,
}

impl ExcludedPatternsRule {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("Invalid exclusion pattern: {p}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            patterns,
            match_excerpt: false,
        })
    }

    /// Also reject posts whose excerpt matches a pattern.
    pub fn matching_excerpt(mut self, enabled: bool) -> Self {
        self.match_excerpt = enabled;
        self
    }
}

impl Rule for ExcludedPatternsRule {
    fn name(&self) -> &'static str {
        "excluded-pattern"
    }

    fn accepts(&self, post: &SourcePost) -> bool {
        searched_text(post, self.match_excerpt)
            .all(|text| !self.patterns.iter().any(|re| re.is_match(text)))
    }
}
