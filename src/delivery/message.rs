// Message template: turns a SourcePost into the text posted to a board.
//
// Placeholders are substituted in one left-to-right pass. Substituted text
// is copied out verbatim and never scanned again, so a title containing
// "{authors}" stays literally "{authors}".

use crate::output::truncate_chars;
use crate::source::models::SourcePost;

pub const DEFAULT_TEMPLATE: &str =
    "New research post on ethresear.ch: {title}\n\nAuthor(s): {authors}\n\n{reddit_url}";

pub const DEFAULT_AUTHOR_SEPARATOR: &str = ", ";

/// Reddit rejects submission titles longer than this.
pub const MAX_TITLE_CHARS: usize = 300;

const UNKNOWN_AUTHOR: &str = "unknown";

/// What gets submitted: a title line and a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedMessage {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    template: String,
    author_separator: String,
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE, DEFAULT_AUTHOR_SEPARATOR)
    }
}

impl MessageTemplate {
    pub fn new(template: &str, author_separator: &str) -> Self {
        Self {
            template: template.to_string(),
            author_separator: author_separator.to_string(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn render(&self, post: &SourcePost) -> FormattedMessage {
        let authors = if post.authors.is_empty() {
            UNKNOWN_AUTHOR.to_string()
        } else {
            post.authors.join(&self.author_separator)
        };

        let mut body = String::with_capacity(self.template.len() + post.title.len() + post.url.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            body.push_str(&rest[..open]);
            let candidate = &rest[open..];

            let substitution = candidate.find('}').and_then(|close| {
                let value = match &candidate[1..close] {
                    "reddit_url" => post.url.as_str(),
                    "title" => post.title.as_str(),
                    "authors" => authors.as_str(),
                    "topic_id" => post.topic_id.as_str(),
                    _ => return None,
                };
                Some((value, close + 1))
            });

            match substitution {
                Some((value, consumed)) => {
                    body.push_str(value);
                    rest = &candidate[consumed..];
                }
                None => {
                    // Unknown or unterminated: keep the brace, move on
                    body.push('{');
                    rest = &candidate[1..];
                }
            }
        }
        body.push_str(rest);

        FormattedMessage {
            title: truncate_chars(&post.title, MAX_TITLE_CHARS),
            body,
        }
    }
}
