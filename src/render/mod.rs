//! Safe rendering of transcript content.
//!
//! Assistant content is expanded as markdown, code blocks are highlighted, and
//! the result is sanitized as the final step. User content is never parsed as
//! markdown: it is escaped as literal text and then goes through the same
//! sanitizer.

pub mod highlight;
pub mod markdown;
pub mod sanitize;

use std::fmt;

use pulldown_cmark::{CowStr, Event, html};

use crate::conversation::errors::ChatResult;
use crate::conversation::message::{Message, Role};
use crate::render::markdown::MarkdownRenderer;
use crate::render::sanitize::Sanitizer;

/// HTML fragment that has passed the sanitizer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SafeHtml(String);

impl SafeHtml {
    /// Borrow the markup.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the markup.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SafeHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SafeHtml {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Markdown, highlighting and sanitizing pipeline.
pub struct Renderer {
    markdown: MarkdownRenderer,
    sanitizer: Sanitizer,
}

impl Renderer {
    /// Build the pipeline.
    ///
    /// # Errors
    /// Returns an error if a built-in pattern fails to compile.
    pub fn new() -> ChatResult<Self> {
        Ok(Self {
            markdown: MarkdownRenderer::new()?,
            sanitizer: Sanitizer::new(),
        })
    }

    /// Render untrusted markdown. Sanitizing happens after expansion.
    #[must_use]
    pub fn render(&self, raw: &str) -> SafeHtml {
        let expanded = self.markdown.to_html(raw);
        SafeHtml(self.sanitizer.clean(&expanded))
    }

    /// Render user-authored text as literal, escaped content.
    #[must_use]
    pub fn render_user(&self, raw: &str) -> SafeHtml {
        let mut escaped = String::with_capacity(raw.len());
        html::push_html(&mut escaped, std::iter::once(Event::Text(CowStr::Borrowed(raw))));
        SafeHtml(self.sanitizer.clean(&escaped))
    }

    /// Render a transcript message according to its role.
    #[must_use]
    pub fn render_message(&self, message: &Message) -> SafeHtml {
        match message.role() {
            Role::User => self.render_user(message.content()),
            Role::Assistant => self.render(message.content()),
        }
    }
}
