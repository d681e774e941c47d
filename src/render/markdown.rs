//! Markdown to HTML expansion with highlighted fenced code.
//!
//! GitHub-flavoured extensions are on and single newlines become `<br>`.
//! Raw HTML in the source is passed through untouched; the sanitizer runs
//! after this stage and is the only place markup is filtered.

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};
use regex::Regex;

use crate::render::highlight::{Highlighted, Highlighter, PLAIN_TEXT};

/// Markdown expander.
pub struct MarkdownRenderer {
    highlighter: Highlighter,
    language_token: Regex,
}

impl MarkdownRenderer {
    /// Build the expander and its highlighter.
    ///
    /// # Errors
    /// Returns an error if the language-token pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            highlighter: Highlighter::new(),
            language_token: Regex::new(r"^[A-Za-z0-9_+#.\-]{1,32}$")?,
        })
    }

    /// Expand `markdown` into unsanitized HTML.
    #[must_use]
    pub fn to_html(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut events = Vec::new();
        let mut code: Option<(Option<String>, String)> = None;

        for event in Parser::new_ext(markdown, options) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    code = Some((self.declared_language(&kind), String::new()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((language, buffer)) = code.take() {
                        self.push_code_block(&mut events, language.as_deref(), buffer);
                    }
                }
                Event::Text(text) if code.is_some() => {
                    if let Some((_, buffer)) = code.as_mut() {
                        buffer.push_str(&text);
                    }
                }
                Event::SoftBreak => events.push(Event::HardBreak),
                other => events.push(other),
            }
        }

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }

    fn declared_language(&self, kind: &CodeBlockKind<'_>) -> Option<String> {
        let CodeBlockKind::Fenced(info) = kind else {
            return None;
        };
        let token = info.split_whitespace().next()?;
        self.language_token
            .is_match(token)
            .then(|| token.to_string())
    }

    fn push_code_block<'a>(
        &self,
        events: &mut Vec<Event<'a>>,
        language: Option<&str>,
        code: String,
    ) {
        match self.highlighter.highlight(&code, language) {
            Highlighted::Markup { language, html: markup } => {
                events.push(Event::Html(CowStr::from(format!(
                    "<pre><code class=\"hljs language-{language}\">{markup}</code></pre>\n"
                ))));
            }
            Highlighted::Plain => {
                events.push(Event::Html(CowStr::from(format!(
                    "<pre><code class=\"hljs language-{PLAIN_TEXT}\">"
                ))));
                events.push(Event::Text(CowStr::from(code)));
                events.push(Event::Html(CowStr::Borrowed("</code></pre>\n")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(markdown: &str) -> String {
        MarkdownRenderer::new().unwrap().to_html(markdown)
    }

    #[test]
    fn test_basic_formatting() {
        let html = render("# Title\n\n- **bold**\n- *em*\n");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>em</em>"));
    }

    #[test]
    fn test_single_newline_is_line_break() {
        let html = render("line one\nline two");
        assert!(html.contains("line one<br />"));
    }

    #[test]
    fn test_gfm_extensions() {
        let html = render("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n\n- [x] done\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("type=\"checkbox\""));
    }

    #[test]
    fn test_fenced_code_is_highlighted() {
        let html = render("```python\nprint('hi')\n```\n");
        assert!(html.contains("<pre><code class=\"hljs language-python\">"));
        assert!(html.contains("hljs-"));
    }

    #[test]
    fn test_unknown_language_falls_back_to_plaintext() {
        let html = render("```klingon\nQapla' <b>\n```\n");
        assert!(html.contains("class=\"hljs language-plaintext\""));
        assert!(html.contains("Qapla&#39; &lt;b&gt;") || html.contains("Qapla' &lt;b&gt;"));
    }

    #[test]
    fn test_hostile_info_string_is_not_used_as_class() {
        let html = render("```\"><script>\nx\n```\n");
        assert!(html.contains("language-plaintext"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_newlines_inside_code_are_kept() {
        let html = render("```\na\nb\n```\n");
        assert!(html.contains("a\nb"));
        assert!(!html.contains("a<br />"));
    }
}
