//! Class-based syntax highlighting for fenced code blocks.
//!
//! Classes are syntect scope names carrying an `hljs-` prefix (for example
//! `hljs-source hljs-rust`). They are not highlight.js token classes, so a
//! stylesheet has to target the scope names.

use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use tracing::debug;

/// Language label used when no grammar matches.
pub const PLAIN_TEXT: &str = "plaintext";

const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hljs-" };

/// Highlighted code ready to be placed inside `<code>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Highlighted {
    /// Markup of `<span class="hljs-…">` runs; already escaped.
    Markup {
        /// Language label for the `language-*` class.
        language: String,
        /// Escaped and classed HTML.
        html: String,
    },
    /// No grammar matched; the caller escapes and emits the raw text.
    Plain,
}

/// Syntax highlighter over syntect's bundled grammars.
pub struct Highlighter {
    syntaxes: SyntaxSet,
}

impl Highlighter {
    /// Load the bundled grammar set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
        }
    }

    /// Whether a grammar exists for `language`.
    #[must_use]
    pub fn supports(&self, language: &str) -> bool {
        self.find_syntax(language).is_some()
    }

    /// Highlight `code` declared as `language`.
    #[must_use]
    pub fn highlight(&self, code: &str, language: Option<&str>) -> Highlighted {
        let Some((label, syntax)) =
            language.and_then(|lang| self.find_syntax(lang).map(|syntax| (lang, syntax)))
        else {
            return Highlighted::Plain;
        };

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntaxes, CLASS_STYLE);
        for line in LinesWithEndings::from(code) {
            if let Err(err) = generator.parse_html_for_line_which_includes_newline(line) {
                debug!(language = label, "highlighting failed, falling back to plain text: {err}");
                return Highlighted::Plain;
            }
        }

        Highlighted::Markup {
            language: label.to_ascii_lowercase(),
            html: generator.finalize(),
        }
    }

    fn find_syntax(&self, language: &str) -> Option<&SyntaxReference> {
        let lower = language.to_ascii_lowercase();
        let token = match lower.as_str() {
            "js" | "jsx" | "javascript" => "js",
            "ts" | "tsx" | "typescript" => "ts",
            "py" | "python" => "py",
            "rb" | "ruby" => "rb",
            "rs" | "rust" => "rs",
            "sh" | "bash" | "zsh" | "shell" => "sh",
            "yml" | "yaml" => "yaml",
            "md" | "markdown" => "md",
            "c++" | "cpp" => "cpp",
            "plaintext" | "text" | "txt" => return None,
            other => other,
        };

        self.syntaxes
            .find_syntax_by_token(token)
            .or_else(|| self.syntaxes.find_syntax_by_extension(token))
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}
