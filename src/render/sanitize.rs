//! Allow-list HTML sanitizer applied as the last rendering step.

use std::collections::HashSet;

use ammonia::Builder;

const URL_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Strict sanitizer for rendered markdown.
///
/// Allows the usual formatting tags, `class` on code markup for highlighting,
/// task-list checkboxes, and links or images over `http`, `https` or `mailto`.
/// Scripts, event handlers, styles and every other scheme are removed.
pub struct Sanitizer {
    builder: Builder<'static>,
}

impl Sanitizer {
    /// Build the allow-list.
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Builder::default();
        builder
            .add_tags(["input"])
            .add_tag_attributes("input", ["type", "checked", "disabled"])
            .add_tag_attributes("code", ["class"])
            .add_tag_attributes("pre", ["class"])
            .add_tag_attributes("span", ["class"])
            .url_schemes(URL_SCHEMES.into_iter().collect::<HashSet<_>>())
            .link_rel(Some("noopener noreferrer nofollow"))
            .strip_comments(true);
        Self { builder }
    }

    /// Sanitize an HTML fragment.
    #[must_use]
    pub fn clean(&self, html: &str) -> String {
        self.builder.clean(html).to_string()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}
