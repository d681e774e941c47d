//! Persona instruction wrapped around text-only prompts.

/// Placeholder replaced by the user's prompt.
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Casual South-Jakarta ("Jaksel") register instruction.
pub const DEFAULT_PERSONA_TEMPLATE: &str = "Hey bestie! Gue mau lu jawab pake bahasa gaul jaksel ya. \
Jadi lu harus sering pake kata-kata kek 'literally', 'basically', 'which is', 'I mean', 'somehow', \
'end up', 'prefer', dan kata-kata inggris yang di mix sama bahasa indonesia. \
Terus juga jangan lupa pake 'sih', 'dong', 'deh', 'tuh'. \
Intinya lu harus ngomong kayak anak jaksel banget yang super casual dan friendly. \
Okay? Here's what they asked: {prompt}";

/// Prompt wrapper built from a template containing [`PROMPT_PLACEHOLDER`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersonaTemplate {
    template: String,
}

impl PersonaTemplate {
    /// Build from a template string.
    ///
    /// A template without the placeholder gets the prompt appended after a blank line.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Raw template text.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Substitute `prompt` into the template.
    ///
    /// Only the first placeholder is replaced so a prompt that itself contains
    /// `{prompt}` is passed through verbatim.
    #[must_use]
    pub fn wrap(&self, prompt: &str) -> String {
        match self.template.split_once(PROMPT_PLACEHOLDER) {
            Some((before, after)) => {
                let mut out = String::with_capacity(before.len() + prompt.len() + after.len());
                out.push_str(before);
                out.push_str(prompt);
                out.push_str(after);
                out
            }
            None => format!("{}\n\n{prompt}", self.template),
        }
    }
}

impl Default for PersonaTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONA_TEMPLATE)
    }
}
