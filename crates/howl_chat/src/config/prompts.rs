//! Prompt template for a single chat turn

/// Marker replaced by the user's text.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// One user turn followed by an open assistant turn.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "User: {input}\nAssistant:";

/// Substitute `input` into `template`.
///
/// A template without the placeholder gets the input appended on its own line.
pub fn render_prompt(template: &str, input: &str) -> String {
    if template.contains(INPUT_PLACEHOLDER) {
        template.replace(INPUT_PLACEHOLDER, input)
    } else {
        format!("{}\n{}", template, input)
    }
}
