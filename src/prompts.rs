//! Prompt construction for document questions and tasks.
//!
//! Every prompt sent to a provider has the same three-part layout:
//!
//! ```text
//! [system instruction]        (optional, followed by a blank line)
//! Document content:
//! <first 100 000 characters of the document>
//!
//! User question: <question or task template>
//! ```
//!
//! The labels act as delimiters for the model, so they are constants and
//! tested. Truncation keeps the first [`DOCUMENT_CHAR_LIMIT`] characters with
//! no sentence or page boundary logic: the same document always yields the
//! same prompt.

/// Hard cap on the number of document characters included in a prompt.
pub const DOCUMENT_CHAR_LIMIT: usize = 100_000;

/// Label introducing the document text.
pub const DOCUMENT_LABEL: &str = "Document content:";

/// Label introducing the user's question or the task template.
pub const QUESTION_LABEL: &str = "User question:";

/// The inputs of one provider call. Never stored.
#[derive(Debug, Clone, Copy)]
pub struct PromptRequest<'a> {
    pub document_text: &'a str,
    pub system_instruction: Option<&'a str>,
    pub user_content: &'a str,
}

impl PromptRequest<'_> {
    pub fn render(&self) -> String {
        build_prompt(self.document_text, self.user_content, self.system_instruction)
    }
}

/// Build the prompt string sent to the provider.
pub fn build_prompt(
    document_text: &str,
    user_content: &str,
    system_instruction: Option<&str>,
) -> String {
    let document = truncate_chars(document_text, DOCUMENT_CHAR_LIMIT);

    let mut prompt = String::with_capacity(
        document.len() + user_content.len() + system_instruction.map_or(0, str::len) + 64,
    );
    if let Some(instruction) = system_instruction {
        prompt.push_str(instruction);
        prompt.push_str("\n\n");
    }
    prompt.push_str(DOCUMENT_LABEL);
    prompt.push('\n');
    prompt.push_str(document);
    prompt.push_str("\n\n");
    prompt.push_str(QUESTION_LABEL);
    prompt.push(' ');
    prompt.push_str(user_content);
    prompt
}

/// The first `limit` characters of `text` (not bytes).
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
