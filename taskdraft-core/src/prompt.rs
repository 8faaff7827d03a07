//! Prompt construction for task-draft generation.

use crate::domain::{PromptSpec, MAX_INPUT_CHARS};

const SYSTEM_PROMPT: &str = r#"You are a helpful AI assistant that converts natural language requests into structured todo items.

Your task is to extract a clear title, optional description, and appropriate priority level from user input.

Guidelines:
1. Create concise, actionable titles (max 40 characters)
2. Extract relevant details for descriptions (max 50 characters)
3. Handle time references appropriately (convert to clear descriptions)
4. Focus on the core task, not meta-instructions
5. Be helpful but stay focused on todo creation

Priority Level Guidelines:
- Priority 0 (Low): Routine tasks, non-urgent items, personal preferences
  Examples: "buy groceries", "read a book", "organize desk", "call mom this weekend"
- Priority 1 (Medium): Important tasks with moderate urgency, work-related items
  Examples: "submit report by Friday", "schedule dentist appointment", "review project proposal"
- Priority 2 (High): Urgent tasks, deadlines, critical items, emergencies
  Examples: "urgent: fix server issue", "deadline: submit taxes tomorrow", "emergency: call doctor"

Examples:
- "remind me to submit taxes next Monday at noon" → Title: "Submit taxes", Description: "Due next Monday at noon", Priority: 2
- "buy groceries" → Title: "Buy groceries", Description: None, Priority: 0
- "call mom this weekend" → Title: "Call mom", Description: "This weekend", Priority: 0
- "urgent: fix the server issue immediately" → Title: "Fix server issue", Description: "Urgent", Priority: 2
- "schedule team meeting for next week" → Title: "Schedule team meeting", Description: "Next week", Priority: 1

Always respond with valid JSON in this exact format:
{
    "title": "string",
    "description": "string or null",
    "priority": 0
}"#;

const USER_PROMPT_PREFIX: &str = "Convert this to a todo: ";
const TRUNCATION_MARKER: &str = "...";

pub fn build_system_prompt() -> &'static str {
    SYSTEM_PROMPT
}

/// Wraps the trimmed input for the model. Inputs over the character cap are cut to the cap
/// and marked with `...`; the marker does not count against the cap.
pub fn build_user_prompt(raw: &str) -> String {
    let text = raw.trim();
    let mut chars = text.char_indices();
    match chars.nth(MAX_INPUT_CHARS) {
        Some((cut, _)) => format!("{USER_PROMPT_PREFIX}{}{TRUNCATION_MARKER}", &text[..cut]),
        None => format!("{USER_PROMPT_PREFIX}{text}"),
    }
}

pub fn build_prompt(raw: &str) -> PromptSpec {
    PromptSpec {
        system: Some(build_system_prompt().to_string()),
        user: build_user_prompt(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_describes_shape_and_rubric() {
        let p = build_system_prompt();
        assert!(p.contains("Priority Level Guidelines"));
        assert!(p.contains("Priority 0 (Low)"));
        assert!(p.contains("Priority 1 (Medium)"));
        assert!(p.contains("Priority 2 (High)"));
        assert!(p.trim_end().ends_with('}'));
        assert!(p.contains("\"priority\": 0"));
    }

    #[test]
    fn user_prompt_wraps_trimmed_input() {
        assert_eq!(
            build_user_prompt("  buy groceries \n"),
            "Convert this to a todo: buy groceries"
        );
    }

    #[test]
    fn user_prompt_truncates_after_cap() {
        let exact = "é".repeat(MAX_INPUT_CHARS);
        assert_eq!(build_user_prompt(&exact), format!("Convert this to a todo: {exact}"));

        let over = "é".repeat(MAX_INPUT_CHARS + 5);
        let prompt = build_user_prompt(&over);
        let body = prompt.strip_prefix("Convert this to a todo: ").unwrap();
        assert_eq!(body, format!("{}...", "é".repeat(MAX_INPUT_CHARS)));
    }
}
