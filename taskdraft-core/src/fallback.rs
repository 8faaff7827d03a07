use crate::domain::{Priority, TaskDraft};

const TITLE_CHARS: usize = 20;
const ELLIPSIS: &str = "...";

/// Builds a draft straight from the input when no provider produced one.
///
/// The title is the first 20 characters, marked with `...` when the input is longer;
/// the rest of the input becomes the description. Priority is always low.
pub fn derive_fallback(raw: &str) -> TaskDraft {
    let text = raw.trim();
    match text.char_indices().nth(TITLE_CHARS) {
        Some((cut, _)) => TaskDraft {
            title: format!("{}{ELLIPSIS}", &text[..cut]),
            description: Some(text[cut..].to_string()),
            priority: Priority::Low,
        },
        None => TaskDraft {
            title: text.to_string(),
            description: None,
            priority: Priority::Low,
        },
    }
}
