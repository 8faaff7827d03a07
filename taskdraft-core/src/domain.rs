use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub type TodoId = i64;
pub type ProviderId = String;

/// Maximum accepted length of a generation request, in characters.
pub const MAX_INPUT_CHARS: usize = 1000;
pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

/// Identifier reported in `provider_used` when the heuristic produced the draft.
pub const FALLBACK_PROVIDER: &str = "fallback";

const SUSPICIOUS_PATTERNS: [&str; 4] = [
    "ignore previous instructions",
    "system prompt",
    "jailbreak",
    "prompt injection",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid priority {0}, expected 0, 1 or 2")]
pub struct InvalidPriority(pub i64);

impl TryFrom<i64> for Priority {
    type Error = InvalidPriority;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Low),
            1 => Ok(Self::Medium),
            2 => Ok(Self::High),
            other => Err(InvalidPriority(other)),
        }
    }
}

impl From<Priority> for i64 {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("input cannot be empty")]
    Empty,
    #[error("input is {actual} characters, at most {max} are allowed")]
    TooLong { max: usize, actual: usize },
}

/// Free text submitted for conversion, already checked against the input bounds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    user_input: String,
}

impl GenerationRequest {
    pub fn new(raw: &str) -> Result<Self, RequestError> {
        let actual = raw.chars().count();
        if actual > MAX_INPUT_CHARS {
            return Err(RequestError::TooLong {
                max: MAX_INPUT_CHARS,
                actual,
            });
        }
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RequestError::Empty);
        }
        Ok(Self {
            user_input: trimmed.to_string(),
        })
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    /// Phrases commonly used in prompt-injection attempts. Matches are only reported,
    /// the request is still processed.
    pub fn suspicious_patterns(&self) -> Vec<&'static str> {
        let lower = self.user_input.to_lowercase();
        SUSPICIOUS_PATTERNS
            .iter()
            .copied()
            .filter(|p| lower.contains(p))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
}

/// Result of a single generation call.
///
/// Built through [`GenerationOutcome::from_provider`], [`GenerationOutcome::from_fallback`]
/// or [`GenerationOutcome::failure`], so a successful outcome always carries a draft and a
/// failed one never does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    success: bool,
    title: Option<String>,
    description: Option<String>,
    priority: Option<Priority>,
    error_message: Option<String>,
    fallback_used: bool,
    provider_used: Option<ProviderId>,
}

impl GenerationOutcome {
    pub fn from_provider(draft: TaskDraft, provider: impl Into<ProviderId>) -> Self {
        Self {
            success: true,
            title: Some(draft.title),
            description: draft.description,
            priority: Some(draft.priority),
            error_message: None,
            fallback_used: false,
            provider_used: Some(provider.into()),
        }
    }

    pub fn from_fallback(draft: TaskDraft) -> Self {
        Self {
            success: true,
            title: Some(draft.title),
            description: draft.description,
            priority: Some(draft.priority),
            error_message: None,
            fallback_used: true,
            provider_used: Some(FALLBACK_PROVIDER.to_string()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            title: None,
            description: None,
            priority: None,
            error_message: Some(message.into()),
            fallback_used: false,
            provider_used: None,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn fallback_used(&self) -> bool {
        self.fallback_used
    }

    pub fn provider_used(&self) -> Option<&str> {
        self.provider_used.as_deref()
    }

    pub fn draft(&self) -> Option<TaskDraft> {
        Some(TaskDraft {
            title: self.title.clone()?,
            description: self.description.clone(),
            priority: self.priority?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSpec {
    pub system: Option<String>,
    pub user: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTodo {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
}

/// Reads a field whose explicit `null` differs from its absence: a missing key stays `None`
/// through `#[serde(default)]`, `null` becomes `Some(None)`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update; `None` leaves the stored value untouched. `description: Some(None)`
/// clears the description.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl TodoPatch {
    pub fn apply(self, todo: &mut Todo) {
        if let Some(title) = self.title {
            todo.title = title;
        }
        if let Some(description) = self.description {
            todo.description = description;
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
        if let Some(priority) = self.priority {
            todo.priority = priority;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TodoFilter {
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
}

impl TodoFilter {
    pub fn completed() -> Self {
        Self {
            completed: Some(true),
            priority: None,
        }
    }

    pub fn with_priority(priority: Priority) -> Self {
        Self {
            completed: None,
            priority: Some(priority),
        }
    }

    pub fn matches(&self, todo: &Todo) -> bool {
        self.completed.map_or(true, |c| todo.completed == c)
            && self.priority.map_or(true, |p| todo.priority == p)
    }
}
