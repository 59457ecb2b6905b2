//! Todo list items carried by TodoWrite tool input.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
    /// Status string outside the known set, kept for display
    #[serde(untagged)]
    Other(String),
}

impl TodoStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    pub status: TodoStatus,
}

impl TodoItem {
    pub fn new(content: impl Into<String>, status: TodoStatus) -> Self {
        Self {
            content: content.into(),
            status,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let content = obj.get("content")?.as_str()?;
        let status = obj
            .get("status")
            .and_then(Value::as_str)
            .map(TodoStatus::parse)
            .unwrap_or(TodoStatus::Pending);
        Some(Self::new(content, status))
    }
}

/// Parses the `todos` array from a TodoWrite input.
///
/// Returns `None` when the input has no `todos` array, so callers can keep
/// the current list. Malformed entries are dropped one by one.
pub fn parse_todos(input: Option<&Map<String, Value>>) -> Option<Vec<TodoItem>> {
    let todos = input?.get("todos")?.as_array()?;
    Some(todos.iter().filter_map(TodoItem::from_value).collect())
}
