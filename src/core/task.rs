use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of a remote to-do. The API hands out numbers, persisted state uses
/// strings; both forms deserialize to the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for TaskId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

struct TaskIdVisitor;

impl Visitor<'_> for TaskIdVisitor {
    type Value = TaskId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a task id as string or integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<TaskId, E> {
        Ok(TaskId(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<TaskId, E> {
        Ok(TaskId(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<TaskId, E> {
        Ok(TaskId(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<TaskId, E> {
        Ok(TaskId(v.to_string()))
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TaskIdVisitor)
    }
}

/// A to-do record as served by the task API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub todo: String,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, todo: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            todo: todo.into(),
            user_id: None,
            completed: None,
        }
    }

    /// Stand-in for a persisted id whose task data was lost.
    pub fn placeholder(id: TaskId) -> Self {
        let todo = format!("Task {}", id);
        Self {
            id,
            todo,
            user_id: None,
            completed: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_string_ids_are_equal() {
        let from_api: Task = serde_json::from_str(r#"{"id": 42, "todo": "Buy milk"}"#).unwrap();
        let from_store: Task = serde_json::from_str(r#"{"id": "42", "todo": "Buy milk"}"#).unwrap();
        assert_eq!(from_api.id, from_store.id);
        assert_eq!(from_api.id.as_str(), "42");
    }

    #[test]
    fn api_fields_are_mapped() {
        let task: Task = serde_json::from_str(
            r#"{"id": 1, "todo": "Do something nice", "completed": true, "userId": 26}"#,
        )
        .unwrap();
        assert_eq!(task.user_id, Some(26));
        assert!(task.is_completed());

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["id"], "1");
        assert_eq!(json["userId"], 26);
    }

    #[test]
    fn placeholder_text() {
        let task = Task::placeholder(TaskId::from("7"));
        assert_eq!(task.todo, "Task 7");
        assert!(!task.is_completed());
    }
}
