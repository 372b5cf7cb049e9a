use serde::{Deserialize, Serialize};

use crate::tasks::repo::Task;

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// Partial update: absent fields leave the stored value untouched.
#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub completed: Option<bool>,
}

fn default_limit() -> i64 {
    10
}

/// Page of tasks with the pagination parameters echoed back.
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_defaults() {
        let q: TaskListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.limit, 10);
        assert_eq!(q.offset, 0);
        assert_eq!(q.completed, None);
    }

    #[test]
    fn create_request_defaults_to_pending() {
        let req: CreateTaskRequest = serde_json::from_str(r#"{"title":"Buy milk"}"#).unwrap();
        assert_eq!(req.title, "Buy milk");
        assert_eq!(req.description, None);
        assert!(!req.completed);
    }

    #[test]
    fn update_request_fields_all_optional() {
        let req: UpdateTaskRequest = serde_json::from_str("{}").unwrap();
        assert!(req.title.is_none());
        assert!(req.description.is_none());
        assert!(req.completed.is_none());

        let req: UpdateTaskRequest =
            serde_json::from_str(r#"{"completed":false,"description":""}"#).unwrap();
        assert_eq!(req.completed, Some(false));
        assert_eq!(req.description.as_deref(), Some(""));
    }
}
