use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::ApiError,
    state::AppState,
    tasks::{
        dto::{CreateTaskRequest, TaskListQuery, TaskListResponse, UpdateTaskRequest},
        repo::Task,
    },
};

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    let len = title.chars().count();
    if len == 0 || len > 200 {
        return Err(ApiError::Validation(
            "title must be between 1 and 200 characters".into(),
        ));
    }
    Ok(())
}

/// Fetch by id, then check the owner. Existence comes first so a missing task
/// is a 404 while a foreign one is a 403.
async fn fetch_owned(state: &AppState, task_id: Uuid, user_id: Uuid) -> Result<Task, ApiError> {
    let task = Task::find_by_id(&state.db, task_id)
        .await?
        .ok_or(ApiError::TaskNotFound)?;
    if task.user_id != user_id {
        return Err(ApiError::TaskForbidden);
    }
    Ok(task)
}

/// Overwrite only the fields present in the payload. `Some(false)` and
/// `Some("")` count as present; the owner is immutable.
fn apply_updates(task: &mut Task, payload: UpdateTaskRequest) -> Result<(), ApiError> {
    if let Some(title) = payload.title {
        validate_title(&title)?;
        task.title = title;
    }
    if let Some(description) = payload.description {
        task.description = Some(description);
    }
    if let Some(completed) = payload.completed {
        task.completed = completed;
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<TaskListQuery>,
) -> Result<Json<TaskListResponse>, ApiError> {
    if !(1..=100).contains(&q.limit) {
        return Err(ApiError::Validation("limit must be between 1 and 100".into()));
    }
    if q.offset < 0 {
        return Err(ApiError::Validation("offset must be non-negative".into()));
    }

    let (tasks, total) =
        Task::list_by_user(&state.db, user_id, q.completed, q.limit, q.offset).await?;
    Ok(Json(TaskListResponse {
        tasks,
        total,
        limit: q.limit,
        offset: q.offset,
    }))
}

/// The owner always comes from the verified token, never the payload.
#[instrument(skip(state, payload))]
pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    validate_title(&payload.title)?;

    let task = Task::create(
        &state.db,
        user_id,
        &payload.title,
        payload.description.as_deref(),
        payload.completed,
    )
    .await?;

    info!(task_id = %task.id, user_id = %user_id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

#[instrument(skip(state))]
pub async fn get_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
    let task = fetch_owned(&state, id, user_id).await?;
    Ok(Json(task))
}

#[instrument(skip(state, payload))]
pub async fn update_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let mut task = fetch_owned(&state, id, user_id).await?;
    apply_updates(&mut task, payload)?;
    let task = task.update(&state.db).await?;

    info!(task_id = %task.id, user_id = %user_id, "task updated");
    Ok(Json(task))
}

#[instrument(skip(state))]
pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let task = fetch_owned(&state, id, user_id).await?;
    Task::delete(&state.db, task.id).await?;

    info!(task_id = %task.id, user_id = %user_id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn sample_task() -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "Buy milk".into(),
            description: Some("two liters".into()),
            completed: false,
            user_id: Uuid::new_v4(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn title_bounds() {
        assert!(validate_title("a").is_ok());
        assert!(validate_title(&"x".repeat(200)).is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title(&"x".repeat(201)).is_err());
    }

    #[test]
    fn title_length_counts_chars_not_bytes() {
        // 200 multibyte characters are within bounds even at 600 bytes.
        assert!(validate_title(&"ä".repeat(200)).is_ok());
        assert!(validate_title(&"ä".repeat(201)).is_err());
    }

    #[test]
    fn omitted_fields_stay_unchanged() {
        let mut task = sample_task();
        apply_updates(
            &mut task,
            UpdateTaskRequest {
                title: None,
                description: None,
                completed: None,
            },
        )
        .unwrap();
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.description.as_deref(), Some("two liters"));
        assert!(!task.completed);
    }

    #[test]
    fn explicit_false_and_empty_string_apply() {
        let mut task = sample_task();
        task.completed = true;
        apply_updates(
            &mut task,
            UpdateTaskRequest {
                title: None,
                description: Some(String::new()),
                completed: Some(false),
            },
        )
        .unwrap();
        assert_eq!(task.description.as_deref(), Some(""));
        assert!(!task.completed);
    }

    #[test]
    fn provided_fields_overwrite() {
        let mut task = sample_task();
        apply_updates(
            &mut task,
            UpdateTaskRequest {
                title: Some("Buy bread".into()),
                description: None,
                completed: Some(true),
            },
        )
        .unwrap();
        assert_eq!(task.title, "Buy bread");
        assert!(task.completed);
        // untouched
        assert_eq!(task.description.as_deref(), Some("two liters"));
    }

    #[test]
    fn update_rejects_invalid_title() {
        let mut task = sample_task();
        let err = apply_updates(
            &mut task,
            UpdateTaskRequest {
                title: Some(String::new()),
                description: None,
                completed: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
        // rejected update must not have partially applied
        assert_eq!(task.title, "Buy milk");
    }

    #[test]
    fn owner_is_never_updatable() {
        let mut task = sample_task();
        let owner = task.user_id;
        apply_updates(
            &mut task,
            UpdateTaskRequest {
                title: Some("New".into()),
                description: Some("New".into()),
                completed: Some(true),
            },
        )
        .unwrap();
        assert_eq!(task.user_id, owner);
    }
}
