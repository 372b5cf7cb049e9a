use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Task record; serializes directly as the API task shape.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Task {
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        title: &str,
        description: Option<&str>,
        completed: bool,
    ) -> sqlx::Result<Task> {
        sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (user_id, title, description, completed)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, description, completed, user_id, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(description)
        .bind(completed)
        .fetch_one(db)
        .await
    }

    /// No ownership filter here: the flow layer checks the owner itself so a
    /// missing task and a foreign task stay distinguishable.
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Task>> {
        sqlx::query_as::<_, Task>(
            r#"
            SELECT id, title, description, completed, user_id, created_at, updated_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Returns one page plus the total count; the count honors the completed
    /// filter but ignores pagination.
    pub async fn list_by_user(
        db: &PgPool,
        user_id: Uuid,
        completed: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<(Vec<Task>, i64)> {
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, title, description, completed, user_id, created_at, updated_at
            FROM tasks
            WHERE user_id = $1 AND ($2::boolean IS NULL OR completed = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(completed)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM tasks
            WHERE user_id = $1 AND ($2::boolean IS NULL OR completed = $2)
            "#,
        )
        .bind(user_id)
        .bind(completed)
        .fetch_one(db)
        .await?;

        Ok((tasks, total))
    }

    /// Writes the mutable fields back and refreshes `updated_at`. The owner
    /// column is never part of the SET list.
    pub async fn update(&self, db: &PgPool) -> sqlx::Result<Task> {
        sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET title = $2, description = $3, completed = $4, updated_at = now()
            WHERE id = $1
            RETURNING id, title, description, completed, user_id, created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(&self.title)
        .bind(&self.description)
        .bind(self.completed)
        .fetch_one(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}
