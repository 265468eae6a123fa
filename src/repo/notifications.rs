use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub title: String,
    pub message: String,
    pub severity: String,
    pub thesis_id: Option<i64>,
    pub is_read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub severity: String,
    pub thesis_id: Option<i64>,
}

pub async fn insert_notification(
    pool: &PgPool,
    notification: &NewNotification,
) -> Result<NotificationRecord, sqlx::Error> {
    sqlx::query_as::<_, NotificationRecord>(
        r#"
        INSERT INTO thesis.notifications (title, message, severity, thesis_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, ts, title, message, severity, thesis_id, is_read
        "#,
    )
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.severity)
    .bind(notification.thesis_id)
    .fetch_one(pool)
    .await
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub since_id: Option<i64>,
    pub unread: Option<bool>,
    pub limit: Option<i64>,
}

pub async fn list_notifications(
    pool: &PgPool,
    params: &ListParams,
) -> Result<Vec<NotificationRecord>, sqlx::Error> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT id, ts, title, message, severity, thesis_id, is_read FROM thesis.notifications WHERE 1=1",
    );

    if let Some(since_id) = params.since_id {
        qb.push(" AND id > ").push_bind(since_id);
    }
    if params.unread == Some(true) {
        qb.push(" AND is_read = FALSE");
    }

    qb.push(" ORDER BY id DESC LIMIT ")
        .push_bind(params.limit.unwrap_or(50).clamp(1, 200));

    qb.build_query_as::<NotificationRecord>()
        .fetch_all(pool)
        .await
}

pub async fn mark_read(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE thesis.notifications
        SET is_read = TRUE
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
