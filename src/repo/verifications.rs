use std::collections::HashMap;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::model::{VerificationRecord, VerificationStatus};

#[derive(Debug, sqlx::FromRow)]
pub struct VerificationRow {
    pub thesis_id: i64,
    pub status: String,
    pub verified_at: DateTime<Utc>,
    pub verified_by: i64,
    pub notes: Option<String>,
}

impl TryFrom<VerificationRow> for VerificationRecord {
    type Error = anyhow::Error;

    fn try_from(row: VerificationRow) -> Result<Self, Self::Error> {
        Ok(VerificationRecord {
            thesis_id: row.thesis_id,
            status: row
                .status
                .parse()
                .with_context(|| format!("verification row for thesis {}", row.thesis_id))?,
            verified_at: row.verified_at,
            verified_by: row.verified_by,
            notes: row.notes,
        })
    }
}

#[derive(Debug, Clone)]
pub struct VerificationUpsert {
    pub thesis_id: i64,
    pub status: VerificationStatus,
    pub verified_by: i64,
    pub notes: Option<String>,
}

/// Insert or replace the single verification record of a title in one statement.
pub async fn upsert_verification(
    pool: &PgPool,
    record: &VerificationUpsert,
) -> anyhow::Result<VerificationRecord> {
    let row = sqlx::query_as::<_, VerificationRow>(
        r#"
        INSERT INTO thesis.title_verifications (thesis_id, status, verified_at, verified_by, notes)
        VALUES ($1, $2, NOW(), $3, $4)
        ON CONFLICT (thesis_id) DO UPDATE SET
            status = EXCLUDED.status,
            verified_at = EXCLUDED.verified_at,
            verified_by = EXCLUDED.verified_by,
            notes = EXCLUDED.notes
        RETURNING thesis_id, status, verified_at, verified_by, notes
        "#,
    )
    .bind(record.thesis_id)
    .bind(record.status.as_str())
    .bind(record.verified_by)
    .bind(&record.notes)
    .fetch_one(pool)
    .await
    .context("failed to upsert title verification")?;

    VerificationRecord::try_from(row)
}

pub async fn get_verification(
    pool: &PgPool,
    thesis_id: i64,
) -> anyhow::Result<Option<VerificationRecord>> {
    let row = sqlx::query_as::<_, VerificationRow>(
        r#"
        SELECT thesis_id, status, verified_at, verified_by, notes
        FROM thesis.title_verifications
        WHERE thesis_id = $1
        "#,
    )
    .bind(thesis_id)
    .fetch_optional(pool)
    .await?;

    row.map(VerificationRecord::try_from).transpose()
}

/// Status of every title that has a verification record. Rows with an
/// unknown status are skipped.
pub async fn list_statuses(pool: &PgPool) -> Result<HashMap<i64, VerificationStatus>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, String)>(
        r#"
        SELECT thesis_id, status
        FROM thesis.title_verifications
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(thesis_id, status)| match status.parse() {
            Ok(status) => Some((thesis_id, status)),
            Err(err) => {
                tracing::warn!(thesis_id, error = %err, "ignoring verification row");
                None
            }
        })
        .collect())
}
