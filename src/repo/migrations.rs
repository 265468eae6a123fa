use sqlx::{Executor, PgPool};

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    tx.execute(
        r#"
        CREATE SCHEMA IF NOT EXISTS thesis;
        "#,
    )
    .await?;

    tx.execute(
        r#"
        CREATE TABLE IF NOT EXISTS thesis.advisors (
          id          BIGSERIAL PRIMARY KEY,
          name        TEXT NOT NULL,
          email       TEXT,
          created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );
        "#,
    )
    .await?;

    tx.execute(
        r#"
        CREATE TABLE IF NOT EXISTS thesis.sections (
          id          BIGSERIAL PRIMARY KEY,
          name        TEXT NOT NULL UNIQUE,
          course      TEXT,
          created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );
        "#,
    )
    .await?;

    tx.execute(
        r#"
        CREATE TABLE IF NOT EXISTS thesis.groups (
          id            BIGSERIAL PRIMARY KEY,
          group_name    TEXT NOT NULL,
          thesis_title  TEXT,
          section_id    BIGINT REFERENCES thesis.sections(id) ON DELETE SET NULL,
          status        TEXT NOT NULL DEFAULT 'active',
          advisor_id    BIGINT REFERENCES thesis.advisors(id) ON DELETE SET NULL,
          created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
          updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );
        "#,
    )
    .await?;

    tx.execute(
        r#"
        CREATE INDEX IF NOT EXISTS idx_groups_advisor_id ON thesis.groups(advisor_id);
        "#,
    )
    .await?;

    tx.execute(
        r#"
        CREATE TABLE IF NOT EXISTS thesis.title_verifications (
          id           BIGSERIAL PRIMARY KEY,
          thesis_id    BIGINT NOT NULL UNIQUE REFERENCES thesis.groups(id) ON DELETE CASCADE,
          status       TEXT NOT NULL DEFAULT 'pending'
                       CHECK (status IN ('pending', 'verified', 'duplicate_reported')),
          verified_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
          verified_by  BIGINT NOT NULL,
          notes        TEXT
        );
        "#,
    )
    .await?;

    tx.execute(
        r#"
        CREATE TABLE IF NOT EXISTS thesis.notifications (
          id          BIGSERIAL PRIMARY KEY,
          ts          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
          title       TEXT NOT NULL,
          message     TEXT NOT NULL,
          severity    TEXT NOT NULL,
          thesis_id   BIGINT,
          is_read     BOOLEAN NOT NULL DEFAULT FALSE
        );
        "#,
    )
    .await?;

    tx.execute(
        r#"
        CREATE INDEX IF NOT EXISTS idx_notifications_ts ON thesis.notifications(ts DESC);
        "#,
    )
    .await?;

    tx.commit().await?;
    Ok(())
}
