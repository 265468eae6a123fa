use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdvisorContact {
    pub name: String,
    pub email: Option<String>,
}

pub async fn get_contact(pool: &PgPool, id: i64) -> Result<Option<AdvisorContact>, sqlx::Error> {
    sqlx::query_as::<_, AdvisorContact>(
        r#"
        SELECT name, email
        FROM thesis.advisors
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
