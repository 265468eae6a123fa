use sqlx::PgPool;

use crate::model::TitleRecord;

#[derive(Debug, sqlx::FromRow)]
pub struct TitleRow {
    pub id: i64,
    pub group_name: String,
    pub thesis_title: Option<String>,
    pub section: Option<String>,
    pub course: Option<String>,
    pub status: String,
    pub advisor_id: Option<i64>,
    pub advisor_name: Option<String>,
}

impl From<TitleRow> for TitleRecord {
    fn from(row: TitleRow) -> Self {
        TitleRecord {
            id: row.id,
            group_name: row.group_name,
            // a missing title takes part in analysis as an empty string
            thesis_title: row.thesis_title.unwrap_or_default(),
            section: row.section,
            course: row.course,
            status: row.status,
            advisor_id: row.advisor_id,
            advisor_name: row.advisor_name,
        }
    }
}

const TITLE_SELECT: &str = r#"
    SELECT g.id,
           g.group_name,
           g.thesis_title,
           s.name AS section,
           s.course,
           g.status,
           g.advisor_id,
           a.name AS advisor_name
    FROM thesis.groups g
    LEFT JOIN thesis.sections s ON s.id = g.section_id
    LEFT JOIN thesis.advisors a ON a.id = g.advisor_id
"#;

pub async fn list_titles(pool: &PgPool) -> Result<Vec<TitleRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TitleRow>(&format!("{TITLE_SELECT} ORDER BY g.id"))
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(TitleRecord::from).collect())
}

pub async fn get_title(pool: &PgPool, id: i64) -> Result<Option<TitleRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, TitleRow>(&format!("{TITLE_SELECT} WHERE g.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(TitleRecord::from))
}
