use std::collections::HashMap;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    error::AppResult,
    model::{AnalysisResult, Threshold, TitleRecord, VerificationStatus},
    repo,
    service::analysis,
};

/// Run a fresh analysis and render it as CSV.
pub async fn export(pool: &PgPool, threshold: Threshold) -> AppResult<Vec<u8>> {
    let titles = repo::titles::list_titles(pool).await?;
    let verifications = repo::verifications::list_statuses(pool).await?;
    let result = analysis::analyze(&titles, threshold);

    let csv = export_report(&titles, &result, &verifications, Utc::now())?;
    tracing::info!(bytes = csv.len(), titles = titles.len(), "analysis report exported");
    Ok(csv)
}

/// Three sections separated by blank rows: summary, grouped duplicates, full listing.
pub fn export_report(
    titles: &[TitleRecord],
    result: &AnalysisResult,
    verifications: &HashMap<i64, VerificationStatus>,
    generated_at: DateTime<Utc>,
) -> anyhow::Result<Vec<u8>> {
    let sections = [
        summary_section(titles, result, generated_at).context("summary section")?,
        cluster_section(titles, result).context("cluster section")?,
        listing_section(titles, result, verifications).context("listing section")?,
    ];
    // csv writes `""` for an empty record, so sections are joined outside the writer
    Ok(sections.join(&b"\n"[..]))
}

fn summary_section(
    titles: &[TitleRecord],
    result: &AnalysisResult,
    generated_at: DateTime<Utc>,
) -> anyhow::Result<Vec<u8>> {
    let flagged = titles.iter().filter(|t| result.is_flagged(t.id)).count();

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(["Thesis Title Duplicate Report"])?;
    writer.write_record(["Generated at", &generated_at.to_rfc3339()])?;
    writer.write_record(["Similarity threshold", &result.threshold.value().to_string()])?;
    writer.write_record(["Total titles", &titles.len().to_string()])?;
    writer.write_record(["Titles flagged", &flagged.to_string()])?;
    writer.write_record(["Duplicate pairs", &result.flagged_pairs.to_string()])?;
    writer.write_record(["Clusters", &result.clusters.len().to_string()])?;
    finish(writer)
}

fn cluster_section(titles: &[TitleRecord], result: &AnalysisResult) -> anyhow::Result<Vec<u8>> {
    let by_id: HashMap<i64, &TitleRecord> = titles.iter().map(|t| (t.id, t)).collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Cluster",
        "ID",
        "Group",
        "Thesis Title",
        "Section",
        "Advisor",
        "Keywords",
    ])?;
    for cluster in &result.clusters {
        let keywords = cluster.keywords.join(", ");
        for id in &cluster.members {
            let Some(title) = by_id.get(id) else {
                continue;
            };
            writer.write_record([
                cluster.number.to_string().as_str(),
                &title.id.to_string(),
                &title.group_name,
                &title.thesis_title,
                title.section.as_deref().unwrap_or(""),
                title.advisor_name.as_deref().unwrap_or(""),
                &keywords,
            ])?;
        }
    }
    finish(writer)
}

fn listing_section(
    titles: &[TitleRecord],
    result: &AnalysisResult,
    verifications: &HashMap<i64, VerificationStatus>,
) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "ID",
        "Group",
        "Thesis Title",
        "Section",
        "Course",
        "Advisor",
        "Status",
        "Duplicate Matches",
        "Max Similarity",
        "Verification",
    ])?;
    for title in titles {
        let matches = result.adjacency.get(&title.id).map_or(0, Vec::len);
        let max_similarity = result
            .max_similarity(title.id)
            .map(|s| format!("{s:.2}"))
            .unwrap_or_default();
        let verification = verifications
            .get(&title.id)
            .copied()
            .unwrap_or(VerificationStatus::Pending);

        writer.write_record([
            title.id.to_string().as_str(),
            &title.group_name,
            &title.thesis_title,
            title.section.as_deref().unwrap_or(""),
            title.course.as_deref().unwrap_or(""),
            title.advisor_name.as_deref().unwrap_or(""),
            &title.status,
            &matches.to_string(),
            &max_similarity,
            verification.as_str(),
        ])?;
    }
    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> anyhow::Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush csv report: {}", err.error()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::service::analysis::tests::title;

    fn render() -> String {
        let titles = vec![
            title(1, "An Inventory Management System for Small Retailers"),
            title(2, "Mobile App for Food Ordering"),
            title(3, "An Inventory Management System for Local Retailers"),
        ];
        let result = analysis::analyze(&titles, Threshold::DEFAULT);
        let mut verifications = HashMap::new();
        verifications.insert(2, VerificationStatus::Verified);
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();

        let bytes = export_report(&titles, &result, &verifications, at).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn summary_section_comes_first() {
        let csv = render();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Thesis Title Duplicate Report"));
        assert_eq!(lines.next(), Some("Generated at,2026-03-01T08:00:00+00:00"));
        assert!(csv.contains("Similarity threshold,60\n"));
        assert!(csv.contains("Total titles,3\n"));
        assert!(csv.contains("Titles flagged,2\n"));
        assert!(csv.contains("Clusters,1\n"));
    }

    #[test]
    fn sections_are_separated_by_empty_lines() {
        let csv = render();
        let blank_lines: Vec<usize> = csv
            .lines()
            .enumerate()
            .filter(|(_, line)| line.is_empty())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(blank_lines, vec![7, 11]);
        assert!(!csv.contains("\"\""));

        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[8].starts_with("Cluster,ID,Group"));
        assert!(lines[12].starts_with("ID,Group,Thesis Title"));
    }

    #[test]
    fn grouped_rows_carry_cluster_number() {
        let csv = render();
        assert!(csv.contains(
            "1,1,Group 1,An Inventory Management System for Small Retailers,BSIT 4A,Dr. Reyes,"
        ));
        assert!(csv.contains(
            "1,3,Group 3,An Inventory Management System for Local Retailers,BSIT 4A,Dr. Reyes,"
        ));
    }

    #[test]
    fn full_listing_includes_every_title() {
        let csv = render();
        assert!(csv.contains("2,Group 2,Mobile App for Food Ordering,BSIT 4A,BSIT,Dr. Reyes,active,0,,verified"));
        assert!(csv.contains(
            "3,Group 3,An Inventory Management System for Local Retailers,BSIT 4A,BSIT,Dr. Reyes,active,1,71.43,pending"
        ));
    }
}
