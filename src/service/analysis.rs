use std::collections::{HashMap, HashSet, VecDeque};

use sqlx::PgPool;

use crate::{
    error::AppResult,
    model::{
        AdjacencyMap, AnalysisResult, Cluster, DisplayStatus, DuplicateMatch, OverviewResp,
        OverviewSummary, Threshold, TitleOverviewItem, TitleRecord, VerificationStatus,
    },
    repo,
    util::{similarity::combined_similarity, title::top_keywords},
};

const CLUSTER_KEYWORDS: usize = 5;

/// Score every unordered pair of titles and cluster the ones at or above
/// `threshold`. Pure: the same input always yields the same result.
pub fn analyze(titles: &[TitleRecord], threshold: Threshold) -> AnalysisResult {
    let (adjacency, flagged_pairs) = build_adjacency(titles, threshold);
    let clusters = cluster_duplicates(titles, &adjacency);

    tracing::info!(
        titles = titles.len(),
        threshold = threshold.value(),
        flagged_pairs,
        clusters = clusters.len(),
        "thesis title analysis finished"
    );

    AnalysisResult {
        threshold,
        adjacency,
        clusters,
        flagged_pairs,
    }
}

/// Symmetric adjacency over all pairs scoring at or above `threshold`.
/// Returns the map together with the number of flagged pairs.
pub fn build_adjacency(titles: &[TitleRecord], threshold: Threshold) -> (AdjacencyMap, usize) {
    let mut adjacency = AdjacencyMap::new();
    let mut flagged_pairs = 0;

    for (i, left) in titles.iter().enumerate() {
        for right in &titles[i + 1..] {
            if left.id == right.id {
                continue;
            }

            let similarity = combined_similarity(&left.thesis_title, &right.thesis_title);
            if !threshold.admits(similarity) {
                continue;
            }

            flagged_pairs += 1;
            adjacency.entry(left.id).or_default().push(DuplicateMatch {
                id: right.id,
                title: right.thesis_title.clone(),
                similarity,
            });
            adjacency.entry(right.id).or_default().push(DuplicateMatch {
                id: left.id,
                title: left.thesis_title.clone(),
                similarity,
            });
        }
    }

    (adjacency, flagged_pairs)
}

/// Connected components of the adjacency graph with at least two members,
/// numbered from 1 in the order their first title appears.
pub fn cluster_duplicates(titles: &[TitleRecord], adjacency: &AdjacencyMap) -> Vec<Cluster> {
    let by_id: HashMap<i64, &str> = titles
        .iter()
        .map(|t| (t.id, t.thesis_title.as_str()))
        .collect();

    let mut visited: HashSet<i64> = HashSet::new();
    let mut clusters = Vec::new();

    for title in titles {
        if !visited.insert(title.id) {
            continue;
        }

        let mut members = vec![title.id];
        let mut queue = VecDeque::from([title.id]);
        while let Some(current) = queue.pop_front() {
            let Some(neighbours) = adjacency.get(&current) else {
                continue;
            };
            for neighbour in neighbours {
                if visited.insert(neighbour.id) {
                    members.push(neighbour.id);
                    queue.push_back(neighbour.id);
                }
            }
        }

        if members.len() < 2 {
            continue;
        }

        let keywords = top_keywords(
            members.iter().filter_map(|id| by_id.get(id).copied()),
            CLUSTER_KEYWORDS,
        );
        clusters.push(Cluster {
            number: clusters.len() + 1,
            members,
            keywords,
        });
    }

    clusters
}

/// Load every title and its verification status, run the analysis, and
/// assemble the overview page payload.
pub async fn overview(pool: &PgPool, threshold: Threshold) -> AppResult<OverviewResp> {
    let titles = repo::titles::list_titles(pool).await?;
    let verifications = repo::verifications::list_statuses(pool).await?;
    let result = analyze(&titles, threshold);

    Ok(build_overview(titles, &verifications, result))
}

pub fn build_overview(
    titles: Vec<TitleRecord>,
    verifications: &HashMap<i64, VerificationStatus>,
    result: AnalysisResult,
) -> OverviewResp {
    let items: Vec<TitleOverviewItem> = titles
        .into_iter()
        .map(|title| {
            let flagged = result.is_flagged(title.id);
            let verification = verifications.get(&title.id).copied();
            TitleOverviewItem {
                duplicate: flagged,
                cluster: result.cluster_of(title.id),
                verification_status: verification.unwrap_or(VerificationStatus::Pending),
                display_status: DisplayStatus::resolve(verification, flagged),
                title,
            }
        })
        .collect();

    let count_status = |status: VerificationStatus| {
        items
            .iter()
            .filter(|item| item.verification_status == status)
            .count()
    };

    let summary = OverviewSummary {
        total_titles: items.len(),
        flagged_titles: items.iter().filter(|item| item.duplicate).count(),
        flagged_pairs: result.flagged_pairs,
        clusters: result.clusters.len(),
        verified: count_status(VerificationStatus::Verified),
        duplicate_reported: count_status(VerificationStatus::DuplicateReported),
    };

    OverviewResp {
        threshold: result.threshold,
        summary,
        titles: items,
        duplicates: result.adjacency,
        clusters: result.clusters,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn title(id: i64, text: &str) -> TitleRecord {
        TitleRecord {
            id,
            group_name: format!("Group {id}"),
            thesis_title: text.to_string(),
            section: Some("BSIT 4A".to_string()),
            course: Some("BSIT".to_string()),
            status: "active".to_string(),
            advisor_id: Some(7),
            advisor_name: Some("Dr. Reyes".to_string()),
        }
    }

    fn threshold(value: i64) -> Threshold {
        Threshold::new(value).unwrap()
    }

    fn sample() -> Vec<TitleRecord> {
        vec![
            title(1, "An Inventory Management System for Small Retailers"),
            title(2, "Mobile App for Food Ordering"),
            title(3, "An Inventory Management System for Local Retailers"),
            title(4, "Web Platform for Hotel Booking"),
        ]
    }

    #[test]
    fn empty_title_set_yields_nothing() {
        let result = analyze(&[], Threshold::DEFAULT);
        assert!(result.adjacency.is_empty());
        assert!(result.clusters.is_empty());
        assert_eq!(result.flagged_pairs, 0);
    }

    #[test]
    fn near_identical_titles_cluster_at_default_threshold() {
        let result = analyze(&sample(), Threshold::DEFAULT);

        assert_eq!(result.flagged_pairs, 1);
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].number, 1);
        assert_eq!(result.clusters[0].members, vec![1, 3]);
        assert!(result.clusters[0]
            .keywords
            .starts_with(&["inventory".to_string(), "management".to_string()]));
        assert!(!result.is_flagged(2));
        assert!(!result.is_flagged(4));
        assert_eq!(result.cluster_of(3), Some(1));
        assert_eq!(result.cluster_of(2), None);
    }

    #[test]
    fn adjacency_is_symmetric() {
        let result = analyze(&sample(), Threshold::DEFAULT);
        for (id, matches) in &result.adjacency {
            for m in matches {
                let back = result.adjacency[&m.id]
                    .iter()
                    .find(|other| other.id == *id)
                    .expect("reverse edge");
                assert_eq!(back.similarity, m.similarity);
            }
        }
    }

    #[test]
    fn chained_matches_form_one_cluster() {
        // A~B and B~C share a three word run; A and C only share two words
        let titles = vec![
            title(10, "alpha beta gamma delta"),
            title(11, "beta gamma delta epsilon"),
            title(12, "gamma delta epsilon zeta"),
            title(13, "completely unrelated words here"),
        ];
        let t = threshold(50);
        let (adjacency, _) = build_adjacency(&titles, t);
        assert!(adjacency[&10].iter().all(|m| m.id != 12));

        let clusters = cluster_duplicates(&titles, &adjacency);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec![10, 11, 12]);
    }

    #[test]
    fn clusters_are_numbered_in_discovery_order() {
        let titles = vec![
            title(5, "Solar Powered Irrigation Controller Design"),
            title(6, "Barangay Health Record Tracking System"),
            title(7, "Solar Powered Irrigation Controller Prototype"),
            title(8, "Barangay Health Record Tracking Portal"),
        ];
        let result = analyze(&titles, Threshold::DEFAULT);
        let members: Vec<_> = result.clusters.iter().map(|c| c.members.clone()).collect();
        assert_eq!(members, vec![vec![5, 7], vec![6, 8]]);
        assert_eq!(result.clusters[1].number, 2);
    }

    #[test]
    fn blank_titles_only_pair_at_zero_threshold() {
        let titles = vec![title(1, ""), title(2, "   "), title(3, "")];
        let result = analyze(&titles, threshold(0));
        // threshold 0 admits every pair with a zero score
        assert_eq!(result.flagged_pairs, 3);

        let strict = analyze(&titles, threshold(1));
        assert!(strict.adjacency.is_empty());
    }

    #[test]
    fn display_ignores_clustering_for_verified_titles() {
        let mut verifications = HashMap::new();
        verifications.insert(1, VerificationStatus::Verified);
        let titles = sample();
        let result = analyze(&titles, Threshold::DEFAULT);
        let overview = build_overview(titles, &verifications, result);

        let verified = overview.titles.iter().find(|t| t.title.id == 1).unwrap();
        assert!(verified.duplicate);
        assert_eq!(verified.cluster, Some(1));
        assert_eq!(verified.display_status, DisplayStatus::VerifiedUnique);

        let partner = overview.titles.iter().find(|t| t.title.id == 3).unwrap();
        assert_eq!(partner.display_status, DisplayStatus::PossibleDuplicate);
        assert_eq!(overview.summary.flagged_titles, 2);
        assert_eq!(overview.summary.verified, 1);
    }

    fn titles_strategy() -> impl Strategy<Value = Vec<TitleRecord>> {
        let word = prop::sample::select(vec![
            "library", "system", "mobile", "inventory", "health", "record", "portal",
            "tracking", "student", "for", "the", "online", "booking",
        ]);
        prop::collection::vec(prop::collection::vec(word, 1..7), 0..10).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, words)| title(i as i64 + 1, &words.join(" ")))
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn analysis_is_idempotent(titles in titles_strategy(), t in 0i64..=100) {
            let t = threshold(t);
            prop_assert_eq!(analyze(&titles, t), analyze(&titles, t));
        }

        #[test]
        fn raising_threshold_never_adds_pairs(
            titles in titles_strategy(),
            low in 0i64..=100,
            bump in 0i64..=100,
        ) {
            let high = (low + bump).min(100);
            let loose = analyze(&titles, threshold(low));
            let strict = analyze(&titles, threshold(high));

            prop_assert!(strict.flagged_pairs <= loose.flagged_pairs);
            for cluster in &strict.clusters {
                let home = loose.cluster_of(cluster.members[0]);
                prop_assert!(home.is_some());
                for id in &cluster.members {
                    prop_assert_eq!(loose.cluster_of(*id), home);
                }
            }
        }

        #[test]
        fn clusters_partition_flagged_titles(titles in titles_strategy(), t in 0i64..=100) {
            let result = analyze(&titles, threshold(t));
            let mut seen = HashSet::new();
            for cluster in &result.clusters {
                prop_assert!(cluster.members.len() >= 2);
                for id in &cluster.members {
                    prop_assert!(seen.insert(*id));
                    prop_assert!(result.is_flagged(*id));
                }
            }
        }
    }
}
