use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Similarity threshold in percent, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Threshold(u8);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("threshold must be between 0 and 100, got {0}")]
    ThresholdOutOfRange(i64),
    #[error("{0} is required")]
    MissingId(&'static str),
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

impl Threshold {
    pub const DEFAULT: Threshold = Threshold(60);

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Threshold)
            .ok_or(ValidationError::ThresholdOutOfRange(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn admits(self, similarity: f64) -> bool {
        similarity >= f64::from(self.0)
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl<'de> Deserialize<'de> for Threshold {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Threshold::new(raw).map_err(serde::de::Error::custom)
    }
}

/// One thesis group's title and descriptive data, as loaded for analysis.
#[derive(Debug, Clone, Serialize)]
pub struct TitleRecord {
    pub id: i64,
    pub group_name: String,
    pub thesis_title: String,
    pub section: Option<String>,
    pub course: Option<String>,
    pub status: String,
    pub advisor_id: Option<i64>,
    pub advisor_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    DuplicateReported,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::DuplicateReported => "duplicate_reported",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "pending" => Ok(VerificationStatus::Pending),
            "verified" => Ok(VerificationStatus::Verified),
            "duplicate_reported" => Ok(VerificationStatus::DuplicateReported),
            other => Err(anyhow::anyhow!("unknown verification status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationRecord {
    pub thesis_id: i64,
    pub status: VerificationStatus,
    pub verified_at: DateTime<Utc>,
    pub verified_by: i64,
    pub notes: Option<String>,
}

/// Entry in a title's adjacency list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    pub id: i64,
    pub title: String,
    pub similarity: f64,
}

pub type AdjacencyMap = BTreeMap<i64, Vec<DuplicateMatch>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub number: usize,
    pub members: Vec<i64>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub threshold: Threshold,
    pub adjacency: AdjacencyMap,
    pub clusters: Vec<Cluster>,
    pub flagged_pairs: usize,
}

impl AnalysisResult {
    pub fn is_flagged(&self, id: i64) -> bool {
        self.adjacency.get(&id).is_some_and(|matches| !matches.is_empty())
    }

    pub fn cluster_of(&self, id: i64) -> Option<usize> {
        self.clusters
            .iter()
            .find(|cluster| cluster.members.contains(&id))
            .map(|cluster| cluster.number)
    }

    pub fn max_similarity(&self, id: i64) -> Option<f64> {
        self.adjacency
            .get(&id)?
            .iter()
            .map(|m| m.similarity)
            .reduce(f64::max)
    }
}

/// How the overview page labels a title. Verification wins over clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    VerifiedUnique,
    DuplicateReported,
    PossibleDuplicate,
    Unique,
}

impl DisplayStatus {
    pub fn resolve(verification: Option<VerificationStatus>, flagged: bool) -> Self {
        match verification {
            Some(VerificationStatus::Verified) => DisplayStatus::VerifiedUnique,
            Some(VerificationStatus::DuplicateReported) => DisplayStatus::DuplicateReported,
            _ if flagged => DisplayStatus::PossibleDuplicate,
            _ => DisplayStatus::Unique,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TitleOverviewItem {
    #[serde(flatten)]
    pub title: TitleRecord,
    pub duplicate: bool,
    pub cluster: Option<usize>,
    pub verification_status: VerificationStatus,
    pub display_status: DisplayStatus,
}

#[derive(Debug, Serialize)]
pub struct OverviewSummary {
    pub total_titles: usize,
    pub flagged_titles: usize,
    pub flagged_pairs: usize,
    pub clusters: usize,
    pub verified: usize,
    pub duplicate_reported: usize,
}

#[derive(Debug, Serialize)]
pub struct OverviewResp {
    pub threshold: Threshold,
    pub summary: OverviewSummary,
    pub titles: Vec<TitleOverviewItem>,
    pub duplicates: AdjacencyMap,
    pub clusters: Vec<Cluster>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OverviewQuery {
    pub threshold: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ThresholdPayload {
    pub threshold: i64,
}

#[derive(Debug, Serialize)]
pub struct ThresholdOut {
    pub threshold: Threshold,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyPayload {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DuplicateEvidence {
    pub title: String,
    pub similarity: f64,
}

#[derive(Debug, Deserialize)]
pub struct ReportDuplicatePayload {
    pub advisor_id: Option<i64>,
    pub reason: String,
    #[serde(default)]
    pub evidence: Vec<DuplicateEvidence>,
}

#[derive(Debug, Serialize)]
pub struct VerificationOut {
    pub ok: bool,
    pub record: VerificationRecord,
}

#[derive(Debug, Serialize)]
pub struct ReportDuplicateOut {
    pub ok: bool,
    pub email_sent: bool,
    pub record: VerificationRecord,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct LogoutPayload {
    pub token: String,
}
