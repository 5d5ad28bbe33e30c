//! Core data models used throughout Annex Guard.
//!
//! These types represent the reference dataset rows, per-ingredient
//! verdicts, list-level summaries, and analysis jobs that flow through
//! the matching pipeline.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AnalysisError, JobError};

/// Identifier of one loaded snapshot of the reference dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetVersion(String);

impl DatasetVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the regulatory dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub canonical_name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    pub regulation_id: String,
    #[serde(default)]
    pub cas_number: Option<String>,
    #[serde(default)]
    pub is_cmr: bool,
    #[serde(default)]
    pub cmr_note: Option<String>,
}

impl ReferenceEntry {
    pub fn new(canonical_name: impl Into<String>, regulation_id: impl Into<String>) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            synonyms: Vec::new(),
            regulation_id: regulation_id.into(),
            cas_number: None,
            is_cmr: false,
            cmr_note: None,
        }
    }

    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms = synonyms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cas(mut self, cas: impl Into<String>) -> Self {
        self.cas_number = Some(cas.into());
        self
    }

    pub fn with_cmr(mut self, note: Option<&str>) -> Self {
        self.is_cmr = true;
        self.cmr_note = note.map(str::to_string);
        self
    }
}

/// Verdict for a single ingredient. Ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Safe,
    Warning,
    Prohibited,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Safe => "safe",
            MatchStatus::Warning => "warning",
            MatchStatus::Prohibited => "prohibited",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Fuzzy,
    SafeList,
    None,
}

/// Result of classifying one normalized token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchVerdict {
    pub status: MatchStatus,
    pub match_type: MatchType,
    pub matched_entry: Option<Arc<ReferenceEntry>>,
    /// Similarity in `[0, 100]`. Kept on SAFE verdicts as the best score observed.
    pub score: f64,
    pub is_cmr: bool,
    pub cmr_note: Option<String>,
}

impl MatchVerdict {
    /// A SAFE verdict with no matched entry.
    pub fn safe(match_type: MatchType, score: f64) -> Self {
        Self {
            status: MatchStatus::Safe,
            match_type,
            matched_entry: None,
            score,
            is_cmr: false,
            cmr_note: None,
        }
    }

    /// A verdict carrying a reference entry and its CMR annotation.
    pub fn matched(
        status: MatchStatus,
        match_type: MatchType,
        entry: Arc<ReferenceEntry>,
        score: f64,
    ) -> Self {
        Self {
            status,
            match_type,
            is_cmr: entry.is_cmr,
            cmr_note: entry.cmr_note.clone(),
            matched_entry: Some(entry),
            score,
        }
    }
}

/// One ingredient line of a [`ListSummary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientResult {
    /// Ordinal position in the submitted list.
    pub position: usize,
    /// Ingredient as submitted, trimmed.
    pub name: String,
    pub normalized: String,
    /// Byte range of the ingredient within the submitted text.
    pub start: usize,
    pub end: usize,
    pub status: MatchStatus,
    pub match_type: MatchType,
    pub matched_name: Option<String>,
    pub regulation_id: Option<String>,
    pub is_cmr: bool,
    pub cmr_note: Option<String>,
    pub score: f64,
}

/// Per-status ingredient counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub safe: usize,
    pub warning: usize,
    pub prohibited: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: MatchStatus) {
        match status {
            MatchStatus::Safe => self.safe += 1,
            MatchStatus::Warning => self.warning += 1,
            MatchStatus::Prohibited => self.prohibited += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.safe + self.warning + self.prohibited
    }

    /// PROHIBITED if any prohibited, else WARNING if any warning, else SAFE.
    pub fn overall(&self) -> MatchStatus {
        if self.prohibited > 0 {
            MatchStatus::Prohibited
        } else if self.warning > 0 {
            MatchStatus::Warning
        } else {
            MatchStatus::Safe
        }
    }
}

/// Aggregate verdict for one submitted ingredient list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListSummary {
    pub overall: MatchStatus,
    pub counts: StatusCounts,
    pub ingredients: Vec<IngredientResult>,
    pub dataset_version: DatasetVersion,
}

impl ListSummary {
    pub fn from_results(ingredients: Vec<IngredientResult>, dataset_version: DatasetVersion) -> Self {
        let mut counts = StatusCounts::default();
        for item in &ingredients {
            counts.record(item.status);
        }
        Self {
            overall: counts.overall(),
            counts,
            ingredients,
            dataset_version,
        }
    }
}

/// Where the submitted text came from. Only used to annotate results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Text,
    Ocr,
}

impl FromStr for Origin {
    type Err = AnalysisError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Origin::Text),
            "ocr" | "image" => Ok(Origin::Ocr),
            _ => Err(AnalysisError::UnsupportedOrigin(tag.to_string())),
        }
    }
}

/// Lifecycle state of an [`AnalysisJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// Allowed edges: PENDING → RUNNING → {COMPLETE, FAILED}.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Complete)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One analysis request and its progress.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisJob {
    pub id: Uuid,
    pub input_text: String,
    /// Origin tag exactly as submitted.
    pub origin: String,
    pub status: JobStatus,
    pub result: Option<ListSummary>,
    pub error: Option<JobError>,
    pub dataset_version: DatasetVersion,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

impl AnalysisJob {
    pub fn new(input_text: String, origin: String, dataset_version: DatasetVersion) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_text,
            origin,
            status: JobStatus::Pending,
            result: None,
            error: None,
            dataset_version,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
        }
    }

    /// Overall verdict, available once the job is complete.
    pub fn overall_status(&self) -> Option<MatchStatus> {
        self.result.as_ref().map(|r| r.overall)
    }
}

/// Body returned to status pollers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusView {
    pub complete: bool,
    pub state: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MatchStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl JobStatusView {
    /// Derives the poller view; `redirect_base` is joined as `{base}/{id}/`.
    pub fn from_job(job: &AnalysisJob, redirect_base: &str) -> Self {
        let complete = job.status == JobStatus::Complete;
        Self {
            complete,
            state: job.status,
            status: job.overall_status(),
            redirect_url: complete
                .then(|| format!("{}/{}/", redirect_base.trim_end_matches('/'), job.id)),
            error: job.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_status_precedence() {
        let mut counts = StatusCounts::default();
        assert_eq!(counts.overall(), MatchStatus::Safe);
        counts.record(MatchStatus::Warning);
        assert_eq!(counts.overall(), MatchStatus::Warning);
        counts.record(MatchStatus::Prohibited);
        counts.record(MatchStatus::Safe);
        assert_eq!(counts.overall(), MatchStatus::Prohibited);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_origin_tags() {
        assert_eq!("text".parse::<Origin>().unwrap(), Origin::Text);
        assert_eq!(" OCR ".parse::<Origin>().unwrap(), Origin::Ocr);
        assert_eq!("image".parse::<Origin>().unwrap(), Origin::Ocr);
        assert_eq!(
            "fax".parse::<Origin>(),
            Err(AnalysisError::UnsupportedOrigin("fax".into()))
        );
    }

    #[test]
    fn test_job_transitions_never_go_backward() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Complete));
        assert!(Running.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Pending));
        assert!(!Complete.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Complete));
        assert!(!Pending.can_transition_to(Complete));
        assert!(Complete.is_terminal() && Failed.is_terminal());
    }

    #[test]
    fn test_status_view_redirect_only_when_complete() {
        let mut job = AnalysisJob::new("Water".into(), "text".into(), DatasetVersion::new("v1"));
        let view = JobStatusView::from_job(&job, "/analysis/");
        assert!(!view.complete);
        assert!(view.redirect_url.is_none());

        job.status = JobStatus::Complete;
        job.result = Some(ListSummary::from_results(Vec::new(), DatasetVersion::new("v1")));
        let view = JobStatusView::from_job(&job, "/analysis/");
        assert!(view.complete);
        assert_eq!(view.status, Some(MatchStatus::Safe));
        assert_eq!(view.redirect_url, Some(format!("/analysis/{}/", job.id)));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&MatchStatus::Prohibited).unwrap();
        assert_eq!(json, "\"prohibited\"");
    }
}
