//! Analysis pipeline and job lifecycle.
//!
//! [`AnalysisPipeline`] owns every [`AnalysisJob`] and is the only code
//! that mutates one. A job moves `PENDING → RUNNING → {COMPLETE, FAILED}`
//! and never backwards; both end states are terminal.
//!
//! # Per-job flow
//!
//! 1. Pin the current [`Matcher`] (and with it one dataset version).
//! 2. Validate the origin tag and input length.
//! 3. Split the text into ingredients and normalize each one.
//! 4. Look up the whole-list summary in the [`ResultCache`]; on a miss,
//!    classify each ingredient through the cache and aggregate.
//! 5. Attach the summary and mark the job COMPLETE, or attach the error
//!    and mark it FAILED.
//!
//! Per-ingredient classification never fails a job. Only input-level
//! errors ([`AnalysisError`]) do.
//!
//! Dataset reloads swap the current matcher behind a lock; running jobs
//! keep the matcher they pinned, so no job sees two dataset versions.
//!
//! The task running a job owns its working copy and mirrors each state
//! change into the shared map. Pruning or deleting the map entry never
//! affects what [`AnalysisPipeline::analyze`] returns.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::cache::ResultCache;
use crate::error::{AnalysisError, JobError};
use crate::index::DatasetSnapshot;
use crate::matcher::{Classify, Matcher};
use crate::models::{
    AnalysisJob, DatasetVersion, IngredientResult, JobStatus, JobStatusView, ListSummary,
    MatchStatus, Origin,
};
use crate::normalize::normalize;
use crate::split::{list_key, split_ingredients};

/// Pipeline limits and presentation settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Longest accepted submission, in characters.
    pub max_input_chars: usize,
    /// Finished jobs kept in memory; older ones are pruned.
    pub retain: usize,
    /// Prefix of the result URL handed to status pollers.
    pub redirect_base: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 10_000,
            retain: 1_000,
            redirect_base: "/analysis".to_string(),
        }
    }
}

/// Aggregate counts over the jobs currently held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub complete: usize,
    pub failed: usize,
    pub safe: usize,
    pub warning: usize,
    pub prohibited: usize,
}

struct Inner {
    current: RwLock<Arc<Matcher>>,
    cache: Arc<ResultCache>,
    jobs: RwLock<HashMap<Uuid, AnalysisJob>>,
    config: PipelineConfig,
}

/// Orchestrates normalization, cached matching, and job state.
///
/// Cloning is cheap; clones share jobs, cache, and dataset.
#[derive(Clone)]
pub struct AnalysisPipeline {
    inner: Arc<Inner>,
}

impl AnalysisPipeline {
    pub fn new(matcher: Matcher, cache: Arc<ResultCache>, config: PipelineConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(Arc::new(matcher)),
                cache,
                jobs: RwLock::new(HashMap::new()),
                config,
            }),
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.inner.cache
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// The matcher new jobs will pin.
    pub fn current_matcher(&self) -> Arc<Matcher> {
        let current = self
            .inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    pub fn dataset_version(&self) -> DatasetVersion {
        self.current_matcher().dataset_version().clone()
    }

    /// Switch to a new dataset version and drop cache entries of the old ones.
    ///
    /// Jobs already submitted finish against the version they pinned.
    /// Returns the number of cache entries removed.
    pub async fn reload_dataset(&self, snapshot: DatasetSnapshot) -> usize {
        let next = {
            let mut current = self
                .inner
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let next = Arc::new(current.with_snapshot(snapshot));
            tracing::info!(
                from = %current.dataset_version(),
                to = %next.dataset_version(),
                entries = next.snapshot().index.len(),
                "switched reference dataset"
            );
            *current = Arc::clone(&next);
            next
        };
        self.inner
            .cache
            .invalidate_dataset(next.dataset_version())
            .await
    }

    /// Create a PENDING job and run it on the Tokio runtime.
    ///
    /// Returns immediately with the PENDING snapshot. Must be called from
    /// within a Tokio runtime.
    pub fn submit(&self, raw_text: impl Into<String>, origin_tag: impl Into<String>) -> AnalysisJob {
        let (job, matcher) = self.create_job(raw_text.into(), origin_tag.into());
        let pipeline = self.clone();
        let working = job.clone();
        tokio::spawn(async move {
            pipeline.execute(working, matcher).await;
        });
        job
    }

    /// Create a job and run it to a terminal state before returning.
    pub async fn analyze(
        &self,
        raw_text: impl Into<String>,
        origin_tag: impl Into<String>,
    ) -> AnalysisJob {
        let (job, matcher) = self.create_job(raw_text.into(), origin_tag.into());
        self.execute(job, matcher).await
    }

    /// Current snapshot of a job. Never blocks on job progress.
    pub fn poll(&self, id: Uuid) -> Option<AnalysisJob> {
        self.read_jobs().get(&id).cloned()
    }

    /// Poller view of a job: `{complete, status, redirect_url}`.
    pub fn status(&self, id: Uuid) -> Option<JobStatusView> {
        self.read_jobs()
            .get(&id)
            .map(|job| JobStatusView::from_job(job, &self.inner.config.redirect_base))
    }

    /// Most recent jobs first, skipping the newest `offset`.
    pub fn history(&self, offset: usize, limit: usize) -> Vec<AnalysisJob> {
        let mut jobs: Vec<AnalysisJob> = self.read_jobs().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        jobs.into_iter().skip(offset).take(limit).collect()
    }

    /// Remove a job and return its last snapshot.
    ///
    /// A job deleted while running still finishes; its outcome is simply
    /// not recorded.
    pub fn delete(&self, id: Uuid) -> Option<AnalysisJob> {
        let removed = self
            .inner
            .jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if let Some(job) = &removed {
            tracing::info!(job = %id, status = %job.status, "deleted analysis job");
        }
        removed
    }

    pub fn stats(&self) -> JobStats {
        let jobs = self.read_jobs();
        let mut stats = JobStats {
            total: jobs.len(),
            ..JobStats::default()
        };
        for job in jobs.values() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Complete => stats.complete += 1,
            }
            match job.overall_status() {
                Some(MatchStatus::Safe) => stats.safe += 1,
                Some(MatchStatus::Warning) => stats.warning += 1,
                Some(MatchStatus::Prohibited) => stats.prohibited += 1,
                None => {}
            }
        }
        stats
    }

    /// Drop the oldest finished jobs beyond `retain`. Unfinished jobs are kept.
    pub fn prune(&self, retain: usize) -> usize {
        let mut jobs = self
            .inner
            .jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut finished: Vec<(chrono::DateTime<Utc>, Uuid)> = jobs
            .values()
            .filter(|j| j.status.is_terminal())
            .map(|j| (j.created_at, j.id))
            .collect();
        if finished.len() <= retain {
            return 0;
        }
        finished.sort_by(|a, b| b.cmp(a));
        let stale: Vec<Uuid> = finished.into_iter().skip(retain).map(|(_, id)| id).collect();
        for id in &stale {
            jobs.remove(id);
        }
        tracing::info!(removed = stale.len(), retain, "pruned finished analysis jobs");
        stale.len()
    }

    fn read_jobs(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, AnalysisJob>> {
        self.inner
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn create_job(&self, raw_text: String, origin_tag: String) -> (AnalysisJob, Arc<Matcher>) {
        let matcher = self.current_matcher();
        let job = AnalysisJob::new(raw_text, origin_tag, matcher.dataset_version().clone());
        self.inner
            .jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.id, job.clone());
        tracing::debug!(job = %job.id, origin = %job.origin, "analysis job created");
        (job, matcher)
    }

    /// Apply `f` and move `job` to `next` if the transition is allowed,
    /// then publish the new snapshot. A deleted job is not re-inserted.
    fn advance<F>(&self, job: &mut AnalysisJob, next: JobStatus, f: F) -> bool
    where
        F: FnOnce(&mut AnalysisJob),
    {
        if !job.status.can_transition_to(next) {
            tracing::warn!(job = %job.id, from = %job.status, to = %next, "rejected job transition");
            return false;
        }
        job.status = next;
        f(job);
        if let Some(slot) = self
            .inner
            .jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&job.id)
        {
            *slot = job.clone();
        }
        tracing::debug!(job = %job.id, status = %next, "job transition");
        true
    }

    /// Run `job` to a terminal state and return that final snapshot.
    async fn execute(&self, mut job: AnalysisJob, matcher: Arc<Matcher>) -> AnalysisJob {
        if !self.advance(&mut job, JobStatus::Running, |job| {
            job.started_at = Some(Utc::now());
        }) {
            return job;
        }

        let outcome = self
            .summarize(&job.input_text, &job.origin, matcher.as_ref())
            .await;

        let finish = |job: &mut AnalysisJob| {
            let now = Utc::now();
            job.finished_at = Some(now);
            job.duration_ms = job
                .started_at
                .map(|started| (now - started).num_milliseconds().max(0) as u64);
        };

        match outcome {
            Ok(summary) => {
                let overall = summary.overall;
                let count = summary.ingredients.len();
                if self.advance(&mut job, JobStatus::Complete, |job| {
                    job.result = Some(summary);
                    finish(job);
                }) {
                    tracing::info!(
                        job = %job.id,
                        overall = %overall,
                        ingredients = count,
                        duration_ms = job.duration_ms.unwrap_or(0),
                        "analysis complete"
                    );
                }
            }
            Err(err) => {
                tracing::warn!(job = %job.id, error = %err, "analysis failed");
                self.advance(&mut job, JobStatus::Failed, |job| {
                    job.error = Some(JobError::from(&err));
                    finish(job);
                });
            }
        }

        self.prune(self.inner.config.retain);
        job
    }

    async fn summarize(
        &self,
        text: &str,
        origin_tag: &str,
        matcher: &Matcher,
    ) -> Result<ListSummary, AnalysisError> {
        origin_tag.parse::<Origin>()?;

        let len = text.chars().count();
        let max = self.inner.config.max_input_chars;
        if len > max {
            return Err(AnalysisError::InputTooLong { len, max });
        }

        let tokens: Vec<_> = split_ingredients(text)
            .into_iter()
            .map(|raw| {
                let normalized = normalize(&raw.text);
                (raw, normalized)
            })
            .collect();
        if tokens.iter().all(|(_, normalized)| normalized.is_empty()) {
            return Err(AnalysisError::EmptyInput);
        }

        let cache = &self.inner.cache;
        let version = matcher.dataset_version();
        let summary = cache
            .get_or_compute_summary(version, &list_key(text), || async {
                let mut results = Vec::with_capacity(tokens.len());
                for (raw, normalized) in &tokens {
                    let verdict = cache.get_or_compute_verdict(matcher, normalized).await;
                    let entry = verdict.matched_entry.as_deref();
                    results.push(IngredientResult {
                        position: raw.position,
                        name: raw.text.clone(),
                        normalized: normalized.as_str().to_string(),
                        start: raw.start,
                        end: raw.end,
                        status: verdict.status,
                        match_type: verdict.match_type,
                        matched_name: entry.map(|e| e.canonical_name.clone()),
                        regulation_id: entry.map(|e| e.regulation_id.clone()),
                        is_cmr: verdict.is_cmr,
                        cmr_note: verdict.cmr_note.clone(),
                        score: verdict.score,
                    });
                }
                ListSummary::from_results(results, version.clone())
            })
            .await;

        Ok(summary)
    }
}
