//! Wires configuration into a ready [`AnalysisPipeline`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use annex_guard_core::cache::ResultCache;
use annex_guard_core::pipeline::PipelineConfig;
use annex_guard_core::similarity::metric_by_name;
use annex_guard_core::{AnalysisPipeline, DatasetSnapshot, Matcher, Thresholds};

use crate::config::Config;
use crate::dataset;

/// Matcher for `snapshot` with the configured metric, thresholds, and pre-filter.
pub fn build_matcher(config: &Config, snapshot: DatasetSnapshot) -> Result<Matcher> {
    let m = &config.matching;
    let similarity = metric_by_name(&m.metric)
        .ok_or_else(|| anyhow!("Unknown matching metric: '{}'", m.metric))?;
    Ok(Matcher::new(snapshot)
        .with_similarity(Arc::from(similarity))
        .with_thresholds(Thresholds {
            prohibited: m.prohibited_threshold,
            warning: m.warning_threshold,
        })
        .with_prefilter(m.prefilter))
}

/// Pipeline over an already loaded snapshot.
pub fn pipeline_for(config: &Config, snapshot: DatasetSnapshot) -> Result<AnalysisPipeline> {
    let matcher = build_matcher(config, snapshot)?;
    let cache = ResultCache::in_memory(Duration::from_secs(config.cache.ttl_secs));
    let settings = PipelineConfig {
        max_input_chars: config.jobs.max_input_chars,
        retain: config.jobs.retain,
        redirect_base: config.server.redirect_base.clone(),
    };
    Ok(AnalysisPipeline::new(matcher, Arc::new(cache), settings))
}

/// Load the dataset named in `config` and build the pipeline around it.
pub fn build_pipeline(config: &Config) -> Result<AnalysisPipeline> {
    let snapshot = dataset::load_snapshot(config)?;
    pipeline_for(config, snapshot)
}
