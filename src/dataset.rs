//! Annex II dataset loading.
//!
//! The dataset is a JSON array of reference entries:
//!
//! ```json
//! [
//!   { "canonical_name": "Hydroquinone", "regulation_id": "II/1339",
//!     "synonyms": ["1,4-benzenediol"], "cas_number": "123-31-9",
//!     "is_cmr": true, "cmr_note": "Reprotoxic Cat. 1B" }
//! ]
//! ```
//!
//! The dataset version is the configured `[dataset].version` or, when
//! absent, the first 12 hex characters of the file's SHA-256. Editing the
//! file therefore yields a new version and a fresh cache namespace.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use annex_guard_core::{
    DatasetSnapshot, DatasetVersion, ReferenceEntry, ReferenceIndex, SafeOverrideSet,
};

use crate::config::Config;

/// Content-derived version: a SHA-256 prefix of the raw file bytes.
pub fn content_version(bytes: &[u8]) -> DatasetVersion {
    let digest = hex::encode(Sha256::digest(bytes));
    DatasetVersion::new(&digest[..12])
}

/// Parse dataset rows from JSON text.
pub fn parse_entries(json: &str) -> Result<Vec<ReferenceEntry>> {
    let rows: Vec<ReferenceEntry> =
        serde_json::from_str(json).with_context(|| "Failed to parse dataset JSON")?;
    for (i, row) in rows.iter().enumerate() {
        if row.canonical_name.trim().is_empty() {
            anyhow::bail!("dataset row {} has an empty canonical_name", i);
        }
        if row.regulation_id.trim().is_empty() {
            anyhow::bail!(
                "dataset row {} ('{}') has an empty regulation_id",
                i,
                row.canonical_name
            );
        }
    }
    Ok(rows)
}

/// Load the configured dataset and build a snapshot with the configured overrides.
pub fn load_snapshot(config: &Config) -> Result<DatasetSnapshot> {
    let path = &config.dataset.path;
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read dataset file: {}", path.display()))?;
    let json = std::str::from_utf8(&bytes)
        .with_context(|| format!("Dataset file is not valid UTF-8: {}", path.display()))?;

    let rows = parse_entries(json)?;
    let version = match &config.dataset.version {
        Some(v) => DatasetVersion::new(v.as_str()),
        None => content_version(&bytes),
    };

    let mut overrides = SafeOverrideSet::with_defaults();
    overrides.extend(&config.matching.safe_overrides);

    let index = ReferenceIndex::build(version, rows);
    tracing::info!(
        path = %path.display(),
        version = %index.version(),
        entries = index.len(),
        conflicts = index.conflicts().len(),
        "loaded reference dataset"
    );

    Ok(DatasetSnapshot::new(index, overrides))
}
