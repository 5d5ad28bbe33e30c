//! Dataset overview for `annexg peek`.

use anyhow::Result;
use serde::Serialize;

use annex_guard_core::DatasetSnapshot;

use crate::config::Config;
use crate::dataset;

#[derive(Debug, Clone, Serialize)]
pub struct PeekEntry {
    pub canonical_name: String,
    pub regulation_id: String,
    pub is_cmr: bool,
    pub synonyms: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetOverview {
    pub version: String,
    pub entries: usize,
    pub cmr_entries: usize,
    pub conflicts: usize,
    pub safe_overrides: usize,
    /// First entries by canonical name.
    pub sample: Vec<PeekEntry>,
}

pub fn overview(snapshot: &DatasetSnapshot, limit: usize) -> DatasetOverview {
    let index = &snapshot.index;
    let mut sample: Vec<PeekEntry> = index
        .entries()
        .iter()
        .map(|e| PeekEntry {
            canonical_name: e.canonical_name.clone(),
            regulation_id: e.regulation_id.clone(),
            is_cmr: e.is_cmr,
            synonyms: e.synonyms.len(),
        })
        .collect();
    sample.sort_by(|a, b| {
        a.canonical_name
            .to_lowercase()
            .cmp(&b.canonical_name.to_lowercase())
            .then_with(|| a.regulation_id.cmp(&b.regulation_id))
    });
    sample.truncate(limit);

    DatasetOverview {
        version: index.version().to_string(),
        entries: index.len(),
        cmr_entries: index.entries().iter().filter(|e| e.is_cmr).count(),
        conflicts: index.conflicts().len(),
        safe_overrides: snapshot.overrides.len(),
        sample,
    }
}

/// CLI entry point: load the dataset and print an overview, as a table or JSON.
pub fn run_peek(config: &Config, limit: usize, json: bool) -> Result<()> {
    let snapshot = dataset::load_snapshot(config)?;
    let view = overview(&snapshot, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("Annex Guard — Dataset");
    println!("=====================");
    println!();
    println!("  File:        {}", config.dataset.path.display());
    println!("  Version:     {}", view.version);
    println!("  Entries:     {}", view.entries);
    println!("  CMR:         {}", view.cmr_entries);
    println!("  Conflicts:   {}", view.conflicts);
    println!("  Safe names:  {}", view.safe_overrides);
    println!();

    if view.sample.is_empty() {
        println!("  (dataset is empty)");
        return Ok(());
    }

    println!("  {:<40} {:<12} CMR", "NAME", "REGULATION");
    for entry in &view.sample {
        println!(
            "  {:<40} {:<12} {}",
            entry.canonical_name,
            entry.regulation_id,
            if entry.is_cmr { "yes" } else { "" }
        );
    }
    if view.entries > view.sample.len() {
        println!("  … {} more", view.entries - view.sample.len());
    }

    Ok(())
}
