//! One-shot analysis of an ingredient list.
//!
//! Used by the `annexg analyze` command. The job runs inline through the
//! same [`AnalysisPipeline`](annex_guard_core::AnalysisPipeline) the HTTP
//! server uses, so output matches what a poller would eventually see.

use std::fmt::Write as _;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};

use annex_guard_core::{AnalysisJob, JobStatus};

use crate::config::Config;
use crate::engine;

/// Resolve the text to analyze: the argument, then `--file`, then piped stdin.
pub fn read_input(text: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()));
    }
    if atty::isnt(atty::Stream::Stdin) {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .with_context(|| "Failed to read stdin")?;
        return Ok(buf);
    }
    bail!("no input: pass TEXT, --file PATH, or pipe the list on stdin");
}

/// Run one analysis to completion against the configured dataset.
pub async fn analyze_text(config: &Config, text: String, origin: &str) -> Result<AnalysisJob> {
    let pipeline = engine::build_pipeline(config)?;
    Ok(pipeline.analyze(text, origin).await)
}

/// CLI entry point. Exits with status 1 when the job fails.
pub async fn run_analyze(config: &Config, text: String, origin: &str, json: bool) -> Result<()> {
    let job = analyze_text(config, text, origin).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        print!("{}", render_job(&job));
    }

    if job.status == JobStatus::Failed {
        if !json {
            if let Some(err) = &job.error {
                eprintln!("Error: {}", err.message);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Human-readable report of a finished job.
pub fn render_job(job: &AnalysisJob) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- Analysis ---");
    let _ = writeln!(out, "id:        {}", job.id);
    let _ = writeln!(out, "state:     {}", job.status);
    let _ = writeln!(out, "dataset:   {}", job.dataset_version);
    if let Some(ms) = job.duration_ms {
        let _ = writeln!(out, "duration:  {} ms", ms);
    }

    let Some(summary) = &job.result else {
        if let Some(err) = &job.error {
            let _ = writeln!(out, "error:     {} ({})", err.message, err.kind);
        }
        return out;
    };

    let _ = writeln!(out, "overall:   {}", summary.overall.as_str().to_uppercase());
    let _ = writeln!(
        out,
        "counts:    safe {} / warning {} / prohibited {}",
        summary.counts.safe, summary.counts.warning, summary.counts.prohibited
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "--- Ingredients ({}) ---", summary.ingredients.len());

    let width = summary
        .ingredients
        .iter()
        .map(|i| i.name.chars().count())
        .max()
        .unwrap_or(0);
    for item in &summary.ingredients {
        let _ = write!(
            out,
            "[{}] {:<width$}  {:<10}",
            item.position + 1,
            item.name,
            item.status.as_str(),
            width = width
        );
        if let (Some(name), Some(reg)) = (&item.matched_name, &item.regulation_id) {
            let _ = write!(out, "  {:.1}  {} ({})", item.score, name, reg);
        }
        if item.is_cmr {
            let _ = write!(out, "  CMR");
            if let Some(note) = &item.cmr_note {
                let _ = write!(out, ": {}", note);
            }
        }
        let _ = writeln!(out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> Config {
        let data = tmp.path().join("annex.json");
        std::fs::write(
            &data,
            r#"[{"canonical_name": "Hydroquinone", "regulation_id": "II/1339",
                 "is_cmr": true, "cmr_note": "Reprotoxic Cat. 1B"}]"#,
        )
        .unwrap();
        parse_config(&format!(
            "[dataset]\npath = \"{}\"\nversion = \"test\"\n",
            data.display()
        ))
        .unwrap()
    }

    #[test]
    fn test_read_input_prefers_argument() {
        let text = read_input(Some("Water".into()), Some(Path::new("/nonexistent"))).unwrap();
        assert_eq!(text, "Water");
    }

    #[test]
    fn test_read_input_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("list.txt");
        std::fs::write(&path, "Aqua, Glycerin").unwrap();
        assert_eq!(read_input(None, Some(&path)).unwrap(), "Aqua, Glycerin");
    }

    #[tokio::test]
    async fn test_render_prohibited_job() {
        let tmp = TempDir::new().unwrap();
        let job = analyze_text(&config(&tmp), "Water, Hydroquinone".into(), "text")
            .await
            .unwrap();
        let report = render_job(&job);
        assert!(report.contains("overall:   PROHIBITED"));
        assert!(report.contains("dataset:   test"));
        assert!(report.contains("--- Ingredients (2) ---"));
        assert!(report.contains("Hydroquinone (II/1339)"));
        assert!(report.contains("CMR: Reprotoxic Cat. 1B"));
    }

    #[tokio::test]
    async fn test_render_failed_job() {
        let tmp = TempDir::new().unwrap();
        let job = analyze_text(&config(&tmp), "  ".into(), "text").await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let report = render_job(&job);
        assert!(report.contains("state:     failed"));
        assert!(report.contains("empty_input"));
    }
}
