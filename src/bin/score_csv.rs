//! Offline scorer: `score_csv <input.csv> [output.csv]`.
//! Uses the configured model; writes the scored CSV (stdout when no output path).

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use attrition_scorer::{load_predictor, summarize, table, AppConfig, ScoringPipeline, Verdict};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        bail!("usage: score_csv <input.csv> [output.csv]");
    };
    let output = args.next().map(PathBuf::from);

    let cfg = AppConfig::load()?;
    let pipeline = ScoringPipeline::with_threshold(load_predictor(&cfg.model_path)?, cfg.threshold);

    let bytes = std::fs::read(&input).with_context(|| format!("read {}", input.display()))?;
    let parsed = table::parse_csv(&bytes).with_context(|| format!("parse {}", input.display()))?;
    let scored = pipeline.score(parsed.rows)?;
    let csv = table::export_csv(&parsed.columns, &scored)?;

    match &output {
        Some(path) => {
            std::fs::write(path, &csv).with_context(|| format!("write {}", path.display()))?
        }
        None => std::io::stdout().write_all(&csv)?,
    }

    let summary = summarize(&scored, cfg.group_field.as_deref());
    eprintln!(
        "scored {} rows: {} {}, {} {}",
        summary.total,
        summary.count(1),
        Verdict::LikelyToLeave.label(),
        summary.count(0),
        Verdict::LikelyToStay.label(),
    );
    for (group, counts) in &summary.by_group {
        let leave = counts.get(&1).copied().unwrap_or(0);
        let stay = counts.get(&0).copied().unwrap_or(0);
        eprintln!("  {group}: leave={leave} stay={stay}");
    }
    if let Some(path) = output {
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}
