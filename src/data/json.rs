//! JSON and JSON Lines storage

use crate::backtest::{Diagnostics, SummaryStats};
use crate::bar::RawBar;
use crate::source::NewsIndex;
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Load every `*.json` (array of bars) and `*.jsonl` (one bar per line)
/// file in `dir`, in file name order.
///
/// Entries that are not valid bar objects are kept as empty records so the
/// validator rejects and counts them instead of them disappearing here.
pub fn load_raw_bars(dir: &Path) -> anyhow::Result<Vec<RawBar>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading data directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("json") | Some("jsonl")
            )
        })
        .collect();
    files.sort();

    let mut bars = Vec::new();
    for path in &files {
        let before = bars.len();
        if path.extension().and_then(|ext| ext.to_str()) == Some("jsonl") {
            read_json_lines(path, &mut bars)?;
        } else {
            read_json_array(path, &mut bars)?;
        }
        tracing::debug!(path = %path.display(), bars = bars.len() - before, "Loaded bar file");
    }

    tracing::info!(files = files.len(), bars = bars.len(), "Loaded raw bars");
    Ok(bars)
}

fn read_json_array(path: &Path, bars: &mut Vec<RawBar>) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let value: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;

    let Value::Array(entries) = value else {
        anyhow::bail!("{} does not hold a JSON array", path.display());
    };
    bars.extend(entries.into_iter().map(to_raw_bar));
    Ok(())
}

fn read_json_lines(path: &Path, bars: &mut Vec<RawBar>) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let bar = match serde_json::from_str::<Value>(&line) {
            Ok(value) => to_raw_bar(value),
            Err(e) => {
                tracing::debug!(path = %path.display(), line = number + 1, error = %e, "Unparseable bar line");
                RawBar::default()
            }
        };
        bars.push(bar);
    }
    Ok(())
}

fn to_raw_bar(value: Value) -> RawBar {
    serde_json::from_value(value).unwrap_or_default()
}

/// Write bars as JSON Lines
pub fn save_raw_bars(path: &Path, bars: &[RawBar]) -> anyhow::Result<()> {
    ensure_parent(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    for bar in bars {
        serde_json::to_writer(&mut writer, bar)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), bars = bars.len(), "Saved raw bars");
    Ok(())
}

/// Load a news index; a missing file yields an empty index
pub fn load_news_index(path: &Path) -> anyhow::Result<NewsIndex> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "News file not found, no ticker has confirmation");
        return Ok(NewsIndex::default());
    }
    let file = File::open(path)?;
    let index = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing news index {}", path.display()))?;
    Ok(index)
}

pub fn save_news_index(path: &Path, index: &NewsIndex) -> anyhow::Result<()> {
    ensure_parent(path)?;
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, index)?;
    tracing::info!(path = %path.display(), pairs = index.len(), "Saved news index");
    Ok(())
}

#[derive(Serialize)]
struct RunSummary<'a> {
    summary: &'a SummaryStats,
    diagnostics: &'a Diagnostics,
}

/// Write summary statistics and diagnostics side by side
pub fn write_summary_json(
    path: &Path,
    summary: &SummaryStats,
    diagnostics: &Diagnostics,
) -> anyhow::Result<()> {
    ensure_parent(path)?;
    let report = RunSummary {
        summary,
        diagnostics,
    };
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &report)?;
    tracing::info!(path = %path.display(), "Wrote summary");
    Ok(())
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
