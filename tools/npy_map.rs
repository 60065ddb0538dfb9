// Atlas — tools/npy_map.rs
// Pre-flight check for an embedding upload: reads a float32 .npy matrix (and
// optional JSONL metadata) and reports what `atlas map-embeddings` would send,
// without contacting the server.
//
// Usage:
//   npy_map --file embeddings.npy [--metadata rows.jsonl] [--id-field id_] [--verbose]
//
// Author: d65v <https://github.com/d65v>

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;

use atlas::input::Embeddings;
use atlas::settings::{ATLAS_DEFAULT_ID_FIELD, MAX_ID_LENGTH, UPLOAD_BATCH_SIZE};

#[derive(Parser, Debug)]
#[command(name = "npy_map")]
#[command(about = "Inspect a .npy embedding matrix before mapping it")]
struct Opts {
    /// Path to the (N, D) float32 .npy file
    #[arg(long, short = 'f')]
    file: PathBuf,

    /// JSONL metadata, one object per embedding row
    #[arg(long, short = 'm')]
    metadata: Option<PathBuf>,

    /// Identifier field expected in the metadata
    #[arg(long, default_value = ATLAS_DEFAULT_ID_FIELD)]
    id_field: String,

    /// List every row containing NaN/Inf
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Debug, Default, PartialEq)]
struct Report {
    rows: usize,
    dim: usize,
    non_finite_rows: Vec<usize>,
    batches: usize,
    metadata_rows: Option<usize>,
    ids_synthesized: bool,
    id_problems: Vec<String>,
}

impl Report {
    fn is_ready(&self) -> bool {
        self.non_finite_rows.is_empty()
            && self.id_problems.is_empty()
            && self.metadata_rows.map_or(true, |n| n == self.rows)
    }
}

fn inspect(embeddings: &Embeddings, metadata: Option<&[serde_json::Value]>, id_field: &str) -> Report {
    let non_finite_rows = embeddings
        .iter_rows()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|x| !x.is_finite()))
        .map(|(i, _)| i)
        .collect();

    let mut report = Report {
        rows: embeddings.rows(),
        dim: embeddings.dim(),
        non_finite_rows,
        batches: embeddings.rows().div_ceil(UPLOAD_BATCH_SIZE),
        metadata_rows: metadata.map(<[_]>::len),
        ..Report::default()
    };

    let first_has_id = metadata
        .and_then(|m| m.first())
        .map_or(false, |v| v.get(id_field).is_some());
    report.ids_synthesized = id_field == ATLAS_DEFAULT_ID_FIELD && !first_has_id;

    if report.ids_synthesized {
        return report;
    }
    let Some(rows) = metadata else {
        report
            .id_problems
            .push(format!("no metadata supplied for id field `{}`", id_field));
        return report;
    };
    for (i, row) in rows.iter().enumerate() {
        match row.get(id_field) {
            None | Some(serde_json::Value::Null) => {
                report.id_problems.push(format!("row {}: missing `{}`", i, id_field))
            }
            Some(serde_json::Value::String(s)) if s.chars().count() > MAX_ID_LENGTH => report
                .id_problems
                .push(format!("row {}: id longer than {} characters", i, MAX_ID_LENGTH)),
            Some(_) => {}
        }
    }
    report
}

fn read_metadata(path: &Path) -> Result<Vec<serde_json::Value>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(&line)
            .with_context(|| format!("{}: line {} is not valid JSON", path.display(), i + 1))?;
        if !value.is_object() {
            bail!("{}: line {} is not a JSON object", path.display(), i + 1);
        }
        rows.push(value);
    }
    Ok(rows)
}

fn main() -> Result<()> {
    env_logger::init();
    let opts = Opts::parse();

    let t = Instant::now();
    let embeddings = atlas::npy::read_embeddings(&opts.file)
        .with_context(|| format!("Failed to read {}", opts.file.display()))?;
    let metadata = opts.metadata.as_deref().map(read_metadata).transpose()?;

    let report = inspect(&embeddings, metadata.as_deref(), &opts.id_field);

    eprintln!("[npy_map] file     : {}", opts.file.display());
    eprintln!("[npy_map] shape    : ({}, {})", report.rows, report.dim);
    eprintln!("[npy_map] batches  : {}", report.batches);
    if let Some(n) = report.metadata_rows {
        eprintln!("[npy_map] metadata : {} rows", n);
    }
    eprintln!(
        "[npy_map] ids      : {}",
        if report.ids_synthesized {
            "generated in row order"
        } else {
            opts.id_field.as_str()
        }
    );
    eprintln!(
        "[npy_map] NaN/Inf  : {} rows",
        report.non_finite_rows.len()
    );
    if opts.verbose {
        for row in &report.non_finite_rows {
            eprintln!("[npy_map]   row {}", row);
        }
    }
    for problem in &report.id_problems {
        eprintln!("[npy_map] id error : {}", problem);
    }
    log::debug!("inspected in {:.2}s", t.elapsed().as_secs_f64());

    if !report.is_ready() {
        bail!("{} is not ready to map", opts.file.display());
    }
    println!("ready: {} embeddings of dimension {}", report.rows, report.dim);
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
