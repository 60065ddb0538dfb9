// Atlas — main.rs
// Command-line entry point: map a JSONL file of text records, or an .npy
// matrix of embeddings with optional JSONL metadata.
// Author: d65v <https://github.com/d65v>

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use atlas::input::Records;
use atlas::record::Record;
use atlas::{AtlasClient, AtlasConfig, AtlasError, DatasetSession, MapOptions, ProjectionParams};

#[derive(Parser)]
#[command(name = "atlas")]
#[command(about = "Upload data to Atlas and build a map of it")]
#[command(version)]
struct Cli {
    /// API base URL
    #[arg(long, env = "ATLAS_API_URL", global = true)]
    api_url: Option<String>,

    /// API key
    #[arg(long, env = "ATLAS_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Default organization for bare dataset names
    #[arg(long, env = "ATLAS_ORGANIZATION", global = true)]
    organization: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map text records read from a JSONL file
    MapText {
        /// JSONL file, one object per line
        #[arg(long)]
        file: PathBuf,

        /// Field holding the text to embed
        #[arg(long)]
        indexed_field: String,

        #[command(flatten)]
        map: MapArgs,

        /// Disable duplicate detection
        #[arg(long)]
        no_duplicate_detection: bool,

        #[arg(long, default_value_t = atlas::settings::DEFAULT_DUPLICATE_THRESHOLD)]
        duplicate_threshold: f32,
    },
    /// Map precomputed embeddings from a float32 .npy file
    MapEmbeddings {
        /// (N, D) float32 .npy file
        #[arg(long)]
        npy: PathBuf,

        /// JSONL metadata, one line per embedding row
        #[arg(long)]
        metadata: Option<PathBuf>,

        #[command(flatten)]
        map: MapArgs,
    },
}

#[derive(Args)]
struct MapArgs {
    #[arg(long, default_value = atlas::settings::ATLAS_DEFAULT_ID_FIELD)]
    id_field: String,

    /// Dataset name, `name` or `organization/name`; random if omitted
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    private: bool,

    /// Field to color the map by (repeatable)
    #[arg(long = "colorable", value_name = "FIELD")]
    colorable_fields: Vec<String>,

    #[arg(long)]
    no_topic_model: bool,

    #[arg(long)]
    topic_label_field: Option<String>,

    /// Replace the dataset if it already exists
    #[arg(long, conflicts_with = "add")]
    reset: bool,

    /// Append to the dataset if it already exists
    #[arg(long)]
    add: bool,

    #[arg(long, default_value_t = atlas::settings::DEFAULT_PROJECTION_N_NEIGHBORS)]
    n_neighbors: u32,

    #[arg(long, default_value_t = atlas::settings::DEFAULT_PROJECTION_EPOCHS)]
    epochs: u32,

    #[arg(long, default_value_t = atlas::settings::DEFAULT_PROJECTION_SPREAD)]
    spread: f32,
}

impl MapArgs {
    fn into_options(self) -> MapOptions {
        MapOptions {
            id_field: self.id_field,
            name: self.name,
            description: self.description,
            is_public: !self.private,
            colorable_fields: self.colorable_fields,
            build_topic_model: !self.no_topic_model,
            topic_label_field: self.topic_label_field,
            reset_project_if_exists: self.reset,
            add_datums_if_exists: self.add,
            projection: ProjectionParams {
                n_neighbors: self.n_neighbors,
                epochs: self.epochs,
                spread: self.spread,
            },
            ..MapOptions::default()
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    // Load .env if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    let mut config = AtlasConfig::from_env();
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    if let Some(key) = cli.api_key {
        config.api_key = key;
    }
    if cli.organization.is_some() {
        config.org_slug = cli.organization;
    }
    let client = AtlasClient::new(&config).context("Failed to configure the Atlas client")?;

    match cli.command {
        Commands::MapText {
            file,
            indexed_field,
            map,
            no_duplicate_detection,
            duplicate_threshold,
        } => {
            let options = MapOptions {
                duplicate_detection: !no_duplicate_detection,
                duplicate_threshold,
                ..map.into_options()
            };
            let rows = read_jsonl(&file)?;
            match atlas::map_text(&client, rows, &indexed_field, &options)? {
                Some(dataset) => print_done(&dataset),
                None => println!("No records in {}; nothing uploaded.", file.display()),
            }
        }
        Commands::MapEmbeddings { npy, metadata, map } => {
            let embeddings = atlas::npy::read_embeddings(&npy)
                .with_context(|| format!("Failed to read embeddings from {}", npy.display()))?;
            let metadata = match metadata {
                Some(path) => Some(
                    read_jsonl(&path)?
                        .collect::<atlas::Result<Vec<Record>>>()
                        .with_context(|| format!("Failed to read metadata from {}", path.display()))?,
                ),
                None => None,
            };
            let dataset = atlas::map_embeddings(&client, &embeddings, metadata, &map.into_options())?;
            print_done(&dataset);
        }
    }

    Ok(())
}

fn print_done(dataset: &atlas::AtlasDataset) {
    let info = dataset.info();
    println!(
        "Dataset `{}` ({}) now holds {} records.",
        dataset.identifier(),
        info.id,
        info.total_datums
    );
}

/// Lazily read a JSONL file as records. Blank lines are skipped; a line that
/// is not a JSON object fails with its line number.
fn read_jsonl(path: &Path) -> Result<Records<'static>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let rows = reader
        .lines()
        .enumerate()
        .filter_map(|(i, line)| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(parse_line(i + 1, &line)),
            Err(e) => Some(Err(AtlasError::Io(e))),
        });
    Ok(Box::new(rows))
}

fn parse_line(line_no: usize, line: &str) -> atlas::Result<Record> {
    match serde_json::from_str::<serde_json::Value>(line) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(AtlasError::Validation(format!(
            "line {}: expected a JSON object",
            line_no
        ))),
        Err(e) => Err(AtlasError::Validation(format!("line {}: {}", line_no, e))),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
