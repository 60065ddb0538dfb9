// Atlas — example/map_embeddings.rs
// Maps 1,000 synthetic 16-d embeddings in two clusters, with a `cluster` label
// per row, then appends 100 more to the same dataset.
// Run with:  ATLAS_API_KEY=... cargo run --example map_embeddings

use atlas::{AtlasClient, AtlasConfig, Embeddings, MapOptions, Record};
use serde_json::json;

const DIM: usize = 16;

/// Deterministic points around one of two centers.
fn gen_points(start: usize, n: usize) -> (Embeddings, Vec<Record>) {
    let mut state = (start as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
    let mut values = Vec::with_capacity(n * DIM);
    let mut metadata = Vec::with_capacity(n);
    for i in start..start + n {
        let cluster = i % 2;
        for _ in 0..DIM {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let noise = ((state >> 33) as f32) / (u32::MAX as f32) * 0.2;
            values.push(if cluster == 0 { 1.0 } else { -1.0 } + noise);
        }
        let mut record = Record::new();
        record.insert("point".into(), json!(format!("p{}", i)));
        record.insert("cluster".into(), json!(cluster));
        metadata.push(record);
    }
    (Embeddings::new(values, DIM).expect("row-major buffer"), metadata)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let _ = dotenv::dotenv();

    println!("── Atlas Embedding Example ───────────────────");

    let client = AtlasClient::new(&AtlasConfig::from_env())?;

    let (embeddings, metadata) = gen_points(0, 1_000);
    let options = MapOptions {
        id_field: "point".into(),
        name: Some("clusters-example".into()),
        colorable_fields: vec!["cluster".into()],
        reset_project_if_exists: true,
        ..MapOptions::default()
    };
    let dataset = atlas::map_embeddings(&client, &embeddings, Some(metadata), &options)?;
    println!("Created `{}` with {} points", dataset.info().name, dataset.info().total_datums);

    // A second upload into the non-empty dataset rebuilds its maps.
    let (more, more_metadata) = gen_points(1_000, 100);
    let append = MapOptions {
        reset_project_if_exists: false,
        add_datums_if_exists: true,
        ..options
    };
    let dataset = atlas::map_embeddings(&client, &more, Some(more_metadata), &append)?;
    println!("Appended; `{}` now has {} points", dataset.info().name, dataset.info().total_datums);

    println!("\n── Done ──────────────────────────────────────");
    Ok(())
}
