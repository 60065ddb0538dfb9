// Atlas — example/map_text.rs
// Maps a handful of short news headlines, colored by section.
// Run with:  ATLAS_API_KEY=... cargo run --example map_text

use atlas::{AtlasClient, AtlasConfig, MapOptions, RowTable};
use serde_json::json;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let _ = dotenv::dotenv();

    println!("── Atlas Text Example ────────────────────────");

    let client = AtlasClient::new(&AtlasConfig::from_env())?;

    let mut table = RowTable::new(vec!["headline".into(), "section".into()]);
    let rows = [
        ("Central bank holds rates steady", "business"),
        ("Local team wins the championship", "sports"),
        ("New telescope images a distant galaxy", "science"),
        ("Markets rally on earnings", "business"),
        ("Rookie sets scoring record", "sports"),
        ("Researchers sequence an ancient genome", "science"),
    ];
    for (headline, section) in rows {
        table.push_row(vec![json!(headline), json!(section)]);
    }

    let options = MapOptions {
        name: Some("headlines-example".into()),
        description: Some("Example headlines".into()),
        colorable_fields: vec!["section".into()],
        reset_project_if_exists: true,
        ..MapOptions::default()
    };

    match atlas::map_text(&client, table, "headline", &options)? {
        Some(dataset) => println!(
            "Uploaded to `{}` ({} records)",
            dataset.info().name,
            dataset.info().total_datums
        ),
        None => println!("Nothing to upload."),
    }

    println!("\n── Done ──────────────────────────────────────");
    Ok(())
}
