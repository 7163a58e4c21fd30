use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use transfer_impact::dataset::{build_training_dataset, write_dataset_csv, write_manifest};
use transfer_impact::{CsvSeasonStore, default_schema, load_config};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config_path = parse_path_arg("--config");
    let mut cfg = load_config(config_path.as_deref())?;
    if let Some(dir) = parse_path_arg("--data-dir") {
        cfg.data_dir = dir;
    }
    let out_path =
        parse_path_arg("--out").unwrap_or_else(|| PathBuf::from("model/training_dataset.csv"));
    let manifest_path = parse_path_arg("--manifest")
        .unwrap_or_else(|| out_path.with_extension("manifest.json"));

    let store = CsvSeasonStore::from_config(&cfg);
    let dataset = build_training_dataset(&store, &cfg, &default_schema())
        .with_context(|| format!("build dataset from {}", store.data_dir().display()))?;
    write_dataset_csv(&out_path, &dataset)?;
    write_manifest(&manifest_path, &dataset.manifest(&cfg))?;

    println!("training dataset written: {}", out_path.display());
    println!("rows: {}", dataset.rows.len());
    if !dataset.skipped_seasons.is_empty() {
        let skipped: Vec<String> = dataset.skipped_seasons.iter().map(|s| s.to_string()).collect();
        println!("skipped seasons: {}", skipped.join(", "));
    }
    println!("manifest: {}", manifest_path.display());
    Ok(())
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(&format!("{name}=")) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}
