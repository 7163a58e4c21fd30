use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use transfer_impact::{
    CsvSeasonStore, ImpactEngine, Season, TransferRequest, load_config, load_linear_predictor,
};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config_path = parse_string_arg("--config").map(PathBuf::from);
    let mut cfg = load_config(config_path.as_deref())?;
    if let Some(dir) = parse_string_arg("--data-dir") {
        cfg.data_dir = PathBuf::from(dir);
    }
    if let Some(model) = parse_string_arg("--model") {
        cfg.model_path = PathBuf::from(model);
    }

    let team = parse_string_arg("--team").context("missing --team")?;
    let season: Season = parse_string_arg("--season")
        .context("missing --season (e.g. 2024-2025)")?
        .parse()?;
    let player = parse_string_arg("--player").context("missing --player")?;
    let minutes = parse_f64_arg("--minutes").context("missing or invalid --minutes")?;

    let mut request = TransferRequest::new(&player, minutes);
    if let Some(scale) = parse_f64_arg("--scale") {
        request = request.with_cross_league_scale(scale);
    }
    if let Some(raw) = parse_string_arg("--source-season") {
        request.incoming_source_season = Some(raw.parse()?);
    }
    for raw in parse_all_string_args("--outgoing") {
        let (name, mins) = parse_outgoing(&raw)?;
        request = request.with_outgoing(&name, mins);
    }

    let store = CsvSeasonStore::from_config(&cfg);
    let predictor = load_linear_predictor(&cfg.model_path)?;
    let engine = ImpactEngine::new(&store, &predictor, &cfg);
    let impact = engine.compare(&team, season, &request)?;

    let raw = serde_json::to_string_pretty(&impact).context("serialize result")?;
    println!("{raw}");
    Ok(())
}

/// `Name:minutes`, e.g. `--outgoing="Ann Striker:900"`.
fn parse_outgoing(raw: &str) -> Result<(String, f64)> {
    let (name, mins) = raw
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("--outgoing expects Name:minutes, got `{raw}`"))?;
    let mins = mins
        .trim()
        .parse::<f64>()
        .with_context(|| format!("invalid minutes in --outgoing `{raw}`"))?;
    Ok((name.trim().to_string(), mins))
}

fn parse_string_arg(name: &str) -> Option<String> {
    parse_all_string_args(name).into_iter().next()
}

fn parse_all_string_args(name: &str) -> Vec<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut out = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(v) = arg.strip_prefix(&format!("{name}="))
            && !v.trim().is_empty()
        {
            out.push(v.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            out.push(next.trim().to_string());
        }
    }
    out
}

fn parse_f64_arg(name: &str) -> Option<f64> {
    parse_string_arg(name).and_then(|raw| raw.parse::<f64>().ok())
}
