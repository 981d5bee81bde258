//! Forward-geocoding query tool (spec.md S6).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use geonlp_core::expander::{Expander, RuleExpander};
use geonlp_core::index::GeonlpReader;
use geonlp_core::search::{assemble, search, SearchConfig};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "geonlp-query")]
#[command(about = "Forward-geocode a free-form address against a built geonlp index")]
#[command(version)]
struct Args {
    /// Free-form address to geocode
    query: String,

    /// Directory holding the built index (object_primary.bin, etc.)
    #[arg(long)]
    geocoder_data: PathBuf,

    /// Reserved for postal-address expander configuration
    #[arg(long)]
    postal_country: Option<PathBuf>,

    #[arg(long)]
    postal_global: Option<PathBuf>,

    #[arg(long, default_value_t = 20)]
    max_results: usize,

    #[arg(long)]
    ref_latitude: Option<f64>,

    #[arg(long)]
    ref_longitude: Option<f64>,

    #[arg(long)]
    ref_zoom: Option<i32>,

    #[arg(long)]
    ref_importance: Option<f64>,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = args.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to install log subscriber");
    }

    match run(args) {
        Ok(found) => {
            if found {
                ExitCode::SUCCESS
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(255) // -1
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let mut reader = GeonlpReader::new();
    reader
        .load(&args.geocoder_data)
        .with_context(|| format!("opening index at {}", args.geocoder_data.display()))?;

    let expander = RuleExpander::new();
    let parsed = expander.parse(&args.query);

    let config = SearchConfig {
        max_results: args.max_results,
        ..Default::default()
    };

    let (Some(trie), Some(postings), Some(hierarchy)) = (reader.trie(), reader.postings(), reader.hierarchy())
    else {
        info!("index handle has nothing loaded; returning empty result set");
        print_results(&[], args.format);
        return Ok(false);
    };

    let candidates = search(&trie, postings, hierarchy, &parsed.parses, 0, &config);

    let places_by_id: hashbrown::HashMap<i64, &geonlp_core::Place> =
        reader.places().iter().map(|p| (p.id, p)).collect();
    let types = reader.types().context("index missing its type dictionary")?;

    let postal_filter = parsed.labels_only.get("postal_code").map(String::as_str);
    let results = assemble(&places_by_id, types, &candidates, postal_filter, &expander, &config);

    let found = !results.is_empty();
    print_results(&results, args.format);
    Ok(found)
}

fn print_results(results: &[geonlp_core::search::GeoResult], format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(results) {
            Ok(json) => println!("{json}"),
            Err(err) => error!("failed to serialize results: {err}"),
        },
        OutputFormat::Text => {
            for result in results {
                println!(
                    "{}\t{}\t{:.6},{:.6}\t(levels_resolved={})",
                    result.title, result.full_address, result.latitude, result.longitude, result.levels_resolved
                );
            }
        }
    }
}
