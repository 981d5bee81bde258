//! Importer: builds a geonlp index from a `PlaceSource` (spec.md S6).

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use hashbrown::HashSet;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use geonlp_core::expander::RuleExpander;
use geonlp_core::import::{HierarchyBuilder, ImportConfig, InMemorySource, PlaceSource, SourceRow};
use geonlp_core::index::write_index;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "geonlp-import")]
#[command(about = "Build a geonlp index from a place source")]
#[command(version)]
struct Args {
    /// Output directory for the built index
    output_dir: PathBuf,

    /// GeoJSON boundary restricting the import region
    #[arg(long)]
    poly: Option<PathBuf>,

    #[arg(long)]
    postal_country: Option<String>,

    #[arg(long)]
    postal_address: Option<String>,

    /// Newline-separated list of types to keep even without a name
    #[arg(long)]
    priority: Option<PathBuf>,

    /// Newline-separated list of types to always drop
    #[arg(long)]
    skip: Option<PathBuf>,

    #[arg(long)]
    log_errors_to_file: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    /// In-memory `PlaceSource` fixture, since no database driver is in scope
    #[arg(long)]
    from_json: Option<PathBuf>,
}

const EXIT_MISSING_INPUT: u8 = 255; // -1
const EXIT_BOUNDARY_FAILURE: u8 = 254; // -2
const EXIT_INDEXING_FAILURE: u8 = 253; // -3

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to install log subscriber");
    }

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(EXIT_MISSING_INPUT)
        }
    }
}

fn read_type_list(path: &Option<PathBuf>) -> Result<HashSet<String>> {
    match path {
        None => Ok(HashSet::new()),
        Some(path) => {
            let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            Ok(content.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    if let Some(poly_path) = &args.poly {
        let content = fs::read_to_string(poly_path);
        match content.and_then(|c| {
            c.parse::<geojson::GeoJson>().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        }) {
            Ok(_) => info!(poly = %poly_path.display(), "boundary polygon parsed"),
            Err(err) => {
                tracing::error!("failed to open boundary file {}: {err}", poly_path.display());
                return Ok(ExitCode::from(EXIT_BOUNDARY_FAILURE));
            }
        }
    }

    let postgres_conn = std::env::var("GEOCODER_IMPORTER_POSTGRES").ok();

    let mut source = match (&args.from_json, &postgres_conn) {
        (Some(path), _) => {
            let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let rows: Vec<SourceRow> = serde_json::from_str(&content)?;
            InMemorySource::new(rows)
        }
        (None, Some(conn)) => {
            warn!(
                "GEOCODER_IMPORTER_POSTGRES is set ({conn} chars) but no concrete database \
                 driver is wired in this build; pass --from-json instead"
            );
            return Ok(ExitCode::from(EXIT_MISSING_INPUT));
        }
        (None, None) => {
            tracing::error!("no place source configured: pass --from-json or set GEOCODER_IMPORTER_POSTGRES");
            return Ok(ExitCode::from(EXIT_MISSING_INPUT));
        }
    };

    let config = ImportConfig::new()
        .with_priority_types(read_type_list(&args.priority)?)
        .with_skip_types(read_type_list(&args.skip)?);

    let mut builder = HierarchyBuilder::new(config);
    for row in source.rows() {
        builder.ingest_row(row)?;
    }
    builder.fetch_missing_parents(&mut source)?;
    builder.set_country(&mut source)?;
    builder.cleanup()?;
    builder.finalize()?;

    if let Err(err) = builder.check_indexing() {
        match &args.log_errors_to_file {
            Some(log_path) => {
                fs::write(log_path, format!("{err}\n"))
                    .with_context(|| format!("writing {}", log_path.display()))?;
                warn!("indexing check failed, logged to {}: {err}", log_path.display());
            }
            None => {
                tracing::error!("indexing check failed: {err}");
                return Ok(ExitCode::from(EXIT_INDEXING_FAILURE));
            }
        }
    }

    let (places, types) = builder.into_parts();
    let mut hierarchy = geonlp_core::model::HierarchyTable::new();
    for place in &places {
        hierarchy.insert(place.my_index, place.last_child_index);
    }

    let expander = RuleExpander::new();
    write_index(&args.output_dir, places, &hierarchy, &types, &expander, args.postal_country.clone())?;

    info!(dir = %args.output_dir.display(), "import complete");
    Ok(ExitCode::SUCCESS)
}
