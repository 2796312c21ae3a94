#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for tract boundary correction and call tract assignment.

mod progress;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use medcall_tract::builder::{TractBoundaryBuilder, build_tract_index, load_raw_tracts};
use medcall_tract::bulk::BulkAssignmentPipeline;
use medcall_tract::config::PipelineConfig;
use medcall_tract::county::CountyBoundary;
use medcall_tract::lookup::find_tract_by_point;
use medcall_tract_models::{RawTract, TractAssignment};

use crate::progress::{IndicatifProgress, init_logger};

#[derive(Parser)]
#[command(name = "medcall_cli", about = "Census tract assignment for emergency calls")]
struct Cli {
    /// Pipeline configuration file
    #[arg(long, global = true, default_value = "medcall.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clip the raw Census tracts to the county boundary and report the result
    Build {
        /// Write the corrected tracts as CSV (same columns as the raw export)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Assign a tract to every incident in the call dataset
    Assign {
        /// Recompute even if a cached result exists
        #[arg(long)]
        force: bool,
    },
    /// Find the tract containing a single coordinate
    Lookup {
        /// Longitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Latitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = init_logger();
    let cli = Cli::parse();
    let config = PipelineConfig::load(&cli.config)?;
    let start = Instant::now();

    match cli.command {
        Commands::Build { output } => build(&config, output.as_deref())?,
        Commands::Assign { force } => {
            let progress = IndicatifProgress::records_bar(&multi, "Loading incidents");
            let outcome = BulkAssignmentPipeline::new(&config).run(force, &progress)?;
            let report = outcome.report;
            println!(
                "{} incidents: {} resolved, {} unresolved, {} without a location{}",
                report.total,
                report.resolved,
                report.unresolved,
                report.unknown_location,
                if outcome.from_cache { " (cached)" } else { "" }
            );
        }
        Commands::Lookup { lon, lat } => {
            let (index, _) = build_tract_index(&config)?;
            match find_tract_by_point(&index, lon, lat) {
                TractAssignment::Resolved(geoid) => println!("{geoid}"),
                TractAssignment::Unresolved => println!("unresolved"),
            }
        }
    }

    log::info!("Done in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn build(config: &PipelineConfig, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let county = CountyBoundary::load(
        &config.county_boundaries_path(),
        &config.county_boundaries.name_field,
        &config.tracts.county,
    )?;
    let table = load_raw_tracts(&config.tracts_path())?;
    let (corrected, mut report) = TractBoundaryBuilder::new(&county).build(&table.tracts);
    report.unreadable_rows = table.unreadable_rows;

    println!(
        "{} tracts read ({} unreadable rows skipped): {} corrected into {} polygons \
         ({} split), {} without land, {} outside {}, {} malformed",
        report.tracts_read,
        report.unreadable_rows,
        report.tracts_corrected,
        report.polygons,
        report.split_tracts,
        report.skipped_no_land,
        report.empty_intersections,
        county.county_name,
        report.malformed
    );

    if let Some(path) = output {
        let mut writer = csv::Writer::from_path(path)?;
        for tract in &corrected {
            writer.serialize(RawTract {
                geoid: tract.geoid.clone(),
                raw_boundary: tract.to_multipolygon_text(),
                land_area: tract.land_area,
                water_area: tract.water_area,
                name: tract.name.clone(),
            })?;
        }
        writer.flush()?;
        log::info!(
            "Wrote {} corrected tracts to {}",
            corrected.len(),
            path.display()
        );
    }

    Ok(())
}
