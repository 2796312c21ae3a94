//! Tract boundary correction.
//!
//! Each raw Census tract polygon is intersected with the county outline so
//! its edges follow the real shoreline. An intersection can come back
//! empty, as one region, or as several disjoint regions (a tract cut in two
//! by a bay, or a tract with piers and islands). Every region keeps the
//! tract's GEOID so that a point in any of them resolves to the same tract.

use std::path::Path;

use geo::{Area, BooleanOps, MultiPolygon, Polygon};
use medcall_tract_models::{BuildReport, RawTract};

use crate::boundary::{format_multipolygon, parse_multipolygon};
use crate::config::PipelineConfig;
use crate::county::CountyBoundary;
use crate::index::TractIndex;
use crate::TractError;

/// Raw tract CSV columns that must be present, with their accepted aliases.
const REQUIRED_TRACT_COLUMNS: &[&[&str]] = &[
    &["GEOID10", "GEOID20", "GEOID"],
    &["the_geom", "geometry"],
    &["ALAND10", "ALAND20", "ALAND"],
    &["AWATER10", "AWATER20", "AWATER"],
];

/// The shape of a tract/county intersection.
#[derive(Debug, Clone, PartialEq)]
pub enum Intersection {
    /// No overlap, or only a zero-area overlap.
    Empty,
    /// One connected region.
    Single(Polygon<f64>),
    /// Several disjoint regions, in the order the overlay produced them.
    Multi(Vec<Polygon<f64>>),
}

impl Intersection {
    /// Classifies the output of a polygon intersection.
    ///
    /// Zero-area pieces (shared edges, touching corners) are discarded
    /// before counting.
    #[must_use]
    pub fn classify(result: MultiPolygon<f64>) -> Self {
        let mut polygons: Vec<Polygon<f64>> = result
            .0
            .into_iter()
            .filter(|p| p.unsigned_area() > 0.0)
            .collect();

        match polygons.len() {
            0 => Self::Empty,
            1 => polygons.pop().map_or(Self::Empty, Self::Single),
            _ => Self::Multi(polygons),
        }
    }

    /// Flattens into the list of regions.
    #[must_use]
    pub fn into_polygons(self) -> Vec<Polygon<f64>> {
        match self {
            Self::Empty => vec![],
            Self::Single(polygon) => vec![polygon],
            Self::Multi(polygons) => polygons,
        }
    }
}

/// A tract whose boundary has been clipped to the county outline.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedTract {
    /// Census GEOID, shared by every polygon.
    pub geoid: String,
    /// Human-readable tract name.
    pub name: String,
    /// Land area in square meters, as recorded in the source.
    pub land_area: u64,
    /// Water area in square meters, as recorded in the source.
    pub water_area: u64,
    /// Corrected land regions. Never empty.
    pub polygons: Vec<Polygon<f64>>,
}

impl CorrectedTract {
    /// The corrected boundary in `MULTIPOLYGON (((...)))` form.
    #[must_use]
    pub fn to_multipolygon_text(&self) -> String {
        format_multipolygon(&self.polygons).unwrap_or_default()
    }
}

/// Clips raw tracts against one county outline.
pub struct TractBoundaryBuilder<'a> {
    county: &'a CountyBoundary,
}

impl<'a> TractBoundaryBuilder<'a> {
    /// Creates a builder for the given county.
    #[must_use]
    pub const fn new(county: &'a CountyBoundary) -> Self {
        Self { county }
    }

    /// Parses one raw boundary and intersects it with the county.
    ///
    /// # Errors
    ///
    /// Returns [`TractError::MalformedGeometry`] if the raw boundary text
    /// cannot be parsed.
    pub fn intersect(&self, raw: &RawTract) -> Result<Intersection, TractError> {
        let polygon = parse_multipolygon(&raw.raw_boundary)?;
        Ok(Intersection::classify(
            polygon.intersection(&self.county.boundary),
        ))
    }

    /// Corrects every tract with land area.
    ///
    /// Malformed tracts are logged and dropped; tracts with no land or an
    /// empty intersection produce no entry. Output order follows input
    /// order.
    #[must_use]
    pub fn build(&self, raw_tracts: &[RawTract]) -> (Vec<CorrectedTract>, BuildReport) {
        let mut report = BuildReport::default();
        let mut corrected = Vec::with_capacity(raw_tracts.len());

        for raw in raw_tracts {
            report.tracts_read += 1;

            if !raw.has_land() {
                log::debug!("Tract {}: no land area, skipping", raw.geoid);
                report.skipped_no_land += 1;
                continue;
            }

            let intersection = match self.intersect(raw) {
                Ok(intersection) => intersection,
                Err(e) => {
                    log::warn!("Tract {}: dropping, {e}", raw.geoid);
                    report.malformed += 1;
                    continue;
                }
            };

            let polygons = match intersection {
                Intersection::Empty => {
                    log::debug!(
                        "Tract {}: no overlap with {}",
                        raw.geoid,
                        self.county.county_name
                    );
                    report.empty_intersections += 1;
                    continue;
                }
                Intersection::Single(polygon) => vec![polygon],
                Intersection::Multi(polygons) => {
                    log::debug!(
                        "Tract {}: split into {} regions by the county boundary",
                        raw.geoid,
                        polygons.len()
                    );
                    report.split_tracts += 1;
                    polygons
                }
            };

            report.tracts_corrected += 1;
            report.polygons += polygons.len() as u64;
            corrected.push(CorrectedTract {
                geoid: raw.geoid.clone(),
                name: raw.name.clone(),
                land_area: raw.land_area,
                water_area: raw.water_area,
                polygons,
            });
        }

        log::info!(
            "Corrected {} of {} tracts against {} ({} polygons, {} split, {} without land, \
             {} outside county, {} malformed)",
            report.tracts_corrected,
            report.tracts_read,
            self.county.county_name,
            report.polygons,
            report.split_tracts,
            report.skipped_no_land,
            report.empty_intersections,
            report.malformed
        );

        (corrected, report)
    }
}

/// Raw tracts read from the Census export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTractTable {
    /// Decoded rows, in file order.
    pub tracts: Vec<RawTract>,
    /// Rows skipped because a field could not be decoded.
    pub unreadable_rows: u64,
}

/// Reads the raw Census tract CSV export.
///
/// GEOIDs are read as text. Columns other than GEOID, geometry, land and
/// water area, and name are ignored. A row that cannot be decoded (short
/// row, non-integer area) is logged and skipped; the other rows load.
///
/// # Errors
///
/// Returns [`TractError::MissingColumn`] if a required column is absent,
/// or an I/O or CSV error if the file or its header cannot be read.
pub fn load_raw_tracts(path: &Path) -> Result<RawTractTable, TractError> {
    log::info!("Loading raw tracts from {}", path.display());
    read_raw_tracts(std::fs::File::open(path)?)
}

fn read_raw_tracts<R: std::io::Read>(source: R) -> Result<RawTractTable, TractError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);

    let headers = reader.headers()?.clone();
    for names in REQUIRED_TRACT_COLUMNS {
        if !names.iter().any(|name| headers.iter().any(|h| h == *name)) {
            return Err(TractError::MissingColumn {
                column: names[0].to_string(),
            });
        }
    }

    let mut table = RawTractTable::default();
    for result in reader.deserialize::<RawTract>() {
        match result {
            Ok(tract) => table.tracts.push(tract),
            Err(e) => {
                log::warn!("Skipping unreadable tract row: {e}");
                table.unreadable_rows += 1;
            }
        }
    }
    log::info!(
        "Loaded {} raw tracts ({} unreadable rows skipped)",
        table.tracts.len(),
        table.unreadable_rows
    );

    Ok(table)
}

/// Loads the raw tracts and county outline named by `config`, corrects the
/// tracts, and indexes the result.
///
/// # Errors
///
/// Returns [`TractError::CountyNotFound`] if the configured county is not
/// in the boundary dataset, or any I/O or format error from loading the
/// inputs. Individual malformed or unreadable tracts are not errors.
pub fn build_tract_index(config: &PipelineConfig) -> Result<(TractIndex, BuildReport), TractError> {
    let county = CountyBoundary::load(
        &config.county_boundaries_path(),
        &config.county_boundaries.name_field,
        &config.tracts.county,
    )?;
    let table = load_raw_tracts(&config.tracts_path())?;

    let (corrected, mut report) = TractBoundaryBuilder::new(&county).build(&table.tracts);
    report.unreadable_rows = table.unreadable_rows;
    Ok((TractIndex::from_tracts(&corrected), report))
}
