#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Census tract and incident assignment types.
//!
//! These types describe the raw Census tract export rows, the location of a
//! single emergency call, and the outcome of assigning that call to a tract.
//! They carry no geometry library types so that downstream consumers (model
//! training, reporting) can depend on them without pulling in `geo`.

use serde::{Deserialize, Serialize};

/// A census tract row as exported by the Census tract dataset.
///
/// Immutable once loaded. Column names follow the 2010 export
/// (`GEOID10`, `the_geom`, ...); 2020 and unsuffixed names are accepted
/// as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTract {
    /// Census GEOID (state FIPS + county FIPS + tract code, e.g. "06075010100").
    ///
    /// Kept as text so leading zeros survive.
    #[serde(rename = "GEOID10", alias = "GEOID20", alias = "GEOID")]
    pub geoid: String,
    /// Boundary as `MULTIPOLYGON (((lon lat, ...)))` text.
    #[serde(rename = "the_geom", alias = "geometry")]
    pub raw_boundary: String,
    /// Land area in square meters.
    #[serde(rename = "ALAND10", alias = "ALAND20", alias = "ALAND")]
    pub land_area: u64,
    /// Water area in square meters.
    #[serde(rename = "AWATER10", alias = "AWATER20", alias = "AWATER")]
    pub water_area: u64,
    /// Human-readable tract name (e.g. "Census Tract 101").
    #[serde(
        rename = "NAMELSAD10",
        alias = "NAMELSAD20",
        alias = "NAMELSAD",
        default
    )]
    pub name: String,
}

impl RawTract {
    /// Whether the tract has any recorded land area.
    ///
    /// Land-free tracts (open water) are never corrected or indexed.
    #[must_use]
    pub const fn has_land(&self) -> bool {
        self.land_area > 0
    }
}

/// Where an incident happened, if the source record says.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncidentLocation {
    /// A WGS84 coordinate fix.
    Known {
        /// Longitude in degrees.
        longitude: f64,
        /// Latitude in degrees.
        latitude: f64,
    },
    /// The source location text was missing or malformed.
    Unknown,
}

impl IncidentLocation {
    /// Returns `(longitude, latitude)` for a known location.
    #[must_use]
    pub const fn lon_lat(&self) -> Option<(f64, f64)> {
        match *self {
            Self::Known {
                longitude,
                latitude,
            } => Some((longitude, latitude)),
            Self::Unknown => None,
        }
    }

    /// Whether this location has a coordinate fix.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known { .. })
    }
}

/// The tract an incident was assigned to.
///
/// `Unresolved` is a normal outcome (the point lies over water or outside
/// the studied county), not an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "geoid", rename_all = "snake_case")]
pub enum TractAssignment {
    /// The point fell inside the tract with this GEOID.
    Resolved(String),
    /// No tract polygon contains the point, or the point is unknown.
    Unresolved,
}

impl TractAssignment {
    /// Returns the GEOID for a resolved assignment.
    #[must_use]
    pub fn geoid(&self) -> Option<&str> {
        match self {
            Self::Resolved(geoid) => Some(geoid),
            Self::Unresolved => None,
        }
    }

    /// Whether a tract was found.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

impl From<Option<&str>> for TractAssignment {
    fn from(geoid: Option<&str>) -> Self {
        geoid.map_or(Self::Unresolved, |g| Self::Resolved(g.to_string()))
    }
}

/// One row of an incident dataset.
///
/// The core only interprets the location text; every other column is
/// carried through untouched so the augmented dataset keeps its shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// Raw location text, e.g. `"(37.7749, -122.4194)"`.
    pub location_text: Option<String>,
    /// All source columns, in source order.
    pub columns: Vec<String>,
}

/// An incident record after tract resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedIncident {
    /// The source record.
    pub record: IncidentRecord,
    /// Parsed location.
    pub location: IncidentLocation,
    /// Assigned tract.
    pub tract: TractAssignment,
}

/// Partial-success summary of a bulk assignment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentReport {
    /// Records processed.
    pub total: u64,
    /// Records assigned a tract.
    pub resolved: u64,
    /// Records with a location that no tract contains.
    pub unresolved: u64,
    /// Records whose location text was missing or malformed.
    pub unknown_location: u64,
}

impl AssignmentReport {
    /// Tallies a set of assigned incidents.
    #[must_use]
    pub fn from_incidents(incidents: &[AssignedIncident]) -> Self {
        let mut report = Self::default();
        for incident in incidents {
            report.total += 1;
            if !incident.location.is_known() {
                report.unknown_location += 1;
            } else if incident.tract.is_resolved() {
                report.resolved += 1;
            } else {
                report.unresolved += 1;
            }
        }
        report
    }
}

/// Summary of a tract boundary correction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    /// Raw tracts considered.
    pub tracts_read: u64,
    /// Tracts that produced at least one corrected polygon.
    pub tracts_corrected: u64,
    /// Corrected polygons across all tracts (index entries).
    pub polygons: u64,
    /// Tracts skipped because they have no land area.
    pub skipped_no_land: u64,
    /// Tracts whose intersection with the county was empty.
    pub empty_intersections: u64,
    /// Tracts dropped because their boundary text was malformed.
    pub malformed: u64,
    /// Tracts whose intersection split into several disjoint regions.
    pub split_tracts: u64,
    /// Source rows skipped because a field could not be decoded.
    #[serde(default)]
    pub unreadable_rows: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incident(location: IncidentLocation, tract: TractAssignment) -> AssignedIncident {
        AssignedIncident {
            record: IncidentRecord {
                location_text: None,
                columns: vec![],
            },
            location,
            tract,
        }
    }

    #[test]
    fn land_free_tract_has_no_land() {
        let tract = RawTract {
            geoid: "06075980401".to_string(),
            raw_boundary: String::new(),
            land_area: 0,
            water_area: 1_000,
            name: "Census Tract 9804.01".to_string(),
        };
        assert!(!tract.has_land());
    }

    #[test]
    fn assignment_from_option() {
        assert_eq!(
            TractAssignment::from(Some("06075010100")),
            TractAssignment::Resolved("06075010100".to_string())
        );
        assert_eq!(TractAssignment::from(None), TractAssignment::Unresolved);
        assert_eq!(TractAssignment::Unresolved.geoid(), None);
    }

    #[test]
    fn unknown_location_has_no_coordinates() {
        assert!(IncidentLocation::Unknown.lon_lat().is_none());
        let known = IncidentLocation::Known {
            longitude: -122.4,
            latitude: 37.7,
        };
        assert_eq!(known.lon_lat(), Some((-122.4, 37.7)));
    }

    #[test]
    fn report_counts_each_outcome() {
        let known = IncidentLocation::Known {
            longitude: -122.4,
            latitude: 37.7,
        };
        let incidents = vec![
            incident(known, TractAssignment::Resolved("06075010100".to_string())),
            incident(known, TractAssignment::Unresolved),
            incident(IncidentLocation::Unknown, TractAssignment::Unresolved),
            incident(known, TractAssignment::Resolved("06075010200".to_string())),
        ];
        let report = AssignmentReport::from_incidents(&incidents);
        assert_eq!(
            report,
            AssignmentReport {
                total: 4,
                resolved: 2,
                unresolved: 1,
                unknown_location: 1,
            }
        );
    }
}
