//! Incident dataset CSV input and the augmented-dataset cache.
//!
//! The incident CSV is read as opaque text columns; only the location
//! column is interpreted. The augmented dataset is the same table with
//! `Longitude`, `Latitude` and `Tract` appended. Unknown coordinates and
//! unresolved tracts are written as empty cells.
//!
//! Rows are read leniently: a short row reads its missing cells as empty,
//! and a location cell that is not valid UTF-8 is treated as missing. Only
//! a header mismatch stops a load.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use medcall_tract_models::{
    AssignedIncident, AssignmentReport, IncidentLocation, IncidentRecord, TractAssignment,
};

use crate::TractError;
use crate::config::{ColumnFilter, ensure_dir};

/// Appended longitude column.
pub const LONGITUDE_COLUMN: &str = "Longitude";

/// Appended latitude column.
pub const LATITUDE_COLUMN: &str = "Latitude";

/// Appended tract column.
pub const TRACT_COLUMN: &str = "Tract";

const APPENDED_COLUMNS: [&str; 3] = [LONGITUDE_COLUMN, LATITUDE_COLUMN, TRACT_COLUMN];

/// An incident table awaiting tract assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentDataset {
    /// Source column names, in order.
    pub headers: Vec<String>,
    /// Rows that passed the filter, in source order.
    pub records: Vec<IncidentRecord>,
}

impl IncidentDataset {
    /// Reads an incident CSV file.
    ///
    /// # Errors
    ///
    /// Returns [`TractError::MissingColumn`] if the location or filter
    /// column is absent, or an I/O or CSV error if the file or its header
    /// cannot be read.
    pub fn load(
        path: &Path,
        location_column: &str,
        filter: Option<&ColumnFilter>,
    ) -> Result<Self, TractError> {
        log::info!("Loading incidents from {}", path.display());
        Self::from_reader(File::open(path)?, location_column, filter)
    }

    /// Reads incidents from any CSV source. See [`Self::load`].
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn from_reader<R: Read>(
        source: R,
        location_column: &str,
        filter: Option<&ColumnFilter>,
    ) -> Result<Self, TractError> {
        let mut reader = lenient_reader(source);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let location_idx = column_index(&headers, location_column)?;
        let filter = filter
            .map(|f| column_index(&headers, &f.column).map(|idx| (idx, f.value.as_bytes())))
            .transpose()?;

        let mut records = Vec::new();
        let mut filtered_out = 0u64;
        let mut skipped = 0u64;

        for result in reader.byte_records() {
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    log::warn!("Skipping unreadable incident row: {e}");
                    skipped += 1;
                    continue;
                }
            };

            if let Some((idx, value)) = filter
                && row.get(idx) != Some(value)
            {
                filtered_out += 1;
                continue;
            }

            records.push(IncidentRecord {
                location_text: text_cell(&row, location_idx),
                columns: lossy_columns(&row, headers.len()),
            });
        }

        log::info!(
            "Loaded {} incidents ({filtered_out} filtered out, {skipped} unreadable)",
            records.len()
        );

        Ok(Self { headers, records })
    }
}

/// An incident table with a tract per row.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignedDataset {
    /// Source column names, without the appended columns.
    pub headers: Vec<String>,
    /// Assigned rows, in source order.
    pub incidents: Vec<AssignedIncident>,
}

impl AssignedDataset {
    /// Tallies resolved, unresolved and unknown-location rows.
    #[must_use]
    pub fn report(&self) -> AssignmentReport {
        AssignmentReport::from_incidents(&self.incidents)
    }

    /// Writes the augmented dataset, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an I/O or CSV error if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), TractError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            ensure_dir(parent)?;
        }
        self.to_writer(csv::Writer::from_path(path)?)?;
        log::info!(
            "Wrote {} assigned incidents to {}",
            self.incidents.len(),
            path.display()
        );
        Ok(())
    }

    /// Writes the augmented dataset to any CSV writer.
    ///
    /// # Errors
    ///
    /// Returns a CSV or I/O error if a row cannot be written.
    pub fn to_writer<W: Write>(&self, mut writer: csv::Writer<W>) -> Result<(), TractError> {
        writer.write_record(
            self.headers
                .iter()
                .map(String::as_str)
                .chain(APPENDED_COLUMNS),
        )?;

        for incident in &self.incidents {
            let (lon, lat) = incident
                .location
                .lon_lat()
                .map_or_else(|| (String::new(), String::new()), |(x, y)| (x.to_string(), y.to_string()));
            let tract = incident.tract.geoid().unwrap_or_default();

            writer.write_record(
                incident
                    .record
                    .columns
                    .iter()
                    .map(String::as_str)
                    .chain([lon.as_str(), lat.as_str(), tract]),
            )?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Reads a previously written augmented dataset.
    ///
    /// # Errors
    ///
    /// Returns [`TractError::MissingColumn`] if the file lacks the appended
    /// columns or the location column, or a CSV error if it cannot be read.
    pub fn load(path: &Path, location_column: &str) -> Result<Self, TractError> {
        log::info!("Loading cached assignments from {}", path.display());
        Self::from_reader(File::open(path)?, location_column)
    }

    /// Reads an augmented dataset from any CSV source. See [`Self::load`].
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn from_reader<R: Read>(source: R, location_column: &str) -> Result<Self, TractError> {
        let mut reader = lenient_reader(source);
        let mut headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let width = headers.len();
        if width < APPENDED_COLUMNS.len()
            || headers[width - APPENDED_COLUMNS.len()..]
                .iter()
                .zip(APPENDED_COLUMNS)
                .any(|(h, expected)| h != expected)
        {
            return Err(TractError::MissingColumn {
                column: TRACT_COLUMN.to_string(),
            });
        }
        headers.truncate(width - APPENDED_COLUMNS.len());
        let location_idx = column_index(&headers, location_column)?;
        let source_width = headers.len();

        let mut incidents = Vec::new();
        let mut skipped = 0u64;
        for result in reader.byte_records() {
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    log::warn!("Skipping unreadable cached row: {e}");
                    skipped += 1;
                    continue;
                }
            };

            let number = |idx: usize| {
                text_cell(&row, idx)
                    .and_then(|s| s.trim().parse::<f64>().ok())
                    .filter(|v| v.is_finite())
            };
            let location = match (number(source_width), number(source_width + 1)) {
                (Some(longitude), Some(latitude)) => IncidentLocation::Known {
                    longitude,
                    latitude,
                },
                _ => IncidentLocation::Unknown,
            };
            let tract = TractAssignment::from(text_cell(&row, source_width + 2).as_deref());

            incidents.push(AssignedIncident {
                record: IncidentRecord {
                    location_text: text_cell(&row, location_idx),
                    columns: lossy_columns(&row, source_width),
                },
                location,
                tract,
            });
        }
        if skipped > 0 {
            log::warn!("Skipped {skipped} unreadable cached rows");
        }

        Ok(Self { headers, incidents })
    }
}

fn column_index(headers: &[String], column: &str) -> Result<usize, TractError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| TractError::MissingColumn {
            column: column.to_string(),
        })
}

fn lenient_reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new().flexible(true).from_reader(source)
}

/// A non-blank cell as text. Missing cells and invalid UTF-8 are `None`.
fn text_cell(row: &csv::ByteRecord, idx: usize) -> Option<String> {
    row.get(idx)
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Exactly `width` cells: short rows are padded with empty cells, long
/// rows truncated, invalid UTF-8 replaced.
fn lossy_columns(row: &csv::ByteRecord, width: usize) -> Vec<String> {
    let mut columns: Vec<String> = row
        .iter()
        .take(width)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .collect();
    columns.resize(width, String::new());
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALLS: &str = "\
Call Number,Call Type,Location
1001,Medical Incident,\"(37.05, -121.95)\"
1002,Structure Fire,\"(37.06, -121.94)\"
1003,Medical Incident,
";

    fn medical() -> ColumnFilter {
        ColumnFilter {
            column: "Call Type".to_string(),
            value: "Medical Incident".to_string(),
        }
    }

    #[test]
    fn reads_all_rows_without_filter() {
        let dataset = IncidentDataset::from_reader(CALLS.as_bytes(), "Location", None).unwrap();
        assert_eq!(dataset.headers, vec!["Call Number", "Call Type", "Location"]);
        assert_eq!(dataset.records.len(), 3);
        assert_eq!(
            dataset.records[0].location_text.as_deref(),
            Some("(37.05, -121.95)")
        );
        assert_eq!(dataset.records[2].location_text, None);
    }

    #[test]
    fn filter_keeps_matching_rows() {
        let filter = medical();
        let dataset =
            IncidentDataset::from_reader(CALLS.as_bytes(), "Location", Some(&filter)).unwrap();
        let numbers: Vec<&str> = dataset
            .records
            .iter()
            .map(|r| r.columns[0].as_str())
            .collect();
        assert_eq!(numbers, vec!["1001", "1003"]);
    }

    #[test]
    fn missing_location_column_is_an_error() {
        let err = IncidentDataset::from_reader(CALLS.as_bytes(), "Coords", None).unwrap_err();
        assert!(matches!(err, TractError::MissingColumn { column } if column == "Coords"));
    }

    #[test]
    fn missing_filter_column_is_an_error() {
        let filter = ColumnFilter {
            column: "Unit Type".to_string(),
            value: "MEDIC".to_string(),
        };
        let err =
            IncidentDataset::from_reader(CALLS.as_bytes(), "Location", Some(&filter)).unwrap_err();
        assert!(matches!(err, TractError::MissingColumn { .. }));
    }

    fn assigned() -> AssignedDataset {
        AssignedDataset {
            headers: vec!["Call Number".to_string(), "Location".to_string()],
            incidents: vec![
                AssignedIncident {
                    record: IncidentRecord {
                        location_text: Some("(37.05, -121.95)".to_string()),
                        columns: vec!["1001".to_string(), "(37.05, -121.95)".to_string()],
                    },
                    location: IncidentLocation::Known {
                        longitude: -121.95,
                        latitude: 37.05,
                    },
                    tract: TractAssignment::Resolved("06075010100".to_string()),
                },
                AssignedIncident {
                    record: IncidentRecord {
                        location_text: None,
                        columns: vec!["1002".to_string(), String::new()],
                    },
                    location: IncidentLocation::Unknown,
                    tract: TractAssignment::Unresolved,
                },
            ],
        }
    }

    #[test]
    fn writes_appended_columns() {
        let mut buf = Vec::new();
        assigned().to_writer(csv::Writer::from_writer(&mut buf)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Call Number,Location,Longitude,Latitude,Tract");
        assert_eq!(lines[1], "1001,\"(37.05, -121.95)\",-121.95,37.05,06075010100");
        assert_eq!(lines[2], "1002,,,,");
    }

    #[test]
    fn cache_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("calls_with_tracts.csv");

        let dataset = assigned();
        dataset.write(&path).unwrap();
        let loaded = AssignedDataset::load(&path, "Location").unwrap();

        assert_eq!(loaded, dataset);
        assert_eq!(loaded.report().resolved, 1);
        assert_eq!(loaded.report().unknown_location, 1);
    }

    #[test]
    fn cache_without_tract_column_is_rejected() {
        let err = AssignedDataset::from_reader(CALLS.as_bytes(), "Location").unwrap_err();
        assert!(matches!(err, TractError::MissingColumn { column } if column == TRACT_COLUMN));
    }

    #[test]
    fn short_row_reads_as_missing_location() {
        let calls = "\
Call Number,Call Type,Location
1,Medical Incident,\"(37.05, -121.95)\"
2,Medical Incident
3,Medical Incident,\"(37.02, -121.98)\"
";
        let filter = medical();
        let dataset =
            IncidentDataset::from_reader(calls.as_bytes(), "Location", Some(&filter)).unwrap();

        assert_eq!(dataset.records.len(), 3);
        assert_eq!(dataset.records[1].location_text, None);
        assert_eq!(
            dataset.records[1].columns,
            vec!["2", "Medical Incident", ""]
        );
        assert_eq!(
            dataset.records[2].location_text.as_deref(),
            Some("(37.02, -121.98)")
        );
    }

    #[test]
    fn invalid_utf8_location_reads_as_missing() {
        let calls: &[u8] = b"Call Number,Call Type,Location\n\
1,Medical Incident,\"(37.05, -121.95)\"\n\
2,Medical Incident,\"(37.0\xff, -121.9)\"\n\
3,Medical Incident,\"(37.02, -121.98)\"\n";
        let dataset = IncidentDataset::from_reader(calls, "Location", None).unwrap();

        assert_eq!(dataset.records.len(), 3);
        assert_eq!(dataset.records[1].location_text, None);
        assert_eq!(dataset.records[1].columns[0], "2");
        assert!(dataset.records[0].location_text.is_some());
        assert!(dataset.records[2].location_text.is_some());
    }

    #[test]
    fn short_cached_row_reads_as_unresolved() {
        let cached = "\
Call Number,Location,Longitude,Latitude,Tract
1001,\"(37.05, -121.95)\",-121.95,37.05,06075010100
1002,\"(37.06, -121.94)\"
";
        let dataset = AssignedDataset::from_reader(cached.as_bytes(), "Location").unwrap();

        assert_eq!(dataset.incidents.len(), 2);
        assert_eq!(
            dataset.incidents[0].tract,
            TractAssignment::Resolved("06075010100".to_string())
        );
        assert_eq!(dataset.incidents[1].location, IncidentLocation::Unknown);
        assert_eq!(dataset.incidents[1].tract, TractAssignment::Unresolved);
        assert_eq!(dataset.report().unknown_location, 1);
    }
}
