//! County boundary loading from a `GeoJSON` boundary dataset.
//!
//! Census tract edges near water are rough, so a more precise county
//! outline is used to clip them. The outline is read once per run and
//! shared read-only by every tract correction.

use std::path::Path;

use geo::MultiPolygon;
use geojson::{Feature, GeoJson};

use crate::TractError;

/// An authoritative county outline.
#[derive(Debug, Clone, PartialEq)]
pub struct CountyBoundary {
    /// County name as it appears in the boundary dataset.
    pub county_name: String,
    /// The outline, including any offshore islands.
    pub boundary: MultiPolygon<f64>,
}

impl CountyBoundary {
    /// Wraps an already-built outline.
    #[must_use]
    pub fn new(county_name: impl Into<String>, boundary: MultiPolygon<f64>) -> Self {
        Self {
            county_name: county_name.into(),
            boundary,
        }
    }

    /// Loads the outline of `county` from a `GeoJSON` file.
    ///
    /// `name_field` is the feature property holding the county name; the
    /// match is exact and case-sensitive. The first matching feature wins.
    ///
    /// # Errors
    ///
    /// Returns [`TractError::CountyNotFound`] if no feature matches, or an
    /// I/O, `GeoJSON` or conversion error if the file cannot be read.
    pub fn load(path: &Path, name_field: &str, county: &str) -> Result<Self, TractError> {
        log::info!(
            "Loading county boundary for {county} from {}",
            path.display()
        );
        let text = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&text, name_field, county)
    }

    /// Same as [`Self::load`], reading from an in-memory `GeoJSON` string.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn from_geojson_str(text: &str, name_field: &str, county: &str) -> Result<Self, TractError> {
        let geojson: GeoJson = text.parse()?;

        let features = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(_) => {
                return Err(TractError::Conversion {
                    message: "Boundary dataset is a bare geometry with no county properties"
                        .to_string(),
                });
            }
        };

        let feature = features
            .into_iter()
            .find(|f| feature_name(f, name_field) == Some(county))
            .ok_or_else(|| TractError::CountyNotFound {
                county: county.to_string(),
            })?;

        let boundary = feature_to_multipolygon(feature, county)?;
        log::info!(
            "County boundary for {county}: {} polygon(s)",
            boundary.0.len()
        );

        Ok(Self::new(county, boundary))
    }
}

fn feature_name<'a>(feature: &'a Feature, name_field: &str) -> Option<&'a str> {
    feature
        .property(name_field)
        .and_then(serde_json::Value::as_str)
}

/// Converts a feature geometry to a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn feature_to_multipolygon(feature: Feature, county: &str) -> Result<MultiPolygon<f64>, TractError> {
    let geometry = feature.geometry.ok_or_else(|| TractError::Conversion {
        message: format!("County {county} has no geometry"),
    })?;

    let geo_geom: geo::Geometry<f64> = geometry.try_into()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        geo::Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        other => Err(TractError::Conversion {
            message: format!("County {county} geometry is not polygonal: {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BAY_AREA: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "COUNTY": "Marin" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-123.0, 38.0], [-122.5, 38.0], [-122.5, 38.3], [-123.0, 38.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "COUNTY": "San Francisco" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[-122.52, 37.70], [-122.35, 37.70], [-122.35, 37.82], [-122.52, 37.82], [-122.52, 37.70]]],
                        [[[-123.02, 37.69], [-123.00, 37.69], [-123.00, 37.70], [-123.02, 37.69]]]
                    ]
                }
            }
        ]
    }"#;

    #[test]
    fn loads_matching_county() {
        let county = CountyBoundary::from_geojson_str(BAY_AREA, "COUNTY", "San Francisco").unwrap();
        assert_eq!(county.county_name, "San Francisco");
        assert_eq!(county.boundary.0.len(), 2);
    }

    #[test]
    fn wraps_polygon_as_multipolygon() {
        let county = CountyBoundary::from_geojson_str(BAY_AREA, "COUNTY", "Marin").unwrap();
        assert_eq!(county.boundary.0.len(), 1);
    }

    #[test]
    fn match_is_case_sensitive() {
        let err = CountyBoundary::from_geojson_str(BAY_AREA, "COUNTY", "san francisco").unwrap_err();
        assert!(matches!(err, TractError::CountyNotFound { county } if county == "san francisco"));
    }

    #[test]
    fn missing_county_is_an_error() {
        let err = CountyBoundary::from_geojson_str(BAY_AREA, "COUNTY", "Alameda").unwrap_err();
        assert!(matches!(err, TractError::CountyNotFound { .. }));
    }

    #[test]
    fn wrong_name_field_finds_nothing() {
        let err = CountyBoundary::from_geojson_str(BAY_AREA, "NAME", "Marin").unwrap_err();
        assert!(matches!(err, TractError::CountyNotFound { .. }));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counties.geojson");
        std::fs::write(&path, BAY_AREA).unwrap();
        let county = CountyBoundary::load(&path, "COUNTY", "Marin").unwrap();
        assert_eq!(county.county_name, "Marin");
    }

    #[test]
    fn rejects_non_polygon_geometry() {
        let text = r#"{
            "type": "Feature",
            "properties": { "COUNTY": "Nowhere" },
            "geometry": { "type": "Point", "coordinates": [0.0, 0.0] }
        }"#;
        let err = CountyBoundary::from_geojson_str(text, "COUNTY", "Nowhere").unwrap_err();
        assert!(matches!(err, TractError::Conversion { .. }));
    }
}
