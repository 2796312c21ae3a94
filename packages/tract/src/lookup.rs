//! Single-incident tract lookup for online response-time estimation.
//!
//! A newly reported incident arrives as a free-text address. The address is
//! geocoded by an external [`Geocoder`], the coordinate is resolved against
//! the shared [`TractIndex`], and the tract becomes one feature of the row
//! handed to an external [`ResponseTimeModel`]. Nothing here is persisted.

use std::collections::BTreeMap;

use medcall_tract_models::TractAssignment;

use crate::index::TractIndex;
use crate::TractError;

/// A geocoded coordinate (WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeocodedPoint {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
}

/// Converts a free-text address into a coordinate.
pub trait Geocoder {
    /// Returns `Ok(None)` when the address cannot be placed.
    ///
    /// # Errors
    ///
    /// Returns an error if the geocoding service itself fails.
    fn geocode(&self, address: &str) -> Result<Option<GeocodedPoint>, TractError>;
}

/// Predicts a response time from a completed feature row.
pub trait ResponseTimeModel {
    /// Returns the predicted response time in seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot score the row.
    fn predict(&self, row: &FeatureRow) -> Result<f64, TractError>;
}

/// Model input for one incident.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// The resolved tract. Integer encoding, if any, is the model's concern.
    pub tract: TractAssignment,
    /// Every other feature (hour, weekday, holiday flag, ...) by name.
    pub features: BTreeMap<String, f64>,
}

/// Finds the tract containing a coordinate.
#[must_use]
pub fn find_tract_by_point(index: &TractIndex, lng: f64, lat: f64) -> TractAssignment {
    let tract = TractAssignment::from(index.resolve(lng, lat));
    log::debug!("({lng}, {lat}) -> {tract:?}");
    tract
}

/// Geocodes an address and finds the tract containing it.
///
/// # Errors
///
/// Returns [`TractError::AddressNotFound`] if the geocoder cannot place the
/// address, or the geocoder's own error if it fails.
pub fn find_tract_by_address(
    index: &TractIndex,
    geocoder: &dyn Geocoder,
    address: &str,
) -> Result<(GeocodedPoint, TractAssignment), TractError> {
    let point = geocoder
        .geocode(address)?
        .ok_or_else(|| TractError::AddressNotFound {
            address: address.to_string(),
        })?;

    Ok((
        point,
        find_tract_by_point(index, point.longitude, point.latitude),
    ))
}

/// Resolves the tract for a coordinate and asks the model for a response
/// time given the remaining `features`.
///
/// # Errors
///
/// Returns the model's error if it cannot score the row.
pub fn estimate_response_time(
    index: &TractIndex,
    model: &dyn ResponseTimeModel,
    point: GeocodedPoint,
    features: BTreeMap<String, f64>,
) -> Result<f64, TractError> {
    let row = FeatureRow {
        tract: find_tract_by_point(index, point.longitude, point.latitude),
        features,
    };
    model.predict(&row)
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;
    use crate::index::TractEntry;

    const GEOID: &str = "06075010100";

    fn index() -> TractIndex {
        TractIndex::new(vec![TractEntry {
            geoid: GEOID.to_string(),
            polygon: polygon![
                (x: -122.0, y: 37.0),
                (x: -121.9, y: 37.0),
                (x: -121.9, y: 37.1),
                (x: -122.0, y: 37.1),
            ],
        }])
    }

    struct FixedGeocoder;

    impl Geocoder for FixedGeocoder {
        fn geocode(&self, address: &str) -> Result<Option<GeocodedPoint>, TractError> {
            Ok(match address {
                "683 Sutter St, San Francisco, CA" => Some(GeocodedPoint {
                    longitude: -121.95,
                    latitude: 37.05,
                }),
                "Pier 39, San Francisco, CA" => Some(GeocodedPoint {
                    longitude: -122.41,
                    latitude: 37.81,
                }),
                _ => None,
            })
        }
    }

    /// Predicts 300 seconds for the known tract, 600 otherwise.
    struct TractModel;

    impl ResponseTimeModel for TractModel {
        fn predict(&self, row: &FeatureRow) -> Result<f64, TractError> {
            let base = if row.tract.geoid() == Some(GEOID) { 300.0 } else { 600.0 };
            Ok(base + row.features.get("hour").copied().unwrap_or_default())
        }
    }

    #[test]
    fn resolves_point() {
        let index = index();
        assert_eq!(
            find_tract_by_point(&index, -121.95, 37.05),
            TractAssignment::Resolved(GEOID.to_string())
        );
        assert_eq!(
            find_tract_by_point(&index, -122.5, 37.05),
            TractAssignment::Unresolved
        );
    }

    #[test]
    fn resolves_geocoded_address() {
        let index = index();
        let (point, tract) =
            find_tract_by_address(&index, &FixedGeocoder, "683 Sutter St, San Francisco, CA")
                .unwrap();
        assert!((point.latitude - 37.05).abs() < f64::EPSILON);
        assert_eq!(tract, TractAssignment::Resolved(GEOID.to_string()));
    }

    #[test]
    fn address_outside_tracts_is_unresolved() {
        let (_, tract) =
            find_tract_by_address(&index(), &FixedGeocoder, "Pier 39, San Francisco, CA").unwrap();
        assert_eq!(tract, TractAssignment::Unresolved);
    }

    #[test]
    fn unknown_address_is_an_error() {
        let err = find_tract_by_address(&index(), &FixedGeocoder, "blab blob").unwrap_err();
        assert!(matches!(err, TractError::AddressNotFound { address } if address == "blab blob"));
    }

    #[test]
    fn model_sees_resolved_tract() {
        let features = BTreeMap::from([("hour".to_string(), 14.0)]);
        let inside = GeocodedPoint {
            longitude: -121.95,
            latitude: 37.05,
        };
        let outside = GeocodedPoint {
            longitude: -122.5,
            latitude: 37.05,
        };

        let estimate =
            estimate_response_time(&index(), &TractModel, inside, features.clone()).unwrap();
        assert!((estimate - 314.0).abs() < f64::EPSILON);

        let estimate = estimate_response_time(&index(), &TractModel, outside, features).unwrap();
        assert!((estimate - 614.0).abs() < f64::EPSILON);
    }
}
