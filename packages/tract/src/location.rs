//! Incident location text parsing.
//!
//! Call records carry their location as `"(<lat>, <lon>)"`, latitude first.
//! Missing or malformed text is common and is mapped to
//! [`IncidentLocation::Unknown`] rather than an error.

use std::sync::LazyLock;

use medcall_tract_models::IncidentLocation;
use regex::Regex;

/// Latitude: between the opening parenthesis and the first comma.
static LATITUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^,()]*?),").expect("valid regex"));

/// Longitude: between the comma and the closing parenthesis.
static LONGITUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([^,()]*?)\)").expect("valid regex"));

/// Parses location text into an [`IncidentLocation`].
///
/// Returns [`IncidentLocation::Unknown`] for `None`, blank text, text
/// without the parenthesized pair, or non-finite numbers.
#[must_use]
pub fn parse_location(text: Option<&str>) -> IncidentLocation {
    let Some(text) = text.map(str::trim).filter(|s| !s.is_empty()) else {
        return IncidentLocation::Unknown;
    };

    let latitude = capture_number(&LATITUDE_RE, text);
    let longitude = capture_number(&LONGITUDE_RE, text);

    match (longitude, latitude) {
        (Some(longitude), Some(latitude)) => IncidentLocation::Known {
            longitude,
            latitude,
        },
        _ => IncidentLocation::Unknown,
    }
}

fn capture_number(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)?
        .get(1)?
        .as_str()
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lat_lon_pair() {
        let location = parse_location(Some("(37.7749, -122.4194)"));
        assert_eq!(
            location,
            IncidentLocation::Known {
                longitude: -122.4194,
                latitude: 37.7749,
            }
        );
    }

    #[test]
    fn tolerates_missing_space_after_comma() {
        let location = parse_location(Some("(37.05,-121.95)"));
        assert_eq!(location.lon_lat(), Some((-121.95, 37.05)));
    }

    #[test]
    fn missing_text_is_unknown() {
        assert_eq!(parse_location(None), IncidentLocation::Unknown);
        assert_eq!(parse_location(Some("   ")), IncidentLocation::Unknown);
    }

    #[test]
    fn malformed_text_is_unknown() {
        assert_eq!(parse_location(Some("37.7, -122.4")), IncidentLocation::Unknown);
        assert_eq!(parse_location(Some("(abc, -122.4)")), IncidentLocation::Unknown);
        assert_eq!(parse_location(Some("(37.7, )")), IncidentLocation::Unknown);
        assert_eq!(parse_location(Some("(NaN, -122.4)")), IncidentLocation::Unknown);
    }
}
