//! Parsing and writing of the Census tract `MULTIPOLYGON` text encoding.
//!
//! The tract export stores each boundary as
//! `MULTIPOLYGON (((lon lat,lon lat,...)))`. Almost every tract is a single
//! ring, but the full grammar (several polygons, each with optional holes)
//! is accepted so disjoint raw parts survive until correction.

use std::iter;
use std::sync::LazyLock;

use geo::{Coord, LineString, MultiPolygon, Polygon};
use regex::Regex;

use crate::TractError;

/// Opening wrapper of the encoding.
pub const MULTIPOLYGON_PREFIX: &str = "MULTIPOLYGON (((";

/// Closing wrapper of the encoding.
pub const MULTIPOLYGON_SUFFIX: &str = ")))";

/// Separator between polygons: `)),((`.
static POLYGON_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\)\)\s*,\s*\(\(").expect("valid regex"));

/// Separator between rings of one polygon: `),(`.
static RING_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\)\s*,\s*\(").expect("valid regex"));

/// Parses `MULTIPOLYGON (((...)))` text into a [`MultiPolygon`].
///
/// The first ring of each polygon is its exterior; any further rings are
/// holes. Rings do not need to repeat their first coordinate.
///
/// # Errors
///
/// Returns [`TractError::MalformedGeometry`] if the wrapper is missing, a
/// coordinate is not a pair of finite numbers, or a ring has fewer than
/// three coordinates. No partial result is ever returned.
pub fn parse_multipolygon(text: &str) -> Result<MultiPolygon<f64>, TractError> {
    let body = text
        .trim()
        .strip_prefix(MULTIPOLYGON_PREFIX)
        .and_then(|s| s.strip_suffix(MULTIPOLYGON_SUFFIX))
        .ok_or_else(|| {
            TractError::malformed(format!(
                "expected `{MULTIPOLYGON_PREFIX}...{MULTIPOLYGON_SUFFIX}`, got `{}`",
                truncate_for_log(text.trim(), 40)
            ))
        })?;

    let polygons = POLYGON_SEPARATOR_RE
        .split(body)
        .map(parse_polygon)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MultiPolygon::new(polygons))
}

fn parse_polygon(text: &str) -> Result<Polygon<f64>, TractError> {
    let mut rings = RING_SEPARATOR_RE.split(text).map(parse_ring);

    let exterior = rings
        .next()
        .ok_or_else(|| TractError::malformed("polygon has no rings"))??;
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;

    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(text: &str) -> Result<LineString<f64>, TractError> {
    let coords = text
        .split(',')
        .map(parse_coord)
        .collect::<Result<Vec<_>, _>>()?;

    if coords.len() < 3 {
        return Err(TractError::malformed(format!(
            "ring has {} coordinate(s), need at least 3",
            coords.len()
        )));
    }

    Ok(LineString::new(coords))
}

fn parse_coord(pair: &str) -> Result<Coord<f64>, TractError> {
    let mut tokens = pair.split_whitespace();

    let (Some(lon), Some(lat), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(TractError::malformed(format!(
            "expected `lon lat`, got `{}`",
            truncate_for_log(pair.trim(), 40)
        )));
    };

    let x = parse_degrees(lon)?;
    let y = parse_degrees(lat)?;

    Ok(Coord { x, y })
}

fn parse_degrees(token: &str) -> Result<f64, TractError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TractError::malformed(format!("invalid coordinate `{token}`")))
}

/// Serializes polygons back into the `MULTIPOLYGON (((...)))` encoding.
///
/// Returns `None` for an empty slice, since the encoding has no empty form.
/// The output parses back with [`parse_multipolygon`].
#[must_use]
pub fn format_multipolygon(polygons: &[Polygon<f64>]) -> Option<String> {
    if polygons.is_empty() {
        return None;
    }

    let parts = polygons
        .iter()
        .map(|polygon| {
            let rings = iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(format_ring)
                .collect::<Vec<_>>()
                .join("),(");
            format!("(({rings}))")
        })
        .collect::<Vec<_>>()
        .join(",");

    Some(format!("MULTIPOLYGON ({parts})"))
}

fn format_ring(ring: &LineString<f64>) -> String {
    ring.coords()
        .map(|c| format!("{} {}", c.x, c.y))
        .collect::<Vec<_>>()
        .join(",")
}

/// Truncates a string for logging, appending "..." if it exceeds `max_len`.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let cut = (0..=max_len)
            .rev()
            .find(|&i| s.is_char_boundary(i))
            .unwrap_or(0);
        format!("{}...", &s[..cut])
    }
}
