#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Census tract boundary correction and point-in-tract assignment.
//!
//! Raw Census tract polygons are rough along coastlines, so each tract is
//! intersected with an authoritative county boundary before use. The
//! corrected polygons are held in a [`index::TractIndex`] that answers
//! "which tract contains this point" for both the bulk historical pass over
//! the emergency call dataset ([`bulk`]) and single freshly geocoded
//! incidents ([`lookup`]).

pub mod boundary;
pub mod builder;
pub mod bulk;
pub mod config;
pub mod county;
pub mod incidents;
pub mod index;
pub mod location;
pub mod lookup;
pub mod progress;

use thiserror::Error;

/// Errors that can occur while building tract boundaries or assigning tracts.
#[derive(Debug, Error)]
pub enum TractError {
    /// Raw boundary text does not match the `MULTIPOLYGON (((...)))` encoding.
    #[error("Malformed geometry: {message}")]
    MalformedGeometry {
        /// Description of what went wrong.
        message: String,
    },

    /// The requested county is absent from the boundary dataset.
    #[error("County not found in boundary dataset: {county}")]
    CountyNotFound {
        /// The county name that was requested.
        county: String,
    },

    /// The geocoder could not place an address.
    #[error("Unable to geocode address: {address}")]
    AddressNotFound {
        /// The address that was submitted.
        address: String,
    },

    /// A required dataset column is missing.
    #[error("Missing column: {column}")]
    MissingColumn {
        /// Name of the missing column.
        column: String,
    },

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Configuration file could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl TractError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedGeometry {
            message: message.into(),
        }
    }
}
