//! In-memory tract index for point-in-tract resolution.
//!
//! Holds one entry per corrected polygon, in the order tracts were
//! processed, plus an R-tree over the entry envelopes. A lookup checks only
//! the entries whose envelope covers the point and returns the earliest
//! containing entry, which is exactly what a front-to-back linear scan
//! would return.

use geo::{BoundingRect, Intersects, Point, Polygon};
use rstar::{AABB, RTree, RTreeObject};

use crate::builder::CorrectedTract;

/// A corrected polygon tagged with its tract GEOID.
#[derive(Debug, Clone, PartialEq)]
pub struct TractEntry {
    /// Census GEOID.
    pub geoid: String,
    /// One corrected land region of the tract.
    pub polygon: Polygon<f64>,
}

/// Envelope of one entry, stored in the R-tree by position.
struct EntryEnvelope {
    ordinal: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for EntryEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Ordered `(geoid, polygon)` entries with an envelope index.
///
/// Built once and then only read, so it can be shared freely across
/// threads. When polygons overlap, the entry added first wins.
pub struct TractIndex {
    entries: Vec<TractEntry>,
    envelopes: RTree<EntryEnvelope>,
}

impl TractIndex {
    /// Indexes `(geoid, polygon)` entries in the given order.
    #[must_use]
    pub fn new(entries: Vec<TractEntry>) -> Self {
        let envelopes = entries
            .iter()
            .enumerate()
            .filter_map(|(ordinal, entry)| {
                compute_envelope(&entry.polygon).map(|envelope| EntryEnvelope { ordinal, envelope })
            })
            .collect();

        let index = Self {
            entries,
            envelopes: RTree::bulk_load(envelopes),
        };
        log::info!(
            "Indexed {} tract polygons ({} with a usable envelope)",
            index.entries.len(),
            index.envelopes.size()
        );
        index
    }

    /// Indexes every polygon of every corrected tract, tract by tract.
    ///
    /// A tract split into N regions contributes N entries sharing its GEOID.
    #[must_use]
    pub fn from_tracts(tracts: &[CorrectedTract]) -> Self {
        let entries = tracts
            .iter()
            .flat_map(|tract| {
                tract.polygons.iter().map(|polygon| TractEntry {
                    geoid: tract.geoid.clone(),
                    polygon: polygon.clone(),
                })
            })
            .collect();
        Self::new(entries)
    }

    /// Look up the census tract GEOID for a point.
    ///
    /// Containment is boundary-inclusive: a point on a polygon edge or
    /// vertex belongs to that polygon. Returns `None` when no polygon
    /// contains the point.
    #[must_use]
    pub fn resolve(&self, lng: f64, lat: f64) -> Option<&str> {
        let point = Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        self.envelopes
            .locate_in_envelope_intersecting(&query_env)
            .filter(|candidate| self.entries[candidate.ordinal].polygon.intersects(&point))
            .map(|candidate| candidate.ordinal)
            .min()
            .map(|ordinal| self.entries[ordinal].geoid.as_str())
    }

    /// Look up the census tract GEOID by testing every entry in order.
    ///
    /// Same answer as [`Self::resolve`], in O(n).
    #[must_use]
    pub fn resolve_by_scan(&self, lng: f64, lat: f64) -> Option<&str> {
        let point = Point::new(lng, lat);
        self.entries
            .iter()
            .find(|entry| entry.polygon.intersects(&point))
            .map(|entry| entry.geoid.as_str())
    }

    /// Entries in index order.
    #[must_use]
    pub fn entries(&self) -> &[TractEntry] {
        &self.entries
    }

    /// Number of polygon entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries carrying `geoid`.
    #[must_use]
    pub fn polygon_count(&self, geoid: &str) -> usize {
        self.entries.iter().filter(|e| e.geoid == geoid).count()
    }
}

/// Compute the bounding box envelope for a [`Polygon`].
fn compute_envelope(polygon: &Polygon<f64>) -> Option<AABB<[f64; 2]>> {
    polygon
        .bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
