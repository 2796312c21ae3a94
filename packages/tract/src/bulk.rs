//! Bulk tract assignment over the historical call dataset.
//!
//! Every record's location text is parsed and resolved against a shared
//! [`TractIndex`]. Records are independent, so they are resolved in
//! parallel with `rayon`; indexed parallel iterators keep output rows in
//! input order. Missing or malformed locations leave the record unresolved
//! and never stop the batch.
//!
//! Correcting the tracts and resolving the full dataset is the most
//! expensive step of the whole system, so the augmented dataset is cached
//! to a file and reused on later runs.

use std::sync::Arc;

use medcall_tract_models::{AssignedIncident, AssignmentReport, IncidentRecord, TractAssignment};
use rayon::prelude::*;

use crate::builder::build_tract_index;
use crate::config::PipelineConfig;
use crate::incidents::{AssignedDataset, IncidentDataset};
use crate::index::TractIndex;
use crate::location::parse_location;
use crate::progress::ProgressCallback;
use crate::TractError;

/// Resolves one incident record.
#[must_use]
pub fn assign_record(index: &TractIndex, record: IncidentRecord) -> AssignedIncident {
    let location = parse_location(record.location_text.as_deref());
    let tract = location
        .lon_lat()
        .map_or(TractAssignment::Unresolved, |(lng, lat)| {
            index.resolve(lng, lat).into()
        });

    AssignedIncident {
        record,
        location,
        tract,
    }
}

/// Resolves every record in parallel, preserving input order.
#[must_use]
pub fn assign_tracts(
    index: &TractIndex,
    records: Vec<IncidentRecord>,
    progress: &Arc<dyn ProgressCallback>,
) -> Vec<AssignedIncident> {
    progress.set_total(records.len() as u64);

    records
        .into_par_iter()
        .map(|record| {
            let incident = assign_record(index, record);
            progress.inc(1);
            incident
        })
        .collect()
}

/// Result of a bulk run.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentOutcome {
    /// The augmented dataset.
    pub dataset: AssignedDataset,
    /// Resolved/unresolved tallies.
    pub report: AssignmentReport,
    /// Whether the dataset came from the cache file.
    pub from_cache: bool,
}

/// Loads incidents, assigns tracts, and maintains the cache, as configured.
pub struct BulkAssignmentPipeline<'a> {
    config: &'a PipelineConfig,
}

impl<'a> BulkAssignmentPipeline<'a> {
    /// Creates a pipeline for `config`.
    #[must_use]
    pub const fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Returns the cached dataset, building the tract index and assigning
    /// from scratch only when there is no cache or `force` is set.
    ///
    /// # Errors
    ///
    /// Returns setup-phase errors: missing county, unreadable inputs,
    /// missing columns, or a cache that cannot be read or written.
    pub fn run(
        &self,
        force: bool,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<AssignmentOutcome, TractError> {
        if !force && let Some(dataset) = self.load_cache()? {
            let report = dataset.report();
            log_report(&report, true);
            progress.finish(format!(
                "Loaded {} assigned incidents from cache",
                report.total
            ));
            return Ok(AssignmentOutcome {
                dataset,
                report,
                from_cache: true,
            });
        }

        progress.set_message("Correcting tract boundaries".to_string());
        let (index, _) = build_tract_index(self.config)?;
        self.run_with_index(&index, progress)
    }

    /// Assigns tracts with an already-built index and refreshes the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the incident dataset cannot be read or the
    /// cache cannot be written.
    pub fn run_with_index(
        &self,
        index: &TractIndex,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<AssignmentOutcome, TractError> {
        let incidents = &self.config.incidents;
        let source = IncidentDataset::load(
            &self.config.incidents_path(),
            &incidents.location_column,
            incidents.filter.as_ref(),
        )?;

        progress.set_message("Assigning tracts".to_string());
        let dataset = AssignedDataset {
            headers: source.headers,
            incidents: assign_tracts(index, source.records, progress),
        };
        let report = dataset.report();
        log_report(&report, false);
        progress.finish(format!(
            "Assigned {} of {} incidents to tracts",
            report.resolved, report.total
        ));

        if let Some(path) = self.config.cache_path() {
            dataset.write(&path)?;
        }

        Ok(AssignmentOutcome {
            dataset,
            report,
            from_cache: false,
        })
    }

    /// Reads the cache file if caching is configured and the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache exists but cannot be read.
    pub fn load_cache(&self) -> Result<Option<AssignedDataset>, TractError> {
        let Some(path) = self.config.cache_path() else {
            return Ok(None);
        };
        if !path.exists() {
            log::info!("No assignment cache at {}", path.display());
            return Ok(None);
        }
        AssignedDataset::load(&path, &self.config.incidents.location_column).map(Some)
    }
}

fn log_report(report: &AssignmentReport, from_cache: bool) {
    log::info!(
        "{}{} incidents: {} resolved, {} outside every tract, {} without a location",
        if from_cache { "(cached) " } else { "" },
        report.total,
        report.resolved,
        report.unresolved,
        report.unknown_location
    );
}
