//! Aggregator: folds a page walk into a numeric rollup

use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::walker::{PageFetcher, PageWalker};

/// Whether an aggregate covers the whole collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateState {
    /// Only some pages have been folded in
    Partial,
    /// Every page of the walk has been folded in
    Complete,
}

/// Mapping from rollup field name to value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    values: BTreeMap<String, f64>,
    state: AggregateState,
    pages: usize,
    records: usize,
}

impl AggregateResult {
    /// A partial aggregate with every listed field at zero
    pub fn zeroed(fields: &[&str]) -> Self {
        Self {
            values: fields.iter().map(|f| (f.to_string(), 0.0)).collect(),
            state: AggregateState::Partial,
            pages: 0,
            records: 0,
        }
    }

    /// Value of a field; fields never touched read as zero
    pub fn get(&self, field: &str) -> f64 {
        self.values.get(field).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, field: &str, value: f64) {
        self.values.insert(field.to_string(), value);
    }

    pub fn add(&mut self, field: &str, delta: f64) {
        *self.values.entry(field.to_string()).or_insert(0.0) += delta;
    }

    pub fn increment(&mut self, field: &str) {
        self.add(field, 1.0);
    }

    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }

    pub fn state(&self) -> AggregateState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == AggregateState::Complete
    }

    pub fn pages_folded(&self) -> usize {
        self.pages
    }

    pub fn records_folded(&self) -> usize {
        self.records
    }

    pub(crate) fn mark_complete(mut self) -> Self {
        self.state = AggregateState::Complete;
        self
    }
}

/// A walk that failed part-way
///
/// `partial` holds what had been folded before the failure and is always
/// flagged [`AggregateState::Partial`]. It is kept for diagnostics only and
/// must not be shown as a final figure.
#[derive(Debug)]
pub struct AggregateFailure {
    pub reason: CoreError,
    pub partial: AggregateResult,
}

impl std::fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "aggregation failed after {} page(s): {}",
            self.partial.pages_folded(),
            self.reason
        )
    }
}

impl std::error::Error for AggregateFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}

/// Fold one page of records into the accumulator
pub fn fold_page<T, R>(mut acc: AggregateResult, records: &[T], reduce: &mut R) -> AggregateResult
where
    R: FnMut(AggregateResult, &T) -> AggregateResult,
{
    for record in records {
        acc = reduce(acc, record);
    }
    acc.pages += 1;
    acc.records += records.len();
    acc
}

/// Walk to the end, folding every record through `reduce`
///
/// Pages are folded strictly in arrival order and dropped right after. A
/// failed fetch aborts the run: the result is an [`AggregateFailure`],
/// never a half-summed aggregate presented as complete.
pub async fn aggregate<T, F, R>(
    mut walker: PageWalker<'_, T, F>,
    seed: AggregateResult,
    mut reduce: R,
) -> Result<AggregateResult, AggregateFailure>
where
    F: PageFetcher<T> + ?Sized,
    R: FnMut(AggregateResult, &T) -> AggregateResult,
{
    let mut acc = AggregateResult {
        state: AggregateState::Partial,
        ..seed
    };

    while let Some(page) = walker.next_page().await {
        match page {
            Ok(page) => {
                acc = fold_page(acc, &page.records, &mut reduce);
                debug!(
                    "folded page {} ({} records, {} total)",
                    page.pagination.current_page,
                    page.records.len(),
                    acc.records
                );
            }
            Err(reason) => {
                error!(
                    "aggregation aborted after {} page(s): {}",
                    acc.pages, reason
                );
                return Err(AggregateFailure { reason, partial: acc });
            }
        }
    }

    Ok(acc.mark_complete())
}
