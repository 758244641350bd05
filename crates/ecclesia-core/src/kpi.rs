//! KPI assembler
//!
//! Per-domain policies decide which record fields are summed and how the
//! composite figures are derived once a walk completes. Policies are plain
//! strategy objects handed to [`assemble`]; derived fields are computed
//! once at the end, never per record.

use log::info;
use serde::Serialize;
use std::collections::HashMap;

use crate::aggregate::{aggregate, AggregateFailure, AggregateResult};
use crate::error::{DefaultErrorLogger, ErrorContext, ErrorLogger};
use crate::generation::{Generation, ResultSlot};
use crate::types::{number_field, FilterCriteria, Record};
use crate::walker::{walk, PageFetcher};

/// Folding rules for one KPI domain
pub trait KpiPolicy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Every field the finished aggregate carries
    fn fields(&self) -> &'static [&'static str];

    /// Fold one record into the running totals
    fn reduce(&self, acc: AggregateResult, record: &Record) -> AggregateResult;

    /// Derive composite figures from the completed totals
    fn finalize(&self, acc: AggregateResult) -> AggregateResult {
        acc
    }

    fn seed(&self) -> AggregateResult {
        AggregateResult::zeroed(self.fields())
    }
}

/// Pledges: `count`, `pledged`, `paid` and `outstanding = max(0, pledged - paid)`
#[derive(Debug, Default, Clone, Copy)]
pub struct PledgePolicy;

impl KpiPolicy for PledgePolicy {
    fn name(&self) -> &'static str {
        "pledges"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["count", "pledged", "paid", "outstanding"]
    }

    fn reduce(&self, mut acc: AggregateResult, record: &Record) -> AggregateResult {
        acc.increment("count");
        acc.add("pledged", number_field(record, "amount"));
        acc.add("paid", number_field(record, "totalPaid"));
        acc
    }

    fn finalize(&self, mut acc: AggregateResult) -> AggregateResult {
        let outstanding = (acc.get("pledged") - acc.get("paid")).max(0.0);
        acc.set("outstanding", outstanding);
        acc
    }
}

/// Tithes: `count`, `total` and `average = total / count`
#[derive(Debug, Default, Clone, Copy)]
pub struct TithePolicy;

impl KpiPolicy for TithePolicy {
    fn name(&self) -> &'static str {
        "tithe"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["count", "total", "average"]
    }

    fn reduce(&self, mut acc: AggregateResult, record: &Record) -> AggregateResult {
        acc.increment("count");
        acc.add("total", number_field(record, "amount"));
        acc
    }

    fn finalize(&self, mut acc: AggregateResult) -> AggregateResult {
        let count = acc.get("count");
        let average = if count > 0.0 { acc.get("total") / count } else { 0.0 };
        acc.set("average", average);
        acc
    }
}

/// Plain ledger of entries: `count` and summed `amount`
///
/// Used for both halves of the welfare tile set.
#[derive(Debug, Clone, Copy)]
pub struct LedgerPolicy {
    name: &'static str,
}

impl LedgerPolicy {
    pub const CONTRIBUTIONS: LedgerPolicy = LedgerPolicy {
        name: "welfare.contributions",
    };
    pub const DISBURSEMENTS: LedgerPolicy = LedgerPolicy {
        name: "welfare.disbursements",
    };
}

impl KpiPolicy for LedgerPolicy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn fields(&self) -> &'static [&'static str] {
        &["count", "amount"]
    }

    fn reduce(&self, mut acc: AggregateResult, record: &Record) -> AggregateResult {
        acc.increment("count");
        acc.add("amount", number_field(record, "amount"));
        acc
    }
}

/// Walk one collection and fold it through `policy`
pub async fn assemble<F>(
    fetcher: &F,
    criteria: &FilterCriteria,
    page_size: u32,
    policy: &dyn KpiPolicy,
) -> Result<AggregateResult, AggregateFailure>
where
    F: PageFetcher<Record> + ?Sized,
{
    let walker = walk::<Record, F>(fetcher, criteria, page_size);
    match aggregate(walker, policy.seed(), |acc, record| policy.reduce(acc, record)).await {
        Ok(totals) => {
            let result = policy.finalize(totals);
            info!(
                "{} KPIs ready: {} record(s) over {} page(s)",
                policy.name(),
                result.records_folded(),
                result.pages_folded()
            );
            Ok(result)
        }
        Err(failure) => {
            let context = ErrorContext::new(format!("kpi.{}", policy.name()))
                .with_data("pages_folded", serde_json::json!(failure.partial.pages_folded()))
                .with_data("page_size", serde_json::json!(page_size));
            DefaultErrorLogger.log_error(&failure.reason, &context);
            Err(failure)
        }
    }
}

pub async fn pledge_kpis<F>(fetcher: &F, criteria: &FilterCriteria, page_size: u32) -> Result<AggregateResult, AggregateFailure>
where
    F: PageFetcher<Record> + ?Sized,
{
    assemble(fetcher, criteria, page_size, &PledgePolicy).await
}

pub async fn tithe_kpis<F>(fetcher: &F, criteria: &FilterCriteria, page_size: u32) -> Result<AggregateResult, AggregateFailure>
where
    F: PageFetcher<Record> + ?Sized,
{
    assemble(fetcher, criteria, page_size, &TithePolicy).await
}

/// Welfare tile set built from two independent walks
///
/// Either half may fail without invalidating the other.
#[derive(Debug)]
pub struct WelfareKpis {
    pub contributions: Result<AggregateResult, AggregateFailure>,
    pub disbursements: Result<AggregateResult, AggregateFailure>,
}

impl WelfareKpis {
    /// Contributions minus disbursements, only when both walks succeeded
    pub fn balance(&self) -> Option<f64> {
        match (&self.contributions, &self.disbursements) {
            (Ok(c), Ok(d)) => Some(c.get("amount") - d.get("amount")),
            _ => None,
        }
    }
}

pub async fn welfare_kpis<C, D>(
    contributions: &C,
    disbursements: &D,
    criteria: &FilterCriteria,
    page_size: u32,
) -> WelfareKpis
where
    C: PageFetcher<Record> + ?Sized,
    D: PageFetcher<Record> + ?Sized,
{
    let contributions = assemble(contributions, criteria, page_size, &LedgerPolicy::CONTRIBUTIONS).await;
    let disbursements = assemble(disbursements, criteria, page_size, &LedgerPolicy::DISBURSEMENTS).await;
    WelfareKpis {
        contributions,
        disbursements,
    }
}

// ==================== Display State ====================

/// KPI domains shown as tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiDomain {
    Pledges,
    Tithe,
    WelfareContributions,
    WelfareDisbursements,
}

impl KpiDomain {
    pub const ALL: [KpiDomain; 4] = [
        KpiDomain::Pledges,
        KpiDomain::Tithe,
        KpiDomain::WelfareContributions,
        KpiDomain::WelfareDisbursements,
    ];
}

/// What a tile shows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum KpiTile {
    /// Figures from a completed walk
    Ready { kpis: AggregateResult },
    /// The latest run failed; `previous` holds the last good figures, if any
    Unavailable {
        message: String,
        previous: Option<AggregateResult>,
    },
}

impl KpiTile {
    /// Figures safe to display, if any
    pub fn figures(&self) -> Option<&AggregateResult> {
        match self {
            KpiTile::Ready { kpis } => Some(kpis),
            KpiTile::Unavailable { previous, .. } => previous.as_ref(),
        }
    }
}

/// Latest-wins tile state per KPI domain
#[derive(Debug)]
pub struct KpiBoard {
    slots: HashMap<KpiDomain, ResultSlot<KpiTile>>,
}

impl Default for KpiBoard {
    fn default() -> Self {
        Self {
            slots: KpiDomain::ALL
                .iter()
                .map(|d| (*d, ResultSlot::new()))
                .collect(),
        }
    }
}

impl KpiBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, domain: KpiDomain) -> &ResultSlot<KpiTile> {
        // every domain is inserted by Default
        &self.slots[&domain]
    }

    /// Tag a new run for `domain`; older in-flight runs become stale
    pub fn begin(&self, domain: KpiDomain) -> Generation {
        self.slot(domain).begin()
    }

    /// Publish the outcome of a run
    ///
    /// A failure keeps the last good figures visible as `previous` instead
    /// of replacing them with zeroes. Returns `false` for stale runs.
    pub fn record(
        &self,
        domain: KpiDomain,
        generation: Generation,
        outcome: &Result<AggregateResult, AggregateFailure>,
    ) -> bool {
        let slot = self.slot(domain);
        let tile = match outcome {
            Ok(kpis) => KpiTile::Ready { kpis: kpis.clone() },
            Err(failure) => KpiTile::Unavailable {
                message: failure.reason.user_message(),
                previous: slot.current().and_then(|t| t.figures().cloned()),
            },
        };
        slot.publish(generation, tile)
    }

    pub fn tile(&self, domain: KpiDomain) -> Option<KpiTile> {
        self.slot(domain).current()
    }
}
